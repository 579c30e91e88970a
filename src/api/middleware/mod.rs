//! API middleware stack.
//!
//! Execution order on session routes (outermost → innermost):
//! 1. Auth validator: bearer token to identity
//! 2. Rate limiter: keyed by the resolved identity
//! 3. Audit logger: logs after auth, has the identity
//!
//! Routes without a session run the rate limiter keyed by client address.

pub mod audit;
pub mod auth;
pub mod rate;
