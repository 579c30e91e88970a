//! API endpoint handlers.
//!
//! Each module corresponds to one resource. Data access goes through
//! `ApiContext::with_store`, so every handler is subject to row policies.

pub mod assignments;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod lookup;
pub mod messages;
pub mod profiles;
pub mod storage;
pub mod symptoms;
pub mod timeline;
