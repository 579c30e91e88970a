//! HTTP and WebSocket surface.
//!
//! Routes are nested under `/api/` and protected by a middleware stack:
//! Auth → Rate Limit → Audit → Handler. Object reads under `/storage/` and
//! the message feed under `/ws/` sit outside the session layer.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
