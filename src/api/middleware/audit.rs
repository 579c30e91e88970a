//! Audit logging middleware.
//!
//! Logs every API request with identity, method, path and response status.
//! Runs innermost (after auth has injected `IdentityContext`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, IdentityContext};

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let identity = req
        .extensions()
        .get::<IdentityContext>()
        .map(|c| c.identity_id);

    let response = next.run(req).await;

    let status = response.status().as_u16();
    tracing::info!(
        method = %method,
        path = %path,
        identity = ?identity,
        status,
        "API access"
    );
    if let Some(ctx) = ctx {
        ctx.core.audit().log(identity, &method, &path, status);
    }

    response
}
