//! Per-client rate limiting middleware.
//!
//! Sliding-window limits keyed by the authenticated identity, else by
//! client address, else a shared anonymous bucket. The bearer header is
//! never trusted here: only a session already resolved by the auth layer
//! counts as an identity.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};

/// Extract a rate-limit key from the request.
fn rate_key(req: &Request<axum::body::Body>) -> String {
    if let Some(identity) = req.extensions().get::<IdentityContext>() {
        return format!("identity:{}", identity.identity_id);
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Returns 429 with `Retry-After` when the client is over its limit.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = rate_key(&req);

    // MutexGuard is !Send: must drop before .await via block scope
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter.check(&key).map_err(|retry_after| {
            tracing::warn!(key = %key, retry_after, "Rate limit exceeded");
            ApiError::RateLimited { retry_after }
        })?;
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(bearer: Option<&str>) -> Request<axum::body::Body> {
        let mut builder = Request::builder().uri("/api/auth/signin");
        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let mut req = builder.body(axum::body::Body::empty()).unwrap();
        let addr: SocketAddr = "203.0.113.7:40000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn unresolved_bearer_does_not_change_the_key() {
        assert_eq!(rate_key(&request(None)), "ip:203.0.113.7");
        assert_eq!(rate_key(&request(Some("forged-1"))), "ip:203.0.113.7");
        assert_eq!(rate_key(&request(Some("forged-2"))), "ip:203.0.113.7");
    }

    #[test]
    fn resolved_identity_is_the_key() {
        let identity_id = uuid::Uuid::new_v4();
        let mut req = request(Some("real"));
        req.extensions_mut().insert(IdentityContext {
            identity_id,
            token: "real".into(),
        });
        assert_eq!(rate_key(&req), format!("identity:{identity_id}"));
    }
}
