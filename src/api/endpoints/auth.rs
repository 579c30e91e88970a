//! Sign-up, sign-in and sign-out endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::identity::{Session, SignUp};
use crate::models::Identity;

/// `POST /api/auth/signup`: create identity, profile and role grant.
///
/// The password is hashed on a blocking thread before the connection lock
/// is taken.
pub async fn sign_up(
    State(ctx): State<ApiContext>,
    Json(req): Json<SignUp>,
) -> Result<(StatusCode, Json<Identity>), ApiError> {
    let core = ctx.core.clone();
    let pending = tokio::task::spawn_blocking(move || core.identity().prepare_sign_up(&req))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {e}")))??;

    let identity = {
        let mut conn = ctx.core.lock_db()?;
        ctx.core.identity().commit_sign_up(&mut conn, pending)?
    };
    Ok((StatusCode::CREATED, Json(identity)))
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/signin`: open a session.
///
/// Only the credential lookup runs under the connection lock; the password
/// check runs on a blocking thread.
pub async fn sign_in(
    State(ctx): State<ApiContext>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Session>, ApiError> {
    let pending = {
        let conn = ctx.core.lock_db()?;
        ctx.core.identity().begin_sign_in(&conn, &req.email)?
    };

    let core = ctx.core.clone();
    let session = tokio::task::spawn_blocking(move || {
        core.identity().finish_sign_in(pending, &req.password)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Password check task failed: {e}")))??;
    Ok(Json(session))
}

/// `POST /api/auth/signout`: revoke the presented token.
pub async fn sign_out(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
) -> Result<StatusCode, ApiError> {
    ctx.core.identity().sign_out(&caller.token)?;
    Ok(StatusCode::NO_CONTENT)
}
