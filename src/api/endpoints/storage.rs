//! Object storage endpoints.
//!
//! - `PUT /api/storage/:bucket/*path`: upload (owner prefix required)
//! - `DELETE /api/storage/:bucket/*path`: delete (owner only)
//! - `GET /storage/:bucket/*path`: public read

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::storage::Bucket;

#[derive(Serialize)]
pub struct UploadResponse {
    /// `bucket/path`, suitable for `photo_url` / `attachment_url`.
    pub locator: String,
    pub url: String,
}

fn parse_bucket(bucket: &str) -> Result<Bucket, ApiError> {
    Ok(bucket.parse::<Bucket>()?)
}

/// `PUT /api/storage/:bucket/*path`
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path((bucket, path)): Path<(String, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let bucket = parse_bucket(&bucket)?;
    let locator = ctx
        .core
        .objects()
        .upload(&caller.identity_id, bucket, &path, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("/storage/{locator}"),
            locator: locator.to_string(),
        }),
    ))
}

/// `DELETE /api/storage/:bucket/*path`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let bucket = parse_bucket(&bucket)?;
    ctx.core.objects().delete(&caller.identity_id, bucket, &path)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /storage/:bucket/*path`: no authentication.
pub async fn read(
    State(ctx): State<ApiContext>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let bucket = parse_bucket(&bucket)?;
    let bytes = ctx.core.objects().read(bucket, &path)?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
}
