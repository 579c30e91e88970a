//! Patient-to-doctor assignment endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::models::Assignment;

#[derive(Deserialize)]
pub struct NewAssignment {
    pub doctor_id: Uuid,
}

/// `GET /api/assignments`: rows naming the caller as patient or doctor.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    ctx.with_store(|store| store.list_assignments(&caller.identity_id))
        .map(Json)
}

/// `POST /api/assignments`: caller assigns themselves to a doctor.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Json(input): Json<NewAssignment>,
) -> Result<(StatusCode, Json<Assignment>), ApiError> {
    let assignment =
        ctx.with_store(|store| store.create_assignment(&caller.identity_id, &input.doctor_id))?;
    Ok((StatusCode::CREATED, Json(assignment)))
}
