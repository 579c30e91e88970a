//! Symptom and doctor-note endpoints.
//!
//! - `GET/POST /api/symptoms`
//! - `GET/PATCH/DELETE /api/symptoms/:id`
//! - `GET/POST /api/symptoms/:id/notes`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::models::{DoctorNote, NewDoctorNote, NewSymptom, Symptom, SymptomPatch};

#[derive(Deserialize)]
pub struct SymptomListQuery {
    pub patient_id: Option<Uuid>,
}

/// `GET /api/symptoms`: visible symptoms, oldest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Query(query): Query<SymptomListQuery>,
) -> Result<Json<Vec<Symptom>>, ApiError> {
    ctx.with_store(|store| store.list_symptoms(&caller.identity_id, query.patient_id.as_ref()))
        .map(Json)
}

/// `POST /api/symptoms`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Json(input): Json<NewSymptom>,
) -> Result<(StatusCode, Json<Symptom>), ApiError> {
    let symptom = ctx.with_store(|store| store.create_symptom(&caller.identity_id, &input))?;
    Ok((StatusCode::CREATED, Json(symptom)))
}

/// `GET /api/symptoms/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Symptom>, ApiError> {
    ctx.with_store(|store| store.get_symptom(&caller.identity_id, &id))
        .map(Json)
}

/// `PATCH /api/symptoms/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
    Json(patch): Json<SymptomPatch>,
) -> Result<Json<Symptom>, ApiError> {
    ctx.with_store(|store| store.update_symptom(&caller.identity_id, &id, &patch))
        .map(Json)
}

/// `DELETE /api/symptoms/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.with_store(|store| store.delete_symptom(&caller.identity_id, &id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/symptoms/:id/notes`
pub async fn notes(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DoctorNote>>, ApiError> {
    ctx.with_store(|store| store.list_notes(&caller.identity_id, &id))
        .map(Json)
}

/// `POST /api/symptoms/:id/notes`: assigned doctors only.
pub async fn add_note(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<NewDoctorNote>,
) -> Result<(StatusCode, Json<DoctorNote>), ApiError> {
    let note = ctx.with_store(|store| store.create_note(&caller.identity_id, &id, &input))?;
    Ok((StatusCode::CREATED, Json(note)))
}
