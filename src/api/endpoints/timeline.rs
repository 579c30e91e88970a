//! Patient timeline endpoint.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::timeline::{patient_timeline, TimelineEntry};

#[derive(Deserialize)]
pub struct TimelineQuery {
    /// Defaults to the caller.
    pub patient_id: Option<Uuid>,
}

/// `GET /api/timeline?patient_id=`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelineEntry>>, ApiError> {
    let patient_id = query.patient_id.unwrap_or(caller.identity_id);
    ctx.with_store(|store| patient_timeline(store, &caller.identity_id, &patient_id))
        .map(Json)
}
