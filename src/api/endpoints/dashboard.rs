//! Dashboard endpoint.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::dashboard::{load_dashboard, Dashboard};

/// `GET /api/dashboard`: patient or doctor view, by the caller's role.
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
) -> Result<Json<Dashboard>, ApiError> {
    ctx.with_store(|store| load_dashboard(store, &caller.identity_id))
        .map(Json)
}
