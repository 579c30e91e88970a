//! Own profile and role grants.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::models::{Profile, ProfilePatch, RoleGrant};

/// `GET /api/profile`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
) -> Result<Json<Profile>, ApiError> {
    let me = caller.identity_id;
    ctx.with_store(|store| store.get_profile(&me, &me)).map(Json)
}

/// `PATCH /api/profile`: display name only.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Profile>, ApiError> {
    ctx.with_store(|store| store.update_profile(&caller.identity_id, &patch))
        .map(Json)
}

/// `GET /api/roles`
pub async fn roles(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
) -> Result<Json<Vec<RoleGrant>>, ApiError> {
    ctx.with_store(|store| store.list_role_grants(&caller.identity_id))
        .map(Json)
}
