//! Message endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IdentityContext};
use crate::models::{Message, NewMessage};

#[derive(Deserialize)]
pub struct ConversationQuery {
    pub peer: Uuid,
}

/// `GET /api/messages?peer=`: conversation with one peer, oldest first.
pub async fn conversation(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    ctx.with_store(|store| store.conversation(&caller.identity_id, &query.peer))
        .map(Json)
}

/// `POST /api/messages`
pub async fn send(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Json(input): Json<NewMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = ctx.with_store(|store| store.send_message(&caller.identity_id, &input))?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /api/messages/:id/read`: receiver only.
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<IdentityContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, ApiError> {
    ctx.with_store(|store| store.mark_read(&caller.identity_id, &id))
        .map(Json)
}
