//! Realtime conversation feed over WebSocket.
//!
//! Connection lifecycle:
//! 1. Client opens `GET /ws/messages?token=<session>&peer=<identity>`
//! 2. The token is resolved and a message-insert subscription is taken
//!    before the upgrade completes, so nothing sent after the handshake
//!    is missed
//! 3. Each new message between the caller and the peer is pushed as JSON,
//!    once, and only if the caller may select it
//! 4. The feed ends when the client closes or the bus shuts down
//!
//! Messages sent before the connection are not replayed; clients load them
//! with `GET /api/messages?peer=`.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::events::{ChangeKind, ConversationView, EventBusError, Subscription, Table};
use crate::models::Message;
use crate::store::GuardedStore;

/// Query parameters for WebSocket upgrade.
#[derive(Deserialize)]
pub struct FeedQuery {
    token: String,
    peer: Uuid,
}

/// WebSocket upgrade handler.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = ctx
        .core
        .identity()
        .resolve(&query.token)
        .ok_or(ApiError::Unauthorized)?;

    let subscription = ctx.core.events().subscribe(Table::Messages, ChangeKind::Insert);
    tracing::info!(identity = %identity, peer = %query.peer, "Message feed opened");

    let core = ctx.core.clone();
    let peer = query.peer;
    Ok(ws.on_upgrade(move |socket| handle_feed(socket, core, subscription, identity, peer)))
}

async fn handle_feed(
    socket: WebSocket,
    core: Arc<CoreState>,
    mut subscription: Subscription,
    identity: Uuid,
    peer: Uuid,
) {
    let (mut sink, mut stream) = socket.split();
    let mut view = ConversationView::new(identity, peer, Vec::new());

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                    // Inbound frames carry nothing; sends go through POST /api/messages.
                    Some(Ok(_)) => {}
                }
            }
            event = subscription.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(EventBusError::Lagged(_)) => continue,
                    Err(_) => break,
                };
                if !view.apply(&event) {
                    continue;
                }
                let Some(message) = view.messages().last().cloned() else {
                    continue;
                };
                if !may_select(&core, &identity, &message) {
                    continue;
                }
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(_) => continue,
                };
                if sink.send(WsMessage::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
    tracing::info!(identity = %identity, peer = %peer, "Message feed closed");
}

/// Select policy check; the connection guard is dropped before returning.
fn may_select(core: &CoreState, identity: &Uuid, message: &Message) -> bool {
    let Ok(conn) = core.lock_db() else {
        return false;
    };
    GuardedStore::new(&conn, core.events())
        .can_select_message(identity, message)
        .unwrap_or(false)
}
