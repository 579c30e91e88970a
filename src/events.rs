//! Change-event feed.
//!
//! The guarded store publishes a `ChangeEvent` after each committed write.
//! Subscribers pick a (table, kind) pair; events published before a
//! subscription exists are not replayed. Delivery is at-least-once from the
//! consumer's point of view, so consumers de-duplicate by `event_id`
//! (see [`ConversationView`]).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Message;

/// Default channel capacity before slow receivers start lagging.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Symptoms,
    DoctorNotes,
    Messages,
    Assignments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One committed row change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub table: Table,
    pub kind: ChangeKind,
    /// The row after the change (before, for deletes).
    pub record: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new<T: Serialize>(
        table: Table,
        kind: ChangeKind,
        record: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: Uuid::new_v4(),
            table,
            kind,
            record: serde_json::to_value(record)?,
            occurred_at: Utc::now(),
        })
    }

    /// Decode the record into a typed row.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.record)
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

/// Publish/subscribe hub for change events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ChangeEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        debug!(
            event_id = %event.event_id,
            table = ?event.table,
            kind = ?event.kind,
            "Publishing change event"
        );
        let receivers = self.sender.send(event).unwrap_or(0);
        if receivers == 0 {
            debug!("No subscribers listening to change event");
        }
        receivers
    }

    /// Subscribe to one table and change kind. Dropping the subscription
    /// releases it.
    pub fn subscribe(&self, table: Table, kind: ChangeKind) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            table,
            kind,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Filtered receiver for a single (table, kind) pair.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    table: Table,
    kind: ChangeKind,
}

impl Subscription {
    fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && event.kind == self.kind
    }

    /// Wait for the next matching event.
    pub async fn recv(&mut self) -> Result<ChangeEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Change subscription lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Result<ChangeEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Change subscription lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Conversation view
// ═══════════════════════════════════════════════════════════

/// In-memory state of one open conversation between two identities.
///
/// Appends inserted messages whose sender/receiver pair matches, in either
/// direction. Repeated deliveries (same event id, or a message already in
/// the view) are ignored.
#[derive(Debug, Clone)]
pub struct ConversationView {
    participant: Uuid,
    peer: Uuid,
    messages: Vec<Message>,
    seen_events: HashSet<Uuid>,
    seen_messages: HashSet<Uuid>,
}

impl ConversationView {
    /// Start a view from the messages already loaded for the conversation.
    pub fn new(participant: Uuid, peer: Uuid, initial: Vec<Message>) -> Self {
        let seen_messages = initial.iter().map(|m| m.id).collect();
        Self {
            participant,
            peer,
            messages: initial,
            seen_events: HashSet::new(),
            seen_messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Apply a change event. Returns `true` if the view gained a message.
    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        if event.table != Table::Messages || event.kind != ChangeKind::Insert {
            return false;
        }
        if !self.seen_events.insert(event.event_id) {
            return false;
        }
        let message: Message = match event.decode() {
            Ok(m) => m,
            Err(e) => {
                warn!(event_id = %event.event_id, "Undecodable message event: {e}");
                return false;
            }
        };
        if !message.is_between(&self.participant, &self.peer) {
            return false;
        }
        if !self.seen_messages.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}
