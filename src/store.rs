//! Guarded store: the only data-access entry point for request handlers.
//!
//! Every read filters rows through their select policy and every write is
//! authorized before it reaches the repository. A single row the requester
//! may not select is reported as not found. A denied write on a visible row
//! is reported as `PolicyDenied`. Committed writes are published on the
//! event bus.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::authorization::{authorize, AuthorizationError, Operation, RowPolicy};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::events::{ChangeEvent, ChangeKind, EventBus, Table};
use crate::models::{
    Assignment, DoctorNote, Message, NewDoctorNote, NewMessage, NewSymptom, Profile, ProfilePatch,
    RoleGrant, Symptom, SymptomPatch,
};
use crate::validation::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{operation:?} on {table} denied by policy")]
    PolicyDenied {
        table: &'static str,
        operation: Operation,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(detail) => StoreError::Conflict(detail),
            DatabaseError::ForeignKeyViolation(detail) => StoreError::InvalidReference(detail),
            other => StoreError::Database(other),
        }
    }
}

/// Per-request view of the store, bound to one connection and the bus.
pub struct GuardedStore<'a> {
    conn: &'a Connection,
    events: &'a EventBus,
}

impl<'a> GuardedStore<'a> {
    pub fn new(conn: &'a Connection, events: &'a EventBus) -> Self {
        Self { conn, events }
    }

    // ── guards ──────────────────────────────────────────────

    fn can<T: RowPolicy>(&self, requester: &Uuid, row: &T, op: Operation) -> Result<bool, StoreError> {
        Ok(authorize(self.conn, requester, row, op)?.allowed)
    }

    fn require<T: RowPolicy>(&self, requester: &Uuid, row: &T, op: Operation) -> Result<(), StoreError> {
        if self.can(requester, row, op)? {
            Ok(())
        } else {
            debug!(table = T::TABLE, operation = ?op, requester = %requester, "Write denied");
            Err(StoreError::PolicyDenied {
                table: T::TABLE,
                operation: op,
            })
        }
    }

    /// Keep only `Some(row)` the requester may select, else `NotFound`.
    fn visible<T: RowPolicy>(
        &self,
        requester: &Uuid,
        row: Option<T>,
        entity: &'static str,
        id: &Uuid,
    ) -> Result<T, StoreError> {
        match row {
            Some(row) if self.can(requester, &row, Operation::Select)? => Ok(row),
            _ => Err(StoreError::NotFound { entity, id: *id }),
        }
    }

    fn filter_visible<T: RowPolicy>(&self, requester: &Uuid, rows: Vec<T>) -> Result<Vec<T>, StoreError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if self.can(requester, &row, Operation::Select)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn publish<T: Serialize>(&self, table: Table, kind: ChangeKind, record: &T) {
        match ChangeEvent::new(table, kind, record) {
            Ok(event) => {
                self.events.publish(event);
            }
            Err(e) => warn!(table = ?table, "Failed to encode change event: {e}"),
        }
    }

    // ── profiles & role grants ──────────────────────────────

    pub fn get_profile(&self, requester: &Uuid, id: &Uuid) -> Result<Profile, StoreError> {
        let row = repository::get_profile(self.conn, id)?;
        self.visible(requester, row, "Profile", id)
    }

    /// Self-edit. Only the display name is patchable.
    pub fn update_profile(&self, requester: &Uuid, patch: &ProfilePatch) -> Result<Profile, StoreError> {
        let mut profile = self.get_profile(requester, requester)?;
        if let Some(name) = &patch.display_name {
            validation::validate_display_name(name)?;
            profile.display_name = name.trim().to_string();
        }
        self.require(requester, &profile, Operation::Update)?;
        profile.updated_at = Utc::now();
        repository::update_profile(self.conn, &profile)?;
        Ok(profile)
    }

    pub fn list_role_grants(&self, requester: &Uuid) -> Result<Vec<RoleGrant>, StoreError> {
        let rows = repository::list_role_grants(self.conn, requester)?;
        self.filter_visible(requester, rows)
    }

    // ── symptoms ────────────────────────────────────────────

    /// Visible symptoms, oldest first, optionally restricted to one patient.
    pub fn list_symptoms(
        &self,
        requester: &Uuid,
        patient_id: Option<&Uuid>,
    ) -> Result<Vec<Symptom>, StoreError> {
        let rows = repository::list_symptoms(self.conn, patient_id)?;
        self.filter_visible(requester, rows)
    }

    pub fn get_symptom(&self, requester: &Uuid, id: &Uuid) -> Result<Symptom, StoreError> {
        let row = repository::get_symptom(self.conn, id)?;
        self.visible(requester, row, "Symptom", id)
    }

    pub fn create_symptom(&self, requester: &Uuid, input: &NewSymptom) -> Result<Symptom, StoreError> {
        validation::validate_new_symptom(input, requester)?;
        let now = Utc::now();
        let symptom = Symptom {
            id: Uuid::new_v4(),
            patient_id: *requester,
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            photo_url: input.photo_url.clone(),
            severity: input.severity,
            affected_area: input.affected_area.clone(),
            duration: input.duration.clone(),
            created_at: now,
            updated_at: now,
        };
        self.require(requester, &symptom, Operation::Insert)?;
        repository::insert_symptom(self.conn, &symptom)?;
        self.publish(Table::Symptoms, ChangeKind::Insert, &symptom);
        Ok(symptom)
    }

    pub fn update_symptom(
        &self,
        requester: &Uuid,
        id: &Uuid,
        patch: &SymptomPatch,
    ) -> Result<Symptom, StoreError> {
        validation::validate_symptom_patch(patch, requester)?;
        let current = self.get_symptom(requester, id)?;
        self.require(requester, &current, Operation::Update)?;
        let updated = patch.apply_to(&current, Utc::now());
        repository::update_symptom(self.conn, &updated)?;
        self.publish(Table::Symptoms, ChangeKind::Update, &updated);
        Ok(updated)
    }

    pub fn delete_symptom(&self, requester: &Uuid, id: &Uuid) -> Result<(), StoreError> {
        let current = self.get_symptom(requester, id)?;
        self.require(requester, &current, Operation::Delete)?;
        repository::delete_symptom(self.conn, id)?;
        self.publish(Table::Symptoms, ChangeKind::Delete, &current);
        Ok(())
    }

    // ── doctor notes ────────────────────────────────────────

    /// Notes on a visible symptom that the requester may select, oldest first.
    pub fn list_notes(&self, requester: &Uuid, symptom_id: &Uuid) -> Result<Vec<DoctorNote>, StoreError> {
        self.get_symptom(requester, symptom_id)?;
        let rows = repository::list_notes_for_symptom(self.conn, symptom_id)?;
        self.filter_visible(requester, rows)
    }

    /// Notes are immutable once written; there is no update or delete.
    pub fn create_note(
        &self,
        requester: &Uuid,
        symptom_id: &Uuid,
        input: &NewDoctorNote,
    ) -> Result<DoctorNote, StoreError> {
        validation::validate_new_note(input)?;
        if repository::get_symptom(self.conn, symptom_id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "Symptom",
                id: *symptom_id,
            });
        }
        let note = DoctorNote {
            id: Uuid::new_v4(),
            symptom_id: *symptom_id,
            doctor_id: *requester,
            note: input.note.trim().to_string(),
            progress_status: input.progress_status,
            created_at: Utc::now(),
        };
        self.require(requester, &note, Operation::Insert)?;
        repository::insert_doctor_note(self.conn, &note)?;
        self.publish(Table::DoctorNotes, ChangeKind::Insert, &note);
        Ok(note)
    }

    // ── messages ────────────────────────────────────────────

    /// Messages between the requester and `peer`, oldest first.
    pub fn conversation(&self, requester: &Uuid, peer: &Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = repository::list_messages_between(self.conn, requester, peer)?;
        self.filter_visible(requester, rows)
    }

    pub fn send_message(&self, requester: &Uuid, input: &NewMessage) -> Result<Message, StoreError> {
        validation::validate_new_message(input, requester)?;
        if repository::get_profile(self.conn, &input.receiver_id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "Profile",
                id: input.receiver_id,
            });
        }
        // A back-reference must name a symptom the sender can see.
        if let Some(symptom_id) = &input.symptom_id {
            self.get_symptom(requester, symptom_id)?;
        }
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: *requester,
            receiver_id: input.receiver_id,
            content: input.content.clone(),
            attachment_url: input.attachment_url.clone(),
            symptom_id: input.symptom_id,
            is_read: false,
            created_at: Utc::now(),
        };
        self.require(requester, &message, Operation::Insert)?;
        repository::insert_message(self.conn, &message)?;
        self.publish(Table::Messages, ChangeKind::Insert, &message);
        Ok(message)
    }

    /// Receiver-only. The read flag is the single mutable column.
    pub fn mark_read(&self, requester: &Uuid, id: &Uuid) -> Result<Message, StoreError> {
        let row = repository::get_message(self.conn, id)?;
        let mut message = self.visible(requester, row, "Message", id)?;
        self.require(requester, &message, Operation::Update)?;
        if !message.is_read {
            repository::set_message_read(self.conn, id, true)?;
            message.is_read = true;
            self.publish(Table::Messages, ChangeKind::Update, &message);
        }
        Ok(message)
    }

    /// Whether the requester may see a message delivered by the feed.
    pub fn can_select_message(&self, requester: &Uuid, message: &Message) -> Result<bool, StoreError> {
        self.can(requester, message, Operation::Select)
    }

    pub fn unread_count(&self, requester: &Uuid) -> Result<i64, StoreError> {
        Ok(repository::count_unread_for(self.conn, requester)?)
    }

    // ── assignments ─────────────────────────────────────────

    pub fn list_assignments(&self, requester: &Uuid) -> Result<Vec<Assignment>, StoreError> {
        let rows = repository::list_assignments_involving(self.conn, requester)?;
        self.filter_visible(requester, rows)
    }

    /// Self-service: the requester assigns themselves to `doctor_id`.
    pub fn create_assignment(&self, requester: &Uuid, doctor_id: &Uuid) -> Result<Assignment, StoreError> {
        if repository::get_profile(self.conn, doctor_id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "Profile",
                id: *doctor_id,
            });
        }
        let assignment = Assignment {
            id: Uuid::new_v4(),
            patient_id: *requester,
            doctor_id: *doctor_id,
            created_at: Utc::now(),
        };
        self.require(requester, &assignment, Operation::Insert)?;
        repository::insert_assignment(self.conn, &assignment)?;
        self.publish(Table::Assignments, ChangeKind::Insert, &assignment);
        Ok(assignment)
    }
}
