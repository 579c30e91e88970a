//! Local input checks run before anything reaches the store.
//!
//! These fail fast with a field-level message. They are a courtesy only:
//! the row policies and table constraints remain the authoritative gate.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::models::{NewDoctorNote, NewMessage, NewSymptom, SymptomPatch};
use crate::storage::{Bucket, Locator};

pub const MAX_DISPLAY_NAME_CHARS: usize = 100;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const MAX_NOTE_CHARS: usize = 4000;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_PATTERN.is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("email", "Enter a valid email address"))
    }
}

pub fn validate_password(password: &str, min_len: usize) -> Result<(), ValidationError> {
    if password.chars().count() < min_len {
        return Err(ValidationError::new(
            "password",
            format!("Password must be at least {min_len} characters"),
        ));
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    required("display_name", name, MAX_DISPLAY_NAME_CHARS)
}

/// `owner` is the patient recording the symptom.
pub fn validate_new_symptom(symptom: &NewSymptom, owner: &Uuid) -> Result<(), ValidationError> {
    required("title", &symptom.title, MAX_TITLE_CHARS)?;
    if let Some(photo) = &symptom.photo_url {
        object_locator("photo_url", photo, Bucket::SymptomPhotos, owner)?;
    }
    Ok(())
}

pub fn validate_symptom_patch(patch: &SymptomPatch, owner: &Uuid) -> Result<(), ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::new("patch", "Nothing to update"));
    }
    if let Some(title) = &patch.title {
        required("title", title, MAX_TITLE_CHARS)?;
    }
    if let Some(photo) = &patch.photo_url {
        object_locator("photo_url", photo, Bucket::SymptomPhotos, owner)?;
    }
    Ok(())
}

pub fn validate_new_note(note: &NewDoctorNote) -> Result<(), ValidationError> {
    required("note", &note.note, MAX_NOTE_CHARS)
}

pub fn validate_new_message(message: &NewMessage, sender: &Uuid) -> Result<(), ValidationError> {
    required("content", &message.content, MAX_MESSAGE_CHARS)?;
    if let Some(attachment) = &message.attachment_url {
        object_locator("attachment_url", attachment, Bucket::MessageAttachments, sender)?;
    }
    Ok(())
}

/// `value` must be a `bucket/owner/...` locator in `bucket`, under `owner`'s prefix.
fn object_locator(
    field: &'static str,
    value: &str,
    bucket: Bucket,
    owner: &Uuid,
) -> Result<(), ValidationError> {
    let locator: Locator = value
        .parse()
        .map_err(|_| ValidationError::new(field, "Must be a stored object locator"))?;
    if locator.bucket != bucket {
        return Err(ValidationError::new(
            field,
            format!("Must be stored in {bucket}"),
        ));
    }
    if !locator.is_owned_by(owner) {
        return Err(ValidationError::new(field, "Must be an object you uploaded"));
    }
    Ok(())
}

fn required(field: &'static str, value: &str, max_chars: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "This field is required"));
    }
    if value.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("Must be at most {max_chars} characters"),
        ));
    }
    Ok(())
}
