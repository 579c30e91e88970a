use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Severity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Storage locator of the photo, `bucket/path`.
    pub photo_url: Option<String>,
    pub severity: Option<Severity>,
    pub affected_area: Option<String>,
    pub duration: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a new symptom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSymptom {
    pub title: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub severity: Option<Severity>,
    pub affected_area: Option<String>,
    pub duration: Option<String>,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymptomPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub severity: Option<Severity>,
    pub affected_area: Option<String>,
    pub duration: Option<String>,
}

impl SymptomPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.photo_url.is_none()
            && self.severity.is_none()
            && self.affected_area.is_none()
            && self.duration.is_none()
    }

    /// Apply the patch onto a copy of `symptom`, bumping `updated_at`.
    pub fn apply_to(&self, symptom: &Symptom, now: DateTime<Utc>) -> Symptom {
        let mut updated = symptom.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(description) = &self.description {
            updated.description = Some(description.clone());
        }
        if let Some(photo_url) = &self.photo_url {
            updated.photo_url = Some(photo_url.clone());
        }
        if let Some(severity) = self.severity {
            updated.severity = Some(severity);
        }
        if let Some(area) = &self.affected_area {
            updated.affected_area = Some(area.clone());
        }
        if let Some(duration) = &self.duration {
            updated.duration = Some(duration.clone());
        }
        updated.updated_at = now;
        updated
    }
}
