use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProgressStatus;

/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorNote {
    pub id: Uuid,
    pub symptom_id: Uuid,
    pub doctor_id: Uuid,
    pub note: String,
    pub progress_status: Option<ProgressStatus>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctorNote {
    pub note: String,
    pub progress_status: Option<ProgressStatus>,
}
