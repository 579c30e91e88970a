//! Per-patient symptom timeline.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{DoctorNote, Symptom};
use crate::store::{GuardedStore, StoreError};

/// One symptom with the notes written against it.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub symptom: Symptom,
    pub notes: Vec<DoctorNote>,
}

/// The patient's symptoms the requester may see, oldest first, each with its
/// visible notes (also oldest first). An unassigned doctor gets nothing.
pub fn patient_timeline(
    store: &GuardedStore<'_>,
    requester: &Uuid,
    patient_id: &Uuid,
) -> Result<Vec<TimelineEntry>, StoreError> {
    let symptoms = store.list_symptoms(requester, Some(patient_id))?;
    let mut entries = Vec::with_capacity(symptoms.len());
    for symptom in symptoms {
        let notes = store.list_notes(requester, &symptom.id)?;
        entries.push(TimelineEntry { symptom, notes });
    }
    tracing::debug!(patient_id = %patient_id, entries = entries.len(), "Timeline assembled");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::events::EventBus;
    use crate::models::enums::Role;
    use crate::models::NewDoctorNote;
    use crate::store::tests::{sign_up, symptom};

    #[test]
    fn timeline_orders_symptoms_and_notes() {
        let mut conn = open_memory_database().unwrap();
        let bus = EventBus::default();
        let patient = sign_up(&mut conn, "pat@example.com", Role::Patient);
        let doctor = sign_up(&mut conn, "doc@example.com", Role::Doctor);
        let store = GuardedStore::new(&conn, &bus);

        let first = store.create_symptom(&patient, &symptom("Fever", "body")).unwrap();
        let second = store.create_symptom(&patient, &symptom("Cough", "chest")).unwrap();
        store.create_assignment(&patient, &doctor).unwrap();
        for text in ["day one", "day two"] {
            store
                .create_note(
                    &doctor,
                    &first.id,
                    &NewDoctorNote {
                        note: text.into(),
                        progress_status: None,
                    },
                )
                .unwrap();
        }

        let timeline = patient_timeline(&store, &patient, &patient).unwrap();
        let ids: Vec<_> = timeline.iter().map(|e| e.symptom.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        let notes: Vec<_> = timeline[0].notes.iter().map(|n| n.note.as_str()).collect();
        assert_eq!(notes, vec!["day one", "day two"]);
        assert!(timeline[1].notes.is_empty());

        assert_eq!(patient_timeline(&store, &doctor, &patient).unwrap().len(), 2);
    }

    #[test]
    fn unassigned_doctor_sees_empty_timeline() {
        let mut conn = open_memory_database().unwrap();
        let bus = EventBus::default();
        let patient = sign_up(&mut conn, "pat@example.com", Role::Patient);
        let doctor = sign_up(&mut conn, "doc@example.com", Role::Doctor);
        let store = GuardedStore::new(&conn, &bus);

        store.create_symptom(&patient, &symptom("Rash", "arm")).unwrap();
        assert!(patient_timeline(&store, &doctor, &patient).unwrap().is_empty());
    }
}
