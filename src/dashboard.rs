//! Role-specific dashboard summaries.

use serde::Serialize;
use uuid::Uuid;

use crate::models::enums::Role;
use crate::models::{Assignment, Profile, Symptom};
use crate::store::{GuardedStore, StoreError};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Dashboard {
    Patient(PatientDashboard),
    Doctor(DoctorDashboard),
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDashboard {
    pub profile: Profile,
    /// Newest first.
    pub symptoms: Vec<Symptom>,
    pub assignments: Vec<Assignment>,
    pub unread_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorDashboard {
    pub profile: Profile,
    pub assignments: Vec<Assignment>,
    /// Visible symptoms of assigned patients, newest first.
    pub patient_symptoms: Vec<Symptom>,
    pub unread_messages: i64,
}

/// Build the dashboard matching the requester's profile role.
pub fn load_dashboard(store: &GuardedStore<'_>, requester: &Uuid) -> Result<Dashboard, StoreError> {
    let profile = store.get_profile(requester, requester)?;
    let assignments = store.list_assignments(requester)?;
    let unread_messages = store.unread_count(requester)?;

    match profile.role {
        Role::Patient => {
            let mut symptoms = store.list_symptoms(requester, Some(requester))?;
            symptoms.reverse();
            Ok(Dashboard::Patient(PatientDashboard {
                profile,
                symptoms,
                assignments,
                unread_messages,
            }))
        }
        Role::Doctor => {
            let mut patient_symptoms = Vec::new();
            for assignment in assignments.iter().filter(|a| &a.doctor_id == requester) {
                patient_symptoms.extend(store.list_symptoms(requester, Some(&assignment.patient_id))?);
            }
            patient_symptoms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(Dashboard::Doctor(DoctorDashboard {
                profile,
                assignments,
                patient_symptoms,
                unread_messages,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::events::EventBus;
    use crate::models::NewMessage;
    use crate::store::tests::{sign_up, symptom};

    #[test]
    fn patient_dashboard_lists_newest_first() {
        let mut conn = open_memory_database().unwrap();
        let bus = EventBus::default();
        let patient = sign_up(&mut conn, "pat@example.com", Role::Patient);
        let doctor = sign_up(&mut conn, "doc@example.com", Role::Doctor);
        let store = GuardedStore::new(&conn, &bus);

        store.create_symptom(&patient, &symptom("Older", "leg")).unwrap();
        store.create_symptom(&patient, &symptom("Newer", "arm")).unwrap();
        store.create_assignment(&patient, &doctor).unwrap();
        store
            .send_message(
                &doctor,
                &NewMessage {
                    receiver_id: patient,
                    content: "How are you?".into(),
                    attachment_url: None,
                    symptom_id: None,
                },
            )
            .unwrap();

        let Dashboard::Patient(dash) = load_dashboard(&store, &patient).unwrap() else {
            panic!("expected patient dashboard");
        };
        let titles: Vec<_> = dash.symptoms.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
        assert_eq!(dash.assignments.len(), 1);
        assert_eq!(dash.unread_messages, 1);
    }

    #[test]
    fn doctor_dashboard_covers_assigned_patients_only() {
        let mut conn = open_memory_database().unwrap();
        let bus = EventBus::default();
        let assigned = sign_up(&mut conn, "a@example.com", Role::Patient);
        let unassigned = sign_up(&mut conn, "b@example.com", Role::Patient);
        let doctor = sign_up(&mut conn, "doc@example.com", Role::Doctor);
        let store = GuardedStore::new(&conn, &bus);

        store.create_symptom(&assigned, &symptom("Fatigue", "body")).unwrap();
        store.create_symptom(&unassigned, &symptom("Dizziness", "head")).unwrap();
        store.create_assignment(&assigned, &doctor).unwrap();

        let Dashboard::Doctor(dash) = load_dashboard(&store, &doctor).unwrap() else {
            panic!("expected doctor dashboard");
        };
        assert_eq!(dash.profile.role, Role::Doctor);
        assert_eq!(dash.patient_symptoms.len(), 1);
        assert_eq!(dash.patient_symptoms[0].patient_id, assigned);
        assert_eq!(dash.unread_messages, 0);
    }
}
