//! Repository layer: raw, table-scoped database operations.
//!
//! Nothing in here evaluates row policies. Callers are the guarded store
//! (`crate::store`), the identity provider and `authorization::has_role`.
//! Request handlers never reach this module directly.

mod assignment;
mod doctor_note;
mod identity;
mod message;
mod profile;
mod role_grant;
mod symptom;

pub use assignment::*;
pub use doctor_note::*;
pub use identity::*;
pub use message::*;
pub use profile::*;
pub use role_grant::*;
pub use symptom::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::enums::*;
    use crate::models::*;
    use chrono::Utc;
    use rusqlite::Connection;
    use uuid::Uuid;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn make_identity(conn: &Connection, email: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        insert_identity(
            conn,
            &IdentityRecord {
                id,
                email: email.into(),
                password_hash: "hash".into(),
                password_salt: "salt".into(),
                created_at: now,
            },
        )
        .unwrap();
        insert_profile(
            conn,
            &Profile {
                id,
                display_name: email.into(),
                role,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
        insert_role_grant(
            conn,
            &RoleGrant {
                id: Uuid::new_v4(),
                identity_id: id,
                role,
            },
        )
        .unwrap();
        id
    }

    fn make_symptom(conn: &Connection, patient_id: Uuid, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        insert_symptom(
            conn,
            &Symptom {
                id,
                patient_id,
                title: title.into(),
                description: Some("itchy patch".into()),
                photo_url: None,
                severity: Some(Severity::Mild),
                affected_area: Some("arm".into()),
                duration: Some("2 days".into()),
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
        id
    }

    #[test]
    fn identity_lookup_by_email() {
        let conn = test_db();
        let id = make_identity(&conn, "pat@example.com", Role::Patient);

        let found = get_identity_by_email(&conn, "pat@example.com").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(get_identity_by_email(&conn, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_constraint_violation() {
        let conn = test_db();
        make_identity(&conn, "pat@example.com", Role::Patient);

        let err = insert_identity(
            &conn,
            &IdentityRecord {
                id: Uuid::new_v4(),
                email: "pat@example.com".into(),
                password_hash: "h".into(),
                password_salt: "s".into(),
                created_at: Utc::now(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn dangling_reference_is_a_foreign_key_violation() {
        let conn = test_db();
        let err = insert_role_grant(
            &conn,
            &RoleGrant {
                id: Uuid::new_v4(),
                identity_id: Uuid::new_v4(),
                role: Role::Patient,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::ForeignKeyViolation(_)));
    }

    #[test]
    fn role_grant_pair_is_unique() {
        let conn = test_db();
        let id = make_identity(&conn, "doc@example.com", Role::Doctor);

        let err = insert_role_grant(
            &conn,
            &RoleGrant {
                id: Uuid::new_v4(),
                identity_id: id,
                role: Role::Doctor,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));

        // A second, different role is allowed.
        insert_role_grant(
            &conn,
            &RoleGrant {
                id: Uuid::new_v4(),
                identity_id: id,
                role: Role::Patient,
            },
        )
        .unwrap();
        assert_eq!(list_role_grants(&conn, &id).unwrap().len(), 2);
    }

    #[test]
    fn symptom_round_trip_and_update() {
        let conn = test_db();
        let patient = make_identity(&conn, "pat@example.com", Role::Patient);
        let symptom_id = make_symptom(&conn, patient, "Rash");

        let mut symptom = get_symptom(&conn, &symptom_id).unwrap().unwrap();
        assert_eq!(symptom.title, "Rash");
        assert_eq!(symptom.severity, Some(Severity::Mild));
        assert_eq!(symptom.affected_area.as_deref(), Some("arm"));

        symptom.severity = Some(Severity::Severe);
        symptom.updated_at = Utc::now();
        update_symptom(&conn, &symptom).unwrap();

        let reloaded = get_symptom(&conn, &symptom_id).unwrap().unwrap();
        assert_eq!(reloaded.severity, Some(Severity::Severe));
    }

    #[test]
    fn list_symptoms_filters_by_patient_in_insert_order() {
        let conn = test_db();
        let a = make_identity(&conn, "a@example.com", Role::Patient);
        let b = make_identity(&conn, "b@example.com", Role::Patient);
        make_symptom(&conn, a, "First");
        make_symptom(&conn, b, "Other");
        make_symptom(&conn, a, "Second");

        let titles: Vec<_> = list_symptoms(&conn, Some(&a))
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(list_symptoms(&conn, None).unwrap().len(), 3);
    }

    #[test]
    fn deleting_symptom_cascades_notes_and_nulls_message_reference() {
        let conn = test_db();
        let patient = make_identity(&conn, "pat@example.com", Role::Patient);
        let doctor = make_identity(&conn, "doc@example.com", Role::Doctor);
        let symptom_id = make_symptom(&conn, patient, "Rash");

        let note_id = Uuid::new_v4();
        insert_doctor_note(
            &conn,
            &DoctorNote {
                id: note_id,
                symptom_id,
                doctor_id: doctor,
                note: "Looks stable".into(),
                progress_status: Some(ProgressStatus::Stable),
                created_at: Utc::now(),
            },
        )
        .unwrap();

        let message_id = Uuid::new_v4();
        insert_message(
            &conn,
            &Message {
                id: message_id,
                sender_id: patient,
                receiver_id: doctor,
                content: "See my rash".into(),
                attachment_url: None,
                symptom_id: Some(symptom_id),
                is_read: false,
                created_at: Utc::now(),
            },
        )
        .unwrap();

        assert!(delete_symptom(&conn, &symptom_id).unwrap());
        assert!(get_doctor_note(&conn, &note_id).unwrap().is_none());
        let message = get_message(&conn, &message_id).unwrap().unwrap();
        assert_eq!(message.symptom_id, None);
    }

    #[test]
    fn messages_between_cover_both_directions() {
        let conn = test_db();
        let a = make_identity(&conn, "a@example.com", Role::Patient);
        let b = make_identity(&conn, "b@example.com", Role::Doctor);
        let c = make_identity(&conn, "c@example.com", Role::Doctor);

        for (from, to, text) in [(a, b, "hi"), (b, a, "hello"), (a, c, "elsewhere")] {
            insert_message(
                &conn,
                &Message {
                    id: Uuid::new_v4(),
                    sender_id: from,
                    receiver_id: to,
                    content: text.into(),
                    attachment_url: None,
                    symptom_id: None,
                    is_read: false,
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }

        let thread = list_messages_between(&conn, &a, &b).unwrap();
        let contents: Vec<_> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello"]);
        assert_eq!(count_unread_for(&conn, &a).unwrap(), 1);

        set_message_read(&conn, &thread[1].id, true).unwrap();
        assert_eq!(count_unread_for(&conn, &a).unwrap(), 0);
    }

    #[test]
    fn assignment_unique_and_removable() {
        let conn = test_db();
        let patient = make_identity(&conn, "pat@example.com", Role::Patient);
        let doctor = make_identity(&conn, "doc@example.com", Role::Doctor);

        let assignment = Assignment {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: doctor,
            created_at: Utc::now(),
        };
        insert_assignment(&conn, &assignment).unwrap();
        assert!(assignment_exists(&conn, &patient, &doctor).unwrap());
        assert!(!assignment_exists(&conn, &doctor, &patient).unwrap());

        let dup = insert_assignment(
            &conn,
            &Assignment {
                id: Uuid::new_v4(),
                ..assignment.clone()
            },
        );
        assert!(matches!(dup, Err(DatabaseError::ConstraintViolation(_))));

        assert_eq!(list_assignments_involving(&conn, &doctor).unwrap().len(), 1);
        assert!(delete_assignment(&conn, &patient, &doctor).unwrap());
        assert!(!assignment_exists(&conn, &patient, &doctor).unwrap());
    }

    #[test]
    fn deleting_identity_cascades_everything() {
        let conn = test_db();
        let patient = make_identity(&conn, "pat@example.com", Role::Patient);
        let symptom_id = make_symptom(&conn, patient, "Rash");

        assert!(delete_identity(&conn, &patient).unwrap());
        assert!(get_profile(&conn, &patient).unwrap().is_none());
        assert!(list_role_grants(&conn, &patient).unwrap().is_empty());
        assert!(get_symptom(&conn, &symptom_id).unwrap().is_none());
    }
}
