use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::Assignment;

pub fn insert_assignment(conn: &Connection, assignment: &Assignment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO assignments (id, patient_id, doctor_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            assignment.id.to_string(),
            assignment.patient_id.to_string(),
            assignment.doctor_id.to_string(),
            assignment.created_at,
        ],
    )?;
    Ok(())
}

pub fn assignment_exists(
    conn: &Connection,
    patient_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM assignments WHERE patient_id = ?1 AND doctor_id = ?2)",
        params![patient_id.to_string(), doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Assignments naming `identity_id` on either side, oldest first.
pub fn list_assignments_involving(
    conn: &Connection,
    identity_id: &Uuid,
) -> Result<Vec<Assignment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, created_at FROM assignments
         WHERE patient_id = ?1 OR doctor_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![identity_id.to_string()], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(assignment_from_row).collect()
}

/// Privileged removal. No row policy exposes this to requesters; operators
/// use it to revoke a doctor's access.
pub fn delete_assignment(
    conn: &Connection,
    patient_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM assignments WHERE patient_id = ?1 AND doctor_id = ?2",
        params![patient_id.to_string(), doctor_id.to_string()],
    )?;
    Ok(affected > 0)
}

type AssignmentRow = (String, String, String, DateTime<Utc>);

fn read_row(row: &Row<'_>) -> rusqlite::Result<AssignmentRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn assignment_from_row(row: AssignmentRow) -> Result<Assignment, DatabaseError> {
    let (id, patient_id, doctor_id, created_at) = row;
    Ok(Assignment {
        id: parse_uuid("assignments.id", &id)?,
        patient_id: parse_uuid("assignments.patient_id", &patient_id)?,
        doctor_id: parse_uuid("assignments.doctor_id", &doctor_id)?,
        created_at,
    })
}
