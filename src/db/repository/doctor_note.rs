use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::enums::ProgressStatus;
use crate::models::DoctorNote;

// No update or delete: notes are immutable once written.

pub fn insert_doctor_note(conn: &Connection, note: &DoctorNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_notes (id, symptom_id, doctor_id, note, progress_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            note.id.to_string(),
            note.symptom_id.to_string(),
            note.doctor_id.to_string(),
            note.note,
            note.progress_status.map(|s| s.as_str()),
            note.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_doctor_note(conn: &Connection, id: &Uuid) -> Result<Option<DoctorNote>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, symptom_id, doctor_id, note, progress_status, created_at
             FROM doctor_notes WHERE id = ?1",
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(note_from_row).transpose()
}

/// Notes attached to one symptom, oldest first.
pub fn list_notes_for_symptom(
    conn: &Connection,
    symptom_id: &Uuid,
) -> Result<Vec<DoctorNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, symptom_id, doctor_id, note, progress_status, created_at
         FROM doctor_notes WHERE symptom_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![symptom_id.to_string()], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(note_from_row).collect()
}

type NoteRow = (String, String, String, String, Option<String>, DateTime<Utc>);

fn read_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn note_from_row(row: NoteRow) -> Result<DoctorNote, DatabaseError> {
    let (id, symptom_id, doctor_id, note, progress_status, created_at) = row;
    Ok(DoctorNote {
        id: parse_uuid("doctor_notes.id", &id)?,
        symptom_id: parse_uuid("doctor_notes.symptom_id", &symptom_id)?,
        doctor_id: parse_uuid("doctor_notes.doctor_id", &doctor_id)?,
        note,
        progress_status: progress_status
            .as_deref()
            .map(ProgressStatus::from_str)
            .transpose()?,
        created_at,
    })
}
