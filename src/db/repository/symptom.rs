use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::enums::Severity;
use crate::models::Symptom;

const SYMPTOM_COLUMNS: &str = "id, patient_id, title, description, photo_url, severity,
    affected_area, duration, created_at, updated_at";

pub fn insert_symptom(conn: &Connection, symptom: &Symptom) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO symptoms (id, patient_id, title, description, photo_url, severity,
         affected_area, duration, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            symptom.id.to_string(),
            symptom.patient_id.to_string(),
            symptom.title,
            symptom.description,
            symptom.photo_url,
            symptom.severity.map(|s| s.as_str()),
            symptom.affected_area,
            symptom.duration,
            symptom.created_at,
            symptom.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_symptom(conn: &Connection, id: &Uuid) -> Result<Option<Symptom>, DatabaseError> {
    let sql = format!("SELECT {SYMPTOM_COLUMNS} FROM symptoms WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], read_row)
        .optional()?;
    row.map(symptom_from_row).transpose()
}

/// Symptoms oldest first, optionally restricted to one patient.
pub fn list_symptoms(
    conn: &Connection,
    patient_id: Option<&Uuid>,
) -> Result<Vec<Symptom>, DatabaseError> {
    let rows = match patient_id {
        Some(patient_id) => {
            let sql = format!(
                "SELECT {SYMPTOM_COLUMNS} FROM symptoms WHERE patient_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(params![patient_id.to_string()], read_row)?;
            mapped.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!(
                "SELECT {SYMPTOM_COLUMNS} FROM symptoms ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map([], read_row)?;
            mapped.collect::<Result<Vec<_>, _>>()?
        }
    };

    rows.into_iter().map(symptom_from_row).collect()
}

pub fn update_symptom(conn: &Connection, symptom: &Symptom) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE symptoms SET title = ?2, description = ?3, photo_url = ?4, severity = ?5,
         affected_area = ?6, duration = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            symptom.id.to_string(),
            symptom.title,
            symptom.description,
            symptom.photo_url,
            symptom.severity.map(|s| s.as_str()),
            symptom.affected_area,
            symptom.duration,
            symptom.updated_at,
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Symptom".into(),
            id: symptom.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a symptom. Notes cascade; message back-references are nulled.
pub fn delete_symptom(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let affected = conn.execute("DELETE FROM symptoms WHERE id = ?1", params![id.to_string()])?;
    Ok(affected > 0)
}

struct SymptomRow {
    id: String,
    patient_id: String,
    title: String,
    description: Option<String>,
    photo_url: Option<String>,
    severity: Option<String>,
    affected_area: Option<String>,
    duration: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<SymptomRow> {
    Ok(SymptomRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        photo_url: row.get(4)?,
        severity: row.get(5)?,
        affected_area: row.get(6)?,
        duration: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn symptom_from_row(row: SymptomRow) -> Result<Symptom, DatabaseError> {
    Ok(Symptom {
        id: parse_uuid("symptoms.id", &row.id)?,
        patient_id: parse_uuid("symptoms.patient_id", &row.patient_id)?,
        title: row.title,
        description: row.description,
        photo_url: row.photo_url,
        severity: row.severity.as_deref().map(Severity::from_str).transpose()?,
        affected_area: row.affected_area,
        duration: row.duration,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
