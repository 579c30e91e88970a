use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::enums::Role;
use crate::models::Profile;

pub fn insert_profile(conn: &Connection, profile: &Profile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO profiles (id, display_name, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            profile.id.to_string(),
            profile.display_name,
            profile.role.as_str(),
            profile.created_at,
            profile.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &Uuid) -> Result<Option<Profile>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, display_name, role, created_at, updated_at FROM profiles WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, DateTime<Utc>>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, display_name, role, created_at, updated_at)) => Ok(Some(Profile {
            id: parse_uuid("profiles.id", &id)?,
            display_name,
            role: Role::from_str(&role)?,
            created_at,
            updated_at,
        })),
        None => Ok(None),
    }
}

/// Persist a self-edit. The role column is never written here.
pub fn update_profile(conn: &Connection, profile: &Profile) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE profiles SET display_name = ?2, updated_at = ?3 WHERE id = ?1",
        params![profile.id.to_string(), profile.display_name, profile.updated_at],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Profile".into(),
            id: profile.id.to_string(),
        });
    }
    Ok(())
}
