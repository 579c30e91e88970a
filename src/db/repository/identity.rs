use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::Identity;

/// Stored credentials row. Only the identity provider reads this.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub email: String,
    /// Base64 PBKDF2-SHA256 output.
    pub password_hash: String,
    /// Base64 salt.
    pub password_salt: String,
    pub created_at: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

pub fn insert_identity(conn: &Connection, record: &IdentityRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO identities (id, email, password_hash, password_salt, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id.to_string(),
            record.email,
            record.password_hash,
            record.password_salt,
            record.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_identity_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<IdentityRecord>, DatabaseError> {
    query_identity(
        conn,
        "SELECT id, email, password_hash, password_salt, created_at
         FROM identities WHERE email = ?1",
        email,
    )
}

pub fn get_identity(conn: &Connection, id: &Uuid) -> Result<Option<IdentityRecord>, DatabaseError> {
    query_identity(
        conn,
        "SELECT id, email, password_hash, password_salt, created_at
         FROM identities WHERE id = ?1",
        &id.to_string(),
    )
}

fn query_identity(
    conn: &Connection,
    sql: &str,
    key: &str,
) -> Result<Option<IdentityRecord>, DatabaseError> {
    let row = conn
        .query_row(sql, params![key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, DateTime<Utc>>(4)?,
            ))
        })
        .optional()?;

    match row {
        Some((id, email, password_hash, password_salt, created_at)) => Ok(Some(IdentityRecord {
            id: parse_uuid("identities.id", &id)?,
            email,
            password_hash,
            password_salt,
            created_at,
        })),
        None => Ok(None),
    }
}

/// Remove an identity. Dependent rows go with it through ON DELETE CASCADE.
pub fn delete_identity(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM identities WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(affected > 0)
}
