use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::enums::Role;
use crate::models::RoleGrant;

pub fn insert_role_grant(conn: &Connection, grant: &RoleGrant) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO role_grants (id, identity_id, role) VALUES (?1, ?2, ?3)",
        params![
            grant.id.to_string(),
            grant.identity_id.to_string(),
            grant.role.as_str(),
        ],
    )?;
    Ok(())
}

/// Raw existence check on `role_grants`, bypassing row policies.
pub fn role_grant_exists(
    conn: &Connection,
    identity_id: &Uuid,
    role: Role,
) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM role_grants WHERE identity_id = ?1 AND role = ?2)",
        params![identity_id.to_string(), role.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn list_role_grants(conn: &Connection, identity_id: &Uuid) -> Result<Vec<RoleGrant>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, identity_id, role FROM role_grants WHERE identity_id = ?1 ORDER BY role",
    )?;
    let rows = stmt.query_map(params![identity_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut grants = Vec::new();
    for row in rows {
        let (id, identity_id, role) = row?;
        grants.push(RoleGrant {
            id: parse_uuid("role_grants.id", &id)?,
            identity_id: parse_uuid("role_grants.identity_id", &identity_id)?,
            role: Role::from_str(&role)?,
        });
    }
    Ok(grants)
}
