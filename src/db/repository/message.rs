use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::Message;

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, attachment_url, symptom_id, is_read, created_at";

pub fn insert_message(conn: &Connection, message: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO messages (id, sender_id, receiver_id, content, attachment_url, symptom_id,
         is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            message.id.to_string(),
            message.sender_id.to_string(),
            message.receiver_id.to_string(),
            message.content,
            message.attachment_url,
            message.symptom_id.map(|id| id.to_string()),
            message.is_read as i32,
            message.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: &Uuid) -> Result<Option<Message>, DatabaseError> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], read_row)
        .optional()?;
    row.map(message_from_row).transpose()
}

/// Messages exchanged between two identities in either direction, oldest first.
pub fn list_messages_between(
    conn: &Connection,
    a: &Uuid,
    b: &Uuid,
) -> Result<Vec<Message>, DatabaseError> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY created_at ASC, rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![a.to_string(), b.to_string()], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(message_from_row).collect()
}

/// Only the read flag is ever written after insert.
pub fn set_message_read(conn: &Connection, id: &Uuid, is_read: bool) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE messages SET is_read = ?2 WHERE id = ?1",
        params![id.to_string(), is_read as i32],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Message".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn count_unread_for(conn: &Connection, receiver_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
        params![receiver_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct MessageRow {
    id: String,
    sender_id: String,
    receiver_id: String,
    content: String,
    attachment_url: Option<String>,
    symptom_id: Option<String>,
    is_read: i32,
    created_at: DateTime<Utc>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        attachment_url: row.get(4)?,
        symptom_id: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        id: parse_uuid("messages.id", &row.id)?,
        sender_id: parse_uuid("messages.sender_id", &row.sender_id)?,
        receiver_id: parse_uuid("messages.receiver_id", &row.receiver_id)?,
        content: row.content,
        attachment_url: row.attachment_url,
        symptom_id: row
            .symptom_id
            .as_deref()
            .map(|s| parse_uuid("messages.symptom_id", s))
            .transpose()?,
        is_read: row.is_read != 0,
        created_at: row.created_at,
    })
}
