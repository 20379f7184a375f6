//! Conversation resolution: one conversation per unordered user pair,
//! created lazily on first contact.
//!
//! The lookup checks both column orderings, so resolve(a, b) and
//! resolve(b, a) land on the same row. Lookup-then-insert runs under the
//! shared connection mutex, which serializes concurrent first contact from
//! both ends of a pair.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::models::Conversation;

/// Find the conversation for an unordered user pair, if one exists.
pub fn find_conversation(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        "SELECT id, user1_id, user2_id, created_at FROM conversations
         WHERE (user1_id = ?1 AND user2_id = ?2) OR (user1_id = ?2 AND user2_id = ?1)",
        rusqlite::params![user_a, user_b],
        |row| {
            Ok(Conversation {
                id: row.get(0)?,
                user1_id: row.get(1)?,
                user2_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Return the id of the conversation between the pair, creating the row on
/// first contact. Idempotent in intent: the same pair always yields the same
/// conversation.
pub fn resolve_conversation(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> rusqlite::Result<String> {
    if let Some(existing) = find_conversation(conn, user_a, user_b)? {
        return Ok(existing.id);
    }

    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO conversations (id, user1_id, user2_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, user_a, user_b, Utc::now().to_rfc3339()],
    )?;
    Ok(id)
}
