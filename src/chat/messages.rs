//! Message persistence: append-only inserts grouped by conversation, and
//! the REST history/send endpoints.
//!
//! The REST send path persists only — live routing is connection-only, so a
//! message posted here reaches its recipient through history replay.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::conversations;
use crate::routes::{api_error, ApiError};
use crate::state::AppState;

/// Append a message to a conversation. Always inserted unread; no operation
/// here ever marks a message read.
pub fn append_message(
    conn: &Connection,
    conversation_id: &str,
    sender_id: &str,
    text: &str,
) -> rusqlite::Result<String> {
    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, text, read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        rusqlite::params![id, conversation_id, sender_id, text, Utc::now().to_rfc3339()],
    )?;
    Ok(id)
}

// --- REST endpoint handlers ---

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub id: String,
    pub conversation_id: String,
}

/// POST /api/chat/message — Persist a chat message.
/// Resolves the conversation for the pair (creating it on first contact)
/// and appends. Performs no live routing.
pub async fn send_chat_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    if body.sender_id.is_empty() || body.receiver_id.is_empty() || body.text.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "sender_id, receiver_id and text are required",
        ));
    }

    let db = state.db.clone();

    let response = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable"))?;

        let conversation_id =
            conversations::resolve_conversation(&conn, &body.sender_id, &body.receiver_id)
                .map_err(|e| {
                    tracing::warn!(error = %e, "Conversation resolution failed");
                    api_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to resolve conversation",
                    )
                })?;

        let id = append_message(&conn, &conversation_id, &body.sender_id, &body.text)
            .map_err(|e| {
                tracing::warn!(error = %e, "Message append failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save message")
            })?;

        Ok(SendMessageResponse {
            id,
            conversation_id,
        })
    })
    .await
    .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage task failed"))??;

    Ok((StatusCode::OK, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryMessage {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: String,
    /// Display name of the sender, "Unknown" when the user row is gone.
    pub sender_username: String,
}

/// GET /api/chat/history?sender_id=..&receiver_id=.. — Full message history
/// for the pair's conversation, ascending by creation time, each message
/// annotated with the sender's username. An unknown pair yields an empty
/// list, not an error.
pub async fn get_chat_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryMessage>>, ApiError> {
    let (sender_id, receiver_id) = match (query.sender_id, query.receiver_id) {
        (Some(s), Some(r)) if !s.is_empty() && !r.is_empty() => (s, r),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "sender_id and receiver_id query parameters are required",
            ))
        }
    };

    let db = state.db.clone();

    let messages = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable"))?;

        let conversation = conversations::find_conversation(&conn, &sender_id, &receiver_id)
            .map_err(|_| {
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to look up conversation",
                )
            })?;

        let Some(conversation) = conversation else {
            return Ok(Vec::new());
        };

        let mut stmt = conn
            .prepare(
                "SELECT m.id, m.sender_id, m.text, m.created_at, u.username
                 FROM messages m
                 LEFT JOIN users u ON u.id = m.sender_id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.created_at ASC",
            )
            .map_err(|_| {
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read history")
            })?;

        let messages: Vec<HistoryMessage> = stmt
            .query_map(rusqlite::params![conversation.id], |row| {
                Ok(HistoryMessage {
                    id: row.get(0)?,
                    sender_id: row.get(1)?,
                    text: row.get(2)?,
                    created_at: row.get(3)?,
                    sender_username: row
                        .get::<_, Option<String>>(4)?
                        .unwrap_or_else(|| "Unknown".to_string()),
                })
            })
            .map_err(|_| {
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read history")
            })?
            // A row that fails to decode is a server fault, not something
            // to silently drop from the history
            .collect::<Result<_, _>>()
            .map_err(|_| {
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read history")
            })?;

        Ok(messages)
    })
    .await
    .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage task failed"))??;

    Ok(Json(messages))
}
