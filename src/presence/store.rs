//! Persisted presence store: the durable `online_status` record behind the
//! live registry, plus the REST fallback read paths for clients that poll
//! instead of holding a connection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::db::models::OnlineStatusRow;
use crate::routes::{api_error, ApiError};
use crate::state::AppState;

/// Upsert a user's online flag, stamping `last_active` with the current time.
/// Creates the row on first transition, updates it thereafter.
pub fn upsert_status(conn: &Connection, user_id: &str, is_online: bool) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO online_status (user_id, is_online, last_active)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET is_online = ?2, last_active = ?3",
        rusqlite::params![user_id, is_online, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Read a user's presence record. `Ok(None)` means no record exists — a
/// distinct outcome from a storage failure, so callers can default to an
/// unknown/offline interpretation.
pub fn get_status(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<OnlineStatusRow>> {
    conn.query_row(
        "SELECT user_id, is_online, last_active FROM online_status WHERE user_id = ?1",
        rusqlite::params![user_id],
        |row| {
            Ok(OnlineStatusRow {
                user_id: row.get(0)?,
                is_online: row.get(1)?,
                last_active: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Ids of all users whose persisted status says online. May diverge from the
/// live registry by the polling interval plus any persistence lag.
pub fn list_online_user_ids(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT user_id FROM online_status WHERE is_online = 1")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

// --- REST endpoint handlers ---

#[derive(Debug, Serialize)]
pub struct PresenceStatusResponse {
    pub user_id: String,
    pub is_online: bool,
    pub last_active: String,
}

/// GET /api/presence/{user_id} — Persisted presence record for one user.
/// 404 when the user has never transitioned (no record).
pub async fn get_presence_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PresenceStatusResponse>, ApiError> {
    let db = state.db.clone();

    let record = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable"))?;
        get_status(&conn, &user_id)
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read presence"))
    })
    .await
    .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage task failed"))??;

    match record {
        Some(row) => Ok(Json(PresenceStatusResponse {
            user_id: row.user_id,
            is_online: row.is_online,
            last_active: row.last_active,
        })),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            "No presence record for user",
        )),
    }
}

/// GET /api/chat/online-users — REST fallback for the live online-set, read
/// from the persisted store rather than the registry.
pub async fn get_online_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let db = state.db.clone();

    let ids = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable"))?;
        list_online_user_ids(&conn).map_err(|_| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read online statuses",
            )
        })
    })
    .await
    .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage task failed"))??;

    Ok(Json(ids))
}
