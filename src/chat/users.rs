//! Thin user roster endpoints. Credential handling lives in the external
//! auth collaborator; these handlers only provision and list the minimal
//! identity rows that history annotation and the chat roster need.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::User;
use crate::routes::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

/// POST /api/users — Provision a user row. 409 when the username is taken.
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if body.username.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "username is required"));
    }

    let db = state.db.clone();
    let username = body.username.trim().to_string();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable"))?;

        let id = Uuid::now_v7().to_string();
        match conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, username, Utc::now().to_rfc3339()],
        ) {
            Ok(_) => Ok(UserResponse { id, username }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(api_error(StatusCode::CONFLICT, "Username already taken"))
            }
            Err(e) => {
                tracing::warn!(error = %e, "User insert failed");
                Err(api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to create user",
                ))
            }
        }
    })
    .await
    .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage task failed"))??;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/chat/users — All users eligible for chat, id and username.
pub async fn list_chat_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let db = state.db.clone();

    let users = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable"))?;

        let mut stmt = conn
            .prepare("SELECT id, username, created_at FROM users ORDER BY username ASC")
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list users"))?;

        let users: Vec<UserResponse> = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list users"))?
            .collect::<Result<Vec<User>, _>>()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list users"))?
            .into_iter()
            .map(|user| UserResponse {
                id: user.id,
                username: user.username,
            })
            .collect();

        Ok(users)
    })
    .await
    .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage task failed"))??;

    Ok(Json(users))
}
