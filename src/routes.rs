use axum::{http::StatusCode, Json, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::chat::{messages, users};
use crate::presence::store;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Structured REST failure: HTTP status plus a JSON body with a message
/// field, so clients always get a machine-readable reason.
pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(serde_json::json!({ "message": message })))
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 30 messages per minute per IP on the REST send path.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(2) // 1 token every 2 seconds = 30 per minute
            .burst_size(10)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    // Message posting is the only write a client can repeat without limit,
    // so it carries the rate limit
    let message_routes = Router::new()
        .route(
            "/api/chat/message",
            axum::routing::post(messages::send_chat_message),
        )
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Chat REST surface: roster, history, online fallback
    let chat_routes = Router::new()
        .route("/api/chat/users", axum::routing::get(users::list_chat_users))
        .route(
            "/api/chat/history",
            axum::routing::get(messages::get_chat_history),
        )
        .route(
            "/api/chat/online-users",
            axum::routing::get(store::get_online_users),
        );

    // Presence store reads and user provisioning
    let presence_routes = Router::new().route(
        "/api/presence/{user_id}",
        axum::routing::get(store::get_presence_status),
    );
    let user_routes =
        Router::new().route("/api/users", axum::routing::post(users::create_user));

    // WebSocket endpoint for the live presence/messaging connection
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(message_routes)
        .merge(chat_routes)
        .merge(presence_routes)
        .merge(user_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
