use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Identity is announced in-band via the
/// `user_connected` event; credential verification is the auth
/// collaborator's job and out of scope here.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_upgraded(socket, state))
}

async fn handle_upgraded(socket: WebSocket, state: AppState) {
    actor::run_connection(socket, state).await;
}
