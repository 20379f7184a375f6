//! JSON event protocol spoken over the WebSocket, and the per-frame dispatch.
//!
//! Frames are text, internally tagged by `event`. Handlers never raise back
//! to the transport: a malformed frame produces an `error` event and the
//! connection stays up.

use serde::{Deserialize, Serialize};

use crate::presence::coordinator;
use crate::state::AppState;
use crate::ws::{broadcast, ConnectionSender};

/// Events sent by the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce identity over a fresh connection, registering presence.
    UserConnected { user_id: String },
    /// Cooperative sign-out. Acknowledged with `disconnect_ack` once the
    /// offline status write has settled.
    UserDisconnected { user_id: String },
    /// Send a chat message for live routing.
    SendMessage { message: ChatMessage },
}

/// A chat message as carried on the wire. With a `receiver_id` it is routed
/// to that user's connection only; without one it is broadcast to every
/// connection except the sender's. Unknown fields are carried through
/// untouched so clients can attach their own metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Events sent by the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full online-set replacement, sent after every presence transition.
    UsersOnline { user_ids: Vec<String> },
    /// Delivery of a live-routed chat message.
    ReceiveMessage { message: ChatMessage },
    /// Acknowledgement of a `user_disconnected` request.
    DisconnectAck,
    /// Structured per-frame failure; never closes the connection.
    Error { code: u16, message: String },
}

/// Handle an incoming text frame: decode the event, dispatch, respond.
/// `session_user` is the identity the connection announced via
/// `user_connected`, used by the abrupt-disconnect path on teardown.
pub async fn handle_text_frame(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    session_user: &mut Option<String>,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode event frame");
            broadcast::send_error(tx, 400, "Invalid event frame");
            return;
        }
    };

    match event {
        ClientEvent::UserConnected { user_id } => {
            if user_id.is_empty() {
                broadcast::send_error(tx, 400, "user_id must not be empty");
                return;
            }
            *session_user = Some(user_id.clone());
            coordinator::handle_connect(state, &user_id, tx.clone()).await;
        }
        ClientEvent::UserDisconnected { user_id } => {
            if user_id.is_empty() {
                broadcast::send_error(tx, 400, "user_id must not be empty");
                return;
            }
            coordinator::handle_explicit_disconnect(state, &user_id).await;
            broadcast::send_event(tx, &ServerEvent::DisconnectAck);
        }
        ClientEvent::SendMessage { message } => {
            broadcast::route_live_message(&state.connections, tx, message);
        }
    }
}
