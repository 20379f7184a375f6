//! WebSocket fan-out helpers: encode a server event once and push it to the
//! relevant connections. Delivery is best effort — a send into a closed
//! channel is ignored, and a recipient without a registered connection is a
//! silent no-op.

use axum::extract::ws::Message;

use crate::ws::protocol::{ChatMessage, ServerEvent};
use crate::ws::{ConnectionRegistry, ConnectionSender};

/// Encode a server event as a text WebSocket message.
fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode server event");
            None
        }
    }
}

/// Send a server event to a single connection.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    if let Some(msg) = encode(event) {
        let _ = tx.send(msg);
    }
}

/// Send a structured error event to a single connection.
pub fn send_error(tx: &ConnectionSender, code: u16, message: &str) {
    send_event(
        tx,
        &ServerEvent::Error {
            code,
            message: message.to_string(),
        },
    );
}

/// Broadcast a server event to every registered connection.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    registry.for_each(|_, sender| {
        let _ = sender.send(msg.clone());
    });
}

/// Broadcast a server event to every registered connection except the one
/// holding the given handle.
pub fn broadcast_to_all_except(
    registry: &ConnectionRegistry,
    except: &ConnectionSender,
    event: &ServerEvent,
) {
    let Some(msg) = encode(event) else { return };
    registry.for_each(|_, sender| {
        if !sender.same_channel(except) {
            let _ = sender.send(msg.clone());
        }
    });
}

/// Send a server event to a specific user's connection. Returns false when
/// the user has no registered connection.
pub fn send_to_user(registry: &ConnectionRegistry, user_id: &str, event: &ServerEvent) -> bool {
    match registry.get(user_id) {
        Some(sender) => {
            send_event(&sender, event);
            true
        }
        None => false,
    }
}

/// Route a chat message live. With a receiver id, targeted delivery to that
/// user's connection only; without one, broadcast to every connection except
/// the sender's. Never touches storage — persistence is the REST path's job.
pub fn route_live_message(
    registry: &ConnectionRegistry,
    sender_handle: &ConnectionSender,
    message: ChatMessage,
) {
    let receiver_id = message.receiver_id.clone();
    let event = ServerEvent::ReceiveMessage { message };

    match receiver_id {
        Some(receiver_id) => {
            if !send_to_user(registry, &receiver_id, &event) {
                tracing::debug!(
                    receiver_id = %receiver_id,
                    "Recipient not connected, live delivery skipped"
                );
            }
        }
        None => broadcast_to_all_except(registry, sender_handle, &event),
    }
}
