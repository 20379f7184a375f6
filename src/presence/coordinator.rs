//! Presence transitions: connect, explicit disconnect, abrupt disconnect.
//!
//! Every transition mutates the connection registry and broadcasts the fresh
//! online-set before any storage I/O is awaited, so presence broadcasts are
//! never delayed by storage latency. Live presence is defined by the
//! registry for the current process lifetime; the persisted store is a
//! best-effort mirror for cold-start and REST fallback reads.
//!
//! The mutate-then-broadcast step of each transition runs under the shared
//! presence lock. Connection tasks are independent, and without the lock two
//! transitions can interleave between the registry write and the broadcast,
//! handing different clients contradictory online-sets. No storage I/O is
//! awaited while the lock is held.

use tokio::task::JoinHandle;

use crate::db::DbPool;
use crate::presence::store;
use crate::state::AppState;
use crate::ws::protocol::ServerEvent;
use crate::ws::{broadcast, ConnectionSender};

/// A client announced its identity: register the connection, broadcast the
/// new online-set, then persist the online flag fire-and-forget.
pub async fn handle_connect(state: &AppState, user_id: &str, handle: ConnectionSender) {
    {
        let _guard = state.presence_lock.lock().await;
        state.connections.put(user_id, handle);
        broadcast_online_set(state);
    }
    tracing::info!(user_id = %user_id, "User connected");
    spawn_status_upsert(state.db.clone(), user_id, true);
}

/// Cooperative sign-out: deregister, broadcast, then persist the offline
/// flag. The write is awaited (failure still logged and swallowed) so the
/// caller's acknowledgement means the transition has settled.
pub async fn handle_explicit_disconnect(state: &AppState, user_id: &str) {
    {
        let _guard = state.presence_lock.lock().await;
        state.connections.remove(user_id);
        broadcast_online_set(state);
    }
    tracing::info!(user_id = %user_id, "User signed out");
    let _ = spawn_status_upsert(state.db.clone(), user_id, false).await;
}

/// Transport-level close without a sign-out event. The removal is guarded:
/// if a newer connection has taken over the user's entry, it stays. Whether
/// an offline status is persisted here is a configured policy — by default
/// it is not, mirroring only explicit sign-outs to storage.
pub async fn handle_abrupt_disconnect(state: &AppState, user_id: &str, handle: &ConnectionSender) {
    let removed = {
        let _guard = state.presence_lock.lock().await;
        let removed = state.connections.remove_if_same(user_id, handle);
        broadcast_online_set(state);
        removed
    };
    tracing::info!(user_id = %user_id, removed, "Transport disconnected");
    if state.persist_offline_on_abrupt_disconnect {
        spawn_status_upsert(state.db.clone(), user_id, false);
    }
}

/// Broadcast the current online-set to every registered connection. Callers
/// hold the presence lock so the snapshot matches the mutation just made.
fn broadcast_online_set(state: &AppState) {
    let user_ids = state.connections.snapshot();
    broadcast::broadcast_to_all(&state.connections, &ServerEvent::UsersOnline { user_ids });
}

/// Upsert a user's persisted online status on the blocking pool. Failures
/// are logged and swallowed — presence correctness never depends on the
/// store, and the write is not retried.
fn spawn_status_upsert(db: DbPool, user_id: &str, is_online: bool) -> JoinHandle<()> {
    let user_id = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        let conn = match db.lock() {
            Ok(conn) => conn,
            Err(_) => {
                tracing::warn!(user_id = %user_id, "DB lock poisoned, status update dropped");
                return;
            }
        };
        if let Err(e) = store::upsert_status(&conn, &user_id, is_online) {
            tracing::warn!(
                user_id = %user_id,
                is_online,
                error = %e,
                "Online status upsert failed"
            );
        }
    })
}
