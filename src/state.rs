use std::sync::Arc;

use crate::db::DbPool;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Active WebSocket connections, one per user
    pub connections: Arc<ConnectionRegistry>,
    /// Serializes presence transitions: registry mutation and the
    /// users_online broadcast that follows must not interleave across
    /// connections, or two clients can observe contradictory sets.
    pub presence_lock: Arc<tokio::sync::Mutex<()>>,
    /// Whether an abrupt transport drop also writes an offline status record.
    /// Explicit sign-out always does; this flag controls the asymmetric case.
    pub persist_offline_on_abrupt_disconnect: bool,
}
