/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

/// Persisted presence record, one row per user (upsert semantics).
/// A best-effort mirror of the live connection registry.
#[derive(Debug, Clone)]
pub struct OnlineStatusRow {
    pub user_id: String,
    pub is_online: bool,
    pub last_active: String,
}

/// Conversation between two users. The pair is unordered: lookups check
/// both column orderings.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub created_at: String,
}

/// Chat message. Immutable once created; `read` is written false on insert
/// and never transitioned by the server.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub read: bool,
    pub created_at: String,
}
