pub mod migrations;
pub mod models;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

/// Single shared SQLite connection. rusqlite is synchronous, so every
/// query runs on the blocking pool while holding this mutex; the single
/// writer also serializes conversation resolution, which has no uniqueness
/// constraint to fall back on.
pub type DbPool = Arc<Mutex<Connection>>;

/// Open (or create) the chat database under `data_dir` and bring the
/// schema up to date.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = Path::new(data_dir).join("pitstop.db");
    let mut conn = Connection::open(&db_path)?;

    // WAL keeps history reads from blocking on presence writes; FK
    // enforcement is off by default in SQLite and the messages table
    // relies on it.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations::migrations().to_latest(&mut conn)?;
    tracing::info!("Database ready at {}", db_path.display());

    Ok(Arc::new(Mutex::new(conn)))
}
