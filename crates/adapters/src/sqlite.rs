//! Shared SQLite pool setup for the store and cache backends

use std::path::Path;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

/// Open (creating if needed) a database file
pub(crate) async fn connect(db_path: &Path) -> Result<SqlitePool, String> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory: {}", e))?;
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .map_err(|e| e.to_string())
}

/// Single-connection in-memory database; more connections would each see
/// their own empty database
pub(crate) async fn connect_in_memory() -> Result<SqlitePool, String> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| e.to_string())
}
