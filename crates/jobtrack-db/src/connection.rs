//! Database connection management.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

const IN_MEMORY: &str = ":memory:";

/// Open a `SQLite` pool at `path`, creating the file if needed.
///
/// `:memory:` opens a private in-memory database on a single long-lived
/// connection, since every new in-memory connection would see an empty
/// database.
///
/// # Errors
/// Returns `DatabaseError::Open` if the path is not UTF-8 or the database
/// cannot be opened.
pub async fn connect(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path = path.as_ref();
    let path_str = path
        .to_str()
        .ok_or_else(|| DatabaseError::Open("invalid database path: not valid UTF-8".to_string()))?;

    if path_str != IN_MEMORY {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    let connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if path_str == IN_MEMORY {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options.journal_mode(SqliteJournalMode::Wal))
            .await
    }
    .map_err(|e| DatabaseError::Open(format!("failed to open {path_str}: {e}")))?;

    tracing::info!(path = %path_str, "database pool created");

    Ok(pool)
}
