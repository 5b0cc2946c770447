//! Jobtrack Database Layer
//!
//! Provides `SQLite` storage for the application sheet, the tenant credential
//! cache and the history of scan passes. Uses `SQLx` with embedded migrations.
//!
//! # Architecture
//!
//! - **Sheet**: [`Database`] implements [`SheetStore`], the read/write surface
//!   the scanner reconciles statuses through
//! - **Credential cache**: [`Database`] implements
//!   [`CredentialCacheStore`](jobtrack_credentials::CredentialCacheStore);
//!   only credential references are stored, never secret values
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Interchange**: CSV import and export of the sheet in [`csv_io`]
//!
//! # Example
//!
//! ```ignore
//! use jobtrack_db::{Database, SheetStore};
//!
//! let db = Database::new("jobtrack.db").await?;
//! db.run_migrations().await?;
//! let applications = db.load_applications().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod applications;
pub mod connection;
pub mod csv_io;
pub mod error;
pub mod migrations;
/// Scan run history.
pub mod scan_runs;
pub mod sheet;
pub mod tenant_credentials;

// Re-export commonly used types
pub use csv_io::ImportSummary;
pub use error::{DatabaseError, Result};
pub use scan_runs::{ScanRun, ScanRunStatus, ScanTotals};
pub use sheet::SheetStore;

use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level database interface with migrations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the database at `path` (or `:memory:`).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::connect(path).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_migrations() {
        let db = Database::new(":memory:").await.expect("create database");

        assert_eq!(db.get_schema_version().await.expect("get version"), 0);
        db.run_migrations().await.expect("run migrations");
        assert_eq!(db.get_schema_version().await.expect("get version"), 3);
    }

    #[tokio::test]
    async fn test_database_schema() {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('applications') ORDER BY cid")
                .fetch_all(db.pool())
                .await
                .expect("query columns");

        assert_eq!(
            columns,
            vec![
                "id",
                "url",
                "company",
                "status",
                "platform",
                "last_checked",
                "position",
                "created_at"
            ]
        );
    }

    #[tokio::test]
    async fn test_database_close() {
        let db = Database::new(":memory:").await.expect("create database");
        db.close().await;
    }
}
