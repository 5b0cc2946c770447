//! The sheet: where reconciled statuses land.

use crate::applications;
use crate::error::Result;
use crate::Database;
use async_trait::async_trait;
use jobtrack_core::{ApplicationId, CanonicalStatus, JobApplication, Timestamp};

/// Read/write surface of the application sheet.
///
/// Columns: URL, Company, Status, Platform, `LastChecked`.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Every application, in sheet order.
    async fn load_applications(&self) -> Result<Vec<JobApplication>>;

    /// Record a reconciled status.
    ///
    /// Writing the status a row already holds must leave the status as it is
    /// and only move `LastChecked`.
    async fn write_status(
        &self,
        id: &ApplicationId,
        status: CanonicalStatus,
        checked_at: Timestamp,
    ) -> Result<()>;
}

#[async_trait]
impl SheetStore for Database {
    async fn load_applications(&self) -> Result<Vec<JobApplication>> {
        applications::list_applications(self.pool()).await
    }

    async fn write_status(
        &self,
        id: &ApplicationId,
        status: CanonicalStatus,
        checked_at: Timestamp,
    ) -> Result<()> {
        applications::update_status(self.pool(), id, status, checked_at).await?;
        tracing::debug!(application_id = %id, status = %status, "wrote status to sheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseError;

    #[tokio::test]
    async fn test_write_status_is_idempotent() {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");

        let id = ApplicationId::new("row-1").expect("valid id");
        applications::insert_application(
            db.pool(),
            &JobApplication::new(id.clone(), "https://jobs.lever.co/acme/1", "Acme"),
        )
        .await
        .expect("insert");

        let first = Timestamp::now();
        db.write_status(&id, CanonicalStatus::Closed, first)
            .await
            .expect("first write");
        db.write_status(&id, CanonicalStatus::Closed, first)
            .await
            .expect("second write");

        let rows = db.load_applications().await.expect("load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current_status, CanonicalStatus::Closed);
    }

    #[tokio::test]
    async fn test_write_unknown_row() {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");

        let id = ApplicationId::new("missing").expect("valid id");
        let err = db
            .write_status(&id, CanonicalStatus::Open, Timestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
