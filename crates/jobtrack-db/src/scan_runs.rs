use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;

/// One scan pass over the sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    /// Unique identifier for the run
    pub id: String,
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// When the pass ended (if finished)
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status of the run
    pub status: ScanRunStatus,
    /// Outcome counts
    pub totals: ScanTotals,
    /// Error message if the run failed
    pub error_message: Option<String>,
}

/// Per-outcome application counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTotals {
    /// Applications considered
    pub total: u32,
    /// Status written to the sheet
    pub reconciled: u32,
    /// Gave up for this run
    pub failed: u32,
    /// Pass stopped before these finished
    pub deferred: u32,
    /// Not selected by the filter
    pub skipped: u32,
}

/// Status of a scan run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanRunStatus {
    /// Pass is running
    InProgress,
    /// Pass visited every selected application
    Completed,
    /// Pass was stopped early
    Cancelled,
    /// Pass aborted on an error
    Failed,
}

impl std::fmt::Display for ScanRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for ScanRunStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "Failed" => Ok(Self::Failed),
            other => Err(DatabaseError::Decode(format!(
                "invalid scan run status '{other}'"
            ))),
        }
    }
}

/// Record the start of a pass.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn create_scan_run(pool: &SqlitePool, total: u32) -> Result<ScanRun> {
    let id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let status = ScanRunStatus::InProgress;

    sqlx::query("INSERT INTO scan_runs (id, started_at, status, total) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(started_at.to_rfc3339())
        .bind(status.to_string())
        .bind(i64::from(total))
        .execute(pool)
        .await?;

    Ok(ScanRun {
        id,
        started_at,
        completed_at: None,
        status,
        totals: ScanTotals {
            total,
            ..ScanTotals::default()
        },
        error_message: None,
    })
}

/// Record how a pass ended.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the run does not exist.
pub async fn finish_scan_run(
    pool: &SqlitePool,
    id: &str,
    status: ScanRunStatus,
    totals: ScanTotals,
    error_message: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE scan_runs
         SET completed_at = ?, status = ?, total = ?, reconciled = ?, failed = ?,
             deferred = ?, skipped = ?, error_message = ?
         WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(status.to_string())
    .bind(i64::from(totals.total))
    .bind(i64::from(totals.reconciled))
    .bind(i64::from(totals.failed))
    .bind(i64::from(totals.deferred))
    .bind(i64::from(totals.skipped))
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("scan run '{id}' not found")));
    }
    Ok(())
}

/// Most recent runs first.
///
/// # Errors
/// Returns an error if the query fails or a row cannot be decoded.
pub async fn list_recent_runs(pool: &SqlitePool, limit: u32) -> Result<Vec<ScanRun>> {
    #[allow(clippy::type_complexity)]
    let rows = sqlx::query_as::<
        _,
        (
            String,
            String,
            Option<String>,
            String,
            i64,
            i64,
            i64,
            i64,
            i64,
            Option<String>,
        ),
    >(
        "SELECT id, started_at, completed_at, status, total, reconciled, failed, deferred, skipped, error_message
         FROM scan_runs ORDER BY started_at DESC LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(
            |(
                id,
                started_at,
                completed_at,
                status,
                total,
                reconciled,
                failed,
                deferred,
                skipped,
                error_message,
            )| {
                Ok(ScanRun {
                    id,
                    started_at: parse_time(&started_at)?,
                    completed_at: completed_at.as_deref().map(parse_time).transpose()?,
                    status: status.parse()?,
                    totals: ScanTotals {
                        total: count(total)?,
                        reconciled: count(reconciled)?,
                        failed: count(failed)?,
                        deferred: count(deferred)?,
                        skipped: count(skipped)?,
                    },
                    error_message,
                })
            },
        )
        .collect()
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{s}': {e}")))
}

fn count(n: i64) -> Result<u32> {
    u32::try_from(n).map_err(|_| DatabaseError::Decode(format!("invalid count {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_create_and_finish_run() {
        let db = setup_test_db().await;

        let run = create_scan_run(db.pool(), 12).await.expect("create run");
        assert_eq!(run.status, ScanRunStatus::InProgress);
        assert_eq!(run.totals.total, 12);

        let totals = ScanTotals {
            total: 12,
            reconciled: 9,
            failed: 1,
            deferred: 1,
            skipped: 1,
        };
        finish_scan_run(db.pool(), &run.id, ScanRunStatus::Completed, totals, None)
            .await
            .expect("finish run");

        let runs = list_recent_runs(db.pool(), 10).await.expect("list runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, ScanRunStatus::Completed);
        assert_eq!(runs[0].totals, totals);
        assert!(runs[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_finish_missing_run() {
        let db = setup_test_db().await;
        let err = finish_scan_run(
            db.pool(),
            "nope",
            ScanRunStatus::Failed,
            ScanTotals::default(),
            Some("boom"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ScanRunStatus::InProgress,
            ScanRunStatus::Completed,
            ScanRunStatus::Cancelled,
            ScanRunStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ScanRunStatus>().unwrap(), status);
        }
        assert!("Paused".parse::<ScanRunStatus>().is_err());
    }
}
