//! Outcome of a scan pass.

use crate::state::FailureReason;
use chrono::{DateTime, Utc};
use jobtrack_classifier::detect;
use jobtrack_core::{ApplicationId, AtsPlatform, CanonicalStatus, Confidence, JobApplication};
use jobtrack_db::ScanTotals;
use serde::{Deserialize, Serialize};

/// How one application ended the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplicationOutcome {
    /// Status written to the sheet
    Reconciled {
        /// Status now in the sheet
        status: CanonicalStatus,
        /// What the page classified as (`Unknown` keeps the stored status)
        classified: CanonicalStatus,
        confidence: Confidence,
        /// Whether the sheet held a different status before
        changed: bool,
    },
    /// Gave up for this pass
    Failed {
        reason: FailureReason,
    },
    /// Pass was cancelled before this application finished
    Deferred,
    /// Not selected by the filter
    Skipped,
}

/// One row of the pass report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationReport {
    pub application_id: ApplicationId,
    pub url: String,
    pub platform: AtsPlatform,
    pub outcome: ApplicationOutcome,
    /// Fetch attempts spent
    pub attempts: u32,
}

impl ApplicationReport {
    /// Report for an application the pass worked on, taking the platform
    /// and fetch attempts recorded on it.
    #[must_use]
    pub fn from_application(application: &JobApplication, outcome: ApplicationOutcome) -> Self {
        Self {
            application_id: application.id.clone(),
            url: application.url.clone(),
            platform: application.platform,
            outcome,
            attempts: application.retry_count,
        }
    }

    /// Report for an application the pass never fetched.
    #[must_use]
    pub fn not_visited(application: &JobApplication, outcome: ApplicationOutcome) -> Self {
        Self {
            application_id: application.id.clone(),
            url: application.url.clone(),
            platform: detect(&application.url),
            outcome,
            attempts: 0,
        }
    }
}

/// Everything a pass did, in sheet order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Scan history row, when history is recorded
    pub run_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Journaled writes from earlier passes that reached the sheet
    pub replayed: usize,
    /// The pass was cancelled or ran out of budget
    pub cancelled: bool,
    pub applications: Vec<ApplicationReport>,
}

impl ScanReport {
    /// Counts per outcome.
    #[must_use]
    pub fn totals(&self) -> ScanTotals {
        let mut totals = ScanTotals {
            total: u32::try_from(self.applications.len()).unwrap_or(u32::MAX),
            ..ScanTotals::default()
        };
        for report in &self.applications {
            match report.outcome {
                ApplicationOutcome::Reconciled { .. } => totals.reconciled += 1,
                ApplicationOutcome::Failed { .. } => totals.failed += 1,
                ApplicationOutcome::Deferred => totals.deferred += 1,
                ApplicationOutcome::Skipped => totals.skipped += 1,
            }
        }
        totals
    }

    /// Applications whose stored status changed this pass.
    pub fn changes(&self) -> impl Iterator<Item = &ApplicationReport> {
        self.applications.iter().filter(|r| {
            matches!(r.outcome, ApplicationOutcome::Reconciled { changed: true, .. })
        })
    }

    /// Look up one application's outcome.
    #[must_use]
    pub fn outcome(&self, id: &ApplicationId) -> Option<&ApplicationOutcome> {
        self.applications
            .iter()
            .find(|r| &r.application_id == id)
            .map(|r| &r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, outcome: ApplicationOutcome) -> ApplicationReport {
        ApplicationReport {
            application_id: ApplicationId::new(id).unwrap(),
            url: format!("https://example.com/{id}"),
            platform: AtsPlatform::Generic,
            outcome,
            attempts: 1,
        }
    }

    #[test]
    fn test_totals_and_changes() {
        let report = ScanReport {
            run_id: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            replayed: 0,
            cancelled: false,
            applications: vec![
                row(
                    "a",
                    ApplicationOutcome::Reconciled {
                        status: CanonicalStatus::Closed,
                        classified: CanonicalStatus::Closed,
                        confidence: Confidence::High,
                        changed: true,
                    },
                ),
                row(
                    "b",
                    ApplicationOutcome::Reconciled {
                        status: CanonicalStatus::Open,
                        classified: CanonicalStatus::Open,
                        confidence: Confidence::High,
                        changed: false,
                    },
                ),
                row(
                    "c",
                    ApplicationOutcome::Failed {
                        reason: FailureReason::FetchTimeout,
                    },
                ),
                row("d", ApplicationOutcome::Deferred),
                row("e", ApplicationOutcome::Skipped),
            ],
        };

        let totals = report.totals();
        assert_eq!(totals.total, 5);
        assert_eq!(totals.reconciled, 2);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.deferred, 1);
        assert_eq!(totals.skipped, 1);

        let changed: Vec<_> = report.changes().map(|r| r.application_id.as_str()).collect();
        assert_eq!(changed, vec!["a"]);
        assert_eq!(
            report.outcome(&ApplicationId::new("d").unwrap()),
            Some(&ApplicationOutcome::Deferred)
        );
    }

    #[test]
    fn test_reports_built_from_application() {
        let mut application = JobApplication::new(
            ApplicationId::new("l1").unwrap(),
            "https://jobs.lever.co/acme/1",
            "Acme",
        );
        application.retry_count = 2;

        let skipped = ApplicationReport::not_visited(&application, ApplicationOutcome::Skipped);
        assert_eq!(skipped.platform, AtsPlatform::Lever);
        assert_eq!(skipped.attempts, 0);

        application.platform = AtsPlatform::Lever;
        let failed = ApplicationReport::from_application(
            &application,
            ApplicationOutcome::Failed {
                reason: FailureReason::FetchTimeout,
            },
        );
        assert_eq!(failed.platform, AtsPlatform::Lever);
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.url, "https://jobs.lever.co/acme/1");
    }
}
