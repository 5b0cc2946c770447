//! Scan orchestrator for reconciling application statuses.
//!
//! This module provides the `ScanOrchestrator`, which drives every selected
//! application through the scan state machine: detect the platform, log into
//! the tenant when the platform is gated, fetch and classify the page, and
//! write the result to the sheet.

use crate::error::Result;
use crate::filter::ApplicationFilter;
use crate::journal::{MemoryJournal, PendingWrite, WriteJournal};
use crate::login::SessionLogin;
use crate::report::{ApplicationOutcome, ApplicationReport, ScanReport};
use crate::retry::RetryPolicy;
use crate::state::{FailureReason, ScanState};
use futures::stream::{FuturesUnordered, StreamExt};
use jobtrack_browser::{BrowserError, BrowserSession};
use jobtrack_classifier::{
    detect, workday_tenant, Extraction, HtmlSignalExtractor, SignalExtractor, StatusClassifier,
};
use jobtrack_core::{
    ApplicationId, AtsPlatform, CanonicalStatus, CredentialRef, JobApplication, ScanningConfig,
    TenantId, Timestamp,
};
use jobtrack_credentials::{
    CredentialError, CredentialResolver, EnvSecretSource, SecretSource,
};
use jobtrack_db::{scan_runs, Database, DatabaseError, ScanRunStatus, SheetStore};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Key of the lane an application belongs to: its Workday tenant, otherwise
/// its host.
#[must_use]
pub fn lane_key(url: &str) -> String {
    if let Some(tenant) = workday_tenant(url) {
        return format!("workday:{tenant}");
    }
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| url.trim().to_string())
}

/// Group applications into lanes, keeping load order inside each lane and
/// ordering lanes by first appearance.
fn group_into_lanes<'a>(applications: &[&'a JobApplication]) -> Vec<Vec<&'a JobApplication>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut lanes: Vec<Vec<&JobApplication>> = Vec::new();

    for application in applications {
        let slot = *index.entry(lane_key(&application.url)).or_insert_with(|| {
            lanes.push(Vec::new());
            lanes.len() - 1
        });
        lanes[slot].push(application);
    }
    lanes
}

async fn until_cancelled<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = token.cancelled() => None,
        output = future => Some(output),
    }
}

/// State shared by the lanes of one pass.
struct Pass {
    cancel: CancellationToken,
    /// Tenants already logged into during this pass
    logins: Mutex<HashMap<TenantId, CredentialRef>>,
}

/// A fetch attempt that did not produce a usable page.
struct FetchFailure {
    reason: FailureReason,
    retryable: bool,
    blocked: bool,
}

impl FetchFailure {
    fn from_browser(error: BrowserError) -> Self {
        let retryable = error.is_retryable();
        match error {
            BrowserError::Timeout { .. } => Self {
                reason: FailureReason::FetchTimeout,
                retryable: true,
                blocked: false,
            },
            BrowserError::Blocked { reason, .. } => Self {
                reason: FailureReason::FetchBlocked { reason },
                retryable: true,
                blocked: true,
            },
            BrowserError::HttpStatus { status, .. } => Self {
                reason: FailureReason::HttpStatus { status },
                retryable,
                blocked: false,
            },
            other => Self {
                reason: FailureReason::Navigation {
                    message: other.to_string(),
                },
                retryable,
                blocked: false,
            },
        }
    }
}

/// Orchestrates scan passes over the sheet.
pub struct ScanOrchestrator {
    session: Arc<dyn BrowserSession>,
    sheet: Arc<dyn SheetStore>,
    resolver: Arc<CredentialResolver>,
    secrets: Arc<dyn SecretSource>,
    extractor: Arc<dyn SignalExtractor>,
    classifier: Arc<StatusClassifier>,
    journal: Arc<dyn WriteJournal>,
    history: Option<Database>,
    candidates: Vec<CredentialRef>,
    username: Option<String>,
    filter: ApplicationFilter,
    fetch_retry: RetryPolicy,
    write_retry: RetryPolicy,
    fetch_timeout: Duration,
    pause: Duration,
    jitter: Duration,
    run_budget: Option<Duration>,
    max_concurrency: usize,
}

impl ScanOrchestrator {
    /// Create an orchestrator with the default scanning settings, built-in
    /// classification rules, secrets from the environment and an in-memory
    /// journal.
    #[must_use]
    pub fn new(
        session: Arc<dyn BrowserSession>,
        sheet: Arc<dyn SheetStore>,
        resolver: Arc<CredentialResolver>,
    ) -> Self {
        Self {
            session,
            sheet,
            resolver,
            secrets: Arc::new(EnvSecretSource),
            extractor: Arc::new(HtmlSignalExtractor::new()),
            classifier: Arc::new(StatusClassifier::default()),
            journal: Arc::new(MemoryJournal::new()),
            history: None,
            candidates: Vec::new(),
            username: None,
            filter: ApplicationFilter::default(),
            fetch_retry: RetryPolicy::default(),
            write_retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(45),
            pause: Duration::ZERO,
            jitter: Duration::ZERO,
            run_budget: None,
            max_concurrency: 1,
        }
        .with_config(&ScanningConfig::default())
    }

    /// Apply retry, timeout, pacing, budget and concurrency settings.
    #[must_use]
    pub fn with_config(mut self, config: &ScanningConfig) -> Self {
        self.fetch_retry = RetryPolicy::fetch_from_config(config);
        self.write_retry = RetryPolicy::write_from_config(config);
        self.fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);
        self.pause = Duration::from_millis(config.delay_between_applications_ms);
        self.jitter = Duration::from_millis(config.delay_jitter_ms);
        self.run_budget = config.run_budget_secs.map(Duration::from_secs);
        self.max_concurrency = config.max_concurrent_tenants.max(1);
        self
    }

    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = secrets;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn SignalExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<StatusClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: Arc<dyn WriteJournal>) -> Self {
        self.journal = journal;
        self
    }

    /// Record each pass in the `scan_runs` table.
    #[must_use]
    pub fn with_history(mut self, db: Database) -> Self {
        self.history = Some(db);
        self
    }

    /// Candidate credentials tried, in order, for tenants without a working
    /// cached credential.
    #[must_use]
    pub fn with_candidates(mut self, candidates: Vec<CredentialRef>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Username typed into tenant login forms.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ApplicationFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }

    #[must_use]
    pub fn with_write_retry(mut self, policy: RetryPolicy) -> Self {
        self.write_retry = policy;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Pause between two applications: `pause` plus up to `jitter` extra.
    #[must_use]
    pub fn with_pacing(mut self, pause: Duration, jitter: Duration) -> Self {
        self.pause = pause;
        self.jitter = jitter;
        self
    }

    /// Cancel the pass once it has run for `budget`.
    #[must_use]
    pub fn with_run_budget(mut self, budget: Option<Duration>) -> Self {
        self.run_budget = budget;
        self
    }

    /// Scan up to `max` lanes at once. `1` scans sequentially in load order.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Run one pass over the sheet.
    ///
    /// Journaled writes from earlier passes are replayed first. Every
    /// application loaded from the sheet appears in the report exactly once.
    /// Cancelling `cancel` (or exhausting the run budget) defers whatever has
    /// not been reconciled yet; a sheet write that has started still completes.
    ///
    /// # Errors
    /// Returns error only if the sheet cannot be loaded.
    pub async fn run_pass(&self, cancel: CancellationToken) -> Result<ScanReport> {
        let started_at = chrono::Utc::now();
        let replayed = self.replay_journal().await;

        let applications = self.sheet.load_applications().await?;
        let selected: Vec<&JobApplication> = applications
            .iter()
            .filter(|application| self.filter.matches(application))
            .collect();

        info!(
            total = applications.len(),
            selected = selected.len(),
            lanes_at_once = self.max_concurrency,
            "starting scan pass"
        );

        let run_id = self.record_start(applications.len()).await;

        let token = cancel.child_token();
        let budget_timer = self.run_budget.map(|budget| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                info!(budget_secs = budget.as_secs(), "run budget exhausted, stopping pass");
                token.cancel();
            })
        });

        let pass = Pass {
            cancel: token.clone(),
            logins: Mutex::new(HashMap::new()),
        };

        let mut finished: HashMap<ApplicationId, ApplicationReport> = HashMap::new();
        if self.max_concurrency <= 1 {
            for report in self.scan_lane(&selected, &pass).await {
                finished.insert(report.application_id.clone(), report);
            }
        } else {
            let lanes = group_into_lanes(&selected);
            let mut futures = FuturesUnordered::new();

            for lane in &lanes {
                futures.push(self.scan_lane(lane, &pass));

                // Respect concurrency limit
                while futures.len() >= self.max_concurrency {
                    if let Some(reports) = futures.next().await {
                        for report in reports {
                            finished.insert(report.application_id.clone(), report);
                        }
                    }
                }
            }

            while let Some(reports) = futures.next().await {
                for report in reports {
                    finished.insert(report.application_id.clone(), report);
                }
            }
        }

        if let Some(timer) = budget_timer {
            timer.abort();
        }
        let cancelled = token.is_cancelled();

        let reports = applications
            .iter()
            .map(|application| {
                finished
                    .remove(&application.id)
                    .unwrap_or_else(|| {
                        ApplicationReport::not_visited(application, ApplicationOutcome::Skipped)
                    })
            })
            .collect();

        let report = ScanReport {
            run_id,
            started_at,
            finished_at: chrono::Utc::now(),
            replayed,
            cancelled,
            applications: reports,
        };

        let totals = report.totals();
        info!(
            reconciled = totals.reconciled,
            failed = totals.failed,
            deferred = totals.deferred,
            skipped = totals.skipped,
            replayed,
            cancelled,
            "scan pass finished"
        );
        self.record_finish(&report).await;

        Ok(report)
    }

    /// Write journaled results from earlier passes.
    ///
    /// Entries for rows that no longer exist are dropped; other failures stay
    /// journaled.
    async fn replay_journal(&self) -> usize {
        let pending = match self.journal.load().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "could not read write journal, skipping replay");
                return 0;
            }
        };
        if pending.is_empty() {
            return 0;
        }

        let mut replayed = 0;
        let mut remaining = Vec::new();
        for write in pending {
            match self
                .sheet
                .write_status(&write.application_id, write.status, write.checked_at)
                .await
            {
                Ok(()) => replayed += 1,
                Err(DatabaseError::NotFound(_)) => {
                    warn!(application_id = %write.application_id, "dropping journaled write for missing row");
                }
                Err(e) => {
                    warn!(application_id = %write.application_id, error = %e, "journaled write still failing");
                    remaining.push(write);
                }
            }
        }

        let still_pending = remaining.len();
        if let Err(e) = self.journal.replace(remaining).await {
            error!(error = %e, "could not update write journal after replay");
        }
        info!(replayed, still_pending, "replayed write journal");
        replayed
    }

    /// Scan one lane in order, pausing between applications.
    async fn scan_lane(&self, lane: &[&JobApplication], pass: &Pass) -> Vec<ApplicationReport> {
        let mut reports = Vec::with_capacity(lane.len());

        for (index, application) in lane.iter().enumerate() {
            if index > 0 {
                let pause = self.politeness_delay();
                if !pause.is_zero() {
                    until_cancelled(&pass.cancel, tokio::time::sleep(pause)).await;
                }
            }

            if pass.cancel.is_cancelled() {
                reports.push(ApplicationReport::not_visited(
                    application,
                    ApplicationOutcome::Deferred,
                ));
                continue;
            }

            reports.push(self.scan_application(application, pass).await);
        }

        reports
    }

    /// Scan a working copy of the row. The copy carries the detected platform
    /// and this pass's fetch attempts into the report.
    async fn scan_application(&self, application: &JobApplication, pass: &Pass) -> ApplicationReport {
        let mut working = application.clone();
        working.platform = detect(&application.url);
        working.retry_count = 0;

        let outcome = match self.drive(&mut working, pass).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(application_id = %application.id, error = %e, "scan state machine error");
                ApplicationOutcome::Failed {
                    reason: FailureReason::Internal {
                        message: e.to_string(),
                    },
                }
            }
        };

        ApplicationReport::from_application(&working, outcome)
    }

    /// Drive one application from `Pending` to a terminal state (or back to
    /// `Pending` on cancellation).
    async fn drive(
        &self,
        application: &mut JobApplication,
        pass: &Pass,
    ) -> Result<ApplicationOutcome> {
        let platform = application.platform;
        let id = &application.id;
        let mut state = ScanState::Pending.transition(ScanState::PlatformDetected(platform))?;
        debug!(application_id = %id, platform = %platform, "platform detected");

        let mut credential = None;
        if platform.requires_tenant_login() {
            if let Some(tenant) = workday_tenant(&application.url) {
                match until_cancelled(&pass.cancel, self.ensure_login(&tenant, pass)).await {
                    None => return Self::defer(state, id),
                    Some(Ok(credential_ref)) => {
                        state = state.transition(ScanState::CredentialReady(credential_ref.clone()))?;
                        credential = Some(credential_ref);
                    }
                    Some(Err(reason)) => return Self::fail(state, id, reason),
                }
            } else {
                debug!(application_id = %id, "no tenant in URL, fetching without login");
            }
        }

        let fetched = until_cancelled(
            &pass.cancel,
            self.fetch_page(
                &application.url,
                platform,
                credential.as_ref(),
                &mut application.retry_count,
            ),
        )
        .await;
        let extraction = match fetched {
            None => return Self::defer(state, id),
            Some(Err(reason)) => return Self::fail(state, id, reason),
            Some(Ok(extraction)) => extraction,
        };
        state = state.transition(ScanState::PageFetched)?;

        let classification = self.classifier.classify(platform, &extraction.signals);
        state = state.transition(ScanState::Classified(classification))?;
        debug!(
            application_id = %id,
            status = %classification.status,
            confidence = %classification.confidence,
            signals = extraction.signals.len(),
            "page classified"
        );

        if pass.cancel.is_cancelled() {
            return Self::defer(state, id);
        }

        let status = if classification.status == CanonicalStatus::Unknown {
            application.current_status
        } else {
            classification.status
        };

        match self.write_with_retry(id, status).await {
            Ok(()) => {
                state.transition(ScanState::Reconciled(status))?;
                let changed = status != application.current_status;
                if changed {
                    info!(
                        application_id = %id,
                        from = %application.current_status,
                        to = %status,
                        "status changed"
                    );
                }
                Ok(ApplicationOutcome::Reconciled {
                    status,
                    classified: classification.status,
                    confidence: classification.confidence,
                    changed,
                })
            }
            Err(reason) => Self::fail(state, id, reason),
        }
    }

    fn defer(state: ScanState, id: &ApplicationId) -> Result<ApplicationOutcome> {
        debug!(application_id = %id, from = state.name(), "pass cancelled, deferring");
        state.transition(ScanState::Pending)?;
        Ok(ApplicationOutcome::Deferred)
    }

    fn fail(state: ScanState, id: &ApplicationId, reason: FailureReason) -> Result<ApplicationOutcome> {
        warn!(application_id = %id, from = state.name(), reason = %reason, "application failed");
        state.transition(ScanState::Failed(reason.clone()))?;
        Ok(ApplicationOutcome::Failed { reason })
    }

    /// Make sure the session is logged into `tenant`, resolving a credential
    /// on the first application of the tenant in this pass.
    async fn ensure_login(
        &self,
        tenant: &TenantId,
        pass: &Pass,
    ) -> std::result::Result<CredentialRef, FailureReason> {
        let known = pass
            .logins
            .lock()
            .expect("acquire login map lock")
            .get(tenant)
            .cloned();
        if let Some(credential) = known {
            return Ok(credential);
        }

        let Some(username) = self.username.as_deref() else {
            return Err(FailureReason::MissingUsername);
        };

        let login = SessionLogin::new(self.session.as_ref(), self.secrets.as_ref(), username);
        match self.resolver.resolve(tenant, &self.candidates, &login).await {
            Ok(credential) => {
                pass.logins
                    .lock()
                    .expect("acquire login map lock")
                    .insert(tenant.clone(), credential.clone());
                Ok(credential)
            }
            Err(CredentialError::AuthExhausted { tenant }) => {
                Err(FailureReason::AuthExhausted { tenant })
            }
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "credential resolution failed");
                Err(FailureReason::AuthExhausted {
                    tenant: tenant.clone(),
                })
            }
        }
    }

    /// Fetch and extract a page, retrying timeouts, blocks and transient HTTP
    /// statuses with backoff.
    async fn fetch_page(
        &self,
        url: &str,
        platform: AtsPlatform,
        credential: Option<&CredentialRef>,
        attempts: &mut u32,
    ) -> std::result::Result<Extraction, FailureReason> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            *attempts = attempt;

            let failure = match tokio::time::timeout(
                self.fetch_timeout,
                self.session.fetch(url, credential),
            )
            .await
            {
                Err(_) => FetchFailure {
                    reason: FailureReason::FetchTimeout,
                    retryable: true,
                    blocked: false,
                },
                Ok(Err(e)) => FetchFailure::from_browser(e),
                Ok(Ok(snapshot)) => {
                    let extraction =
                        self.extractor
                            .extract(platform, &snapshot.html, snapshot.http_status);
                    match extraction.blocked {
                        None => return Ok(extraction),
                        Some(reason) => FetchFailure {
                            reason: FailureReason::FetchBlocked { reason },
                            retryable: true,
                            blocked: true,
                        },
                    }
                }
            };

            if !failure.retryable || !self.fetch_retry.should_retry(attempt) {
                return Err(failure.reason);
            }

            let delay = self.fetch_retry.delay_for(attempt, failure.blocked);
            warn!(
                url,
                attempt,
                max_attempts = self.fetch_retry.max_attempts(),
                reason = %failure.reason,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Write a status, journaling it when every attempt fails.
    async fn write_with_retry(
        &self,
        id: &ApplicationId,
        status: CanonicalStatus,
    ) -> std::result::Result<(), FailureReason> {
        let checked_at = Timestamp::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.sheet.write_status(id, status, checked_at).await {
                Ok(()) => {
                    if let Err(e) = self.journal.remove(id).await {
                        warn!(application_id = %id, error = %e, "could not clear journaled write");
                    }
                    return Ok(());
                }
                Err(e) if self.write_retry.should_retry(attempt) => {
                    let delay = self.write_retry.delay_for(attempt, false);
                    warn!(application_id = %id, attempt, error = %e, "sheet write failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let pending = PendingWrite {
                        application_id: id.clone(),
                        status,
                        checked_at,
                    };
                    match self.journal.append(pending).await {
                        Ok(()) => info!(application_id = %id, status = %status, "journaled sheet write"),
                        Err(journal_error) => error!(
                            application_id = %id,
                            status = %status,
                            error = %journal_error,
                            "could not journal sheet write"
                        ),
                    }
                    return Err(FailureReason::WriteFailure {
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    fn politeness_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.pause + Duration::from_millis(extra)
    }

    async fn record_start(&self, total: usize) -> Option<String> {
        let db = self.history.as_ref()?;
        let total = u32::try_from(total).unwrap_or(u32::MAX);
        match scan_runs::create_scan_run(db.pool(), total).await {
            Ok(run) => Some(run.id),
            Err(e) => {
                warn!(error = %e, "could not record scan run start");
                None
            }
        }
    }

    async fn record_finish(&self, report: &ScanReport) {
        let (Some(db), Some(run_id)) = (self.history.as_ref(), report.run_id.as_deref()) else {
            return;
        };
        let status = if report.cancelled {
            ScanRunStatus::Cancelled
        } else {
            ScanRunStatus::Completed
        };
        if let Err(e) =
            scan_runs::finish_scan_run(db.pool(), run_id, status, report.totals(), None).await
        {
            warn!(run_id, error = %e, "could not record scan run end");
        }
    }
}
