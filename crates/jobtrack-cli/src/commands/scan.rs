use crate::cli::ScanArgs;
use anyhow::{anyhow, Context, Result};
use jobtrack_browser::{open_session, BrowserSession, ChromiumSession};
use jobtrack_core::{AppConfig, ApplicationId, AtsPlatform, CredentialRef};
use jobtrack_credentials::{
    workday_candidates, CredentialCacheStore, CredentialResolver, EnvSecretSource, SecretSource,
};
use jobtrack_db::{Database, SheetStore};
use jobtrack_scanner::{
    ApplicationFilter, ApplicationOutcome, JsonFileJournal, ScanOrchestrator, ScanReport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run a single pass and print its report.
pub async fn run_once(config: &AppConfig, db: &Database, args: &ScanArgs) -> Result<()> {
    let orchestrator = build_orchestrator(config, db, args).await?;
    let cancel = cancel_on_interrupt();

    let report = orchestrator.run_pass(cancel).await.context("scan pass")?;
    print_report(&report, args.json)
}

/// Run passes until Ctrl-C, sleeping `interval_minutes` between them.
pub async fn watch(
    config: &AppConfig,
    db: &Database,
    args: &ScanArgs,
    interval_minutes: u64,
) -> Result<()> {
    let orchestrator = build_orchestrator(config, db, args).await?;
    let cancel = cancel_on_interrupt();
    let interval = Duration::from_secs(interval_minutes.max(1) * 60);

    loop {
        let report = orchestrator
            .run_pass(cancel.clone())
            .await
            .context("scan pass")?;
        print_report(&report, args.json)?;

        if cancel.is_cancelled() {
            break;
        }
        info!(minutes = interval_minutes, "waiting for next pass");
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    info!("watch stopped");
    Ok(())
}

/// Token cancelled on the first Ctrl-C. Writes already started still finish.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing in-flight writes");
            token.cancel();
        }
    });
    cancel
}

fn filter_from_args(config: &AppConfig, args: &ScanArgs) -> Result<ApplicationFilter> {
    if args.all {
        return Ok(ApplicationFilter::All);
    }
    if let Some(platform) = &args.platform {
        let platform: AtsPlatform = platform.parse().map_err(|e| anyhow!("{e}"))?;
        return Ok(ApplicationFilter::Platform(platform));
    }
    if !args.id.is_empty() {
        let ids = args
            .id
            .iter()
            .map(|id| ApplicationId::new(id.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        return Ok(ApplicationFilter::Specific(ids));
    }
    Ok(if config.scanning.skip_terminal {
        ApplicationFilter::Unresolved
    } else {
        ApplicationFilter::All
    })
}

fn env_value(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

async fn build_orchestrator(
    config: &AppConfig,
    db: &Database,
    args: &ScanArgs,
) -> Result<ScanOrchestrator> {
    let filter = filter_from_args(config, args)?;
    let (classifier, extractor) =
        jobtrack_classifier::from_config(&config.classifier).context("load classification rules")?;
    let session = open_browser(config).await?;

    let store: Arc<dyn CredentialCacheStore> = Arc::new(db.clone());
    let resolver = Arc::new(CredentialResolver::from_config(store, &config.credentials));
    let candidates = workday_candidates(&config.credentials)?;
    let journal = Arc::new(JsonFileJournal::new(config.journal_path()?));
    let sheet: Arc<dyn SheetStore> = Arc::new(db.clone());

    let mut orchestrator = ScanOrchestrator::new(session, sheet, resolver)
        .with_config(&config.scanning)
        .with_classifier(Arc::new(classifier))
        .with_extractor(Arc::new(extractor))
        .with_journal(journal)
        .with_history(db.clone())
        .with_candidates(candidates)
        .with_filter(filter);

    match env_value(&config.credentials.workday_username_env) {
        Some(username) => orchestrator = orchestrator.with_username(username),
        None => warn!(
            variable = %config.credentials.workday_username_env,
            "no Workday username set, Workday applications will fail"
        ),
    }

    Ok(orchestrator)
}

/// Open the configured browser; a Chromium session also signs into `LinkedIn`
/// when a `LinkedIn` username is configured.
async fn open_browser(config: &AppConfig) -> Result<Arc<dyn BrowserSession>> {
    let engine = config.browser.engine.to_ascii_lowercase();
    if engine != "chromium" && engine != "chrome" {
        return open_session(&config.browser)
            .await
            .context("open browser session");
    }

    let session = ChromiumSession::launch(&config.browser)
        .await
        .context("launch Chrome")?;

    if let Some(username) = env_value(&config.credentials.linkedin_username_env) {
        let reference = CredentialRef::new(config.credentials.linkedin_password_ref.as_str())?;
        match EnvSecretSource.secret(&reference) {
            Ok(secret) => match session.login_linkedin(&username, &secret).await {
                Ok(true) => info!("signed into LinkedIn"),
                Ok(false) => warn!("LinkedIn rejected the login, continuing signed out"),
                Err(e) => warn!(error = %e, "LinkedIn login failed, continuing signed out"),
            },
            Err(e) => warn!(error = %e, "LinkedIn password not available"),
        }
    }

    Ok(Arc::new(session))
}

fn print_report(report: &ScanReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for row in &report.applications {
        match &row.outcome {
            ApplicationOutcome::Reconciled {
                status,
                changed: true,
                ..
            } => println!("  {:<12} {} -> {}", "changed", row.url, status),
            ApplicationOutcome::Failed { reason } => {
                println!("  {:<12} {} ({})", "failed", row.url, reason);
            }
            ApplicationOutcome::Deferred => println!("  {:<12} {}", "deferred", row.url),
            _ => {}
        }
    }

    let totals = report.totals();
    println!(
        "{} applications: {} reconciled ({} changed), {} failed, {} deferred, {} skipped",
        totals.total,
        totals.reconciled,
        report.changes().count(),
        totals.failed,
        totals.deferred,
        totals.skipped
    );
    if report.replayed > 0 {
        println!("replayed {} journaled writes", report.replayed);
    }
    if report.cancelled {
        println!("pass stopped early; deferred rows will be picked up next time");
    }
    Ok(())
}
