use anyhow::{Context, Result};
use jobtrack_db::{applications, csv_io, scan_runs, Database};
use std::path::Path;
use tracing::info;

pub async fn import(db: &Database, path: &Path) -> Result<()> {
    let summary = csv_io::import_file(db.pool(), path)
        .await
        .with_context(|| format!("import {}", path.display()))?;

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped,
        "import finished"
    );
    println!(
        "imported {}: {} new, {} updated, {} skipped",
        path.display(),
        summary.inserted,
        summary.updated,
        summary.skipped
    );
    Ok(())
}

pub async fn export(db: &Database, path: &Path) -> Result<()> {
    let rows = csv_io::export_file(db.pool(), path)
        .await
        .with_context(|| format!("export {}", path.display()))?;
    println!("exported {rows} applications to {}", path.display());
    Ok(())
}

/// Print what the dashboard charts: counts by status and by platform.
pub async fn summary(db: &Database, runs: u32) -> Result<()> {
    let by_status = applications::count_by_status(db.pool()).await?;
    let by_platform = applications::count_by_platform(db.pool()).await?;
    let total: i64 = by_status.iter().map(|(_, n)| n).sum();

    println!("{total} applications");
    println!();
    println!("By status:");
    for (status, count) in &by_status {
        println!("  {status:<16} {count:>5}");
    }
    println!();
    println!("By platform:");
    for (platform, count) in &by_platform {
        println!("  {platform:<16} {count:>5}");
    }

    let recent = scan_runs::list_recent_runs(db.pool(), runs).await?;
    if !recent.is_empty() {
        println!();
        println!("Recent passes:");
        for run in recent {
            println!(
                "  {}  {:<11} {} reconciled, {} failed, {} deferred",
                run.started_at,
                run.status,
                run.totals.reconciled,
                run.totals.failed,
                run.totals.deferred
            );
        }
    }
    Ok(())
}
