//! CSV interchange for the application sheet.
//!
//! Import accepts the columns `URL`, `Company`, `Status` (or the older
//! `Decision`), `Platform`, `LastChecked` and an optional `Id`. Rows are
//! matched on URL, so importing the same file twice updates instead of
//! duplicating.

use crate::applications;
use crate::error::{DatabaseError, Result};
use jobtrack_classifier::detect;
use jobtrack_core::{ApplicationId, AtsPlatform, CanonicalStatus, JobApplication, Timestamp};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{Pool, Sqlite};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// What an import did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// New rows
    pub inserted: usize,
    /// Existing rows matched by URL
    pub updated: usize,
    /// Rows without a usable URL or ID
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(rename = "URL", alias = "Url", alias = "url")]
    url: String,
    #[serde(
        rename = "Company",
        alias = "company",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    company: Option<String>,
    #[serde(
        rename = "Status",
        alias = "Decision",
        alias = "status",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    status: Option<String>,
    #[serde(
        rename = "Platform",
        alias = "platform",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    platform: Option<String>,
    #[serde(
        rename = "LastChecked",
        alias = "Last Checked",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    last_checked: Option<String>,
    #[serde(rename = "Id", alias = "ID", default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "URL")]
    url: &'a str,
    #[serde(rename = "Company")]
    company: &'a str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Platform")]
    platform: &'static str,
    #[serde(rename = "LastChecked")]
    last_checked: String,
    #[serde(rename = "Id")]
    id: &'a str,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_rows<R: Read>(reader: R) -> Result<Vec<SheetRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    csv_reader
        .deserialize::<SheetRow>()
        .map(|row| row.map_err(DatabaseError::from))
        .collect()
}

/// Import rows from CSV, upserting by URL.
///
/// A missing Platform is detected from the URL. An unreadable Status is
/// ignored and the stored status kept.
///
/// # Errors
/// Returns error if the CSV is malformed or a database write fails.
pub async fn import_csv<R: Read>(pool: &Pool<Sqlite>, reader: R) -> Result<ImportSummary> {
    let rows = parse_rows(reader)?;
    let mut summary = ImportSummary::default();

    for (index, row) in rows.into_iter().enumerate() {
        if row.url.is_empty() {
            debug!(row = index + 1, "skipping row without URL");
            summary.skipped += 1;
            continue;
        }

        let platform = match row.platform.as_deref().map(str::parse::<AtsPlatform>) {
            Some(Ok(platform)) => platform,
            Some(Err(e)) => {
                warn!(row = index + 1, error = %e, "unreadable platform, detecting from URL");
                detect(&row.url)
            }
            None => detect(&row.url),
        };

        let status = row.status.as_deref().and_then(|label| {
            let parsed = CanonicalStatus::parse_label(label);
            if parsed.is_none() {
                warn!(row = index + 1, label, "unreadable status, keeping stored value");
            }
            parsed
        });
        let company = row.company.unwrap_or_default();

        if let Some(existing) = applications::find_by_url(pool, &row.url).await? {
            applications::update_details(pool, &existing.id, &company, platform, status).await?;
            summary.updated += 1;
            continue;
        }

        let id = match row.id {
            Some(id) => match ApplicationId::new(id) {
                Ok(id) => id,
                Err(e) => {
                    warn!(row = index + 1, error = %e, "skipping row with invalid id");
                    summary.skipped += 1;
                    continue;
                }
            },
            None => ApplicationId::generate(),
        };

        let mut application = JobApplication::new(id, row.url, company);
        application.platform = platform;
        if let Some(status) = status {
            application.current_status = status;
        }
        application.last_checked = row
            .last_checked
            .as_deref()
            .and_then(|s| Timestamp::from_rfc3339(s).ok());

        applications::insert_application(pool, &application).await?;
        summary.inserted += 1;
    }

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped,
        "imported applications"
    );
    Ok(summary)
}

/// Import a CSV file.
///
/// # Errors
/// Returns error if the file cannot be opened or the import fails.
pub async fn import_file(pool: &Pool<Sqlite>, path: impl AsRef<Path>) -> Result<ImportSummary> {
    let file = std::fs::File::open(path.as_ref())?;
    import_csv(pool, file).await
}

/// Write every application as CSV, in sheet order.
///
/// # Errors
/// Returns error if the query fails or the writer does.
pub async fn export_csv<W: Write>(pool: &Pool<Sqlite>, writer: W) -> Result<usize> {
    let rows = applications::list_applications(pool).await?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    for application in &rows {
        csv_writer.serialize(ExportRow {
            url: &application.url,
            company: &application.company_name,
            status: application.current_status.label(),
            platform: application.platform.as_str(),
            last_checked: application
                .last_checked
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            id: application.id.as_str(),
        })?;
    }
    csv_writer.flush()?;

    Ok(rows.len())
}

/// Export to a CSV file, replacing it.
///
/// # Errors
/// Returns error if the file cannot be created or the export fails.
pub async fn export_file(pool: &Pool<Sqlite>, path: impl AsRef<Path>) -> Result<usize> {
    let file = std::fs::File::create(path.as_ref())?;
    export_csv(pool, file).await
}
