//! Application rows: the sheet the scanner reconciles into.
//!
//! Rows keep their load order in `position`, so passes walk the sheet the way
//! the user laid it out.

use crate::error::{DatabaseError, Result};
use jobtrack_core::{ApplicationId, AtsPlatform, CanonicalStatus, JobApplication, Timestamp};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

const SELECT_COLUMNS: &str =
    "SELECT id, url, company, status, platform, last_checked FROM applications";

/// Insert a new application at the end of the sheet.
///
/// # Errors
/// Returns error if the URL is already tracked or the insert fails.
pub async fn insert_application(pool: &Pool<Sqlite>, application: &JobApplication) -> Result<()> {
    sqlx::query(
        "INSERT INTO applications (id, url, company, status, platform, last_checked, position)
         VALUES (?, ?, ?, ?, ?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM applications))",
    )
    .bind(application.id.as_str())
    .bind(&application.url)
    .bind(&application.company_name)
    .bind(application.current_status.label())
    .bind(application.platform.as_str())
    .bind(application.last_checked.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Update company, platform and (when given) status of an existing row.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if no row has this ID.
pub async fn update_details(
    pool: &Pool<Sqlite>,
    id: &ApplicationId,
    company: &str,
    platform: AtsPlatform,
    status: Option<CanonicalStatus>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE applications
         SET company = ?, platform = ?, status = COALESCE(?, status)
         WHERE id = ?",
    )
    .bind(company)
    .bind(platform.as_str())
    .bind(status.map(|s| s.label()))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("application '{id}' not found")));
    }
    Ok(())
}

/// All applications in sheet order.
///
/// # Errors
/// Returns error if the query fails or a row holds an undecodable value.
pub async fn list_applications(pool: &Pool<Sqlite>) -> Result<Vec<JobApplication>> {
    let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY position"))
        .fetch_all(pool)
        .await?;

    rows.iter().map(decode_row).collect()
}

/// Look up one application by ID.
///
/// # Errors
/// Returns error if the query fails.
pub async fn get_application(
    pool: &Pool<Sqlite>,
    id: &ApplicationId,
) -> Result<Option<JobApplication>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(decode_row).transpose()
}

/// Look up one application by URL.
///
/// # Errors
/// Returns error if the query fails.
pub async fn find_by_url(pool: &Pool<Sqlite>, url: &str) -> Result<Option<JobApplication>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE url = ?"))
        .bind(url)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(decode_row).transpose()
}

/// Set status and check time.
///
/// Writing the status a row already has only moves `last_checked`.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if no row has this ID.
pub async fn update_status(
    pool: &Pool<Sqlite>,
    id: &ApplicationId,
    status: CanonicalStatus,
    checked_at: Timestamp,
) -> Result<()> {
    let result = sqlx::query("UPDATE applications SET status = ?, last_checked = ? WHERE id = ?")
        .bind(status.label())
        .bind(checked_at.to_rfc3339())
        .bind(id.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("application '{id}' not found")));
    }
    Ok(())
}

/// Delete an application.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if no row has this ID.
pub async fn delete_application(pool: &Pool<Sqlite>, id: &ApplicationId) -> Result<()> {
    let result = sqlx::query("DELETE FROM applications WHERE id = ?")
        .bind(id.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("application '{id}' not found")));
    }
    Ok(())
}

/// Row counts grouped by status label, largest first.
///
/// # Errors
/// Returns error if the query fails.
pub async fn count_by_status(pool: &Pool<Sqlite>) -> Result<Vec<(String, i64)>> {
    count_by(pool, "status").await
}

/// Row counts grouped by platform, largest first.
///
/// # Errors
/// Returns error if the query fails.
pub async fn count_by_platform(pool: &Pool<Sqlite>) -> Result<Vec<(String, i64)>> {
    count_by(pool, "platform").await
}

async fn count_by(pool: &Pool<Sqlite>, column: &'static str) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(&format!(
        "SELECT {column}, COUNT(*) AS n FROM applications GROUP BY {column} ORDER BY n DESC, {column}"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn decode_row(row: &SqliteRow) -> Result<JobApplication> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let platform: String = row.try_get("platform")?;
    let last_checked: Option<String> = row.try_get("last_checked")?;

    let id = ApplicationId::new(id).map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let current_status = CanonicalStatus::parse_label(&status).ok_or_else(|| {
        DatabaseError::Decode(format!("invalid status '{status}' for application '{id}'"))
    })?;
    let platform = platform
        .parse::<AtsPlatform>()
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let last_checked = last_checked
        .as_deref()
        .map(Timestamp::from_rfc3339)
        .transpose()
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;

    Ok(JobApplication {
        id,
        url: row.try_get("url")?,
        company_name: row.try_get("company")?,
        current_status,
        platform,
        last_checked,
        // counted per pass by the scanner, never stored
        retry_count: 0,
    })
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

    fn app(id: &str, url: &str) -> JobApplication {
        JobApplication::new(ApplicationId::new(id).expect("valid id"), url, "Acme")
    }

    #[tokio::test]
    async fn test_insert_and_list_in_order() {
        let db = setup_test_db().await;
        insert_application(db.pool(), &app("b", "https://jobs.lever.co/acme/2"))
            .await
            .expect("insert");
        insert_application(db.pool(), &app("a", "https://jobs.lever.co/acme/1"))
            .await
            .expect("insert");

        let apps = list_applications(db.pool()).await.expect("list");
        let ids: Vec<_> = apps.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(apps[0].current_status, CanonicalStatus::Unknown);
        assert!(apps[0].last_checked.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let db = setup_test_db().await;
        insert_application(db.pool(), &app("a", "https://x.com/1"))
            .await
            .expect("insert");
        assert!(insert_application(db.pool(), &app("b", "https://x.com/1"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_status_roundtrip() {
        let db = setup_test_db().await;
        let application = app("a", "https://x.com/1");
        insert_application(db.pool(), &application)
            .await
            .expect("insert");

        let checked = Timestamp::now();
        update_status(db.pool(), &application.id, CanonicalStatus::UnderReview, checked)
            .await
            .expect("update");

        let loaded = get_application(db.pool(), &application.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(loaded.current_status, CanonicalStatus::UnderReview);
        assert_eq!(
            loaded.last_checked.map(|t| t.timestamp()),
            Some(checked.timestamp())
        );
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let db = setup_test_db().await;
        let id = ApplicationId::new("ghost").expect("valid id");
        let err = update_status(db.pool(), &id, CanonicalStatus::Open, Timestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
        assert!(matches!(
            delete_application(db.pool(), &id).await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_counts() {
        let db = setup_test_db().await;
        for (id, url, status) in [
            ("1", "https://a.com/1", CanonicalStatus::Rejected),
            ("2", "https://a.com/2", CanonicalStatus::Rejected),
            ("3", "https://a.com/3", CanonicalStatus::Open),
        ] {
            let mut application = app(id, url);
            application.current_status = status;
            insert_application(db.pool(), &application)
                .await
                .expect("insert");
        }

        let by_status = count_by_status(db.pool()).await.expect("count");
        assert_eq!(by_status[0], ("Rejected".to_string(), 2));
        assert_eq!(by_status[1], ("Open".to_string(), 1));

        let by_platform = count_by_platform(db.pool()).await.expect("count");
        assert_eq!(by_platform, vec![("generic".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_undecodable_status_is_reported() {
        let db = setup_test_db().await;
        sqlx::query(
            "INSERT INTO applications (id, url, status, platform, position) VALUES ('x', 'u', 'Ghosted', 'generic', 1)",
        )
        .execute(db.pool())
        .await
        .expect("insert raw row");

        let err = list_applications(db.pool()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Decode(_)));
    }
}
