//! Persistent tenant credential cache.

use crate::error::{DatabaseError, Result};
use crate::Database;
use async_trait::async_trait;
use jobtrack_core::{CredentialRef, TenantId, Timestamp};
use jobtrack_credentials::{CredentialCacheStore, TenantCredentialCacheEntry};
use sqlx::{Pool, Sqlite};

type EntryRow = (String, String, String, i64);

/// Load one tenant's entry.
///
/// # Errors
/// Returns error if the query fails or the row cannot be decoded.
pub async fn load_entry(
    pool: &Pool<Sqlite>,
    tenant: &TenantId,
) -> Result<Option<TenantCredentialCacheEntry>> {
    let row = sqlx::query_as::<_, EntryRow>(
        "SELECT tenant_id, credential_ref, last_verified, consecutive_failures
         FROM tenant_credentials WHERE tenant_id = ?",
    )
    .bind(tenant.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(decode_entry).transpose()
}

/// Insert or replace an entry.
///
/// # Errors
/// Returns error if the write fails.
pub async fn upsert_entry(pool: &Pool<Sqlite>, entry: &TenantCredentialCacheEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO tenant_credentials (tenant_id, credential_ref, last_verified, consecutive_failures)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(tenant_id) DO UPDATE SET
             credential_ref = excluded.credential_ref,
             last_verified = excluded.last_verified,
             consecutive_failures = excluded.consecutive_failures",
    )
    .bind(entry.tenant_id.as_str())
    .bind(entry.credential_ref.as_str())
    .bind(entry.last_verified.to_rfc3339())
    .bind(i64::from(entry.consecutive_failures))
    .execute(pool)
    .await?;

    tracing::debug!(
        tenant = %entry.tenant_id,
        credential = %entry.credential_ref,
        failures = entry.consecutive_failures,
        "stored tenant credential"
    );
    Ok(())
}

/// Remove an entry. Missing entries are ignored.
///
/// # Errors
/// Returns error if the delete fails.
pub async fn remove_entry(pool: &Pool<Sqlite>, tenant: &TenantId) -> Result<()> {
    sqlx::query("DELETE FROM tenant_credentials WHERE tenant_id = ?")
        .bind(tenant.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// All entries ordered by tenant.
///
/// # Errors
/// Returns error if the query fails or a row cannot be decoded.
pub async fn list_entries(pool: &Pool<Sqlite>) -> Result<Vec<TenantCredentialCacheEntry>> {
    let rows = sqlx::query_as::<_, EntryRow>(
        "SELECT tenant_id, credential_ref, last_verified, consecutive_failures
         FROM tenant_credentials ORDER BY tenant_id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_entry).collect()
}

fn decode_entry(
    (tenant_id, credential_ref, last_verified, failures): EntryRow,
) -> Result<TenantCredentialCacheEntry> {
    let decode = |e: jobtrack_core::JobtrackError| DatabaseError::Decode(e.to_string());
    Ok(TenantCredentialCacheEntry {
        tenant_id: TenantId::new(tenant_id).map_err(decode)?,
        credential_ref: CredentialRef::new(credential_ref).map_err(decode)?,
        last_verified: Timestamp::from_rfc3339(&last_verified).map_err(decode)?,
        consecutive_failures: u32::try_from(failures).map_err(|_| {
            DatabaseError::Decode(format!("invalid failure count {failures}"))
        })?,
    })
}

#[async_trait]
impl CredentialCacheStore for Database {
    async fn load(
        &self,
        tenant: &TenantId,
    ) -> jobtrack_credentials::Result<Option<TenantCredentialCacheEntry>> {
        Ok(load_entry(self.pool(), tenant).await?)
    }

    async fn upsert(&self, entry: &TenantCredentialCacheEntry) -> jobtrack_credentials::Result<()> {
        Ok(upsert_entry(self.pool(), entry).await?)
    }

    async fn remove(&self, tenant: &TenantId) -> jobtrack_credentials::Result<()> {
        Ok(remove_entry(self.pool(), tenant).await?)
    }

    async fn list(&self) -> jobtrack_credentials::Result<Vec<TenantCredentialCacheEntry>> {
        Ok(list_entries(self.pool()).await?)
    }
}
