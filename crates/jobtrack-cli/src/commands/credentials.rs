use anyhow::Result;
use jobtrack_core::TenantId;
use jobtrack_db::{tenant_credentials, Database};
use tracing::info;

/// Print the cached credential reference per tenant. Secrets never leave the
/// environment, so only reference names are shown.
pub async fn list(db: &Database) -> Result<()> {
    let entries = tenant_credentials::list_entries(db.pool()).await?;
    if entries.is_empty() {
        println!("no cached tenant credentials");
        return Ok(());
    }

    println!("{:<24} {:<28} {:<26} failures", "tenant", "credential", "last verified");
    for entry in entries {
        println!(
            "{:<24} {:<28} {:<26} {}",
            entry.tenant_id.as_str(),
            entry.credential_ref.as_str(),
            entry.last_verified.to_rfc3339(),
            entry.consecutive_failures
        );
    }
    Ok(())
}

/// Drop a tenant's cached credential; the next pass tries every candidate.
pub async fn forget(db: &Database, tenant: &str) -> Result<()> {
    let tenant = TenantId::new(tenant)?;
    tenant_credentials::remove_entry(db.pool(), &tenant).await?;
    info!(tenant = %tenant, "forgot cached credential");
    println!("forgot cached credential for {tenant}");
    Ok(())
}
