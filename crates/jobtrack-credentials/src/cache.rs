//! Tenant → working credential cache.

use crate::error::Result;
use async_trait::async_trait;
use jobtrack_core::{CredentialRef, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Which credential last logged into a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCredentialCacheEntry {
    /// Tenant the entry belongs to
    pub tenant_id: TenantId,
    /// Reference to the credential that worked
    pub credential_ref: CredentialRef,
    /// When the credential last logged in successfully
    pub last_verified: Timestamp,
    /// Failed logins with the cached credential since it last worked
    pub consecutive_failures: u32,
}

impl TenantCredentialCacheEntry {
    /// Entry for a credential that just logged in.
    #[must_use]
    pub fn verified(tenant_id: TenantId, credential_ref: CredentialRef) -> Self {
        Self {
            tenant_id,
            credential_ref,
            last_verified: Timestamp::now(),
            consecutive_failures: 0,
        }
    }

    /// An entry whose failures exceed the threshold must not be trusted.
    #[must_use]
    pub fn is_invalidated(&self, failure_threshold: u32) -> bool {
        self.consecutive_failures > failure_threshold
    }
}

/// Persistence behind the credential cache.
///
/// Every mutation made by the resolver is written through to the store.
#[async_trait]
pub trait CredentialCacheStore: Send + Sync {
    /// Fetch the entry for a tenant.
    async fn load(&self, tenant: &TenantId) -> Result<Option<TenantCredentialCacheEntry>>;

    /// Insert or replace the entry for `entry.tenant_id`.
    async fn upsert(&self, entry: &TenantCredentialCacheEntry) -> Result<()>;

    /// Remove a tenant's entry. Removing a missing entry is not an error.
    async fn remove(&self, tenant: &TenantId) -> Result<()>;

    /// Every entry, ordered by tenant.
    async fn list(&self) -> Result<Vec<TenantCredentialCacheEntry>>;
}

/// In-process cache store, used in tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<TenantId, TenantCredentialCacheEntry>>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialCacheStore for MemoryCacheStore {
    async fn load(&self, tenant: &TenantId) -> Result<Option<TenantCredentialCacheEntry>> {
        let entries = self.entries.read().expect("acquire read lock on cache");
        Ok(entries.get(tenant).cloned())
    }

    async fn upsert(&self, entry: &TenantCredentialCacheEntry) -> Result<()> {
        let mut entries = self.entries.write().expect("acquire write lock on cache");
        entries.insert(entry.tenant_id.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, tenant: &TenantId) -> Result<()> {
        let mut entries = self.entries.write().expect("acquire write lock on cache");
        entries.remove(tenant);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TenantCredentialCacheEntry>> {
        let entries = self.entries.read().expect("acquire read lock on cache");
        let mut all: Vec<_> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(all)
    }
}
