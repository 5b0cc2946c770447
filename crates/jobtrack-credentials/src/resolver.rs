//! Per-tenant credential resolution.
//!
//! For a multi-tenant ATS each employer tenant may accept a different
//! password from the candidate pool. The resolver remembers which candidate
//! worked for each tenant, tries it first next time, and falls back to the
//! full pool when it stops working.

use crate::cache::{CredentialCacheStore, TenantCredentialCacheEntry};
use crate::error::{CredentialError, Result};
use async_trait::async_trait;
use jobtrack_core::{CredentialRef, CredentialsConfig, TenantId, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of cached-credential failures tolerated before eviction.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default bound on one login attempt.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(45);

/// One login attempt against a tenant.
///
/// Returns `true` when the tenant accepted the credential. Transport errors
/// are reported as `false`.
#[async_trait]
pub trait LoginAttempt: Send + Sync {
    /// Try to log into `tenant` with the secret behind `credential`.
    async fn attempt(&self, tenant: &TenantId, credential: &CredentialRef) -> bool;
}

/// Resolves and caches the working credential for each tenant.
pub struct CredentialResolver {
    store: Arc<dyn CredentialCacheStore>,
    failure_threshold: u32,
    login_timeout: Duration,
    tenant_locks: Mutex<HashMap<TenantId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CredentialResolver {
    /// Create a resolver writing through to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialCacheStore>) -> Self {
        Self {
            store,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            tenant_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a resolver using the thresholds from configuration.
    #[must_use]
    pub fn from_config(store: Arc<dyn CredentialCacheStore>, config: &CredentialsConfig) -> Self {
        Self::new(store)
            .with_failure_threshold(config.failure_threshold)
            .with_login_timeout(Duration::from_secs(config.login_timeout_secs))
    }

    /// Set how many consecutive failures a cached credential may accumulate
    /// before it is evicted.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the bound on a single login attempt.
    #[must_use]
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Configured failure threshold.
    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Find a credential that logs into `tenant`.
    ///
    /// The cached credential is tried first; on a miss or a failure the
    /// candidates are tried in order, skipping one already tried in this
    /// call. Calls for the same tenant run one at a time.
    ///
    /// # Errors
    /// Returns [`CredentialError::AuthExhausted`] when no credential works.
    pub async fn resolve(
        &self,
        tenant: &TenantId,
        candidates: &[CredentialRef],
        login: &dyn LoginAttempt,
    ) -> Result<CredentialRef> {
        let lock = self.tenant_lock(tenant);
        let result = {
            let _guard = lock.lock().await;
            self.resolve_locked(tenant, candidates, login).await
        };
        drop(lock);
        self.release_tenant_lock(tenant);
        result
    }

    async fn resolve_locked(
        &self,
        tenant: &TenantId,
        candidates: &[CredentialRef],
        login: &dyn LoginAttempt,
    ) -> Result<CredentialRef> {
        let mut already_tried: Option<CredentialRef> = None;

        if let Some(mut entry) = self.load_entry(tenant).await {
            if entry.is_invalidated(self.failure_threshold) {
                debug!(
                    tenant = %tenant,
                    failures = entry.consecutive_failures,
                    "cached credential already invalidated"
                );
                self.persist_remove(tenant).await;
            } else if self.try_login(tenant, &entry.credential_ref, login).await {
                entry.consecutive_failures = 0;
                entry.last_verified = Timestamp::now();
                self.persist_upsert(&entry).await;
                debug!(tenant = %tenant, credential = %entry.credential_ref, "cached credential accepted");
                return Ok(entry.credential_ref);
            } else {
                entry.consecutive_failures += 1;
                if entry.is_invalidated(self.failure_threshold) {
                    info!(
                        tenant = %tenant,
                        credential = %entry.credential_ref,
                        failures = entry.consecutive_failures,
                        "evicting cached credential"
                    );
                    self.persist_remove(tenant).await;
                } else {
                    self.persist_upsert(&entry).await;
                }
                already_tried = Some(entry.credential_ref);
            }
        }

        for candidate in candidates {
            if already_tried.as_ref() == Some(candidate) {
                continue;
            }
            if self.try_login(tenant, candidate, login).await {
                let entry = TenantCredentialCacheEntry::verified(tenant.clone(), candidate.clone());
                self.persist_upsert(&entry).await;
                info!(tenant = %tenant, credential = %candidate, "cached working credential");
                return Ok(candidate.clone());
            }
        }

        warn!(
            tenant = %tenant,
            candidates = candidates.len(),
            "no candidate credential logged in"
        );
        Err(CredentialError::AuthExhausted {
            tenant: tenant.clone(),
        })
    }

    /// Drop the cached credential for a tenant.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub async fn forget(&self, tenant: &TenantId) -> Result<()> {
        let lock = self.tenant_lock(tenant);
        let result = {
            let _guard = lock.lock().await;
            self.store.remove(tenant).await
        };
        drop(lock);
        self.release_tenant_lock(tenant);
        result
    }

    async fn try_login(
        &self,
        tenant: &TenantId,
        credential: &CredentialRef,
        login: &dyn LoginAttempt,
    ) -> bool {
        debug!(tenant = %tenant, credential = %credential, "attempting login");
        if let Ok(accepted) =
            tokio::time::timeout(self.login_timeout, login.attempt(tenant, credential)).await
        {
            accepted
        } else {
            warn!(
                tenant = %tenant,
                credential = %credential,
                timeout_secs = self.login_timeout.as_secs(),
                "login attempt timed out"
            );
            false
        }
    }

    fn tenant_lock(&self, tenant: &TenantId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .tenant_locks
            .lock()
            .expect("acquire tenant lock table");
        Arc::clone(locks.entry(tenant.clone()).or_default())
    }

    /// Drop the tenant's lock once no other call holds or waits on it, so the
    /// table only grows with tenants that are in use.
    fn release_tenant_lock(&self, tenant: &TenantId) {
        let mut locks = self
            .tenant_locks
            .lock()
            .expect("acquire tenant lock table");
        if locks
            .get(tenant)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(tenant);
        }
    }

    #[cfg(test)]
    fn tracked_tenants(&self) -> usize {
        self.tenant_locks
            .lock()
            .expect("acquire tenant lock table")
            .len()
    }

    async fn load_entry(&self, tenant: &TenantId) -> Option<TenantCredentialCacheEntry> {
        match self.store.load(tenant).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "failed to read credential cache");
                None
            }
        }
    }

    async fn persist_upsert(&self, entry: &TenantCredentialCacheEntry) {
        if let Err(e) = self.store.upsert(entry).await {
            warn!(tenant = %entry.tenant_id, error = %e, "failed to persist credential cache entry");
        }
    }

    async fn persist_remove(&self, tenant: &TenantId) {
        if let Err(e) = self.store.remove(tenant).await {
            warn!(tenant = %tenant, error = %e, "failed to evict credential cache entry");
        }
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("failure_threshold", &self.failure_threshold)
            .field("login_timeout", &self.login_timeout)
            .finish_non_exhaustive()
    }
}
