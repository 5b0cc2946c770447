//! Jobtrack Credentials - tenant login resolution.
//!
//! Workday-style portals host one login per employer tenant, and the user's
//! password differs between tenants. This crate keeps a persistent
//! tenant → credential cache and resolves a working credential from a
//! candidate pool when the cache misses or goes stale.
//!
//! Credential references ([`CredentialRef`](jobtrack_core::CredentialRef))
//! are safe to log and persist; the secrets behind them are only ever held
//! as [`Secret`] values.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod error;
pub mod resolver;
pub mod secret;

// Re-export commonly used types
pub use cache::{CredentialCacheStore, MemoryCacheStore, TenantCredentialCacheEntry};
pub use error::{CredentialError, Result};
pub use resolver::{CredentialResolver, LoginAttempt};
pub use secret::{EnvSecretSource, Secret, SecretSource, StaticSecretSource};

use jobtrack_core::{CredentialRef, CredentialsConfig};

/// Candidate credential references configured for Workday tenants.
///
/// # Errors
/// Returns error if a configured reference is not a valid name.
pub fn workday_candidates(config: &CredentialsConfig) -> Result<Vec<CredentialRef>> {
    config
        .workday_candidates
        .iter()
        .map(|name| CredentialRef::new(name.as_str()).map_err(CredentialError::from))
        .collect()
}
