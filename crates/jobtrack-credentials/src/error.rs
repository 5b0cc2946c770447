//! Error types for credential resolution.

use jobtrack_core::{CredentialRef, JobtrackError, TenantId};
use thiserror::Error;

/// Errors raised while resolving tenant credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Every candidate credential failed to log in
    #[error("all candidate credentials failed for tenant {tenant}")]
    AuthExhausted {
        /// Tenant that could not be logged into
        tenant: TenantId,
    },

    /// The secret behind a reference could not be read
    #[error("secret for {reference} is not available")]
    MissingSecret {
        /// Reference that did not resolve
        reference: CredentialRef,
    },

    /// Cache persistence failed
    #[error("credential cache store error: {0}")]
    Store(String),

    /// Core error (validation of identifiers)
    #[error(transparent)]
    Core(#[from] JobtrackError),
}

/// Result type for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;
