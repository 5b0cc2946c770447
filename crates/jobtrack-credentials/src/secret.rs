//! Secrets behind credential references.

use crate::error::{CredentialError, Result};
use jobtrack_core::CredentialRef;
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

/// A login secret, wiped from memory on drop.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the secret for typing into a login form.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Resolves a [`CredentialRef`] to its secret value.
pub trait SecretSource: Send + Sync {
    /// Look up the secret named by `reference`.
    fn secret(&self, reference: &CredentialRef) -> Result<Secret>;
}

/// Reads secrets from environment variables named by the reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretSource;

impl SecretSource for EnvSecretSource {
    fn secret(&self, reference: &CredentialRef) -> Result<Secret> {
        match std::env::var(reference.as_str()) {
            Ok(value) if !value.is_empty() => Ok(Secret::new(value)),
            _ => Err(CredentialError::MissingSecret {
                reference: reference.clone(),
            }),
        }
    }
}

/// Fixed map of secrets.
#[derive(Default)]
pub struct StaticSecretSource {
    secrets: HashMap<CredentialRef, Secret>,
}

impl StaticSecretSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    #[must_use]
    pub fn with(mut self, reference: CredentialRef, value: impl Into<String>) -> Self {
        self.secrets.insert(reference, Secret::new(value));
        self
    }
}

impl SecretSource for StaticSecretSource {
    fn secret(&self, reference: &CredentialRef) -> Result<Secret> {
        self.secrets
            .get(reference)
            .cloned()
            .ok_or_else(|| CredentialError::MissingSecret {
                reference: reference.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret([REDACTED])");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_env_source_missing_variable() {
        let reference = CredentialRef::new("JOBTRACK_TEST_SURELY_UNSET_7f3a").expect("valid ref");
        let err = EnvSecretSource.secret(&reference).unwrap_err();
        assert!(matches!(err, CredentialError::MissingSecret { .. }));
    }

    #[test]
    fn test_static_source() {
        let reference = CredentialRef::new("p1").expect("valid ref");
        let source = StaticSecretSource::new().with(reference.clone(), "pw");
        assert_eq!(source.secret(&reference).expect("secret").expose(), "pw");

        let other = CredentialRef::new("p2").expect("valid ref");
        assert!(source.secret(&other).is_err());
    }
}
