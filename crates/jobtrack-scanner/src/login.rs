//! Logging into employer tenants through the browser session.

use async_trait::async_trait;
use jobtrack_browser::BrowserSession;
use jobtrack_core::{CredentialRef, TenantId};
use jobtrack_credentials::{LoginAttempt, SecretSource};
use tracing::warn;

/// Logs into a tenant through the browser session.
///
/// A reference whose secret is missing, or a session error, counts as a
/// rejected attempt so the resolver moves on to the next candidate.
pub struct SessionLogin<'a> {
    session: &'a dyn BrowserSession,
    secrets: &'a dyn SecretSource,
    username: &'a str,
}

impl<'a> SessionLogin<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        secrets: &'a dyn SecretSource,
        username: &'a str,
    ) -> Self {
        Self {
            session,
            secrets,
            username,
        }
    }
}

#[async_trait]
impl LoginAttempt for SessionLogin<'_> {
    async fn attempt(&self, tenant: &TenantId, credential: &CredentialRef) -> bool {
        let secret = match self.secrets.secret(credential) {
            Ok(secret) => secret,
            Err(e) => {
                warn!(tenant = %tenant, credential = %credential, error = %e, "skipping credential");
                return false;
            }
        };

        match self.session.login(tenant, self.username, &secret).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(tenant = %tenant, credential = %credential, error = %e, "login attempt errored");
                false
            }
        }
    }
}
