use crate::error::{BrowserError, Result};
use jobtrack_core::{CredentialRef, TenantId};
use jobtrack_credentials::Secret;
use serde::{Deserialize, Serialize};

/// A fetched page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// URL that was requested
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    /// Response status, when the session can observe it
    pub http_status: Option<u16>,
    /// Page HTML
    pub html: String,
}

/// Page fetching and tenant login
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load a page. `credential` names the login the session is expected to
    /// be signed in with, if any.
    async fn fetch(&self, url: &str, credential: Option<&CredentialRef>) -> Result<PageSnapshot>;

    /// Log into a Workday tenant. `Ok(false)` means the tenant rejected the
    /// credential.
    async fn login(&self, tenant: &TenantId, username: &str, secret: &Secret) -> Result<bool>;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::Navigation(format!("Invalid URL: {e}")))?;

    url.host_str()
        .ok_or_else(|| BrowserError::Navigation("No host in URL".to_string()))
        .map(str::to_ascii_lowercase)
}

/// Turn a response status into an error when the page is unusable.
///
/// Success, redirects and the "gone" statuses `404`/`410` yield a page for the
/// classifier. `403` is treated as an anti-bot block.
pub fn check_status(url: &str, status: u16) -> Result<()> {
    match status {
        200..=399 | 404 | 410 => Ok(()),
        403 => Err(BrowserError::Blocked {
            url: url.to_string(),
            reason: "HTTP 403".to_string(),
        }),
        _ => Err(BrowserError::HttpStatus {
            url: url.to_string(),
            status,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://Acme.wd5.myworkdayjobs.com/path").unwrap(),
            "acme.wd5.myworkdayjobs.com"
        );
        assert_eq!(
            extract_domain("http://jobs.lever.co:8080/acme").unwrap(),
            "jobs.lever.co"
        );
    }

    #[test]
    fn test_extract_domain_invalid() {
        assert!(extract_domain("not-a-url").is_err());
    }

    #[test]
    fn test_check_status() {
        assert!(check_status("u", 200).is_ok());
        assert!(check_status("u", 404).is_ok());
        assert!(check_status("u", 410).is_ok());
        assert!(matches!(check_status("u", 403), Err(BrowserError::Blocked { .. })));
        let err = check_status("u", 502).unwrap_err();
        assert!(err.is_retryable());
        let err = check_status("u", 401).unwrap_err();
        assert!(!err.is_retryable());
    }
}
