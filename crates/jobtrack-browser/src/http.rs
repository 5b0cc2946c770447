use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::pacing::DomainPacer;
use crate::session::{check_status, extract_domain, BrowserSession, PageSnapshot};
use jobtrack_core::{BrowserConfig, CredentialRef, TenantId};
use jobtrack_credentials::Secret;
use std::time::Duration;
use tracing::debug;

/// Plain HTTP session for portals that render server-side.
///
/// Cannot run a tenant login; Workday rows need [`ChromiumSession`](crate::ChromiumSession).
pub struct HttpSession {
    client: reqwest::Client,
    pacer: DomainPacer,
    timeout: Duration,
}

impl HttpSession {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let fingerprint = FingerprintConfig::for_config(config);
        let timeout = Duration::from_secs(config.navigation_timeout_secs);

        let client = reqwest::Client::builder()
            .user_agent(fingerprint.user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            pacer: DomainPacer::new(Duration::from_millis(config.min_domain_delay_ms)),
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl BrowserSession for HttpSession {
    async fn fetch(&self, url: &str, _credential: Option<&CredentialRef>) -> Result<PageSnapshot> {
        let domain = extract_domain(url)?;
        self.pacer.wait(&domain).await;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                BrowserError::Timeout {
                    url: url.to_string(),
                    secs: self.timeout.as_secs(),
                }
            } else {
                BrowserError::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        debug!(url, status, "fetched page over HTTP");
        check_status(url, status)?;

        let html = response.text().await?;
        Ok(PageSnapshot {
            url: url.to_string(),
            final_url,
            http_status: Some(status),
            html,
        })
    }

    async fn login(&self, tenant: &TenantId, _username: &str, _secret: &Secret) -> Result<bool> {
        debug!(tenant = %tenant, "HTTP session cannot perform tenant login");
        Ok(false)
    }
}
