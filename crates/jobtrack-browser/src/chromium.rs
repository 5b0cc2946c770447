use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::pacing::DomainPacer;
use crate::session::{extract_domain, BrowserSession, PageSnapshot};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use jobtrack_classifier::workday_login_url;
use jobtrack_core::{BrowserConfig, CredentialRef, TenantId};
use jobtrack_credentials::Secret;
use std::time::Duration;
use tracing::{debug, info, warn};

const LINKEDIN_LOGIN_URL: &str = "https://www.linkedin.com/login";

/// Browser session backed by a Chromium instance.
///
/// Pages share one browser profile, so a tenant login carries over to the
/// pages fetched after it.
pub struct ChromiumSession {
    browser: Browser,
    fingerprint: FingerprintConfig,
    pacer: DomainPacer,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl ChromiumSession {
    /// Launch Chromium with the configured window and headless mode
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let fingerprint = FingerprintConfig::for_config(config);

        let mut builder = ChromiumConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .arg(format!("--user-agent={}", fingerprint.user_agent))
            .arg("--disable-blink-features=AutomationControlled");
        if !config.headless {
            builder = builder.with_head();
        }
        let chromium_config = builder.build().map_err(BrowserError::Chromium)?;

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        // Spawn browser handler
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!(headless = config.headless, "launched chromium session");

        Ok(Self {
            browser,
            fingerprint,
            pacer: DomainPacer::new(Duration::from_millis(config.min_domain_delay_ms)),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        })
    }

    /// Sign into `LinkedIn` so application badges are visible.
    pub async fn login_linkedin(&self, username: &str, secret: &Secret) -> Result<bool> {
        let page = self.open(LINKEDIN_LOGIN_URL).await?;
        let outcome = async {
            Self::fill(&page, "#username", username).await?;
            Self::fill(&page, "#password", secret.expose()).await?;
            Self::submit(&page, "#password").await?;
            tokio::time::sleep(self.settle_delay).await;

            let current = Self::current_url(&page, LINKEDIN_LOGIN_URL).await;
            Ok::<_, BrowserError>(!current.contains("login") && !current.contains("checkpoint"))
        }
        .await;
        let _ = page.close().await;

        match &outcome {
            Ok(true) => info!("linkedin session established"),
            Ok(false) => warn!("linkedin login was not accepted"),
            Err(e) => warn!(error = %e, "linkedin login failed"),
        }
        outcome
    }

    /// Fingerprint in use
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    async fn open(&self, url: &str) -> Result<Page> {
        let domain = extract_domain(url)?;
        self.pacer.wait(&domain).await;

        let page = tokio::time::timeout(self.navigation_timeout, self.browser.new_page(url))
            .await
            .map_err(|_| self.timeout(url))?
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;

        if tokio::time::timeout(self.navigation_timeout, page.wait_for_navigation())
            .await
            .is_err()
        {
            let _ = page.close().await;
            return Err(self.timeout(url));
        }

        // Portals render client-side after the load event.
        tokio::time::sleep(self.settle_delay).await;
        Ok(page)
    }

    async fn fill(page: &Page, selector: &str, value: &str) -> Result<()> {
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?
            .type_str(value)
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;
        Ok(())
    }

    async fn submit(page: &Page, selector: &str) -> Result<()> {
        page.find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?
            .press_key("Enter")
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;
        Ok(())
    }

    async fn current_url(page: &Page, fallback: &str) -> String {
        page.url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| fallback.to_string())
            .to_lowercase()
    }

    fn timeout(&self, url: &str) -> BrowserError {
        BrowserError::Timeout {
            url: url.to_string(),
            secs: self.navigation_timeout.as_secs(),
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn fetch(&self, url: &str, credential: Option<&CredentialRef>) -> Result<PageSnapshot> {
        debug!(url, credential = credential.map(CredentialRef::as_str), "fetching page");

        let page = self.open(url).await?;
        let content = page
            .content()
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()));
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        let _ = page.close().await;

        Ok(PageSnapshot {
            url: url.to_string(),
            final_url,
            http_status: None,
            html: content?,
        })
    }

    async fn login(&self, tenant: &TenantId, username: &str, secret: &Secret) -> Result<bool> {
        let login_url = workday_login_url(tenant);
        let page = self.open(&login_url).await?;

        let outcome = async {
            Self::fill(&page, "input[type='email'], input[type='text']", username).await?;
            Self::fill(&page, "input[type='password']", secret.expose()).await?;
            Self::submit(&page, "input[type='password']").await?;
            tokio::time::sleep(self.settle_delay).await;

            let current = Self::current_url(&page, &login_url).await;
            Ok::<_, BrowserError>(!current.contains("login"))
        }
        .await;
        let _ = page.close().await;

        debug!(tenant = %tenant, accepted = ?outcome.as_ref().ok(), "workday login attempt finished");
        outcome
    }
}
