use jobtrack_browser::{open_session, BrowserSession, ChromiumSession, HttpSession};
use jobtrack_core::{BrowserConfig, TenantId};
use jobtrack_credentials::Secret;

fn headless() -> BrowserConfig {
    BrowserConfig {
        headless: true,
        settle_delay_ms: 500,
        ..BrowserConfig::default()
    }
}

#[tokio::test]
async fn test_unknown_engine_is_rejected() {
    let config = BrowserConfig {
        engine: "netscape".into(),
        ..BrowserConfig::default()
    };
    assert!(open_session(&config).await.is_err());
}

#[tokio::test]
async fn test_http_session_cannot_log_in() {
    let session = HttpSession::new(&BrowserConfig::default()).expect("build client");
    let tenant = TenantId::new("acme").expect("valid tenant");
    let accepted = session
        .login(&tenant, "me@example.com", &Secret::new("pw"))
        .await
        .expect("login");
    assert!(!accepted);
}

#[tokio::test]
async fn test_http_session_rejects_bad_url() {
    let session = HttpSession::new(&BrowserConfig::default()).expect("build client");
    assert!(session.fetch("not a url", None).await.is_err());
}

#[tokio::test]
#[ignore = "Requires Chrome browser to be installed"]
async fn test_chromium_fetch() {
    let session = ChromiumSession::launch(&headless()).await.expect("launch");
    let page = session
        .fetch("https://example.com", None)
        .await
        .expect("fetch");
    assert!(page.html.contains("Example Domain"));
}

#[tokio::test]
#[ignore = "Requires network access"]
async fn test_http_fetch_not_found_is_a_page() {
    let session = HttpSession::new(&headless()).expect("build client");
    let page = session
        .fetch("https://example.com/definitely-missing-page", None)
        .await
        .expect("fetch");
    assert_eq!(page.http_status, Some(404));
}
