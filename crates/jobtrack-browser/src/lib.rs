//! Page fetching and tenant login for ATS portals.
//!
//! [`BrowserSession`] is the seam the scanner drives. Two sessions ship:
//! [`ChromiumSession`] for JavaScript-rendered portals and tenant logins, and
//! [`HttpSession`] for server-rendered job boards. Both pace requests per
//! domain.

pub mod chromium;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod pacing;
pub mod session;

pub use chromium::ChromiumSession;
pub use error::{BrowserError, Result};
pub use http::HttpSession;
pub use session::{BrowserSession, PageSnapshot};

use jobtrack_core::BrowserConfig;
use std::sync::Arc;

/// Open the session named by `config.engine` (`chromium` or `http`).
pub async fn open_session(config: &BrowserConfig) -> Result<Arc<dyn BrowserSession>> {
    match config.engine.to_ascii_lowercase().as_str() {
        "http" => Ok(Arc::new(HttpSession::new(config)?)),
        "chromium" | "chrome" => Ok(Arc::new(ChromiumSession::launch(config).await?)),
        other => Err(BrowserError::Chromium(format!(
            "unknown browser engine '{other}', expected 'chromium' or 'http'"
        ))),
    }
}
