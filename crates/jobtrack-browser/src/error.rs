use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    Chromium(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout after {secs}s: {url}")]
    Timeout { url: String, secs: u64 },

    #[error("blocked by anti-bot page at {url}: {reason}")]
    Blocked { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl BrowserError {
    /// Whether another attempt may succeed.
    ///
    /// Timeouts, anti-bot blocks, `429` and `5xx` responses are transient;
    /// everything else fails the fetch immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Blocked { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Chromium(_) | Self::Navigation(_) | Self::SelectorNotFound(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrowserError::Navigation("page not found".to_string());
        assert_eq!(err.to_string(), "navigation failed: page not found");
    }

    #[test]
    fn test_retryable_classification() {
        let status = |status| BrowserError::HttpStatus {
            url: "https://example.com".into(),
            status,
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(BrowserError::Timeout {
            url: "https://example.com".into(),
            secs: 45
        }
        .is_retryable());
        assert!(!BrowserError::SelectorNotFound("input".into()).is_retryable());
    }
}
