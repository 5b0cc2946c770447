//! Error types for the classification subsystem.

use thiserror::Error;

/// Errors raised while loading classification rules and markers.
///
/// Classification itself never fails: an unmatched page is `Unknown`.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// A rule entry is malformed
    #[error("invalid rule #{index}: {reason}")]
    InvalidRule {
        /// Zero-based position of the rule in its file
        index: usize,
        /// Reason for validation failure
        reason: String,
    },

    /// A marker selector does not parse as CSS
    #[error("invalid selector for marker {name}: {reason}")]
    InvalidSelector {
        /// Marker name
        name: String,
        /// Parser message
        reason: String,
    },

    /// Failed to parse a rules TOML file
    #[error("failed to parse rules TOML in {path}: {source}")]
    ParseError {
        /// Path to the rules file
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// I/O error while reading a rules file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for classifier operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;
