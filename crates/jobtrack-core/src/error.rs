//! Core error types for jobtrack.
//!
//! This module defines the central error type shared by the subsystems.
//! Each crate keeps its own error enum and converts into this one at the
//! application boundary.

use thiserror::Error;

/// Central error type for jobtrack operations.
#[derive(Error, Debug)]
pub enum JobtrackError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid identifiers, malformed values)
    #[error("validation error: {0}")]
    Validation(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `JobtrackError`.
pub type Result<T> = std::result::Result<T, JobtrackError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JobtrackError::Validation("empty tenant".to_string());
        assert_eq!(err.to_string(), "validation error: empty tenant");

        let err = ConfigError::InvalidValue {
            field: "scanning.max_fetch_attempts".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for scanning.max_fetch_attempts: must be at least 1"
        );
    }

    #[test]
    fn test_error_from_config() {
        let err: JobtrackError = ConfigError::NoConfigDir.into();
        assert!(matches!(err, JobtrackError::Config(_)));
    }
}
