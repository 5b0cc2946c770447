//! Jobtrack Core - Foundation crate for the jobtrack application tracker.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other jobtrack crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`ApplicationId`, `TenantId`,
//!   `CredentialRef`, `AtsPlatform`, `CanonicalStatus`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use jobtrack_core::{AppConfig, AtsPlatform, CanonicalStatus};
//!
//! let config = AppConfig::default();
//! assert!(config.scanning.max_fetch_attempts > 0);
//!
//! assert!(AtsPlatform::Workday.requires_tenant_login());
//! assert!(CanonicalStatus::Closed.precedence() > CanonicalStatus::UnderReview.precedence());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, ClassifierConfig, CredentialsConfig, ScanningConfig, StoreConfig,
};
pub use error::{ConfigError, ConfigResult, JobtrackError, Result};
pub use types::{
    ApplicationId, AtsPlatform, CanonicalStatus, Confidence, CredentialRef, JobApplication,
    StatusFamily, TenantId, Timestamp,
};
