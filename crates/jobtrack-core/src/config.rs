//! Configuration management for jobtrack.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/jobtrack/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where application records and the credential cache live
    pub store: StoreConfig,
    /// Scan pass behaviour
    pub scanning: ScanningConfig,
    /// Tenant login settings
    pub credentials: CredentialsConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Status classification settings
    pub classifier: ClassifierConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, using defaults if it is absent.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `JOBTRACK_DATABASE`: Override the database path
    /// - `JOBTRACK_HEADLESS` (or legacy `HEADLESS`): Override browser headless mode
    /// - `JOBTRACK_FAILURE_THRESHOLD`: Override the credential eviction threshold
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("JOBTRACK_DATABASE") {
            if !val.trim().is_empty() {
                tracing::debug!("Override store.database_path from env: {}", val);
                self.store.database_path = Some(PathBuf::from(val));
            }
        }

        let headless = std::env::var("JOBTRACK_HEADLESS").or_else(|_| std::env::var("HEADLESS"));
        if let Ok(val) = headless {
            if let Ok(headless) = val.to_lowercase().parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("JOBTRACK_FAILURE_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.credentials.failure_threshold = threshold;
                tracing::debug!("Override credentials.failure_threshold from env: {}", threshold);
            }
        }
    }

    /// Reject values the scanner cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scanning.max_fetch_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.max_fetch_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scanning.max_write_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.max_write_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scanning.max_concurrent_tenants == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.max_concurrent_tenants".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scanning.fetch_timeout_secs == 0 || self.credentials.login_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeouts".to_string(),
                reason: "network timeouts must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/jobtrack/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/jobtrack`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Database file to use: the configured path, or `jobtrack.db` in the data dir.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.store.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("jobtrack.db")),
        }
    }

    /// Write journal file to use: the configured path, or `pending-writes.json`
    /// in the data dir.
    pub fn journal_path(&self) -> ConfigResult<PathBuf> {
        match &self.store.journal_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("pending-writes.json")),
        }
    }

    fn project_dirs() -> ConfigResult<ProjectDirs> {
        ProjectDirs::from("com", "jobtrack", "jobtrack").ok_or(ConfigError::NoConfigDir)
    }
}

/// Storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `SQLite` database holding applications, the credential cache and run history
    pub database_path: Option<PathBuf>,
    /// JSON journal of status writes awaiting reconciliation
    pub journal_path: Option<PathBuf>,
}

/// Scan pass behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Fetch attempts per application before giving up for this run
    pub max_fetch_attempts: u32,
    /// Base retry delay in milliseconds (multiplied by the attempt number)
    pub retry_delay_ms: u64,
    /// Extra backoff multiplier applied after an anti-bot block
    pub blocked_backoff_multiplier: u64,
    /// Page fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Sheet write attempts before journaling the result
    pub max_write_attempts: u32,
    /// Lanes (distinct tenants/hosts) scanned in parallel; 1 means sequential
    pub max_concurrent_tenants: usize,
    /// Minimum pause between two applications, in milliseconds
    pub delay_between_applications_ms: u64,
    /// Random extra pause added on top of the minimum, in milliseconds
    pub delay_jitter_ms: u64,
    /// Wall-clock budget for one pass in seconds (unset means unbounded)
    pub run_budget_secs: Option<u64>,
    /// Skip applications that already have a terminal status
    pub skip_terminal: bool,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            max_fetch_attempts: 3,
            retry_delay_ms: 2000,
            blocked_backoff_multiplier: 3,
            fetch_timeout_secs: 45,
            max_write_attempts: 3,
            max_concurrent_tenants: 1,
            delay_between_applications_ms: 3000,
            delay_jitter_ms: 3000,
            run_budget_secs: None,
            skip_terminal: true,
        }
    }
}

/// Tenant login settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variable holding the Workday login email
    pub workday_username_env: String,
    /// Ordered candidate credential references tried for unknown tenants
    pub workday_candidates: Vec<String>,
    /// Consecutive failures of a cached credential tolerated before eviction
    pub failure_threshold: u32,
    /// Login attempt timeout in seconds
    pub login_timeout_secs: u64,
    /// Environment variable holding the `LinkedIn` login email (empty disables)
    pub linkedin_username_env: String,
    /// Credential reference for the `LinkedIn` password
    pub linkedin_password_ref: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            workday_username_env: "WORKDAY_EMAIL".to_string(),
            workday_candidates: vec![
                "WORKDAY_PASSWORD_1".to_string(),
                "WORKDAY_PASSWORD_2".to_string(),
            ],
            failure_threshold: 3,
            login_timeout_secs: 45,
            linkedin_username_env: "LINKEDIN_EMAIL".to_string(),
            linkedin_password_ref: "LINKEDIN_PASSWORD".to_string(),
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Which session implementation to use: `chromium` or `http`
    pub engine: String,
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Time to let client-side rendering settle after navigation, in milliseconds
    pub settle_delay_ms: u64,
    /// Minimum delay between two requests to the same domain, in milliseconds
    pub min_domain_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: "chromium".to_string(),
            headless: false,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 45,
            settle_delay_ms: 5000,
            min_domain_delay_ms: 1000,
        }
    }
}

/// Status classification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Optional TOML file with extra classification rules
    pub rules_path: Option<PathBuf>,
}
