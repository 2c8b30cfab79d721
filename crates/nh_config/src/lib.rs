//! `nh_config` - Configuration parsing and validation for netharvest
//!
//! This crate provides:
//! - TOML configuration parsing
//! - Default value handling
//! - Environment variable overrides (credentials usually come from here)
//! - Path expansion (`~/` to home directory)
//! - Auto-discovery from standard config paths

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NhConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// Batch dispatcher and snapshot writer tuning
    pub harvest: HarvestConfig,

    /// Reachability probe settings
    pub probe: ProbeConfig,

    /// Device SSH access
    pub ssh: SshConfig,

    /// AKiPS telemetry source
    pub akips: AkipsConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Path to `DuckDB` database file
    pub db_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: "info".to_string(),
        }
    }
}

/// Default database path using XDG directories
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nh")
        .join("nh.duckdb")
}

/// Expand tilde in path to home directory
#[must_use]
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    path.to_path_buf()
}

/// Harvest pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Devices per batch
    pub batch_size: usize,

    /// Concurrent device sequences (slot pool size)
    pub max_concurrent: usize,

    /// Pause between batches in seconds
    pub batch_cooldown_secs: u64,

    /// Pause between refresh joins after a full run
    pub refresh_step_delay_secs: u64,

    /// Pause between refresh joins after a single-device run
    pub single_device_refresh_delay_secs: u64,

    /// Rows per INSERT statement inside a snapshot transaction
    pub insert_chunk_size: usize,

    /// Age after which a held run lock is considered abandoned
    pub run_lock_stale_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrent: 50,
            batch_cooldown_secs: 3,
            refresh_step_delay_secs: 3,
            single_device_refresh_delay_secs: 1,
            insert_chunk_size: 1000,
            run_lock_stale_secs: 6 * 60 * 60,
        }
    }
}

/// TCP reachability probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 22,
            timeout_ms: 1000,
        }
    }
}

/// SSH access used for every switch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Login user
    pub user: Option<String>,

    /// Private key path
    pub key_path: Option<PathBuf>,

    /// SSH port
    pub port: u16,

    /// Per-command timeout in seconds
    pub command_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            key_path: None,
            port: 22,
            command_timeout_secs: 60,
        }
    }
}

/// AKiPS API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AkipsConfig {
    /// Disable to skip switch-list reconciliation and usage telemetry
    pub enabled: bool,

    /// Base URL, e.g. `https://akips.example.edu`
    pub base_url: Option<String>,

    /// API password (prefer `NH_AKIPS_PASSWORD`)
    pub password: Option<String>,

    /// Restrict the switch list to an AKiPS group
    pub group: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AkipsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            password: None,
            group: None,
            timeout_secs: 30,
        }
    }
}

impl NhConfig {
    /// Standard config file paths, in order of precedence
    #[must_use]
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("nh.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("nh").join("nh.toml"));
        }

        paths.push(PathBuf::from("/etc/nh/nh.toml"));

        paths
    }

    /// Discover and load configuration from standard paths.
    ///
    /// Returns defaults if no config file is found.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if a discovered config file cannot be loaded.
    pub fn discover() -> Result<Self, ConfigError> {
        for path in Self::config_paths() {
            if path.exists() {
                info!(path = %path.display(), "Loading config from");
                return Self::load(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Discover config and apply environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if config discovery fails.
    pub fn discover_with_env() -> Result<Self, ConfigError> {
        let mut config = Self::discover()?;
        config.apply_env_overrides();
        config.expand_all_paths();
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: NhConfig = toml::from_str(&content)?;
        config.expand_all_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.expand_all_paths();
        Ok(config)
    }

    /// Expand all paths in configuration (resolve `~/` to home directory)
    pub fn expand_all_paths(&mut self) {
        self.global.db_path = expand_path(&self.global.db_path);
        if let Some(key) = &self.ssh.key_path {
            self.ssh.key_path = Some(expand_path(key));
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NH_DB_PATH") {
            self.global.db_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("NH_LOG_LEVEL") {
            self.global.log_level = val;
        }
        if let Ok(val) = std::env::var("NH_SSH_USER") {
            self.ssh.user = Some(val);
        }
        if let Ok(val) = std::env::var("NH_SSH_KEY") {
            self.ssh.key_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("NH_AKIPS_URL") {
            self.akips.base_url = Some(val);
        }
        if let Ok(val) = std::env::var("NH_AKIPS_PASSWORD") {
            self.akips.password = Some(val);
        }
    }

    /// Validate structural settings.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when validation rules are violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.harvest.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "harvest.batch_size must be > 0".to_string(),
            ));
        }

        if self.harvest.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "harvest.max_concurrent must be > 0".to_string(),
            ));
        }

        if self.harvest.insert_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "harvest.insert_chunk_size must be > 0".to_string(),
            ));
        }

        if self.probe.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "probe.timeout_ms must be > 0".to_string(),
            ));
        }

        if self.ssh.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ssh.command_timeout_secs must be > 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.global.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.global.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Validate everything a harvest run needs, including credentials.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when a structural rule fails or credentials are missing.
    pub fn validate_for_harvest(&self) -> Result<(), ConfigError> {
        self.validate()?;

        if self.ssh.user.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingField(
                "ssh.user (or NH_SSH_USER)".to_string(),
            ));
        }

        if self.akips.enabled {
            if self.akips.base_url.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingField(
                    "akips.base_url (or NH_AKIPS_URL)".to_string(),
                ));
            }
            if self.akips.password.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingField(
                    "akips.password (or NH_AKIPS_PASSWORD)".to_string(),
                ));
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn batch_cooldown(&self) -> Duration {
        Duration::from_secs(self.harvest.batch_cooldown_secs)
    }

    #[must_use]
    pub fn refresh_step_delay(&self) -> Duration {
        Duration::from_secs(self.harvest.refresh_step_delay_secs)
    }

    #[must_use]
    pub fn single_device_refresh_delay(&self) -> Duration {
        Duration::from_secs(self.harvest.single_device_refresh_delay_secs)
    }

    #[must_use]
    pub fn run_lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.harvest.run_lock_stale_secs)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_ms)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.command_timeout_secs)
    }

    #[must_use]
    pub fn akips_timeout(&self) -> Duration {
        Duration::from_secs(self.akips.timeout_secs)
    }
}
