//! Scanner configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default scan interval in milliseconds.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 5_000;

/// Errors loading or validating a scanner configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration is well-formed but unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration of one deployment scanner instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    /// Directory watched for deployment content.
    pub root: PathBuf,

    /// Milliseconds between scan cycles. Zero means a single scan per
    /// (re)configuration instead of a periodic one.
    #[serde(default = "default_interval")]
    pub scan_interval_ms: u64,

    /// Whether scanning starts enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_MS
}

fn default_enabled() -> bool {
    true
}

impl ScannerConfig {
    /// Configuration with defaults for everything but the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            enabled: true,
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&text)
    }

    /// Schema-level validation (the service separately validates the
    /// root directory against the live filesystem).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("root must not be empty".into()));
        }
        Ok(())
    }
}
