use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use larder_types::QueryOptions;

/// Errors loading a [`CacheConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the write-through cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Number of bootstrap locks shared by all record types.
    pub lock_stripes: usize,
    /// Bootstraps slower than this are logged at warn level. `0` disables.
    pub slow_bootstrap_ms: u64,
    /// Options passed to the backing store's full read during bootstrap.
    pub bootstrap_options: QueryOptions,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_stripes: 64,
            slow_bootstrap_ms: 5_000,
            bootstrap_options: QueryOptions::none(),
        }
    }
}

impl CacheConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_stripes == 0 {
            return Err(ConfigError::Invalid("lock_stripes must be at least 1".into()));
        }
        Ok(())
    }

    pub fn slow_bootstrap_threshold(&self) -> Option<Duration> {
        (self.slow_bootstrap_ms > 0).then(|| Duration::from_millis(self.slow_bootstrap_ms))
    }
}
