//! Configuration file support.
//!
//! Loads from an explicit path, else `~/.config/typeahead/config.toml`,
//! else built-in defaults. Every field is optional in the file.

use crate::error::ConfigError;
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for the dispatcher pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Quiet period before a keystroke burst is dispatched
    pub debounce_ms: u64,
    /// Inputs shorter than this (in chars, after trimming) are not searched
    pub min_query_len: usize,
    /// Cache entry lifetime
    pub cache_ttl_secs: u64,
    /// Entry count above which the cache evicts
    pub cache_capacity: usize,
    /// Fraction of entries evicted when over capacity (0.0, 1.0]
    pub eviction_ratio: f64,
    /// Maximum simultaneously executing searches
    pub concurrency_limit: usize,
    /// Retries allowed after the first failed attempt
    pub max_retries: u32,
    /// Base delay for linear retry backoff
    pub retry_delay_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_query_len: 2,
            cache_ttl_secs: 5 * 60,
            cache_capacity: 50,
            eviction_ratio: 0.2,
            concurrency_limit: 3,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl DispatcherConfig {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Rejects settings that would stall or disable the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.concurrency_limit must be at least 1".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.cache_capacity must be at least 1".into(),
            ));
        }
        if !(self.eviction_ratio > 0.0 && self.eviction_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "dispatcher.eviction_ratio must be in (0, 1], got {}",
                self.eviction_ratio
            )));
        }
        if self.min_query_len == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.min_query_len must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Location and shape of the remote search capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Endpoint segment overrides keyed by category
    pub endpoints: HashMap<Category, String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_ms: 10_000,
            endpoints: HashMap::new(),
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Endpoint segment for `category`, honoring overrides.
    #[must_use]
    pub fn segment(&self, category: Category) -> &str {
        self.endpoints
            .get(&category)
            .map_or_else(|| category.segment(), String::as_str)
    }
}

/// Full configuration as read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatcher: DispatcherConfig,
    pub backend: BackendConfig,
}

impl Config {
    /// Default config file location (`~/.config/typeahead/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("typeahead").join("config.toml"))
    }

    /// Loads configuration.
    ///
    /// Precedence (highest to lowest):
    /// 1. `explicit` path (must exist)
    /// 2. `~/.config/typeahead/config.toml` (if present)
    /// 3. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a file cannot be read or parsed, or if the
    /// resulting settings fail validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_from_path(&path)?,
                _ => Self::default(),
            },
        };
        config.dispatcher.validate()?;
        Ok(config)
    }

    /// Reads and parses one TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` or `ConfigError::Parse`.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
