//! Lookup configuration
//!
//! Defaults match the deployed service. Values can come from the environment
//! (`SIG_*` variables), a JSON file, or be built in code; all three paths go
//! through [`LookupConfig::validate`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Object-store bucket holding `{dataset}/info.json` and `{dataset}/blocks/*`
pub const ENV_BUCKET: &str = "SIG_BUCKET";
pub const ENV_DATASET_SUFFIX: &str = "SIG_DATASET_SUFFIX";
pub const ENV_MAX_DISTANCE: &str = "SIG_MAX_DISTANCE";
pub const ENV_MAX_HAMMING: &str = "SIG_MAX_HAMMING";
pub const ENV_LIMIT: &str = "SIG_LIMIT";
pub const ENV_STORE_BASE_URL: &str = "SIG_STORE_BASE_URL";
pub const ENV_STORE_TIMEOUT_SECS: &str = "SIG_STORE_TIMEOUT_SECS";

/// Radius (coordinate units) for resolving a point to a stored sample
pub const DEFAULT_MAX_DISTANCE: f64 = 100.0;
/// Exclusive Hamming bound for similarity matches
pub const DEFAULT_MAX_HAMMING: u32 = 8;
/// Maximum number of similarity matches returned
pub const DEFAULT_LIMIT: usize = 200;
/// Appended to the dataset name to form the partition-table namespace
pub const DEFAULT_DATASET_SUFFIX: &str = "_imgsearch";
pub const DEFAULT_STORE_BASE_URL: &str = "https://storage.googleapis.com";
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STORE_BASE_URL.to_string(),
            timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub bucket: String,
    pub dataset_suffix: String,
    pub max_distance: f64,
    pub max_hamming: u32,
    pub limit: usize,
    pub store: StoreConfig,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            dataset_suffix: DEFAULT_DATASET_SUFFIX.to_string(),
            max_distance: DEFAULT_MAX_DISTANCE,
            max_hamming: DEFAULT_MAX_HAMMING,
            limit: DEFAULT_LIMIT,
            store: StoreConfig::default(),
        }
    }
}

/// Per-call overrides. `None` falls back to the service configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LookupOptions {
    pub max_distance: Option<f64>,
    pub max_hamming: Option<u32>,
    pub limit: Option<usize>,
}

/// Effective parameters for one call, after applying overrides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOptions {
    pub max_distance: f64,
    pub max_hamming: u32,
    pub limit: usize,
}

impl LookupConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.bucket = lookup(ENV_BUCKET)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_BUCKET))?;

        if let Some(v) = lookup(ENV_DATASET_SUFFIX) {
            config.dataset_suffix = v;
        }
        if let Some(v) = lookup(ENV_MAX_DISTANCE) {
            config.max_distance = parse_field(ENV_MAX_DISTANCE, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_HAMMING) {
            config.max_hamming = parse_field(ENV_MAX_HAMMING, &v)?;
        }
        if let Some(v) = lookup(ENV_LIMIT) {
            config.limit = parse_field(ENV_LIMIT, &v)?;
        }
        if let Some(v) = lookup(ENV_STORE_BASE_URL) {
            config.store.base_url = v;
        }
        if let Some(v) = lookup(ENV_STORE_TIMEOUT_SECS) {
            config.store.timeout_secs = parse_field(ENV_STORE_TIMEOUT_SECS, &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("bucket"));
        }
        check_max_distance(self.max_distance)?;
        check_max_hamming(self.max_hamming)?;
        check_limit(self.limit)?;
        if self.store.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "store.timeout_secs",
                reason: "must be positive".into(),
            });
        }
        if self.store.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "store.retry.max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Apply per-call overrides and validate the result.
    pub fn resolve(&self, options: &LookupOptions) -> Result<ResolvedOptions, ConfigError> {
        let resolved = ResolvedOptions {
            max_distance: options.max_distance.unwrap_or(self.max_distance),
            max_hamming: options.max_hamming.unwrap_or(self.max_hamming),
            limit: options.limit.unwrap_or(self.limit),
        };
        check_max_distance(resolved.max_distance)?;
        check_max_hamming(resolved.max_hamming)?;
        check_limit(resolved.limit)?;
        Ok(resolved)
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        reason: format!("'{value}': {e}"),
    })
}

fn check_max_distance(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid {
            field: "max_distance",
            reason: format!("must be a finite non-negative number, got {value}"),
        });
    }
    Ok(())
}

// score divides by max_hamming
fn check_max_hamming(value: u32) -> Result<(), ConfigError> {
    if value == 0 || value > 65 {
        return Err(ConfigError::Invalid {
            field: "max_hamming",
            reason: format!("must be in 1..=65, got {value}"),
        });
    }
    Ok(())
}

fn check_limit(value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field: "limit",
            reason: "must be positive".into(),
        });
    }
    Ok(())
}
