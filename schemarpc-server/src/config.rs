//! Pipeline configuration
//!
//! [`PipelineConfig`] deserializes from any serde format with every field
//! optional, and can be overlaid with `SCHEMARPC_*` environment variables.
//!
//! ```rust
//! use schemarpc_server::PipelineConfig;
//!
//! let config: PipelineConfig = serde_json::from_str(
//!     r#"{"schema_root": "/etc/rpc/schemas", "batch": {"mode": "sequential"}}"#,
//! ).unwrap();
//! assert!(config.cache.enabled);
//! ```

use crate::batch::BatchMode;
use crate::schema_cache::SchemaCacheConfig;
use schemarpc_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_SCHEMA_ROOT: &str = "SCHEMARPC_SCHEMA_ROOT";
pub const ENV_CACHE_ENABLED: &str = "SCHEMARPC_CACHE_ENABLED";
pub const ENV_CACHE_PROJECT: &str = "SCHEMARPC_CACHE_PROJECT";
pub const ENV_CACHE_TTL_SECS: &str = "SCHEMARPC_CACHE_TTL_SECS";
pub const ENV_BATCH_MODE: &str = "SCHEMARPC_BATCH_MODE";
pub const ENV_MAX_BATCH_SIZE: &str = "SCHEMARPC_MAX_BATCH_SIZE";
pub const ENV_HANDLER_TIMEOUT_MS: &str = "SCHEMARPC_HANDLER_TIMEOUT_MS";

/// Batch execution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub mode: BatchMode,
    /// Largest accepted batch; unlimited when unset
    pub max_size: Option<usize>,
}

/// Everything the pipeline reads at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one `{method}.json` schema per method
    pub schema_root: PathBuf,
    pub cache: SchemaCacheConfig,
    pub batch: BatchConfig,
    pub handler_timeout_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_root: PathBuf::from("./schemas"),
            cache: SchemaCacheConfig::default(),
            batch: BatchConfig::default(),
            handler_timeout_ms: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with the process environment
    ///
    /// # Errors
    ///
    /// `Error::InvalidRequest` naming the variable whose value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Overlay values returned by `lookup` for the `SCHEMARPC_*` names
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_SCHEMA_ROOT) {
            self.schema_root = PathBuf::from(root);
        }
        if let Some(value) = lookup(ENV_CACHE_ENABLED) {
            self.cache.enabled = parse_bool(ENV_CACHE_ENABLED, &value)?;
        }
        if let Some(project) = lookup(ENV_CACHE_PROJECT) {
            self.cache.project = project;
        }
        if let Some(value) = lookup(ENV_CACHE_TTL_SECS) {
            let secs: u64 = parse_var(ENV_CACHE_TTL_SECS, &value)?;
            self.cache.ttl_ms = secs.saturating_mul(1000);
        }
        if let Some(value) = lookup(ENV_BATCH_MODE) {
            self.batch.mode = parse_mode(&value)?;
        }
        if let Some(value) = lookup(ENV_MAX_BATCH_SIZE) {
            self.batch.max_size = Some(parse_var(ENV_MAX_BATCH_SIZE, &value)?);
        }
        if let Some(value) = lookup(ENV_HANDLER_TIMEOUT_MS) {
            self.handler_timeout_ms = Some(parse_var(ENV_HANDLER_TIMEOUT_MS, &value)?);
        }
        Ok(self)
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::InvalidRequest(format!("{}={:?}: {}", name, value, e)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidRequest(format!(
            "{}={:?}: expected a boolean",
            name, value
        ))),
    }
}

fn parse_mode(value: &str) -> Result<BatchMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "parallel" => Ok(BatchMode::Parallel),
        "sequential" => Ok(BatchMode::Sequential),
        _ => Err(Error::InvalidRequest(format!(
            "{}={:?}: expected parallel or sequential",
            ENV_BATCH_MODE, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_cache::DEFAULT_CACHE_TTL_SECS;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.schema_root, PathBuf::from("./schemas"));
        assert!(config.cache.enabled);
        assert_eq!(config.cache.project, "schemarpc");
        assert_eq!(config.cache.ttl(), Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
        assert_eq!(config.batch.mode, BatchMode::Parallel);
        assert_eq!(config.batch.max_size, None);
        assert_eq!(config.handler_timeout(), None);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"cache": {"ttl_ms": 750}, "batch": {"max_size": 10}, "handler_timeout_ms": 250}"#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl(), Duration::from_millis(750));
        assert_eq!(config.cache.project, "schemarpc");
        assert_eq!(config.batch.max_size, Some(10));
        assert_eq!(config.handler_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_env_overlay() {
        let config = PipelineConfig::default()
            .apply_env(env(&[
                (ENV_SCHEMA_ROOT, "/srv/schemas"),
                (ENV_CACHE_ENABLED, "false"),
                (ENV_CACHE_PROJECT, "billing"),
                (ENV_CACHE_TTL_SECS, "30"),
                (ENV_BATCH_MODE, "Sequential"),
                (ENV_MAX_BATCH_SIZE, "50"),
                (ENV_HANDLER_TIMEOUT_MS, "1500"),
            ]))
            .unwrap();

        assert_eq!(config.schema_root, PathBuf::from("/srv/schemas"));
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.project, "billing");
        assert_eq!(config.cache.ttl_ms, 30_000);
        assert_eq!(config.batch.mode, BatchMode::Sequential);
        assert_eq!(config.batch.max_size, Some(50));
        assert_eq!(config.handler_timeout_ms, Some(1500));
    }

    #[test]
    fn test_env_error_names_variable() {
        let err = PipelineConfig::default()
            .apply_env(env(&[(ENV_MAX_BATCH_SIZE, "lots")]))
            .unwrap_err();
        assert!(matches!(&err, Error::InvalidRequest(msg) if msg.contains(ENV_MAX_BATCH_SIZE)));

        let err = PipelineConfig::default()
            .apply_env(env(&[(ENV_CACHE_ENABLED, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_CACHE_ENABLED));
    }

    #[test]
    fn test_empty_env_keeps_defaults() {
        let config = PipelineConfig::default().apply_env(|_| None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
