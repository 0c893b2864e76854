//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Timer phase durations and cycle length
//! - Remote service location and request timeout
//! - Refresh throttle and retry tuning
//!
//! Configuration is stored at `~/.config/pomosync/config.toml`.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::data_dir;
use crate::error::ConfigError;
use crate::sync::{RateLimiterConfig, RetryPolicy, SyncSettings};
use crate::timer::TimerConfig;

/// Remote service and refresh tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_min_refresh_interval_secs")]
    pub min_refresh_interval_secs: u64,
    #[serde(default = "default_max_refresh_interval_secs")]
    pub max_refresh_interval_secs: u64,
    #[serde(default = "default_backoff_factor")]
    pub server_error_backoff_factor: u32,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u8,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomosync/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:8787/api".into()
}
fn default_min_refresh_interval_secs() -> u64 {
    60
}
fn default_max_refresh_interval_secs() -> u64 {
    600
}
fn default_backoff_factor() -> u32 {
    2
}
fn default_retry_max_attempts() -> u8 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}
fn default_request_timeout_secs() -> u64 {
    30
}

const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_BACKOFF_FACTOR: u32 = 10;

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            min_refresh_interval_secs: default_min_refresh_interval_secs(),
            max_refresh_interval_secs: default_max_refresh_interval_secs(),
            server_error_backoff_factor: default_backoff_factor(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|e| invalid("sync.base_url", e.to_string()))?;
        if self.min_refresh_interval_secs == 0 {
            return Err(invalid("sync.min_refresh_interval_secs", "must be at least 1"));
        }
        if self.max_refresh_interval_secs < self.min_refresh_interval_secs {
            return Err(invalid(
                "sync.max_refresh_interval_secs",
                "must not be below sync.min_refresh_interval_secs",
            ));
        }
        if self.max_refresh_interval_secs > MAX_INTERVAL_SECS {
            return Err(invalid(
                "sync.max_refresh_interval_secs",
                format!("must be at most {MAX_INTERVAL_SECS}"),
            ));
        }
        if !(1..=MAX_BACKOFF_FACTOR).contains(&self.server_error_backoff_factor) {
            return Err(invalid(
                "sync.server_error_backoff_factor",
                format!("must be between 1 and {MAX_BACKOFF_FACTOR}"),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("sync.request_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        let secs = |s: u64| Duration::seconds(s.min(MAX_INTERVAL_SECS) as i64);
        SyncSettings {
            limiter: RateLimiterConfig {
                min_interval: secs(self.min_refresh_interval_secs),
                max_interval: secs(self.max_refresh_interval_secs),
                backoff_factor: self.server_error_backoff_factor.min(MAX_BACKOFF_FACTOR) as i32,
            },
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay_ms: self.retry_base_delay_ms,
            },
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(key, e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(key, format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) => {
                        return Err(invalid(key, "is a section, not a value"));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|error| {
            warn!(%error, "falling back to default configuration");
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timer.validate()?;
        self.sync.validate()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory. The result must still validate.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(key, e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and persist. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Every leaf key with its current value, in file order.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn sync_settings(&self) -> SyncSettings {
        self.sync.sync_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let parsed: Config = toml::from_str("[timer]\nwork_minutes = 50\n").unwrap();
        assert_eq!(parsed.timer.work_minutes, 50);
        assert_eq!(parsed.timer.short_break_minutes, 5);
        assert_eq!(parsed.sync, SyncConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.auto_advance").as_deref(), Some("true"));
        assert_eq!(cfg.get("timer.work_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("sync.base_url").as_deref(), Some("http://localhost:8787/api"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_json_value_by_path_updates_nested_bool() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        Config::set_json_value_by_path(&mut json, "timer.auto_advance", "false").unwrap();
        assert_eq!(
            Config::get_json_value_by_path(&json, "timer.auto_advance").unwrap(),
            &serde_json::Value::Bool(false)
        );
    }

    #[test]
    fn set_json_value_by_path_updates_nested_number() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        Config::set_json_value_by_path(&mut json, "sync.min_refresh_interval_secs", "90").unwrap();
        assert_eq!(
            Config::get_json_value_by_path(&json, "sync.min_refresh_interval_secs").unwrap(),
            &serde_json::Value::Number(90.into())
        );
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "timer.nonexistent_key", "value");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_json_value_by_path_rejects_invalid_type() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "timer.auto_advance", "not_a_bool");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn apply_rejects_values_that_fail_validation() {
        let mut cfg = Config::default();
        let err = cfg.apply("sync.max_refresh_interval_secs", "10").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "sync.max_refresh_interval_secs"));
        assert_eq!(cfg, Config::default());

        cfg.apply("timer.work_minutes", "50").unwrap();
        assert_eq!(cfg.timer.work_minutes, 50);
    }

    #[test]
    fn sync_settings_follow_config() {
        let mut cfg = Config::default();
        cfg.sync.min_refresh_interval_secs = 30;
        cfg.sync.retry_max_attempts = 3;
        let settings = cfg.sync_settings();
        assert_eq!(settings.limiter.min_interval, Duration::seconds(30));
        assert_eq!(settings.limiter.max_interval, Duration::seconds(600));
        assert_eq!(settings.limiter.backoff_factor, 2);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.base_delay_ms, 1000);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timer = [not toml").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::LoadFailed { .. })));
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.apply("sync.base_url", "https://api.example.test/v1").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn entries_list_every_leaf() {
        let entries = Config::default().entries();
        assert!(entries.iter().any(|(k, v)| k == "timer.work_minutes" && v == "25"));
        assert!(entries.iter().any(|(k, _)| k == "sync.request_timeout_secs"));
        assert_eq!(entries.len(), 12);
    }
}
