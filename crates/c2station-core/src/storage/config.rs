//! TOML-based station configuration.
//!
//! Stores:
//! - API endpoint and request timeout
//! - Auth behaviour (single-flight refresh, remembered username)
//! - Presence liveness window
//! - Scheduler tick period and history retention
//!
//! Configuration is stored at `~/.config/c2station/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use super::data_dir;
use crate::error::ConfigError;
use crate::gateway::GatewayConfig;
use crate::presence::LIVENESS_WINDOW_SECS;

/// Longest tick period allowed; the scheduler must look at least once a minute.
pub const MAX_TICK_INTERVAL_SECS: u64 = 60;

/// Upper bound for `presence.liveness_window_secs` (one day).
pub const MAX_LIVENESS_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Upper bound for `schedule.retention_days` (about a century).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub single_flight_refresh: bool,
    /// Remembered operator name; empty when unset.
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_liveness_window")]
    pub liveness_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

/// Station configuration.
///
/// Serialized to/from TOML at `~/.config/c2station/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fallback tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_liveness_window() -> u64 {
    LIVENESS_WINDOW_SECS as u64
}
fn default_tick_interval() -> u64 {
    30
}
fn default_retention_days() -> u32 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            single_flight_refresh: true,
            username: String::new(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            liveness_window_secs: default_liveness_window(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            presence: PresenceConfig::default(),
            schedule: ScheduleConfig::default(),
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
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::UnknownKey(key.to_string());

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => serde_json::Value::Number(
                    value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?
                        .into(),
                ),
                serde_json::Value::Object(_) => return Err(unknown()),
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// `config.toml` inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults when no file exists yet.
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
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
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
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving. The result must
    /// still pass [`Config::validate`]; on error `self` is unchanged.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        url::Url::parse(&self.api.base_url)
            .map_err(|e| invalid("api.base_url", format!("'{}': {e}", self.api.base_url)))?;
        if self.api.request_timeout_secs == 0 {
            return Err(invalid("api.request_timeout_secs", "must be at least 1".into()));
        }
        if !(1..=MAX_LIVENESS_WINDOW_SECS).contains(&self.presence.liveness_window_secs) {
            return Err(invalid(
                "presence.liveness_window_secs",
                format!("must be between 1 and {MAX_LIVENESS_WINDOW_SECS}"),
            ));
        }
        if self.schedule.retention_days > MAX_RETENTION_DAYS {
            return Err(invalid(
                "schedule.retention_days",
                format!("must be at most {MAX_RETENTION_DAYS}"),
            ));
        }
        if !(1..=MAX_TICK_INTERVAL_SECS).contains(&self.schedule.tick_interval_secs) {
            return Err(invalid(
                "schedule.tick_interval_secs",
                format!("must be between 1 and {MAX_TICK_INTERVAL_SECS}"),
            ));
        }
        Ok(())
    }

    pub fn username(&self) -> Option<&str> {
        Some(self.auth.username.trim()).filter(|u| !u.is_empty())
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.api.base_url.clone(),
            request_timeout: StdDuration::from_secs(self.api.request_timeout_secs),
            single_flight_refresh: self.auth.single_flight_refresh,
        }
    }

    /// Clamped to [`MAX_LIVENESS_WINDOW_SECS`] so an unvalidated file can't
    /// push timestamps out of range.
    pub fn liveness_window(&self) -> chrono::Duration {
        let secs = self.presence.liveness_window_secs.min(MAX_LIVENESS_WINDOW_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn tick_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.schedule.tick_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.schedule.retention_days.min(MAX_RETENTION_DAYS)))
    }
}
