//! Bridge and binding configuration types

use crate::{BridgeError, BridgeResult, LogLevel};
use serde::{Deserialize, Serialize};

/// Process-wide bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Number of engine worker threads (default: number of CPU cores)
    #[serde(default)]
    pub engine_threads: Option<usize>,

    /// Name prefix for engine worker threads
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Initial log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How long a graceful engine shutdown may wait for queued completions
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,

    /// Upper bound for the blocking credential fetch
    #[serde(default = "default_credentials_timeout")]
    pub credentials_timeout_ms: u64,
}

fn default_thread_name() -> String {
    "hostbridge-engine".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_drain_timeout() -> u64 {
    5000
}

fn default_credentials_timeout() -> u64 {
    10_000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine_threads: None,
            thread_name: default_thread_name(),
            log_level: default_log_level(),
            drain_timeout_ms: default_drain_timeout(),
            credentials_timeout_ms: default_credentials_timeout(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from JSON bytes (empty input yields defaults)
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// Parsed log level
    pub fn level(&self) -> BridgeResult<LogLevel> {
        LogLevel::parse(&self.log_level)
            .ok_or_else(|| BridgeError::ConfigError(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn drain_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn credentials_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.credentials_timeout_ms)
    }
}

/// Options handed to `create` for one binding and forwarded to the engine
///
/// `data` carries engine-specific settings (endpoint, timeouts, fault
/// injection for test engines) as a free-form JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingOptions {
    /// Human-readable label used in log output
    #[serde(default)]
    pub label: String,

    /// Engine-specific settings
    #[serde(default)]
    pub data: serde_json::Value,
}

impl BindingOptions {
    /// Create empty options with a label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Create options from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// Get a typed value from the engine settings
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the engine settings
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        if !self.data.is_object() {
            self.data = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.data.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Builder-style variant of [`BindingOptions::set`]
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Result<Self, serde_json::Error> {
        self.set(key, value)?;
        Ok(self)
    }
}


#[cfg(test)]
#[path = "config/config_parameterized_tests.rs"]
mod config_parameterized_tests;
