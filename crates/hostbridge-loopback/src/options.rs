//! Fault injection settings read from binding options

use hostbridge_core::BindingOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response body chunk size when none is configured
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// How a loopback binding behaves
///
/// Read from the `data` object of [`BindingOptions`]; missing keys take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackOptions {
    /// Refuse `connect` / `new_client` synchronously
    pub reject_connect: bool,
    /// Delay before setup (or client connection) is reported
    pub setup_delay_ms: u64,
    /// Non-zero fails setup with this code
    pub setup_error_code: i32,
    /// Delay before an operation completes
    pub operation_delay_ms: u64,
    /// Refuse sends, publishes, subscribes and stream opens synchronously
    pub reject_operations: bool,
    /// Size of the body chunks a stream response is split into
    pub chunk_size: usize,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            reject_connect: false,
            setup_delay_ms: 0,
            setup_error_code: 0,
            operation_delay_ms: 0,
            reject_operations: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl LoopbackOptions {
    pub fn from_options(options: &BindingOptions) -> Self {
        let defaults = Self::default();
        Self {
            reject_connect: options.get("reject_connect").unwrap_or(defaults.reject_connect),
            setup_delay_ms: options.get("setup_delay_ms").unwrap_or(defaults.setup_delay_ms),
            setup_error_code: options
                .get("setup_error_code")
                .unwrap_or(defaults.setup_error_code),
            operation_delay_ms: options
                .get("operation_delay_ms")
                .unwrap_or(defaults.operation_delay_ms),
            reject_operations: options
                .get("reject_operations")
                .unwrap_or(defaults.reject_operations),
            chunk_size: options
                .get::<usize>("chunk_size")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.chunk_size),
        }
    }

    pub fn setup_delay(&self) -> Duration {
        Duration::from_millis(self.setup_delay_ms)
    }

    pub fn operation_delay(&self) -> Duration {
        Duration::from_millis(self.operation_delay_ms)
    }
}

#[cfg(test)]
#[path = "options/options_tests.rs"]
mod options_tests;
