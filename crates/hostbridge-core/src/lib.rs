//! hostbridge-core - Core types shared by every hostbridge crate
//!
//! This crate provides the foundational pieces of the event bridge:
//! - [`RefHandle`] intrusive-style reference counting with a zero-callback
//! - [`CompletionLatch`] single-use release of a reference held across racing paths
//! - [`BindingState`] for the per-binding lifecycle state machine
//! - [`BridgeError`] for error handling
//! - [`BridgeConfig`] and [`BindingOptions`] for configuration

mod config;
mod error;
mod latch;
mod lifecycle;
mod refcount;

pub use config::{BindingOptions, BridgeConfig};
pub use error::{BridgeError, BridgeResult, EngineError};
pub use latch::CompletionLatch;
pub use lifecycle::BindingState;
pub use refcount::{RefHandle, WeakRefHandle};

/// Engine error code signalling success
pub const ERROR_CODE_SUCCESS: i32 = 0;

/// Log levels understood by the host log sink
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl LogLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Off,
        }
    }

    /// Parse a configuration string such as `"debug"` (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "off" => Some(LogLevel::Off),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BindingOptions, BindingState, BridgeConfig, BridgeError, BridgeResult, CompletionLatch,
        EngineError, LogLevel, RefHandle,
    };
}
