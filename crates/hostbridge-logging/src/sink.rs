//! Host log sink management

use hostbridge_core::LogLevel;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// One log event as handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Module path the event came from
    pub target: String,
    pub message: String,
    /// Structured fields other than the message, in recording order
    pub fields: Vec<(String, String)>,
}

impl LogRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.level, self.target, self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

/// Host-provided log sink
///
/// Called from whichever thread emitted the event, engine threads included.
pub type LogSink = Arc<dyn Fn(&LogRecord) + Send + Sync>;

static SINK_MANAGER: OnceCell<LogSinkManager> = OnceCell::new();

/// Holds the host's log sink and the level it wants
pub struct LogSinkManager {
    sink: RwLock<Option<LogSink>>,
    level: AtomicU8,
    forwarded: AtomicU64,
}

impl LogSinkManager {
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(None),
            level: AtomicU8::new(LogLevel::Info as u8),
            forwarded: AtomicU64::new(0),
        }
    }

    pub fn global() -> &'static LogSinkManager {
        SINK_MANAGER.get_or_init(LogSinkManager::new)
    }

    /// Install or remove the sink; returns the previous one
    pub fn set_sink(&self, sink: Option<LogSink>) -> Option<LogSink> {
        std::mem::replace(&mut *self.sink.write(), sink)
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::SeqCst))
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.level()
    }

    /// Number of records handed to a sink so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Hand `record` to the sink if one is set and its level is enabled
    pub fn log(&self, record: &LogRecord) {
        if !self.is_enabled(record.level) {
            return;
        }
        // Clone out so a sink that logs or swaps sinks cannot deadlock.
        let Some(sink) = self.sink.read().clone() else {
            return;
        };
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        sink(record);
    }
}

impl Default for LogSinkManager {
    fn default() -> Self {
        Self::new()
    }
}
