//! Error types for the event bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Binding is not in a valid state for the requested operation
    #[error("invalid binding state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// The engine failed to create a native handle synchronously
    #[error("construction failed: {0}")]
    ConstructionFailed(String),

    /// The engine rejected an operation
    #[error("engine error {code}: {message}")]
    Engine { code: i32, message: String },

    /// The dispatch subsystem has been globally disabled
    #[error("dispatch disabled")]
    DispatchDisabled,

    /// A channel no longer accepts deliveries
    #[error("channel retired: {0}")]
    ChannelRetired(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Engine runtime error
    #[error("runtime error: {0}")]
    RuntimeError(String),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Returns an error code suitable for host marshalling
    pub fn error_code(&self) -> u32 {
        match self {
            BridgeError::InvalidState { .. } => 1,
            BridgeError::ConstructionFailed(_) => 2,
            BridgeError::Engine { .. } => 3,
            BridgeError::DispatchDisabled => 4,
            BridgeError::ChannelRetired(_) => 5,
            BridgeError::ConfigError(_) => 6,
            BridgeError::SerializationError(_) => 7,
            BridgeError::RuntimeError(_) => 8,
            BridgeError::Timeout => 9,
            BridgeError::Cancelled => 10,
            BridgeError::Internal(_) => 11,
        }
    }

    /// Create an error from an error code and message
    pub fn from_code(code: u32, message: String) -> Self {
        match code {
            1 => BridgeError::InvalidState {
                expected: String::new(),
                actual: message,
            },
            2 => BridgeError::ConstructionFailed(message),
            3 => BridgeError::Engine { code: -1, message },
            4 => BridgeError::DispatchDisabled,
            5 => BridgeError::ChannelRetired(message),
            6 => BridgeError::ConfigError(message),
            7 => BridgeError::SerializationError(message),
            8 => BridgeError::RuntimeError(message),
            9 => BridgeError::Timeout,
            10 => BridgeError::Cancelled,
            _ => BridgeError::Internal(message),
        }
    }

    /// Shorthand for the use-after-close error
    pub fn closed(kind: &str) -> Self {
        BridgeError::InvalidState {
            expected: format!("open {kind}"),
            actual: "closed".to_string(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::SerializationError(err.to_string())
    }
}

/// Synchronous failure reported by an engine entry point
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine error {code}: {message}")]
pub struct EngineError {
    pub code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<EngineError> for BridgeError {
    fn from(err: EngineError) -> Self {
        BridgeError::Engine {
            code: err.code,
            message: err.message,
        }
    }
}
