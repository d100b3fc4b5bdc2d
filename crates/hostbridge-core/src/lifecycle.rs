//! Binding lifecycle state machine

use serde::{Deserialize, Serialize};

/// Lifecycle of one binding (connection, stream or client)
///
/// State transitions:
/// ```text
/// Created → Connecting → Operational → ShuttingDown → Closed
///    ↑          │  ↑          │
///    └──────────┘  └──────────┘ (stop / reconnect)
///        Any open state → ShuttingDown (failure, shutdown or close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
    /// Binding allocated, no engine handle requested yet
    #[default]
    Created,
    /// Engine asked to connect or activate; handle may not exist yet
    Connecting,
    /// Engine handle set, events may arrive on any channel
    Operational,
    /// Engine failure, engine shutdown or explicit close in progress
    ShuttingDown,
    /// Terminal: channels retired, weak host reference revoked
    Closed,
}

impl BindingState {
    /// Check if this state can transition to the target state
    pub fn can_transition_to(&self, target: BindingState) -> bool {
        use BindingState::*;
        matches!(
            (self, target),
            (Created, Connecting)
                | (Connecting, Operational)
                // Reconnect after an interruption
                | (Operational, Connecting)
                // Stop without closing
                | (Connecting, Created)
                | (Operational, Created)
                | (Created, ShuttingDown)
                | (Connecting, ShuttingDown)
                | (Operational, ShuttingDown)
                | (ShuttingDown, Closed)
        )
    }

    /// Check if operations (send, publish, subscribe) are accepted in this state
    pub fn can_accept_operations(&self) -> bool {
        matches!(self, BindingState::Operational)
    }

    /// Check if the binding is still open (not shutting down or closed)
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            BindingState::Created | BindingState::Connecting | BindingState::Operational
        )
    }

    /// Check if the binding is in its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, BindingState::Closed)
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            BindingState::Created => "Binding is allocated but not connected",
            BindingState::Connecting => "Binding is waiting for the engine to set up",
            BindingState::Operational => "Binding is operational",
            BindingState::ShuttingDown => "Binding is shutting down",
            BindingState::Closed => "Binding is closed",
        }
    }
}

impl std::fmt::Display for BindingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingState::Created => write!(f, "Created"),
            BindingState::Connecting => write!(f, "Connecting"),
            BindingState::Operational => write!(f, "Operational"),
            BindingState::ShuttingDown => write!(f, "ShuttingDown"),
            BindingState::Closed => write!(f, "Closed"),
        }
    }
}
