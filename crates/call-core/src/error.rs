//! Error types for call-core

use thiserror::Error;

use crate::types::CallState;
use peerlink_presence_core::ParticipantId;

/// Result type for call operations
pub type Result<T> = std::result::Result<T, CallError>;

/// Errors returned by the call coordinator and its transport.
///
/// `Busy` and `InvalidState` are usage errors returned to the caller of a
/// coordinator operation. `Negotiation` and `Transport` come from the
/// [`crate::PeerTransport`]; the coordinator turns them into
/// [`crate::CallEvent::Failed`] instead of returning them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// A call is already in progress
    #[error("Already in a call ({state}) with {peer}")]
    Busy {
        state: CallState,
        peer: ParticipantId,
    },

    /// Operation not valid in the current state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: CallState,
    },

    /// Malformed or incompatible session description
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Transport could not be created or used
    #[error("Transport error: {0}")]
    Transport(String),
}

impl CallError {
    /// Create a negotiation error
    pub fn negotiation(message: impl Into<String>) -> Self {
        Self::Negotiation(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub(crate) fn invalid_state(operation: &'static str, state: CallState) -> Self {
        Self::InvalidState { operation, state }
    }
}
