//! Error types for client-core

use peerlink_call_core::CallError;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the signaling server
    #[error("Connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    /// Frame from the server could not be understood
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// The call agent task is no longer running
    #[error("Call agent stopped")]
    AgentStopped,

    /// Call operation refused by the coordinator
    #[error(transparent)]
    Call(#[from] CallError),
}

impl ClientError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClientError::Connection { .. } | ClientError::Protocol(_))
    }
}
