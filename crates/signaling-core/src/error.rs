//! Error types for signaling-core

use std::net::SocketAddr;
use thiserror::Error;

/// Result type for signaling operations
pub type Result<T> = std::result::Result<T, SignalingError>;

/// Errors raised by the signaling server.
///
/// Delivery misses are not errors: the relay reports them as
/// [`crate::RelayOutcome::Dropped`].
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Frame could not be decoded into a client message
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Frame exceeds the configured size limit
    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// I/O failure while serving
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl SignalingError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for SignalingError {
    fn from(err: config::ConfigError) -> Self {
        Self::config(err.to_string())
    }
}
