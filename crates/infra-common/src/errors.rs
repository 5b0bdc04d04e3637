//! Error types for infra-common

use thiserror::Error;

/// Result alias for infra-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while bootstrapping shared infrastructure
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A global subscriber was already installed
    #[error("Logging already initialized: {0}")]
    LoggingInit(String),
}
