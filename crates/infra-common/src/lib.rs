//! Common infrastructure shared by the peerlink crates.
//!
//! Currently this is the logging bootstrap used by binaries and examples.
//! Library crates only emit `tracing` events and never install a subscriber.

pub mod errors;
pub mod logging;

pub use errors::{Error, Result};
pub use logging::{setup_logging, LoggingConfig};
