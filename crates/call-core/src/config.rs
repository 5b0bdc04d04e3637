//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a call may ring, in either direction, without a decision
pub const DEFAULT_RING_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on remote candidates buffered per sender
pub const DEFAULT_MAX_QUEUED_CANDIDATES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// How long `Calling` or `RingingIncoming` may last; `None` waits forever
    pub ring_timeout: Option<Duration>,
    /// Remote candidates buffered per sender before a remote description exists
    pub max_queued_candidates: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Some(DEFAULT_RING_TIMEOUT),
            max_queued_candidates: DEFAULT_MAX_QUEUED_CANDIDATES,
        }
    }
}

impl CallConfig {
    pub fn with_ring_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ring_timeout = timeout;
        self
    }

    pub fn with_max_queued_candidates(mut self, max: usize) -> Self {
        self.max_queued_candidates = max;
        self
    }
}
