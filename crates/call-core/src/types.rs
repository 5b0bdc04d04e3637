//! Call state and negotiation payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Offer or answer produced by a [`crate::PeerTransport`].
///
/// Opaque to everything except the transport that created or consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(pub Value);

impl SessionDescription {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// One network path candidate; opaque like [`SessionDescription`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkCandidate(pub Value);

impl NetworkCandidate {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Call state as seen by the user of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// No call; ready to place or receive one
    Idle,
    /// Invitation sent, waiting for an answer
    Calling,
    /// Invitation received, waiting for accept or reject
    RingingIncoming,
    /// Call established
    Connected,
    /// Call torn down, reset to `Idle` pending
    Ended,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::Calling => "calling",
            CallState::RingingIncoming => "ringing",
            CallState::Connected => "connected",
            CallState::Ended => "ended",
        };
        f.write_str(name)
    }
}
