//! Core types for presence-core

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one connected participant.
///
/// Valid only for the lifetime of the connection that created it; a client
/// that reconnects gets a new one.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Generate a fresh identifier for a new connection
    pub fn new() -> Self {
        Self(format!("peer-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Membership change delivered to a participant's handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Everyone currently connected except the receiver, in connect order
    Snapshot(Vec<ParticipantId>),
    /// A participant connected
    Joined(ParticipantId),
    /// A participant disconnected
    Left(ParticipantId),
}
