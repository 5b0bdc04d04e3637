//! Events surfaced to the user layer

use peerlink_presence_core::ParticipantId;
use std::fmt;

use crate::error::CallError;
use crate::types::CallState;

/// Why a call ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// We hung up or cancelled
    LocalHangUp,
    /// The peer hung up or cancelled its invitation
    RemoteHangUp,
    /// The peer disconnected from the server
    PeerLeft,
}

/// Why a call failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Description rejected by the transport
    Negotiation(String),
    /// Transport could not be created or used
    Transport(String),
    /// Nobody answered or decided within the ring timeout
    Timeout,
    /// Connection to the signaling server was lost mid-call
    SignalingLost,
    /// The peer declined our renegotiation offer
    RenegotiationRejected,
}

impl From<CallError> for FailureReason {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Negotiation(msg) => FailureReason::Negotiation(msg),
            other => FailureReason::Transport(other.to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Negotiation(msg) => write!(f, "negotiation failed: {}", msg),
            FailureReason::Transport(msg) => write!(f, "transport failed: {}", msg),
            FailureReason::Timeout => f.write_str("timed out"),
            FailureReason::SignalingLost => f.write_str("signaling connection lost"),
            FailureReason::RenegotiationRejected => f.write_str("renegotiation rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// Public state changed
    StateChanged {
        previous: CallState,
        current: CallState,
    },
    /// Invitation waiting for accept or reject
    Incoming { from: ParticipantId },
    /// Call established
    Connected { peer: ParticipantId },
    /// Call kept alive on a fresh transport
    Renegotiated { peer: ParticipantId },
    /// Our invitation was declined
    Rejected { peer: ParticipantId },
    /// Call ended
    Ended {
        peer: ParticipantId,
        reason: EndReason,
    },
    /// Call aborted; the coordinator is back to idle
    Failed {
        peer: ParticipantId,
        reason: FailureReason,
    },
}
