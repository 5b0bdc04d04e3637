//! Messages exchanged with the signaling channel

use peerlink_presence_core::ParticipantId;

use crate::types::{NetworkCandidate, SessionDescription};

/// Signals arriving from the relay, already decoded
#[derive(Debug, Clone, PartialEq)]
pub enum InboundSignal {
    /// `from` invites us (or renegotiates an existing call)
    Incoming {
        from: ParticipantId,
        offer: SessionDescription,
    },
    /// `from` accepted our offer
    Answered {
        from: ParticipantId,
        answer: SessionDescription,
    },
    /// `from` declined our invitation
    Rejected { from: ParticipantId },
    /// Remote candidate from `from`
    Candidate {
        from: ParticipantId,
        candidate: NetworkCandidate,
    },
    /// `from` hung up or cancelled its invitation
    Ended { from: ParticipantId },
    /// `peer` disconnected from the server
    PeerLeft { peer: ParticipantId },
    /// Our own connection to the server was lost
    SignalingLost,
}

/// Signals the coordinator wants relayed
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundSignal {
    Invite {
        to: ParticipantId,
        offer: SessionDescription,
    },
    Answer {
        to: ParticipantId,
        answer: SessionDescription,
    },
    /// Decline the invitation sent by `to`
    Reject { to: ParticipantId },
    Candidate {
        to: ParticipantId,
        candidate: NetworkCandidate,
    },
    HangUp { to: ParticipantId },
}

impl OutboundSignal {
    /// Participant the signal is addressed to
    pub fn target(&self) -> &ParticipantId {
        match self {
            OutboundSignal::Invite { to, .. }
            | OutboundSignal::Answer { to, .. }
            | OutboundSignal::Reject { to }
            | OutboundSignal::Candidate { to, .. }
            | OutboundSignal::HangUp { to } => to,
        }
    }
}
