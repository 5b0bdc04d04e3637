//! Mapping between wire messages and coordinator signals

use peerlink_call_core::{InboundSignal, NetworkCandidate, OutboundSignal, SessionDescription};
use peerlink_signaling_core::{ClientMessage, ServerMessage};

/// Coordinator signal carried by a server message, if any.
///
/// `remove-user` becomes [`InboundSignal::PeerLeft`]; membership and control
/// messages without a call meaning yield `None`.
pub fn inbound_signal(message: &ServerMessage) -> Option<InboundSignal> {
    let signal = match message {
        ServerMessage::CallMade { offer, socket } => InboundSignal::Incoming {
            from: socket.clone(),
            offer: SessionDescription(offer.clone()),
        },
        ServerMessage::AnswerMade { answer, socket } => InboundSignal::Answered {
            from: socket.clone(),
            answer: SessionDescription(answer.clone()),
        },
        ServerMessage::CallRejected { socket } => InboundSignal::Rejected {
            from: socket.clone(),
        },
        ServerMessage::IceCandidate { candidate, socket } => InboundSignal::Candidate {
            from: socket.clone(),
            candidate: NetworkCandidate(candidate.clone()),
        },
        ServerMessage::CallEnded { socket } => InboundSignal::Ended {
            from: socket.clone(),
        },
        ServerMessage::RemoveUser { socket_id } => InboundSignal::PeerLeft {
            peer: socket_id.clone(),
        },
        ServerMessage::Welcome { .. }
        | ServerMessage::UpdateUserList { .. }
        | ServerMessage::Error { .. } => return None,
    };
    Some(signal)
}

/// Wire message for an outbound coordinator signal
pub fn client_message(signal: OutboundSignal) -> ClientMessage {
    match signal {
        OutboundSignal::Invite { to, offer } => ClientMessage::CallUser {
            offer: offer.into_inner(),
            to,
        },
        OutboundSignal::Answer { to, answer } => ClientMessage::MakeAnswer {
            answer: answer.into_inner(),
            to,
        },
        OutboundSignal::Reject { to } => ClientMessage::RejectCall { from: to },
        OutboundSignal::Candidate { to, candidate } => ClientMessage::IceCandidate {
            candidate: candidate.into_inner(),
            to,
        },
        OutboundSignal::HangUp { to } => ClientMessage::HangUp { to },
    }
}
