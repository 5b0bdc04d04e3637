//! Wire protocol between clients and the signaling server.
//!
//! Every frame is one JSON object `{"event": "<name>", "data": {...}}`.
//! Offer, answer and candidate payloads are carried as raw JSON values and
//! are never inspected by the server.

use peerlink_presence_core::{ParticipantId, PresenceEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SignalingError};

/// Messages a client sends to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// (Re-)register and ask for the full user list
    Join,
    /// Invite `to` into a call
    CallUser { offer: Value, to: ParticipantId },
    /// Accept an invitation from `to`
    MakeAnswer { answer: Value, to: ParticipantId },
    /// Decline the invitation sent by `from`
    RejectCall { from: ParticipantId },
    /// One network path candidate for `to`
    IceCandidate { candidate: Value, to: ParticipantId },
    /// End or cancel the call with `to`
    HangUp { to: ParticipantId },
}

/// Messages the server sends to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// The identifier assigned to this connection
    Welcome {
        #[serde(rename = "socketId")]
        socket_id: ParticipantId,
    },
    /// Participants to add to the local user list
    UpdateUserList { users: Vec<ParticipantId> },
    /// Participant to remove from the local user list
    RemoveUser {
        #[serde(rename = "socketId")]
        socket_id: ParticipantId,
    },
    /// Incoming invitation from `socket`
    CallMade { offer: Value, socket: ParticipantId },
    /// `socket` accepted our invitation
    AnswerMade { answer: Value, socket: ParticipantId },
    /// `socket` declined our invitation
    CallRejected { socket: ParticipantId },
    /// Network path candidate from `socket`
    IceCandidate { candidate: Value, socket: ParticipantId },
    /// `socket` hung up or cancelled its invitation
    CallEnded { socket: ParticipantId },
    /// The last frame from this client could not be processed
    Error { message: String },
}

impl From<PresenceEvent> for ServerMessage {
    fn from(event: PresenceEvent) -> Self {
        match event {
            PresenceEvent::Snapshot(users) => ServerMessage::UpdateUserList { users },
            PresenceEvent::Joined(id) => ServerMessage::UpdateUserList { users: vec![id] },
            PresenceEvent::Left(id) => ServerMessage::RemoveUser { socket_id: id },
        }
    }
}

/// Decode one text frame, enforcing the size limit first.
pub fn decode_client_message(text: &str, max_bytes: usize) -> Result<ClientMessage> {
    if text.len() > max_bytes {
        return Err(SignalingError::MessageTooLarge {
            size: text.len(),
            max: max_bytes,
        });
    }
    serde_json::from_str(text).map_err(|e| SignalingError::MalformedMessage(e.to_string()))
}
