//! Stateless message relay between two named participants

use std::sync::Arc;

use peerlink_presence_core::{ParticipantId, PresenceEvent, PresenceHandle, PresenceRegistry};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::protocol::{ClientMessage, ServerMessage};

/// Outbound queue of one WebSocket connection.
///
/// Sending never blocks; the connection's writer task drains the queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a message; `false` once the connection is gone
    pub fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

impl PresenceHandle for ConnectionHandle {
    fn notify(&self, event: PresenceEvent) -> bool {
        self.send(event.into())
    }
}

/// What happened to a message handed to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Queued on the target's connection
    Delivered,
    /// Target not connected; the message is gone
    Dropped,
    /// A `join` was answered with a fresh membership snapshot
    Resynced,
}

/// Forwards negotiation messages to their target participant.
///
/// Holds no per-call state; everything it needs is in the registry.
pub struct SignalingRelay {
    registry: Arc<PresenceRegistry<ConnectionHandle>>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<PresenceRegistry<ConnectionHandle>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry<ConnectionHandle>> {
        &self.registry
    }

    /// Handle one message from a connected participant.
    ///
    /// `join` re-registers `from` with `handle` (a no-op for membership, but it
    /// resends the full user list). Everything else is relayed.
    pub fn dispatch(
        &self,
        from: &ParticipantId,
        handle: &ConnectionHandle,
        message: ClientMessage,
    ) -> RelayOutcome {
        match message {
            ClientMessage::Join => {
                self.registry.connect(from.clone(), handle.clone());
                RelayOutcome::Resynced
            }
            other => self.relay(from, other),
        }
    }

    /// Rewrite `message` for its target and deliver it if the target is connected.
    pub fn relay(&self, from: &ParticipantId, message: ClientMessage) -> RelayOutcome {
        let (to, outbound) = match message {
            ClientMessage::Join => return RelayOutcome::Resynced,
            ClientMessage::CallUser { offer, to } => (
                to,
                ServerMessage::CallMade {
                    offer,
                    socket: from.clone(),
                },
            ),
            ClientMessage::MakeAnswer { answer, to } => (
                to,
                ServerMessage::AnswerMade {
                    answer,
                    socket: from.clone(),
                },
            ),
            ClientMessage::RejectCall { from: target } => (
                target,
                ServerMessage::CallRejected {
                    socket: from.clone(),
                },
            ),
            ClientMessage::IceCandidate { candidate, to } => (
                to,
                ServerMessage::IceCandidate {
                    candidate,
                    socket: from.clone(),
                },
            ),
            ClientMessage::HangUp { to } => (
                to,
                ServerMessage::CallEnded {
                    socket: from.clone(),
                },
            ),
        };

        match self.registry.handle(&to) {
            Some(handle) if handle.send(outbound) => {
                trace!(from = %from, to = %to, "Relayed message");
                RelayOutcome::Delivered
            }
            _ => {
                debug!(from = %from, to = %to, "Target not connected, message dropped");
                RelayOutcome::Dropped
            }
        }
    }
}
