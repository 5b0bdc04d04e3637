//! Seam to the peer-to-peer media transport
//!
//! The coordinator never looks inside descriptions or candidates; it only
//! drives a [`PeerTransport`] through offer/answer and hands candidates over.
//! A fresh transport is built by the [`TransportFactory`] for every call and
//! every renegotiation.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{NetworkCandidate, SessionDescription};

/// One local candidate tagged with the transport generation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCandidate {
    pub generation: u64,
    pub candidate: NetworkCandidate,
}

/// Given to each new transport so it can report locally gathered candidates.
///
/// The generation lets the coordinator drop candidates from a transport it
/// has already replaced.
#[derive(Debug, Clone)]
pub struct LocalCandidateSender {
    generation: u64,
    tx: mpsc::UnboundedSender<LocalCandidate>,
}

impl LocalCandidateSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<LocalCandidate>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report a candidate; `false` if the coordinator is gone
    pub fn send(&self, candidate: NetworkCandidate) -> bool {
        self.tx
            .send(LocalCandidate {
                generation: self.generation,
                candidate,
            })
            .is_ok()
    }
}

/// Local end of one peer-to-peer session
#[async_trait]
pub trait PeerTransport: Send {
    /// Create and apply a local offer
    async fn create_offer(&mut self) -> Result<SessionDescription>;

    /// Create and apply a local answer to the applied remote offer
    async fn create_answer(&mut self) -> Result<SessionDescription>;

    /// Apply the remote offer or answer
    async fn set_remote_description(&mut self, description: SessionDescription) -> Result<()>;

    /// Add one remote candidate; only called after a remote description is applied
    async fn add_remote_candidate(&mut self, candidate: NetworkCandidate) -> Result<()>;

    /// Release all resources; the transport is not used afterwards
    async fn close(&mut self);
}

/// Builds transports for the coordinator
pub trait TransportFactory: Send {
    fn create(&mut self, candidates: LocalCandidateSender) -> Result<Box<dyn PeerTransport>>;
}
