//! Candidate buffering
//!
//! Candidates travel independently of descriptions, so either side may see
//! them before it can use them. Both queues keep arrival order.

use peerlink_presence_core::ParticipantId;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use crate::types::NetworkCandidate;

/// Most distinct senders buffered at once; a new sender evicts the oldest
pub const MAX_BUFFERED_SENDERS: usize = 4;

/// Remote candidates received before the remote description was applied.
///
/// Bounded: at most `per_sender` candidates from each of at most
/// [`MAX_BUFFERED_SENDERS`] participants.
#[derive(Debug)]
pub struct RemoteCandidateQueue {
    entries: VecDeque<(ParticipantId, NetworkCandidate)>,
    per_sender: usize,
}

impl RemoteCandidateQueue {
    pub fn new(per_sender: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            per_sender,
        }
    }

    /// Buffer `candidate`; `false` if `from` already has a full share
    pub fn push(&mut self, from: ParticipantId, candidate: NetworkCandidate) -> bool {
        let queued = self.entries.iter().filter(|(sender, _)| *sender == from).count();
        if queued >= self.per_sender {
            return false;
        }
        if queued == 0 && self.senders() >= MAX_BUFFERED_SENDERS {
            if let Some((oldest, _)) = self.entries.front() {
                let oldest = oldest.clone();
                debug!(evicted = %oldest, "Candidate buffer full, evicting oldest sender");
                self.discard_from(&oldest);
            }
        }
        self.entries.push_back((from, candidate));
        true
    }

    fn senders(&self) -> usize {
        self.entries
            .iter()
            .map(|(sender, _)| sender)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Drain the queue, keeping only `peer`'s candidates in arrival order
    pub fn take_from(&mut self, peer: &ParticipantId) -> Vec<NetworkCandidate> {
        let total = self.entries.len();
        let kept: Vec<NetworkCandidate> = self
            .entries
            .drain(..)
            .filter(|(from, _)| from == peer)
            .map(|(_, candidate)| candidate)
            .collect();
        if kept.len() < total {
            debug!(peer = %peer, discarded = total - kept.len(), "Discarded candidates from other participants");
        }
        kept
    }

    /// Forget everything not from `peer`
    pub fn retain_from(&mut self, peer: &ParticipantId) {
        self.entries.retain(|(from, _)| from == peer);
    }

    /// Forget everything from one participant
    pub fn discard_from(&mut self, participant: &ParticipantId) {
        self.entries.retain(|(from, _)| from != participant);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Local candidates gathered before they can be sent
#[derive(Debug, Default)]
pub struct LocalCandidateQueue {
    entries: VecDeque<NetworkCandidate>,
}

impl LocalCandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: NetworkCandidate) {
        self.entries.push_back(candidate);
    }

    pub fn drain(&mut self) -> Vec<NetworkCandidate> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
