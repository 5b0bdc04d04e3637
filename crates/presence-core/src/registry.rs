//! Presence registry

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::types::{ParticipantId, PresenceEvent};

/// Delivery handle for one connected participant.
///
/// `notify` must not block: the registry calls it while holding its lock.
/// Returning `false` means the event could not be queued (the connection is
/// going away); the registry logs it and carries on.
pub trait PresenceHandle: Clone + Send + Sync + 'static {
    fn notify(&self, event: PresenceEvent) -> bool;
}

/// In-memory set of connected participants.
///
/// One registry instance is shared (behind an `Arc`) by every connection task
/// of a server. All mutation goes through a single mutex, and membership
/// broadcasts are sent from inside the critical section.
pub struct PresenceRegistry<H: PresenceHandle> {
    /// Connected participants in connect order
    members: Mutex<IndexMap<ParticipantId, H>>,
}

impl<H: PresenceHandle> PresenceRegistry<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            members: Mutex::new(IndexMap::new()),
        }
    }

    /// Register a participant and announce it.
    ///
    /// The new participant receives a [`PresenceEvent::Snapshot`] of everyone
    /// else; everyone else receives [`PresenceEvent::Joined`]. Connecting an id
    /// that is already present replaces its handle and resends the snapshot
    /// without announcing it a second time.
    ///
    /// Returns the snapshot that was sent.
    pub fn connect(&self, id: ParticipantId, handle: H) -> Vec<ParticipantId> {
        let mut members = self.members.lock();

        let others: Vec<ParticipantId> = members.keys().filter(|m| **m != id).cloned().collect();
        let rejoin = members.insert(id.clone(), handle.clone()).is_some();

        if !handle.notify(PresenceEvent::Snapshot(others.clone())) {
            warn!(participant = %id, "Snapshot could not be delivered");
        }

        if rejoin {
            debug!(participant = %id, "Participant re-joined, membership resent");
            return others;
        }

        for (member, member_handle) in members.iter() {
            if *member == id {
                continue;
            }
            if !member_handle.notify(PresenceEvent::Joined(id.clone())) {
                debug!(participant = %member, joined = %id, "Join notice not delivered");
            }
        }

        info!(participant = %id, active = members.len(), "Participant connected");
        others
    }

    /// Remove a participant and tell everyone still connected.
    ///
    /// Returns `false` if the participant was not registered, in which case
    /// nothing is broadcast.
    pub fn disconnect(&self, id: &ParticipantId) -> bool {
        let mut members = self.members.lock();

        if members.shift_remove(id).is_none() {
            debug!(participant = %id, "Disconnect for unknown participant ignored");
            return false;
        }

        for (member, member_handle) in members.iter() {
            if !member_handle.notify(PresenceEvent::Left(id.clone())) {
                debug!(participant = %member, left = %id, "Leave notice not delivered");
            }
        }

        info!(participant = %id, active = members.len(), "Participant disconnected");
        true
    }

    /// Delivery handle of a connected participant
    pub fn handle(&self, id: &ParticipantId) -> Option<H> {
        self.members.lock().get(id).cloned()
    }

    /// Whether `id` is currently connected
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.members.lock().contains_key(id)
    }

    /// All connected participants in connect order
    pub fn members(&self) -> Vec<ParticipantId> {
        self.members.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}

impl<H: PresenceHandle> Default for PresenceRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
