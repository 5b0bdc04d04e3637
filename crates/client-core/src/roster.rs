//! Locally observed set of connected participants

use indexmap::IndexSet;
use peerlink_presence_core::ParticipantId;
use peerlink_signaling_core::ServerMessage;

/// The participant list as seen from one client.
///
/// Built only from server messages: `welcome` names us, `update-user-list`
/// adds, `remove-user` removes. We never list ourselves.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    local_id: Option<ParticipantId>,
    users: IndexSet<ParticipantId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Our own identifier on the current connection
    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    /// Other participants, in the order we learned about them
    pub fn users(&self) -> Vec<ParticipantId> {
        self.users.iter().cloned().collect()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.users.contains(id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Forget everything; identifiers do not survive a reconnect
    pub fn reset(&mut self) {
        self.local_id = None;
        self.users.clear();
    }

    /// Apply one server message. Returns `true` if the user list changed.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::Welcome { socket_id } => {
                let removed_self = self.users.shift_remove(socket_id);
                self.local_id = Some(socket_id.clone());
                removed_self
            }
            ServerMessage::UpdateUserList { users } => {
                let mut changed = false;
                for user in users {
                    if Some(user) != self.local_id.as_ref() {
                        changed |= self.users.insert(user.clone());
                    }
                }
                changed
            }
            ServerMessage::RemoveUser { socket_id } => self.users.shift_remove(socket_id),
            _ => false,
        }
    }
}
