//! # Presence-Core
//!
//! Tracks which participants are currently connected to a signaling server and
//! tells everyone when that set changes.
//!
//! The registry owns the membership set and the delivery handle of every
//! connection. Membership changes and the notifications they cause are applied
//! under one lock, so no participant ever observes a half-applied update.
//!
//! ```
//! use peerlink_presence_core::{ParticipantId, PresenceEvent, PresenceHandle, PresenceRegistry};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Clone, Default)]
//! struct Inbox(Arc<Mutex<Vec<PresenceEvent>>>);
//!
//! impl PresenceHandle for Inbox {
//!     fn notify(&self, event: PresenceEvent) -> bool {
//!         self.0.lock().unwrap().push(event);
//!         true
//!     }
//! }
//!
//! let registry = PresenceRegistry::new();
//! let alice = Inbox::default();
//! registry.connect(ParticipantId::from("A1"), alice.clone());
//! registry.connect(ParticipantId::from("B1"), Inbox::default());
//!
//! let seen = alice.0.lock().unwrap().clone();
//! assert_eq!(seen.last(), Some(&PresenceEvent::Joined(ParticipantId::from("B1"))));
//! ```

pub mod registry;
pub mod types;

pub use registry::{PresenceHandle, PresenceRegistry};
pub use types::{ParticipantId, PresenceEvent};
