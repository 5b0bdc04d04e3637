//! # Signaling-Core
//!
//! Server side of peerlink: a WebSocket endpoint that keeps the presence
//! registry current and relays call-negotiation messages between exactly two
//! named participants.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  SignalingServer (axum, /ws + /health)   │
//! ├──────────────────────────────────────────┤
//! │  per-connection reader loop / writer task│
//! ├──────────────────────────────────────────┤
//! │  SignalingRelay  │  PresenceRegistry     │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The relay is stateless: it looks the target up in the registry, rewrites
//! the envelope (`call-user` becomes `call-made`, and so on) and forwards the
//! payload untouched. A target that is not connected means the message is
//! dropped; retries and timeouts belong to the calling client.

pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;

pub use config::{OriginPolicy, ServerConfig};
pub use error::{Result, SignalingError};
pub use protocol::{decode_client_message, ClientMessage, ServerMessage};
pub use relay::{ConnectionHandle, RelayOutcome, SignalingRelay};
pub use server::{router, SignalingServer};

pub use peerlink_presence_core::{ParticipantId, PresenceRegistry};
