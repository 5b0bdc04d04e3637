//! # Client-Core
//!
//! Client runtime for peerlink. A [`CallAgent`] connects to a signaling
//! server, keeps the locally observed [`Roster`] in sync and drives one
//! [`peerlink_call_core::CallCoordinator`] from user commands and relayed
//! signals.
//!
//! ```text
//!   app ──CallAgentHandle──▶ CallAgent task ──▶ CallCoordinator ──▶ PeerTransport
//!    ▲                          │    ▲
//!    └──── ClientEvent ─────────┘    │ SignalingEvent / OutboundSignal
//!                                    ▼
//!                            SignalingClient task ◀──WebSocket──▶ server
//! ```
//!
//! The media transport is supplied by the application through a
//! [`peerlink_call_core::TransportFactory`].

pub mod agent;
pub mod config;
pub mod error;
pub mod recovery;
pub mod roster;
pub mod signaling;
pub mod translate;

pub use agent::{CallAgent, CallAgentHandle, ClientEvent};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use recovery::ReconnectPolicy;
pub use roster::Roster;
pub use signaling::{SignalingClient, SignalingEvent};
