//! # Call-Core
//!
//! The per-participant call coordinator. One [`CallCoordinator`] decides how
//! its participant reacts to user commands and relayed signals, keeps at most
//! one call alive, and buffers network candidates until they can be used.
//!
//! ## States
//!
//! ```text
//!            call()                     answered
//!   Idle ─────────────▶ Calling ─────────────────────┐
//!    │ ▲                  │ rejected / hang_up       ▼
//!    │ └──────────────────┘                      Connected ──┐
//!    │ incoming                  accept()           ▲        │ hang_up / peer ended
//!    └────────▶ RingingIncoming ────────────────────┘        ▼
//!                    │ reject()                            Ended ──reset──▶ Idle
//!                    └──────────────▶ Idle
//! ```
//!
//! Offers, answers and candidates are opaque: the coordinator passes them to
//! and from a [`PeerTransport`] without looking inside.
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use peerlink_call_core::*;
//! use peerlink_presence_core::ParticipantId;
//! use serde_json::json;
//! use tokio::sync::mpsc;
//!
//! struct Loopback;
//!
//! #[async_trait]
//! impl PeerTransport for Loopback {
//!     async fn create_offer(&mut self) -> Result<SessionDescription> {
//!         Ok(SessionDescription::new(json!("offer")))
//!     }
//!     async fn create_answer(&mut self) -> Result<SessionDescription> {
//!         Ok(SessionDescription::new(json!("answer")))
//!     }
//!     async fn set_remote_description(&mut self, _: SessionDescription) -> Result<()> {
//!         Ok(())
//!     }
//!     async fn add_remote_candidate(&mut self, _: NetworkCandidate) -> Result<()> {
//!         Ok(())
//!     }
//!     async fn close(&mut self) {}
//! }
//!
//! struct Factory;
//!
//! impl TransportFactory for Factory {
//!     fn create(&mut self, _: LocalCandidateSender) -> Result<Box<dyn PeerTransport>> {
//!         Ok(Box::new(Loopback))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
//! let (event_tx, _events) = mpsc::unbounded_channel();
//! let (mut coordinator, _candidates) =
//!     CallCoordinator::new(CallConfig::default(), Factory, signal_tx, event_tx);
//!
//! coordinator.call(ParticipantId::from("B1")).await.unwrap();
//! assert_eq!(coordinator.state(), CallState::Calling);
//! assert!(matches!(signal_rx.try_recv(), Ok(OutboundSignal::Invite { .. })));
//! # }
//! ```

pub mod candidates;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod signal;
pub mod transport;
pub mod types;

pub use config::CallConfig;
pub use coordinator::CallCoordinator;
pub use error::{CallError, Result};
pub use events::{CallEvent, EndReason, FailureReason};
pub use signal::{InboundSignal, OutboundSignal};
pub use transport::{LocalCandidate, LocalCandidateSender, PeerTransport, TransportFactory};
pub use types::{CallState, NetworkCandidate, SessionDescription};
