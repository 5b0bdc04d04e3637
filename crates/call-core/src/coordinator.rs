//! Per-participant call state machine

use peerlink_presence_core::ParticipantId;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::candidates::{LocalCandidateQueue, RemoteCandidateQueue};
use crate::config::CallConfig;
use crate::error::{CallError, Result};
use crate::events::{CallEvent, EndReason, FailureReason};
use crate::signal::{InboundSignal, OutboundSignal};
use crate::transport::{LocalCandidate, LocalCandidateSender, PeerTransport, TransportFactory};
use crate::types::{CallState, NetworkCandidate, SessionDescription};

/// Offer/answer progress of an established call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Negotiation {
    /// Remote description applied
    Stable,
    /// Renegotiation offer sent, answer outstanding
    AwaitingAnswer,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Calling {
        peer: ParticipantId,
    },
    Ringing {
        peer: ParticipantId,
        offer: SessionDescription,
    },
    Connected {
        peer: ParticipantId,
        negotiation: Negotiation,
    },
    Ended {
        peer: ParticipantId,
    },
}

impl Phase {
    fn state(&self) -> CallState {
        match self {
            Phase::Idle => CallState::Idle,
            Phase::Calling { .. } => CallState::Calling,
            Phase::Ringing { .. } => CallState::RingingIncoming,
            Phase::Connected { .. } => CallState::Connected,
            Phase::Ended { .. } => CallState::Ended,
        }
    }

    fn peer(&self) -> Option<&ParticipantId> {
        match self {
            Phase::Idle => None,
            Phase::Calling { peer }
            | Phase::Ringing { peer, .. }
            | Phase::Connected { peer, .. }
            | Phase::Ended { peer } => Some(peer),
        }
    }

    fn remote_applied(&self) -> bool {
        matches!(
            self,
            Phase::Connected {
                negotiation: Negotiation::Stable,
                ..
            }
        )
    }

    /// Peer whose answer we are waiting for, if any
    fn awaiting_answer_from(&self) -> Option<&ParticipantId> {
        match self {
            Phase::Calling { peer }
            | Phase::Connected {
                peer,
                negotiation: Negotiation::AwaitingAnswer,
            } => Some(peer),
            _ => None,
        }
    }
}

/// Call coordinator for one participant.
///
/// Owns the current [`PeerTransport`], the call phase and both candidate
/// queues. Every operation takes `&mut self`, so a coordinator processes one
/// command or signal at a time; the owner (usually a `CallAgent` task) feeds
/// it in arrival order.
///
/// Relayed messages leave through the [`OutboundSignal`] channel and
/// everything the user should see leaves through the [`CallEvent`] channel.
/// Negotiation failures are reported as [`CallEvent::Failed`]; operations only
/// return errors for misuse ([`CallError::Busy`], [`CallError::InvalidState`]).
pub struct CallCoordinator {
    config: CallConfig,
    local_id: Option<ParticipantId>,
    factory: Box<dyn TransportFactory>,
    transport: Option<Box<dyn PeerTransport>>,
    generation: u64,
    candidate_tx: mpsc::UnboundedSender<LocalCandidate>,
    phase: Phase,
    remote_candidates: RemoteCandidateQueue,
    local_candidates: LocalCandidateQueue,
    deadline: Option<Instant>,
    signals: mpsc::UnboundedSender<OutboundSignal>,
    events: mpsc::UnboundedSender<CallEvent>,
}

impl CallCoordinator {
    /// Create an idle coordinator and allocate its first transport.
    ///
    /// Returns the receiver for locally gathered candidates; feed each one
    /// back through [`CallCoordinator::on_local_candidate`].
    pub fn new(
        config: CallConfig,
        factory: impl TransportFactory + 'static,
        signals: mpsc::UnboundedSender<OutboundSignal>,
        events: mpsc::UnboundedSender<CallEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<LocalCandidate>) {
        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();
        let remote_candidates = RemoteCandidateQueue::new(config.max_queued_candidates);
        let mut coordinator = Self {
            config,
            local_id: None,
            factory: Box::new(factory),
            transport: None,
            generation: 0,
            candidate_tx,
            phase: Phase::Idle,
            remote_candidates,
            local_candidates: LocalCandidateQueue::new(),
            deadline: None,
            signals,
            events,
        };
        coordinator.allocate_transport();
        (coordinator, candidate_rx)
    }

    pub fn state(&self) -> CallState {
        self.phase.state()
    }

    /// Counterpart of the current call
    pub fn peer(&self) -> Option<&ParticipantId> {
        self.phase.peer()
    }

    /// Generation of the current transport
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the current ringing phase times out
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// Our own identifier, once the signaling server has assigned one
    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    /// Record the identifier the server assigned us.
    ///
    /// It breaks ties when both sides of a call renegotiate at once: the
    /// lower identifier keeps its offer. Without it, crossing offers are
    /// both declined and the call fails on both sides.
    pub fn set_local_id(&mut self, id: ParticipantId) {
        self.local_id = Some(id);
    }

    /// Remote candidates waiting for a remote description
    pub fn queued_remote_candidates(&self) -> usize {
        self.remote_candidates.len()
    }

    /// Local candidates waiting to be sent
    pub fn queued_local_candidates(&self) -> usize {
        self.local_candidates.len()
    }

    /// Invite `peer`: create an offer and send it.
    pub async fn call(&mut self, peer: ParticipantId) -> Result<()> {
        if let Some(current) = self.phase.peer() {
            return Err(CallError::Busy {
                state: self.state(),
                peer: current.clone(),
            });
        }

        let offer = match self.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                self.fail(peer, None, e.into()).await;
                return Ok(());
            }
        };

        info!(peer = %peer, "Calling");
        self.send(OutboundSignal::Invite {
            to: peer.clone(),
            offer,
        });
        self.remote_candidates.retain_from(&peer);
        self.set_phase(Phase::Calling { peer });
        self.arm_deadline();
        Ok(())
    }

    /// Accept the pending invitation.
    pub async fn accept(&mut self) -> Result<()> {
        let (peer, offer) = match &self.phase {
            Phase::Ringing { peer, offer } => (peer.clone(), offer.clone()),
            _ => return Err(CallError::invalid_state("accept", self.state())),
        };
        self.deadline = None;

        if let Err(e) = self.set_remote_description(offer).await {
            self.fail(peer.clone(), Some(OutboundSignal::Reject { to: peer }), e.into())
                .await;
            return Ok(());
        }
        let answer = match self.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                self.fail(peer.clone(), Some(OutboundSignal::Reject { to: peer }), e.into())
                    .await;
                return Ok(());
            }
        };

        info!(peer = %peer, "Accepted call");
        self.send(OutboundSignal::Answer {
            to: peer.clone(),
            answer,
        });
        self.set_phase(Phase::Connected {
            peer: peer.clone(),
            negotiation: Negotiation::Stable,
        });
        self.flush_candidates(&peer).await;
        self.emit(CallEvent::Connected { peer });
        Ok(())
    }

    /// Decline the pending invitation.
    pub async fn reject(&mut self) -> Result<()> {
        let peer = match &self.phase {
            Phase::Ringing { peer, .. } => peer.clone(),
            _ => return Err(CallError::invalid_state("reject", self.state())),
        };

        info!(peer = %peer, "Rejected call");
        self.send(OutboundSignal::Reject { to: peer });
        self.clear_call_state();
        self.set_phase(Phase::Idle);
        Ok(())
    }

    /// End, cancel or decline whatever call is in progress. No-op when idle.
    pub async fn hang_up(&mut self) -> Result<()> {
        match (self.state(), self.phase.peer().cloned()) {
            (CallState::RingingIncoming, _) => self.reject().await,
            (CallState::Calling | CallState::Connected, Some(peer)) => {
                info!(peer = %peer, "Hanging up");
                self.send(OutboundSignal::HangUp { to: peer.clone() });
                self.end_call(peer, EndReason::LocalHangUp).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Rebuild the transport mid-call and renegotiate with the same peer.
    ///
    /// The call stays `Connected`; remote candidates are buffered until the
    /// new answer is applied.
    pub async fn renegotiate(&mut self) -> Result<()> {
        let peer = match &self.phase {
            Phase::Connected { peer, .. } => peer.clone(),
            _ => return Err(CallError::invalid_state("renegotiate", self.state())),
        };

        self.reset().await;
        let offer = match self.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                self.fail(peer.clone(), Some(OutboundSignal::HangUp { to: peer }), e.into())
                    .await;
                return Ok(());
            }
        };

        info!(peer = %peer, generation = self.generation, "Renegotiating");
        self.send(OutboundSignal::Invite {
            to: peer.clone(),
            offer,
        });
        self.set_phase(Phase::Connected {
            peer,
            negotiation: Negotiation::AwaitingAnswer,
        });
        Ok(())
    }

    /// Apply one signal from the relay
    pub async fn handle_signal(&mut self, signal: InboundSignal) {
        match signal {
            InboundSignal::Incoming { from, offer } => self.on_incoming(from, offer).await,
            InboundSignal::Answered { from, answer } => self.on_answered(from, answer).await,
            InboundSignal::Rejected { from } => self.on_rejected(from).await,
            InboundSignal::Candidate { from, candidate } => {
                self.on_remote_candidate(from, candidate).await
            }
            InboundSignal::Ended { from } => self.on_remote_end(from, EndReason::RemoteHangUp).await,
            InboundSignal::PeerLeft { peer } => {
                self.remote_candidates.discard_from(&peer);
                self.on_remote_end(peer, EndReason::PeerLeft).await
            }
            InboundSignal::SignalingLost => self.on_signaling_lost().await,
        }
    }

    /// Send or queue a locally gathered candidate
    pub fn on_local_candidate(&mut self, local: LocalCandidate) {
        if local.generation != self.generation {
            debug!(
                generation = local.generation,
                current = self.generation,
                "Dropped candidate from a replaced transport"
            );
            return;
        }

        match (self.phase.remote_applied(), self.phase.peer().cloned()) {
            (true, Some(peer)) => self.send(OutboundSignal::Candidate {
                to: peer,
                candidate: local.candidate,
            }),
            (false, Some(_)) => self.local_candidates.push(local.candidate),
            _ => debug!("Dropped local candidate while idle"),
        }
    }

    /// Time out a ringing phase whose deadline is at or before `now`.
    ///
    /// Returns `true` if the call was aborted.
    pub async fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => self.deadline = None,
            _ => return false,
        }

        match (self.state(), self.phase.peer().cloned()) {
            (CallState::Calling, Some(peer)) => {
                self.fail(
                    peer.clone(),
                    Some(OutboundSignal::HangUp { to: peer }),
                    FailureReason::Timeout,
                )
                .await;
                true
            }
            (CallState::RingingIncoming, Some(peer)) => {
                self.fail(
                    peer.clone(),
                    Some(OutboundSignal::Reject { to: peer }),
                    FailureReason::Timeout,
                )
                .await;
                true
            }
            _ => false,
        }
    }

    async fn on_incoming(&mut self, from: ParticipantId, offer: SessionDescription) {
        match (self.state(), self.phase.peer().cloned()) {
            (CallState::Idle, _) => {
                info!(from = %from, "Incoming call");
                self.remote_candidates.retain_from(&from);
                self.set_phase(Phase::Ringing {
                    peer: from.clone(),
                    offer,
                });
                self.arm_deadline();
                self.emit(CallEvent::Incoming { from });
            }
            (CallState::RingingIncoming, _) => {
                debug!(from = %from, "Already ringing, invitation ignored");
            }
            (CallState::Connected, Some(peer)) if peer == from => {
                if self.phase.awaiting_answer_from().is_some() && self.keeps_own_offer(&peer) {
                    info!(peer = %peer, "Renegotiation offers crossed, declining the peer's");
                    self.send(OutboundSignal::Reject { to: from });
                } else {
                    self.answer_renegotiation(peer, offer).await;
                }
            }
            (state, _) => {
                // Glare while calling, or a third party while connected
                info!(from = %from, state = %state, "Busy, declining invitation");
                self.send(OutboundSignal::Reject { to: from });
            }
        }
    }

    /// Whether our outstanding renegotiation offer wins over `peer`'s
    fn keeps_own_offer(&self, peer: &ParticipantId) -> bool {
        match &self.local_id {
            Some(local) => local < peer,
            None => true,
        }
    }

    async fn answer_renegotiation(&mut self, peer: ParticipantId, offer: SessionDescription) {
        self.reset().await;

        if let Err(e) = self.set_remote_description(offer).await {
            self.fail(peer.clone(), Some(OutboundSignal::HangUp { to: peer }), e.into())
                .await;
            return;
        }
        let answer = match self.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                self.fail(peer.clone(), Some(OutboundSignal::HangUp { to: peer }), e.into())
                    .await;
                return;
            }
        };

        info!(peer = %peer, generation = self.generation, "Answered renegotiation");
        self.send(OutboundSignal::Answer {
            to: peer.clone(),
            answer,
        });
        self.set_phase(Phase::Connected {
            peer: peer.clone(),
            negotiation: Negotiation::Stable,
        });
        self.flush_candidates(&peer).await;
        self.emit(CallEvent::Renegotiated { peer });
    }

    async fn on_answered(&mut self, from: ParticipantId, answer: SessionDescription) {
        if self.phase.awaiting_answer_from() != Some(&from) {
            debug!(from = %from, state = %self.state(), "Unexpected answer ignored");
            return;
        }
        let renegotiated = self.state() == CallState::Connected;

        if let Err(e) = self.set_remote_description(answer).await {
            self.fail(from.clone(), Some(OutboundSignal::HangUp { to: from }), e.into())
                .await;
            return;
        }

        self.deadline = None;
        self.set_phase(Phase::Connected {
            peer: from.clone(),
            negotiation: Negotiation::Stable,
        });
        self.flush_candidates(&from).await;
        if renegotiated {
            self.emit(CallEvent::Renegotiated { peer: from });
        } else {
            info!(peer = %from, "Call answered");
            self.emit(CallEvent::Connected { peer: from });
        }
    }

    async fn on_rejected(&mut self, from: ParticipantId) {
        match (self.state(), self.phase.awaiting_answer_from().cloned()) {
            (CallState::Calling, Some(peer)) if peer == from => {
                info!(peer = %peer, "Call rejected");
                self.reset().await;
                self.set_phase(Phase::Idle);
                self.emit(CallEvent::Rejected { peer });
            }
            (CallState::Connected, Some(peer)) if peer == from => {
                self.fail(
                    peer.clone(),
                    Some(OutboundSignal::HangUp { to: peer }),
                    FailureReason::RenegotiationRejected,
                )
                .await;
            }
            _ => debug!(from = %from, "Unexpected rejection ignored"),
        }
    }

    async fn on_remote_candidate(&mut self, from: ParticipantId, candidate: NetworkCandidate) {
        if !self.phase.remote_applied() {
            match self.phase.peer() {
                Some(peer) if *peer != from => {
                    debug!(from = %from, "Candidate from outside the call dropped");
                }
                _ => {
                    if !self.remote_candidates.push(from.clone(), candidate) {
                        debug!(from = %from, "Candidate queue full, candidate dropped");
                    }
                }
            }
            return;
        }
        if self.phase.peer() == Some(&from) {
            self.add_remote_candidate(candidate).await;
        } else {
            debug!(from = %from, "Candidate from outside the call dropped");
        }
    }

    async fn on_remote_end(&mut self, from: ParticipantId, reason: EndReason) {
        if self.phase.peer() != Some(&from) {
            debug!(from = %from, ?reason, "End notice for another call ignored");
            return;
        }
        info!(peer = %from, ?reason, "Call ended by peer");
        self.end_call(from, reason).await;
    }

    async fn on_signaling_lost(&mut self) {
        self.remote_candidates.clear();
        if let Some(peer) = self.phase.peer().cloned() {
            self.fail(peer, None, FailureReason::SignalingLost).await;
        }
    }

    /// Tear down the current call and go back to idle on a fresh transport
    async fn end_call(&mut self, peer: ParticipantId, reason: EndReason) {
        if self.state() == CallState::Connected {
            self.set_phase(Phase::Ended { peer: peer.clone() });
        }
        self.reset().await;
        self.set_phase(Phase::Idle);
        self.emit(CallEvent::Ended { peer, reason });
    }

    async fn fail(
        &mut self,
        peer: ParticipantId,
        notify: Option<OutboundSignal>,
        reason: FailureReason,
    ) {
        warn!(peer = %peer, "Call failed: {}", reason);
        self.reset().await;
        if let Some(signal) = notify {
            self.send(signal);
        }
        self.set_phase(Phase::Idle);
        self.emit(CallEvent::Failed { peer, reason });
    }

    /// Close the transport, drop call-scoped buffers and allocate a new
    /// transport generation.
    async fn reset(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.clear_call_state();
        self.generation += 1;
        self.allocate_transport();
    }

    fn clear_call_state(&mut self) {
        self.deadline = None;
        self.remote_candidates.clear();
        self.local_candidates.clear();
    }

    fn allocate_transport(&mut self) {
        let sender = LocalCandidateSender::new(self.generation, self.candidate_tx.clone());
        match self.factory.create(sender) {
            Ok(transport) => self.transport = Some(transport),
            Err(e) => warn!(generation = self.generation, "Transport allocation failed: {}", e),
        }
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn PeerTransport>> {
        if self.transport.is_none() {
            let sender = LocalCandidateSender::new(self.generation, self.candidate_tx.clone());
            self.transport = Some(self.factory.create(sender)?);
        }
        self.transport
            .as_mut()
            .ok_or_else(|| CallError::transport("no transport available"))
    }

    async fn create_offer(&mut self) -> Result<SessionDescription> {
        self.transport_mut()?.create_offer().await
    }

    async fn create_answer(&mut self) -> Result<SessionDescription> {
        self.transport_mut()?.create_answer().await
    }

    async fn set_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        self.transport_mut()?.set_remote_description(description).await
    }

    async fn add_remote_candidate(&mut self, candidate: NetworkCandidate) {
        let result = match self.transport_mut() {
            Ok(transport) => transport.add_remote_candidate(candidate).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to add remote candidate: {}", e);
        }
    }

    /// Apply buffered remote candidates from `peer`, then send buffered local ones
    async fn flush_candidates(&mut self, peer: &ParticipantId) {
        let remote = self.remote_candidates.take_from(peer);
        if !remote.is_empty() {
            debug!(peer = %peer, count = remote.len(), "Applying queued remote candidates");
        }
        for candidate in remote {
            self.add_remote_candidate(candidate).await;
        }

        for candidate in self.local_candidates.drain() {
            self.send(OutboundSignal::Candidate {
                to: peer.clone(),
                candidate,
            });
        }
    }

    fn arm_deadline(&mut self) {
        self.deadline = self.config.ring_timeout.map(|timeout| Instant::now() + timeout);
    }

    fn set_phase(&mut self, phase: Phase) {
        let previous = self.phase.state();
        self.phase = phase;
        let current = self.phase.state();
        if previous != current {
            debug!(%previous, %current, "Call state changed");
            self.emit(CallEvent::StateChanged { previous, current });
        }
    }

    fn send(&self, signal: OutboundSignal) {
        if self.signals.send(signal).is_err() {
            debug!("Signaling channel closed, signal dropped");
        }
    }

    fn emit(&self, event: CallEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}
