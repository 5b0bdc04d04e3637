//! Call coordinator behavior against a scripted transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use peerlink_call_core::{
    CallConfig, CallCoordinator, CallError, CallEvent, CallState, EndReason, FailureReason,
    InboundSignal, LocalCandidate, LocalCandidateSender, NetworkCandidate, OutboundSignal,
    PeerTransport, Result, SessionDescription, TransportFactory,
};
use peerlink_presence_core::ParticipantId;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Offer(u64),
    Answer(u64),
    Remote(u64, Value),
    Candidate(u64, Value),
    Close(u64),
}

#[derive(Default)]
struct Failures {
    remote: bool,
    offer: bool,
}

#[derive(Clone, Default)]
struct Shared {
    ops: Arc<Mutex<Vec<Op>>>,
    failures: Arc<Mutex<Failures>>,
    senders: Arc<Mutex<Vec<LocalCandidateSender>>>,
}

struct MockTransport {
    generation: u64,
    shared: Shared,
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn create_offer(&mut self) -> Result<SessionDescription> {
        if self.shared.failures.lock().offer {
            return Err(CallError::transport("no media devices"));
        }
        self.shared.ops.lock().push(Op::Offer(self.generation));
        Ok(SessionDescription::new(json!(format!("offer-{}", self.generation))))
    }

    async fn create_answer(&mut self) -> Result<SessionDescription> {
        self.shared.ops.lock().push(Op::Answer(self.generation));
        Ok(SessionDescription::new(json!(format!("answer-{}", self.generation))))
    }

    async fn set_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        if self.shared.failures.lock().remote {
            return Err(CallError::negotiation("incompatible description"));
        }
        self.shared
            .ops
            .lock()
            .push(Op::Remote(self.generation, description.into_inner()));
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: NetworkCandidate) -> Result<()> {
        self.shared
            .ops
            .lock()
            .push(Op::Candidate(self.generation, candidate.into_inner()));
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.ops.lock().push(Op::Close(self.generation));
    }
}

struct MockFactory(Shared);

impl TransportFactory for MockFactory {
    fn create(&mut self, candidates: LocalCandidateSender) -> Result<Box<dyn PeerTransport>> {
        let generation = candidates.generation();
        self.0.senders.lock().push(candidates);
        Ok(Box::new(MockTransport {
            generation,
            shared: self.0.clone(),
        }))
    }
}

struct Harness {
    coordinator: CallCoordinator,
    signals: mpsc::UnboundedReceiver<OutboundSignal>,
    events: mpsc::UnboundedReceiver<CallEvent>,
    local: mpsc::UnboundedReceiver<LocalCandidate>,
    shared: Shared,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(CallConfig::default())
    }

    fn with_config(config: CallConfig) -> Self {
        let shared = Shared::default();
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (coordinator, local) =
            CallCoordinator::new(config, MockFactory(shared.clone()), signal_tx, event_tx);
        Self {
            coordinator,
            signals,
            events,
            local,
            shared,
        }
    }

    fn signals(&mut self) -> Vec<OutboundSignal> {
        let mut out = Vec::new();
        while let Ok(signal) = self.signals.try_recv() {
            out.push(signal);
        }
        out
    }

    fn events(&mut self) -> Vec<CallEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Events other than state changes
    fn notices(&mut self) -> Vec<CallEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, CallEvent::StateChanged { .. }))
            .collect()
    }

    fn ops(&self) -> Vec<Op> {
        self.shared.ops.lock().clone()
    }

    fn applied_candidates(&self) -> Vec<Value> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Candidate(_, value) => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Emit a local candidate from the transport of `generation`
    fn gather(&mut self, generation: u64, value: Value) {
        let sender = self.shared.senders.lock()[generation as usize].clone();
        assert!(sender.send(NetworkCandidate::new(value)));
        while let Ok(local) = self.local.try_recv() {
            self.coordinator.on_local_candidate(local);
        }
    }

    async fn signal(&mut self, signal: InboundSignal) {
        self.coordinator.handle_signal(signal).await;
    }

    /// Drive to Connected as the callee of `peer`
    async fn connected_as_callee(&mut self, peer: &ParticipantId) {
        self.signal(incoming(peer, "O1")).await;
        self.coordinator.accept().await.unwrap();
        assert_eq!(self.coordinator.state(), CallState::Connected);
        self.signals();
        self.events();
    }

    /// Drive to Connected as the caller of `peer`
    async fn connected_as_caller(&mut self, peer: &ParticipantId) {
        self.coordinator.call(peer.clone()).await.unwrap();
        self.signal(InboundSignal::Answered {
            from: peer.clone(),
            answer: SessionDescription::new(json!("Ans1")),
        })
        .await;
        assert_eq!(self.coordinator.state(), CallState::Connected);
        self.signals();
        self.events();
    }
}

fn id(s: &str) -> ParticipantId {
    ParticipantId::from(s)
}

fn incoming(from: &ParticipantId, offer: &str) -> InboundSignal {
    InboundSignal::Incoming {
        from: from.clone(),
        offer: SessionDescription::new(json!(offer)),
    }
}

fn candidate(from: &ParticipantId, value: Value) -> InboundSignal {
    InboundSignal::Candidate {
        from: from.clone(),
        candidate: NetworkCandidate::new(value),
    }
}

#[tokio::test]
async fn caller_reaches_connected_on_answer() {
    let mut h = Harness::new();
    let b = id("B1");

    h.coordinator.call(b.clone()).await.unwrap();
    assert_eq!(h.coordinator.state(), CallState::Calling);
    assert_eq!(
        h.signals(),
        vec![OutboundSignal::Invite {
            to: b.clone(),
            offer: SessionDescription::new(json!("offer-0")),
        }]
    );

    h.signal(InboundSignal::Answered {
        from: b.clone(),
        answer: SessionDescription::new(json!("Ans1")),
    })
    .await;

    assert_eq!(h.coordinator.state(), CallState::Connected);
    assert_eq!(h.coordinator.peer(), Some(&b));
    assert_eq!(
        h.events(),
        vec![
            CallEvent::StateChanged {
                previous: CallState::Idle,
                current: CallState::Calling,
            },
            CallEvent::StateChanged {
                previous: CallState::Calling,
                current: CallState::Connected,
            },
            CallEvent::Connected { peer: b },
        ]
    );
    assert_eq!(h.ops(), vec![Op::Offer(0), Op::Remote(0, json!("Ans1"))]);
}

#[tokio::test]
async fn early_candidates_are_applied_in_order_after_accept() {
    let mut h = Harness::new();
    let a = id("A1");

    h.signal(incoming(&a, "O1")).await;
    for n in 1..=3 {
        h.signal(candidate(&a, json!(n))).await;
    }
    assert!(h.applied_candidates().is_empty());
    assert_eq!(h.coordinator.queued_remote_candidates(), 3);

    h.coordinator.accept().await.unwrap();

    assert_eq!(
        h.ops(),
        vec![
            Op::Remote(0, json!("O1")),
            Op::Answer(0),
            Op::Candidate(0, json!(1)),
            Op::Candidate(0, json!(2)),
            Op::Candidate(0, json!(3)),
        ]
    );
    assert_eq!(h.coordinator.queued_remote_candidates(), 0);
    assert_eq!(
        h.signals(),
        vec![OutboundSignal::Answer {
            to: a,
            answer: SessionDescription::new(json!("answer-0")),
        }]
    );
}

#[tokio::test]
async fn candidates_arriving_before_the_invitation_are_kept() {
    let mut h = Harness::new();
    let a = id("A1");

    h.signal(candidate(&a, json!("early"))).await;
    h.signal(incoming(&a, "O1")).await;
    h.coordinator.accept().await.unwrap();

    assert_eq!(h.applied_candidates(), vec![json!("early")]);
}

#[tokio::test]
async fn accept_flushes_exactly_the_counterparts_queue() {
    let mut h = Harness::new();
    let a = id("A1");
    let z = id("Z9");

    h.signal(incoming(&a, "O1")).await;
    h.signal(candidate(&a, json!(1))).await;
    h.signal(candidate(&z, json!(99))).await;
    h.signal(candidate(&a, json!(2))).await;

    h.coordinator.accept().await.unwrap();
    assert_eq!(h.applied_candidates(), vec![json!(1), json!(2)]);

    // Once connected, the counterpart's candidates apply immediately
    h.signal(candidate(&a, json!(3))).await;
    h.signal(candidate(&z, json!(100))).await;
    assert_eq!(h.applied_candidates(), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(h.coordinator.queued_remote_candidates(), 0);
}

#[tokio::test]
async fn reject_returns_to_idle_and_forgets_the_invitation() {
    let mut h = Harness::new();
    let a = id("A1");

    h.signal(incoming(&a, "O1")).await;
    h.signal(candidate(&a, json!(1))).await;
    assert_eq!(h.notices(), vec![CallEvent::Incoming { from: a.clone() }]);

    h.coordinator.reject().await.unwrap();

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(h.coordinator.peer(), None);
    assert_eq!(h.coordinator.queued_remote_candidates(), 0);
    assert_eq!(h.coordinator.deadline(), None);
    assert_eq!(h.signals(), vec![OutboundSignal::Reject { to: a }]);
    assert_eq!(
        h.coordinator.accept().await,
        Err(CallError::InvalidState {
            operation: "accept",
            state: CallState::Idle,
        })
    );
}

#[tokio::test]
async fn second_invitation_while_ringing_is_ignored() {
    let mut h = Harness::new();
    let a = id("A1");
    let c = id("C1");

    h.signal(incoming(&a, "O1")).await;
    h.signal(incoming(&c, "O2")).await;

    assert_eq!(h.coordinator.state(), CallState::RingingIncoming);
    assert_eq!(h.coordinator.peer(), Some(&a));
    assert!(h.signals().is_empty());

    h.coordinator.accept().await.unwrap();
    assert_eq!(h.ops()[0], Op::Remote(0, json!("O1")));
}

#[tokio::test]
async fn simultaneous_calls_never_connect_twice() {
    let a_id = id("A1");
    let b_id = id("B1");
    let mut a = Harness::new();
    let mut b = Harness::new();

    a.coordinator.call(b_id.clone()).await.unwrap();
    b.coordinator.call(a_id.clone()).await.unwrap();

    // Each invitation crosses the other in flight
    for signal in a.signals() {
        if let OutboundSignal::Invite { offer, .. } = signal {
            b.signal(InboundSignal::Incoming { from: a_id.clone(), offer }).await;
        }
    }
    for signal in b.signals() {
        if let OutboundSignal::Invite { offer, .. } = signal {
            a.signal(InboundSignal::Incoming { from: b_id.clone(), offer }).await;
        }
    }

    // Both sides decline the crossing invitation
    let from_a = a.signals();
    let from_b = b.signals();
    assert_eq!(from_a, vec![OutboundSignal::Reject { to: b_id.clone() }]);
    assert_eq!(from_b, vec![OutboundSignal::Reject { to: a_id.clone() }]);

    a.signal(InboundSignal::Rejected { from: b_id.clone() }).await;
    b.signal(InboundSignal::Rejected { from: a_id.clone() }).await;

    assert_eq!(a.coordinator.state(), CallState::Idle);
    assert_eq!(b.coordinator.state(), CallState::Idle);
    assert_eq!(a.notices(), vec![CallEvent::Rejected { peer: b_id }]);
    assert_eq!(b.notices(), vec![CallEvent::Rejected { peer: a_id }]);
}

/// Two coordinators in one call, each with its assigned identifier
async fn connected_pair(a_id: &ParticipantId, b_id: &ParticipantId) -> (Harness, Harness) {
    let mut a = Harness::new();
    let mut b = Harness::new();
    a.coordinator.set_local_id(a_id.clone());
    b.coordinator.set_local_id(b_id.clone());
    a.connected_as_caller(b_id).await;
    b.connected_as_callee(a_id).await;
    (a, b)
}

/// Deliver every signal `from` has sent to `to`
async fn relay(from: &mut Harness, from_id: &ParticipantId, to: &mut Harness) {
    for signal in from.signals() {
        let inbound = match signal {
            OutboundSignal::Invite { offer, .. } => InboundSignal::Incoming { from: from_id.clone(), offer },
            OutboundSignal::Answer { answer, .. } => InboundSignal::Answered { from: from_id.clone(), answer },
            OutboundSignal::Reject { .. } => InboundSignal::Rejected { from: from_id.clone() },
            OutboundSignal::Candidate { candidate, .. } => InboundSignal::Candidate { from: from_id.clone(), candidate },
            OutboundSignal::HangUp { .. } => InboundSignal::Ended { from: from_id.clone() },
        };
        to.signal(inbound).await;
    }
}

#[tokio::test]
async fn crossing_renegotiations_settle_on_the_lower_id_offer() {
    let a_id = id("A1");
    let b_id = id("B1");
    let (mut a, mut b) = connected_pair(&a_id, &b_id).await;

    a.coordinator.renegotiate().await.unwrap();
    b.coordinator.renegotiate().await.unwrap();

    // Both offers are in flight before either side sees the other's
    let from_a = a.signals();
    let from_b = b.signals();
    for signal in from_a {
        if let OutboundSignal::Invite { offer, .. } = signal {
            b.signal(InboundSignal::Incoming { from: a_id.clone(), offer }).await;
        }
    }
    for signal in from_b {
        if let OutboundSignal::Invite { offer, .. } = signal {
            a.signal(InboundSignal::Incoming { from: b_id.clone(), offer }).await;
        }
    }

    // A keeps its offer and declines B's; B drops its own and answers A's
    assert_eq!(a.signals(), vec![OutboundSignal::Reject { to: b_id.clone() }]);
    let from_b = b.signals();
    assert_eq!(
        from_b,
        vec![OutboundSignal::Answer {
            to: a_id.clone(),
            answer: SessionDescription::new(json!("answer-2")),
        }]
    );

    for signal in from_b {
        if let OutboundSignal::Answer { answer, .. } = signal {
            a.signal(InboundSignal::Answered { from: b_id.clone(), answer }).await;
        }
    }
    b.signal(InboundSignal::Rejected { from: a_id.clone() }).await;

    assert_eq!(a.coordinator.state(), CallState::Connected);
    assert_eq!(b.coordinator.state(), CallState::Connected);

    // A's live transport carries the offer B answered, and vice versa
    assert_eq!(a.coordinator.generation(), 1);
    assert_eq!(a.ops().last(), Some(&Op::Remote(1, json!("answer-2"))));
    let b_ops = b.ops();
    assert_eq!(
        &b_ops[b_ops.len() - 2..],
        &[Op::Remote(2, json!("offer-1")), Op::Answer(2)]
    );

    assert_eq!(a.notices(), vec![CallEvent::Renegotiated { peer: b_id }]);
    assert_eq!(b.notices(), vec![CallEvent::Renegotiated { peer: a_id }]);
    assert!(b.signals().is_empty());
}

#[tokio::test]
async fn crossing_renegotiations_without_ids_fail_on_both_sides() {
    let a_id = id("A1");
    let b_id = id("B1");
    let mut a = Harness::new();
    let mut b = Harness::new();
    a.connected_as_caller(&b_id).await;
    b.connected_as_callee(&a_id).await;

    a.coordinator.renegotiate().await.unwrap();
    b.coordinator.renegotiate().await.unwrap();
    let from_a = a.signals();
    let from_b = b.signals();
    for signal in from_a {
        if let OutboundSignal::Invite { offer, .. } = signal {
            b.signal(InboundSignal::Incoming { from: a_id.clone(), offer }).await;
        }
    }
    for signal in from_b {
        if let OutboundSignal::Invite { offer, .. } = signal {
            a.signal(InboundSignal::Incoming { from: b_id.clone(), offer }).await;
        }
    }

    // Each declines the other's offer, so each sees its own rejected
    relay(&mut a, &a_id, &mut b).await;
    relay(&mut b, &b_id, &mut a).await;
    relay(&mut a, &a_id, &mut b).await;

    assert_eq!(a.coordinator.state(), CallState::Idle);
    assert_eq!(b.coordinator.state(), CallState::Idle);
    assert_eq!(
        a.notices(),
        vec![CallEvent::Failed { peer: b_id, reason: FailureReason::RenegotiationRejected }]
    );
    assert_eq!(
        b.notices(),
        vec![CallEvent::Failed { peer: a_id, reason: FailureReason::RenegotiationRejected }]
    );
}

#[tokio::test]
async fn stranger_candidates_cannot_grow_an_idle_buffer() {
    let mut h = Harness::with_config(CallConfig::default().with_max_queued_candidates(8));
    let a = id("A1");
    let z = id("Z9");

    for n in 0..10_000 {
        h.signal(candidate(&z, json!(n))).await;
    }
    assert_eq!(h.coordinator.queued_remote_candidates(), 8);

    h.signal(candidate(&a, json!("early"))).await;
    h.signal(incoming(&a, "O1")).await;
    assert_eq!(h.coordinator.queued_remote_candidates(), 1);

    h.signal(candidate(&z, json!("late"))).await;
    assert_eq!(h.coordinator.queued_remote_candidates(), 1);

    h.coordinator.accept().await.unwrap();
    assert_eq!(h.applied_candidates(), vec![json!("early")]);
}

#[tokio::test]
async fn only_the_callee_may_queue_candidates_while_calling() {
    let mut h = Harness::new();
    let b = id("B1");
    let z = id("Z9");

    h.coordinator.call(b.clone()).await.unwrap();
    h.signal(candidate(&z, json!("stranger"))).await;
    h.signal(candidate(&b, json!("b1"))).await;
    assert_eq!(h.coordinator.queued_remote_candidates(), 1);

    h.signal(InboundSignal::Answered {
        from: b,
        answer: SessionDescription::new(json!("Ans1")),
    })
    .await;
    assert_eq!(h.applied_candidates(), vec![json!("b1")]);
}

#[tokio::test]
async fn third_party_invitation_while_connected_is_declined() {
    let mut h = Harness::new();
    let a = id("A1");
    let c = id("C1");
    h.connected_as_callee(&a).await;

    h.signal(incoming(&c, "O9")).await;

    assert_eq!(h.coordinator.state(), CallState::Connected);
    assert_eq!(h.coordinator.peer(), Some(&a));
    assert_eq!(h.signals(), vec![OutboundSignal::Reject { to: c }]);
}

#[tokio::test]
async fn busy_call_is_refused() {
    let mut h = Harness::new();
    h.coordinator.call(id("B1")).await.unwrap();

    let err = h.coordinator.call(id("C1")).await.unwrap_err();

    assert_eq!(
        err,
        CallError::Busy {
            state: CallState::Calling,
            peer: id("B1"),
        }
    );
}

#[tokio::test]
async fn peer_leaving_mid_call_ends_it_once() {
    let mut h = Harness::new();
    let a = id("A1");
    h.connected_as_callee(&a).await;
    let generation = h.coordinator.generation();

    h.signal(InboundSignal::PeerLeft { peer: a.clone() }).await;
    h.signal(InboundSignal::Ended { from: a.clone() }).await;

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(
        h.events(),
        vec![
            CallEvent::StateChanged {
                previous: CallState::Connected,
                current: CallState::Ended,
            },
            CallEvent::StateChanged {
                previous: CallState::Ended,
                current: CallState::Idle,
            },
            CallEvent::Ended {
                peer: a,
                reason: EndReason::PeerLeft,
            },
        ]
    );
    assert!(h.ops().contains(&Op::Close(generation)));
    assert_eq!(h.coordinator.generation(), generation + 1);
    assert!(h.signals().is_empty());
}

#[tokio::test]
async fn unrelated_departure_is_ignored() {
    let mut h = Harness::new();
    let a = id("A1");
    h.connected_as_callee(&a).await;

    h.signal(InboundSignal::PeerLeft { peer: id("C1") }).await;

    assert_eq!(h.coordinator.state(), CallState::Connected);
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn caller_cancelling_stops_the_ringing() {
    let mut h = Harness::new();
    let a = id("A1");
    h.signal(incoming(&a, "O1")).await;
    h.events();

    h.signal(InboundSignal::Ended { from: a.clone() }).await;

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(
        h.notices(),
        vec![CallEvent::Ended {
            peer: a,
            reason: EndReason::RemoteHangUp,
        }]
    );
}

#[tokio::test]
async fn hang_up_tears_down_and_notifies_the_peer() {
    let mut h = Harness::new();
    let b = id("B1");
    h.connected_as_caller(&b).await;

    h.coordinator.hang_up().await.unwrap();

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(h.signals(), vec![OutboundSignal::HangUp { to: b.clone() }]);
    assert_eq!(
        h.notices(),
        vec![CallEvent::Ended {
            peer: b,
            reason: EndReason::LocalHangUp,
        }]
    );
    assert!(h.ops().contains(&Op::Close(0)));

    // Idle hang-up is a no-op
    h.coordinator.hang_up().await.unwrap();
    assert!(h.signals().is_empty());
}

#[tokio::test]
async fn bad_description_fails_the_call_and_releases_the_transport() {
    let mut h = Harness::new();
    let a = id("A1");
    h.signal(incoming(&a, "garbage")).await;
    h.events();
    h.shared.failures.lock().remote = true;

    h.coordinator.accept().await.unwrap();

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(h.signals(), vec![OutboundSignal::Reject { to: a.clone() }]);
    assert!(h.ops().contains(&Op::Close(0)));
    assert_eq!(
        h.notices(),
        vec![CallEvent::Failed {
            peer: a,
            reason: FailureReason::Negotiation("incompatible description".to_string()),
        }]
    );
}

#[tokio::test]
async fn bad_answer_hangs_up_on_the_callee() {
    let mut h = Harness::new();
    let b = id("B1");
    h.coordinator.call(b.clone()).await.unwrap();
    h.signals();
    h.shared.failures.lock().remote = true;

    h.signal(InboundSignal::Answered {
        from: b.clone(),
        answer: SessionDescription::new(json!("bad")),
    })
    .await;

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(h.signals(), vec![OutboundSignal::HangUp { to: b }]);
}

#[tokio::test]
async fn offer_failure_sends_nothing() {
    let mut h = Harness::new();
    h.shared.failures.lock().offer = true;

    h.coordinator.call(id("B1")).await.unwrap();

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert!(h.signals().is_empty());
    assert!(matches!(
        h.notices().as_slice(),
        [CallEvent::Failed { reason: FailureReason::Transport(_), .. }]
    ));
}

#[tokio::test]
async fn local_candidates_wait_for_the_answer() {
    let mut h = Harness::new();
    let b = id("B1");
    h.coordinator.call(b.clone()).await.unwrap();
    h.signals();

    h.gather(0, json!("l1"));
    h.gather(0, json!("l2"));
    assert_eq!(h.coordinator.queued_local_candidates(), 2);
    assert!(h.signals().is_empty());

    h.signal(InboundSignal::Answered {
        from: b.clone(),
        answer: SessionDescription::new(json!("Ans1")),
    })
    .await;

    assert_eq!(
        h.signals(),
        vec![
            OutboundSignal::Candidate {
                to: b.clone(),
                candidate: NetworkCandidate::new(json!("l1")),
            },
            OutboundSignal::Candidate {
                to: b.clone(),
                candidate: NetworkCandidate::new(json!("l2")),
            },
        ]
    );

    h.gather(0, json!("l3"));
    assert_eq!(
        h.signals(),
        vec![OutboundSignal::Candidate {
            to: b,
            candidate: NetworkCandidate::new(json!("l3")),
        }]
    );
}

#[tokio::test]
async fn renegotiation_keeps_the_call_connected() {
    let mut h = Harness::new();
    let b = id("B1");
    h.connected_as_caller(&b).await;

    h.coordinator.renegotiate().await.unwrap();

    assert_eq!(h.coordinator.state(), CallState::Connected);
    assert_eq!(h.coordinator.generation(), 1);
    assert_eq!(
        h.signals(),
        vec![OutboundSignal::Invite {
            to: b.clone(),
            offer: SessionDescription::new(json!("offer-1")),
        }]
    );
    assert!(h.events().is_empty());

    // Old-generation candidates are stale; remote ones wait for the answer
    h.gather(0, json!("stale"));
    h.signal(candidate(&b, json!("r1"))).await;
    assert_eq!(h.coordinator.queued_local_candidates(), 0);
    assert_eq!(h.coordinator.queued_remote_candidates(), 1);

    h.signal(InboundSignal::Answered {
        from: b.clone(),
        answer: SessionDescription::new(json!("Ans2")),
    })
    .await;

    let ops = h.ops();
    assert!(ops.contains(&Op::Close(0)));
    assert_eq!(
        &ops[ops.len() - 2..],
        &[Op::Remote(1, json!("Ans2")), Op::Candidate(1, json!("r1"))]
    );
    assert_eq!(h.notices(), vec![CallEvent::Renegotiated { peer: b }]);
}

#[tokio::test]
async fn peer_renegotiation_is_answered_in_place() {
    let mut h = Harness::new();
    let a = id("A1");
    h.connected_as_callee(&a).await;

    h.signal(incoming(&a, "O2")).await;

    assert_eq!(h.coordinator.state(), CallState::Connected);
    assert_eq!(
        h.signals(),
        vec![OutboundSignal::Answer {
            to: a.clone(),
            answer: SessionDescription::new(json!("answer-1")),
        }]
    );
    assert_eq!(h.notices(), vec![CallEvent::Renegotiated { peer: a }]);
}

#[tokio::test]
async fn signaling_loss_fails_the_call() {
    let mut h = Harness::new();
    let b = id("B1");
    h.connected_as_caller(&b).await;

    h.signal(InboundSignal::SignalingLost).await;

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert!(h.signals().is_empty());
    assert_eq!(
        h.notices(),
        vec![CallEvent::Failed {
            peer: b,
            reason: FailureReason::SignalingLost,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn unanswered_call_times_out() {
    let mut h = Harness::with_config(CallConfig::default().with_ring_timeout(Some(Duration::from_secs(5))));
    let b = id("B1");
    h.coordinator.call(b.clone()).await.unwrap();
    h.signals();
    h.events();

    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(!h.coordinator.expire(Instant::now()).await);
    assert_eq!(h.coordinator.state(), CallState::Calling);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(h.coordinator.expire(Instant::now()).await);

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(h.signals(), vec![OutboundSignal::HangUp { to: b.clone() }]);
    assert_eq!(
        h.notices(),
        vec![CallEvent::Failed {
            peer: b,
            reason: FailureReason::Timeout,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn undecided_invitation_times_out() {
    let mut h = Harness::with_config(CallConfig::default().with_ring_timeout(Some(Duration::from_secs(5))));
    let a = id("A1");
    h.signal(incoming(&a, "O1")).await;
    h.events();

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(h.coordinator.expire(Instant::now()).await);

    assert_eq!(h.coordinator.state(), CallState::Idle);
    assert_eq!(h.signals(), vec![OutboundSignal::Reject { to: a }]);
}

#[tokio::test]
async fn no_deadline_without_ring_timeout() {
    let mut h = Harness::with_config(CallConfig::default().with_ring_timeout(None));
    h.coordinator.call(id("B1")).await.unwrap();
    assert_eq!(h.coordinator.deadline(), None);
}
