//! Call agent: one task that owns a coordinator and its signaling connection
//!
//! User commands, relayed signals, local candidates and the ring timer all
//! funnel into a single `select!` loop, so the coordinator never sees two
//! things at once.

use std::sync::Arc;

use parking_lot::RwLock;
use peerlink_call_core::{CallCoordinator, CallEvent, CallState, LocalCandidate, TransportFactory};
use peerlink_presence_core::ParticipantId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::roster::Roster;
use crate::signaling::{SignalingClient, SignalingEvent};

/// Everything the application hears from a running agent
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Connected and assigned `id` (again, after a reconnect)
    Registered { id: ParticipantId },
    /// Full current list of other participants
    RosterChanged { users: Vec<ParticipantId> },
    /// Lost the signaling connection; reconnecting
    Disconnected,
    /// Stopped reconnecting
    GaveUp { attempts: u32 },
    /// The server refused one of our frames
    ServerError { message: String },
    /// Call lifecycle
    Call(CallEvent),
}

type Reply = oneshot::Sender<ClientResult<()>>;

enum Command {
    Call { peer: ParticipantId, reply: Reply },
    Accept { reply: Reply },
    Reject { reply: Reply },
    HangUp { reply: Reply },
    Renegotiate { reply: Reply },
    State { reply: oneshot::Sender<CallState> },
    Shutdown,
}

/// Cloneable API to a running [`CallAgent`]
#[derive(Clone)]
pub struct CallAgentHandle {
    commands: mpsc::UnboundedSender<Command>,
    roster: Arc<RwLock<Roster>>,
    task: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,
}

impl CallAgentHandle {
    /// Invite `peer`
    pub async fn call(&self, peer: ParticipantId) -> ClientResult<()> {
        self.request(|reply| Command::Call { peer, reply }).await
    }

    /// Accept the ringing invitation
    pub async fn accept(&self) -> ClientResult<()> {
        self.request(|reply| Command::Accept { reply }).await
    }

    /// Decline the ringing invitation
    pub async fn reject(&self) -> ClientResult<()> {
        self.request(|reply| Command::Reject { reply }).await
    }

    /// End, cancel or decline the current call
    pub async fn hang_up(&self) -> ClientResult<()> {
        self.request(|reply| Command::HangUp { reply }).await
    }

    /// Rebuild the transport (e.g. after a device change) and renegotiate
    pub async fn renegotiate(&self) -> ClientResult<()> {
        self.request(|reply| Command::Renegotiate { reply }).await
    }

    pub async fn state(&self) -> ClientResult<CallState> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::State { reply })
            .map_err(|_| ClientError::AgentStopped)?;
        rx.await.map_err(|_| ClientError::AgentStopped)
    }

    /// Our identifier on the current connection
    pub fn local_id(&self) -> Option<ParticipantId> {
        self.roster.read().local_id().cloned()
    }

    /// Other participants currently known
    pub fn users(&self) -> Vec<ParticipantId> {
        self.roster.read().users()
    }

    /// Hang up any call, close the connection and wait for the agent to stop.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Call agent panicked: {}", e);
            }
        }
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> ClientResult<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| ClientError::AgentStopped)?;
        rx.await.map_err(|_| ClientError::AgentStopped)?
    }
}

/// Owns a [`CallCoordinator`] and a [`SignalingClient`]
pub struct CallAgent {
    coordinator: CallCoordinator,
    signaling: SignalingClient,
    commands: mpsc::UnboundedReceiver<Command>,
    signaling_events: mpsc::UnboundedReceiver<SignalingEvent>,
    call_events: mpsc::UnboundedReceiver<CallEvent>,
    local_candidates: mpsc::UnboundedReceiver<LocalCandidate>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl CallAgent {
    /// Connect to the server in `config` and start the agent task.
    pub fn spawn(
        config: ClientConfig,
        factory: impl TransportFactory + 'static,
    ) -> ClientResult<(CallAgentHandle, mpsc::UnboundedReceiver<ClientEvent>)> {
        config.validate()?;

        let (signaling_tx, signaling_events) = mpsc::unbounded_channel();
        let signaling = SignalingClient::spawn(
            config.server_url.clone(),
            config.reconnect.clone(),
            signaling_tx,
        );

        let (call_tx, call_events) = mpsc::unbounded_channel();
        let (coordinator, local_candidates) =
            CallCoordinator::new(config.call.clone(), factory, signaling.outbound(), call_tx);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let roster = signaling.roster();

        let agent = CallAgent {
            coordinator,
            signaling,
            commands,
            signaling_events,
            call_events,
            local_candidates,
            events: events_tx,
        };
        let task = tokio::spawn(agent.run());

        let handle = CallAgentHandle {
            commands: commands_tx,
            roster,
            task: Arc::new(parking_lot::Mutex::new(Some(task))),
        };
        Ok((handle, events_rx))
    }

    async fn run(mut self) {
        info!("Call agent started");
        loop {
            let deadline = self.coordinator.deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.signaling_events.recv() => self.handle_signaling(event).await,
                Some(local) = self.local_candidates.recv() => self.coordinator.on_local_candidate(local),
                Some(event) = self.call_events.recv() => self.emit(ClientEvent::Call(event)),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.coordinator.expire(Instant::now()).await;
                }
            }
        }

        if let Err(e) = self.coordinator.hang_up().await {
            debug!("Hang-up on shutdown failed: {}", e);
        }
        let CallAgent {
            coordinator,
            signaling,
            mut call_events,
            events,
            ..
        } = self;
        // The coordinator holds a sender into the signaling queue
        drop(coordinator);
        signaling.close().await;
        while let Ok(event) = call_events.try_recv() {
            let _ = events.send(ClientEvent::Call(event));
        }
        info!("Call agent stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Call { peer, reply } => {
                let _ = reply.send(self.coordinator.call(peer).await.map_err(Into::into));
            }
            Command::Accept { reply } => {
                let _ = reply.send(self.coordinator.accept().await.map_err(Into::into));
            }
            Command::Reject { reply } => {
                let _ = reply.send(self.coordinator.reject().await.map_err(Into::into));
            }
            Command::HangUp { reply } => {
                let _ = reply.send(self.coordinator.hang_up().await.map_err(Into::into));
            }
            Command::Renegotiate { reply } => {
                let _ = reply.send(self.coordinator.renegotiate().await.map_err(Into::into));
            }
            Command::State { reply } => {
                let _ = reply.send(self.coordinator.state());
            }
            Command::Shutdown => {}
        }
    }

    async fn handle_signaling(&mut self, event: SignalingEvent) {
        match event {
            SignalingEvent::Signal(signal) => self.coordinator.handle_signal(signal).await,
            SignalingEvent::Registered { id } => {
                self.coordinator.set_local_id(id.clone());
                self.emit(ClientEvent::Registered { id });
            }
            SignalingEvent::RosterChanged { users } => self.emit(ClientEvent::RosterChanged { users }),
            SignalingEvent::ServerError { message } => self.emit(ClientEvent::ServerError { message }),
            SignalingEvent::Disconnected => self.emit(ClientEvent::Disconnected),
            SignalingEvent::GaveUp { attempts } => self.emit(ClientEvent::GaveUp { attempts }),
        }
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("Client event receiver dropped");
        }
    }
}
