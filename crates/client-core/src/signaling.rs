//! Client side of the signaling channel
//!
//! A background task owns the WebSocket. It keeps the [`Roster`] current,
//! turns server messages into [`SignalingEvent`]s, and writes outbound
//! coordinator signals to the server. When the connection drops it reports
//! [`InboundSignal::SignalingLost`] and reconnects according to the
//! [`ReconnectPolicy`].

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use peerlink_call_core::{InboundSignal, OutboundSignal};
use peerlink_presence_core::ParticipantId;
use peerlink_signaling_core::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::recovery::ReconnectPolicy;
use crate::roster::Roster;
use crate::translate::{client_message, inbound_signal};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the signaling task reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingEvent {
    /// Connected and assigned an identifier
    Registered { id: ParticipantId },
    /// The roster changed; carries the full current list
    RosterChanged { users: Vec<ParticipantId> },
    /// Something for the call coordinator
    Signal(InboundSignal),
    /// The server refused one of our frames
    ServerError { message: String },
    /// Connection lost; a reconnect follows unless attempts are exhausted
    Disconnected,
    /// Reconnection abandoned after `attempts` consecutive failures
    GaveUp { attempts: u32 },
}

enum Served {
    /// Owner shut us down
    Closed,
    /// Connection dropped
    Lost,
}

/// Handle to the background signaling task
pub struct SignalingClient {
    outbound: mpsc::UnboundedSender<OutboundSignal>,
    roster: Arc<RwLock<Roster>>,
    task: JoinHandle<()>,
}

impl SignalingClient {
    /// Start connecting to `url` in the background.
    ///
    /// The task stops once every clone of [`SignalingClient::outbound`] is
    /// dropped and [`SignalingClient::close`] is called.
    pub fn spawn(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<SignalingEvent>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let roster = Arc::new(RwLock::new(Roster::new()));
        let task = SignalingTask {
            url: url.into(),
            policy,
            outbound: outbound_rx,
            events,
            roster: roster.clone(),
        };
        let task = tokio::spawn(task.run());
        Self {
            outbound: outbound_tx,
            roster,
            task,
        }
    }

    /// Sender for coordinator signals; hand it to the coordinator
    pub fn outbound(&self) -> mpsc::UnboundedSender<OutboundSignal> {
        self.outbound.clone()
    }

    pub fn roster(&self) -> Arc<RwLock<Roster>> {
        self.roster.clone()
    }

    /// Flush queued signals, close the connection and wait for the task.
    pub async fn close(self) {
        drop(self.outbound);
        if let Err(e) = self.task.await {
            error!("Signaling task panicked: {}", e);
        }
    }
}

struct SignalingTask {
    url: String,
    policy: ReconnectPolicy,
    outbound: mpsc::UnboundedReceiver<OutboundSignal>,
    events: mpsc::UnboundedSender<SignalingEvent>,
    roster: Arc<RwLock<Roster>>,
}

impl SignalingTask {
    async fn run(mut self) {
        let mut failures: u32 = 0;
        loop {
            match self.connect().await {
                Ok(ws) => {
                    failures = 0;
                    match self.serve(ws).await {
                        Served::Closed => return,
                        Served::Lost => {
                            warn!(url = %self.url, "Signaling connection lost");
                            self.roster.write().reset();
                            self.emit(SignalingEvent::Signal(InboundSignal::SignalingLost));
                            self.emit(SignalingEvent::Disconnected);
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(attempt = failures, error = %e, "Signaling connect failed");
                    if !self.policy.allows(failures) {
                        error!(attempts = failures, "Giving up on signaling server");
                        self.emit(SignalingEvent::GaveUp { attempts: failures });
                        return;
                    }
                }
            }

            let delay = self.policy.delay_for(failures.max(1));
            debug!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
            if !self.wait(delay).await {
                return;
            }
        }
    }

    async fn connect(&self) -> ClientResult<WsStream> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Connection {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        info!(url = %self.url, "Connected to signaling server");
        Ok(ws)
    }

    /// Sleep for `delay`, dropping signals that cannot be delivered.
    /// Returns `false` if the owner shut down meanwhile.
    async fn wait(&mut self, delay: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                signal = self.outbound.recv() => match signal {
                    Some(signal) => debug!(to = %signal.target(), "Not connected, signal dropped"),
                    None => return false,
                },
            }
        }
    }

    async fn serve(&mut self, ws: WsStream) -> Served {
        let (mut sink, mut stream) = ws.split();
        self.roster.write().reset();

        if !send(&mut sink, &ClientMessage::Join).await {
            return Served::Lost;
        }

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => return Served::Lost,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Signaling read failed: {}", e);
                        return Served::Lost;
                    }
                },
                signal = self.outbound.recv() => match signal {
                    Some(signal) => {
                        if !send(&mut sink, &client_message(signal)).await {
                            return Served::Lost;
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        let _ = sink.close().await;
                        return Served::Closed;
                    }
                },
            }
        }
    }

    fn handle_text(&self, text: &str) {
        let message: ServerMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("{}", ClientError::Protocol(e.to_string()));
                return;
            }
        };

        match &message {
            ServerMessage::Welcome { socket_id } => {
                self.roster.write().apply(&message);
                info!(id = %socket_id, "Registered with signaling server");
                self.emit(SignalingEvent::Registered {
                    id: socket_id.clone(),
                });
            }
            ServerMessage::UpdateUserList { .. } | ServerMessage::RemoveUser { .. } => {
                let users = {
                    let mut roster = self.roster.write();
                    roster.apply(&message);
                    roster.users()
                };
                self.emit(SignalingEvent::RosterChanged { users });
            }
            ServerMessage::Error { message } => {
                warn!("Server rejected a frame: {}", message);
                self.emit(SignalingEvent::ServerError {
                    message: message.clone(),
                });
            }
            _ => {}
        }

        if let Some(signal) = inbound_signal(&message) {
            self.emit(SignalingEvent::Signal(signal));
        }
    }

    fn emit(&self, event: SignalingEvent) {
        if self.events.send(event).is_err() {
            debug!("Signaling event receiver dropped");
        }
    }
}

/// Write one message; `false` if the connection is gone
async fn send<S>(sink: &mut S, message: &ClientMessage) -> bool
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode message: {}", e);
            return true;
        }
    };
    match sink.send(Message::text(text)).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Signaling write failed: {}", e);
            false
        }
    }
}
