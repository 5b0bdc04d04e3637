//! WebSocket endpoint and HTTP routes

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use peerlink_presence_core::{ParticipantId, PresenceRegistry};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::{OriginPolicy, ServerConfig};
use crate::error::{Result, SignalingError};
use crate::protocol::{decode_client_message, ServerMessage};
use crate::relay::{ConnectionHandle, RelayOutcome, SignalingRelay};

#[derive(Clone)]
struct AppState {
    relay: Arc<SignalingRelay>,
    origins: Arc<OriginPolicy>,
    max_message_bytes: usize,
    frame_limit: usize,
}

/// Build the axum router: `/ws` for the signaling channel, `/health` for probes.
pub fn router(relay: Arc<SignalingRelay>, config: &ServerConfig) -> Result<Router> {
    let origins = config.origin_policy()?;
    let cors = origins.cors_layer();

    let state = AppState {
        relay,
        origins: Arc::new(origins),
        max_message_bytes: config.max_message_bytes,
        frame_limit: config.frame_limit(),
    };

    Ok(Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "participants": state.relay.registry().len(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !state.origins.allows(origin) {
        warn!(origin = ?origin, "Rejected connection from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    ws.max_message_size(state.frame_limit)
        .max_frame_size(state.frame_limit)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = ParticipantId::new();
    let (handle, mut outbound) = ConnectionHandle::channel();
    let (mut sink, mut stream) = socket.split();

    // Writer: everything addressed to this participant goes through here
    let writer_id = id.clone();
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(participant = %writer_id, "Failed to encode message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let registry = state.relay.registry().clone();
    handle.send(ServerMessage::Welcome {
        socket_id: id.clone(),
    });
    registry.connect(id.clone(), handle.clone());

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => {
                handle.send(ServerMessage::Error {
                    message: "binary frames are not supported".to_string(),
                });
                continue;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(participant = %id, "Connection read failed: {}", e);
                break;
            }
        };

        match decode_client_message(text.as_str(), state.max_message_bytes) {
            Ok(message) => {
                if state.relay.dispatch(&id, &handle, message) == RelayOutcome::Dropped {
                    debug!(participant = %id, "Message for absent participant dropped");
                }
            }
            Err(e) => {
                warn!(participant = %id, "Rejected frame: {}", e);
                handle.send(ServerMessage::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    registry.disconnect(&id);
}

/// A bound signaling server, ready to run.
pub struct SignalingServer {
    listener: TcpListener,
    app: Router,
    relay: Arc<SignalingRelay>,
    local_addr: SocketAddr,
}

impl SignalingServer {
    /// Validate `config` and bind its listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let relay = Arc::new(SignalingRelay::new(Arc::new(PresenceRegistry::new())));
        let app = router(relay.clone(), &config)?;

        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| SignalingError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            app,
            relay,
            local_addr,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<PresenceRegistry<ConnectionHandle>> {
        self.relay.registry().clone()
    }

    /// Serve until the process is stopped
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then stop accepting connections.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Signaling server listening on {}", self.local_addr);
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Signaling server stopped");
        Ok(())
    }
}
