//! Client configuration

use peerlink_call_core::CallConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::recovery::ReconnectPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the signaling endpoint
    pub server_url: String,
    pub reconnect: ReconnectPolicy,
    pub call: CallConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:5000/ws".to_string(),
            reconnect: ReconnectPolicy::default(),
            call: CallConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_call(mut self, call: CallConfig) -> Self {
        self.call = call;
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ClientError::invalid_config(
                "server_url",
                format!("expected a ws:// or wss:// URL, got {:?}", self.server_url),
            ));
        }
        if self.reconnect.backoff_multiplier < 1.0 {
            return Err(ClientError::invalid_config(
                "reconnect.backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        Ok(())
    }
}
