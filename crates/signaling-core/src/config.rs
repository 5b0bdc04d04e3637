//! Configuration for the signaling server

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use axum::http::{HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::{Result, SignalingError};

/// Prefix for environment overrides, e.g. `PEERLINK__PORT=6000`
pub const ENV_PREFIX: &str = "PEERLINK";

/// Frames up to this multiple of `max_message_bytes` get an error reply;
/// larger ones close the connection before they are buffered.
pub const FRAME_LIMIT_FACTOR: usize = 4;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Origins allowed to open the channel; `*` allows any
    pub allowed_origins: Vec<String>,
    /// Largest accepted client frame in bytes
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            allowed_origins: vec!["*".to_string()],
            max_message_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file, then apply `PEERLINK__*` environment overrides.
    ///
    /// Keys missing from both sources keep their defaults. The result is not
    /// validated, so later layers can still fix it; call
    /// [`ServerConfig::validate`] once every override is applied.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Defaults plus `PEERLINK__*` environment overrides, unvalidated
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(Self::environment())
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("allowed_origins")
            .try_parsing(true)
    }

    /// Loopback config on an OS-assigned port, for tests and embedding
    pub fn local() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Largest WebSocket frame or message read at all
    pub fn frame_limit(&self) -> usize {
        self.max_message_bytes.saturating_mul(FRAME_LIMIT_FACTOR)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Check values that deserialization cannot
    pub fn validate(&self) -> Result<()> {
        if self.max_message_bytes == 0 {
            return Err(SignalingError::config("max_message_bytes must be greater than zero"));
        }
        if self.allowed_origins.is_empty() {
            return Err(SignalingError::config(
                "allowed_origins must not be empty (use \"*\" to allow any origin)",
            ));
        }
        self.origin_policy().map(|_| ())
    }

    /// Parse `allowed_origins` into a policy
    pub fn origin_policy(&self) -> Result<OriginPolicy> {
        OriginPolicy::from_list(&self.allowed_origins)
    }
}

/// Which browser origins may open a signaling channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    Any,
    List(Vec<String>),
}

impl OriginPolicy {
    pub fn from_list(origins: &[String]) -> Result<Self> {
        if origins.iter().any(|o| o.trim() == "*") {
            return Ok(OriginPolicy::Any);
        }
        let mut list = Vec::with_capacity(origins.len());
        for origin in origins {
            let origin = origin.trim().trim_end_matches('/');
            if HeaderValue::from_str(origin).is_err() || !origin.contains("://") {
                return Err(SignalingError::config(format!("invalid origin: {:?}", origin)));
            }
            list.push(origin.to_string());
        }
        Ok(OriginPolicy::List(list))
    }

    /// Requests without an `Origin` header come from non-browser clients and
    /// are always allowed.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (OriginPolicy::Any, _) | (_, None) => true,
            (OriginPolicy::List(list), Some(origin)) => {
                let origin = origin.trim_end_matches('/');
                list.iter().any(|allowed| allowed.eq_ignore_ascii_case(origin))
            }
        }
    }

    /// CORS layer for the HTTP routes
    pub fn cors_layer(&self) -> CorsLayer {
        let allow_origin = match self {
            OriginPolicy::Any => AllowOrigin::any(),
            OriginPolicy::List(list) => AllowOrigin::list(
                list.iter()
                    .filter_map(|origin| HeaderValue::from_str(origin).ok())
                    .collect::<Vec<_>>(),
            ),
        };
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET])
            .allow_headers(Any)
    }
}
