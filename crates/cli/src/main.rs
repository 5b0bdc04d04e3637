//! peerlink signaling server launcher
//!
//! Configuration is layered: built-in defaults, then the optional TOML file,
//! then `PEERLINK__*` environment variables, then command-line flags.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use peerlink_infra_common::logging::{log_welcome, setup_logging, LoggingConfig};
use peerlink_signaling_core::{ServerConfig, SignalingServer};
use tracing::{error, info};

const APP_NAME: &str = "peerlink-server";

#[derive(Parser, Debug)]
#[command(name = "peerlink-server")]
#[command(version, about = "Presence and call-signaling relay for peer-to-peer calls")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PEERLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Origin allowed to open a channel; repeat for several, `*` for any
    #[arg(long = "allowed-origin", value_name = "ORIGIN")]
    allowed_origins: Vec<String>,

    /// Largest accepted client frame in bytes
    #[arg(long)]
    max_message_bytes: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PEERLINK_LOG", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::from_env().context("reading environment")?,
        };

        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if !self.allowed_origins.is_empty() {
            config.allowed_origins = self.allowed_origins.clone();
        }
        if let Some(max) = self.max_message_bytes {
            config.max_message_bytes = max;
        }

        config.validate()?;
        Ok(config)
    }

    fn logging_config(&self) -> LoggingConfig {
        let logging = LoggingConfig::new(self.log_level.clone(), APP_NAME);
        if self.json_logs {
            logging.with_json()
        } else {
            logging
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_logging(args.logging_config())?;
    log_welcome(APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = args.server_config()?;
    info!(
        origins = ?config.allowed_origins,
        max_message_bytes = config.max_message_bytes,
        "Configuration loaded"
    );

    let server = SignalingServer::bind(config).await?;
    println!("peerlink signaling server listening on ws://{}/ws", server.local_addr());

    server.run_until(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
