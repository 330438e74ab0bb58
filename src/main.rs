//! RPC server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ net::tls (optional) ──▶ server::session
//!                                                            │
//!                          transport (read half) ──▶ protocol::read_message
//!                                                            │
//!                                                   processor::process
//!                                                            │
//!     Client ◀── transport (write half) ◀── protocol::write_message
//! ```
//!
//! Serves an echo processor: every call is answered with its own payload.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;

use rpc_server::config::{self, RpcConfig};
use rpc_server::observability::{logging, metrics};
use rpc_server::protocol::{Message, MessageType};
use rpc_server::{Processor, ProcessorError};

#[derive(Parser)]
#[command(name = "rpc-server")]
#[command(about = "Transport-agnostic RPC server", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

struct EchoProcessor;

#[async_trait]
impl Processor for EchoProcessor {
    async fn process(&self, request: Message) -> Result<Option<Message>, ProcessorError> {
        match request.message_type {
            MessageType::Oneway => Ok(None),
            MessageType::Call => {
                let payload = request.payload.clone();
                Ok(Some(request.reply(payload)))
            }
            other => Err(ProcessorError::InvalidArguments {
                method: request.name,
                reason: format!("unexpected {:?} message", other),
            }),
        }
    }
}

fn load(cli: &Cli) -> Result<RpcConfig, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RpcConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init(&config.observability.log_level);
    tracing::info!("rpc-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        server = ?config.server.kind,
        transport = ?config.transport.kind,
        protocol = ?config.protocol.kind,
        tls = config.tls.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = config::build_server(&config, Arc::new(EchoProcessor));

    let stopper = Arc::clone(&server);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, shutting down");
                stopper.stop();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    server.serve().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
