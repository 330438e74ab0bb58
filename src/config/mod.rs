//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RpcConfig (validated, immutable)
//!     → configure() onto a builder → server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

use std::sync::Arc;

use crate::processor::Processor;
use crate::server::{
    Server, ServerBuilder, SimpleServer, SimpleServerArgs, ThreadedServer, ThreadedServerArgs,
    TlsBuilder,
};

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ListenerConfig, ObservabilityConfig, ProtocolConfig, ProtocolKind, RpcConfig, ServeConfig,
    ServerKind, TlsConfig, TransportConfig, TransportKind,
};
pub use validation::{validate_config, ValidationError};

/// Apply transport, protocol and TLS settings to a builder.
pub fn configure<B>(builder: B, config: &RpcConfig) -> B
where
    B: ServerBuilder + TlsBuilder,
{
    let tls = &config.tls;
    let mut builder = builder
        .transport_factory(config.transport.factory())
        .protocol_factory(config.protocol.factory())
        .ssl(tls.enabled)
        .client_auth_required(tls.client_auth_required);

    if let Some(path) = &tls.key_store_path {
        builder = builder.key_store_path(path.clone());
    }
    if let Some(password) = &tls.key_store_password {
        builder = builder.key_store_password(password.clone());
    }
    if let Some(path) = &tls.trust_store_path {
        builder = builder.trust_store_path(path.clone());
    }
    if let Some(password) = &tls.trust_store_password {
        builder = builder.trust_store_password(password.clone());
    }
    builder
}

/// Build the configured server kind around `processor`.
pub fn build_server(config: &RpcConfig, processor: Arc<dyn Processor>) -> Arc<dyn Server> {
    let bind_address = config.listener.bind_address.clone();
    match config.server.kind {
        ServerKind::Simple => {
            let args = configure(SimpleServerArgs::new(bind_address), config)
                .processor(processor)
                .drain_timeout(config.server.drain_timeout());
            Arc::new(SimpleServer::new(args))
        }
        ServerKind::Threaded => {
            let args = configure(ThreadedServerArgs::new(bind_address), config)
                .processor(processor)
                .max_connections(config.listener.max_connections)
                .drain_timeout(config.server.drain_timeout());
            Arc::new(ThreadedServer::new(args))
        }
    }
}
