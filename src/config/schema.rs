//! Configuration schema definitions.
//!
//! Every section and field has a default so a minimal (even empty) file is
//! valid. All types derive Serde traits for deserialization from TOML.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::{
    BinaryProtocolFactory, JsonProtocolFactory, ProtocolFactory, DEFAULT_MAX_MESSAGE_SIZE,
};
use crate::transport::{
    BufferedTransportFactory, PassthroughTransportFactory, TransportFactory, DEFAULT_BUFFER_SIZE,
};

/// Root configuration for the RPC server binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    /// Bind address and connection limit.
    pub listener: ListenerConfig,

    /// Which server implementation runs and how it stops.
    pub server: ServeConfig,

    pub transport: TransportConfig,

    pub protocol: ProtocolConfig,

    /// TLS intent handed to the builder's TLS tier.
    pub tls: TlsConfig,

    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    pub bind_address: String,

    /// Maximum concurrent connections (threaded server only).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9090".to_string(),
            max_connections: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Simple,
    #[default]
    Threaded,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServeConfig {
    pub kind: ServerKind,

    /// Seconds stop() waits for live sessions before aborting them.
    pub drain_timeout_secs: u64,
}

impl ServeConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            kind: ServerKind::default(),
            drain_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Passthrough,
    Buffered,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,

    /// Buffer capacity in bytes for the buffered transport.
    pub buffer_size: usize,
}

impl TransportConfig {
    /// Factory applied to both directions of every connection.
    pub fn factory(&self) -> Arc<dyn TransportFactory> {
        match self.kind {
            TransportKind::Passthrough => Arc::new(PassthroughTransportFactory),
            TransportKind::Buffered => Arc::new(BufferedTransportFactory::new(self.buffer_size)),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[default]
    Binary,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProtocolConfig {
    pub kind: ProtocolKind,

    /// Reject unversioned binary messages.
    pub strict_read: bool,

    /// Write the versioned binary header.
    pub strict_write: bool,

    /// Largest accepted message body (or JSON line) in bytes.
    pub max_message_size: usize,
}

impl ProtocolConfig {
    pub fn factory(&self) -> Arc<dyn ProtocolFactory> {
        match self.kind {
            ProtocolKind::Binary => Arc::new(
                BinaryProtocolFactory::new(self.strict_read, self.strict_write)
                    .with_max_message_size(self.max_message_size),
            ),
            ProtocolKind::Json => {
                Arc::new(JsonProtocolFactory::new().with_max_message_size(self.max_message_size))
            }
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            kind: ProtocolKind::default(),
            strict_read: false,
            strict_write: true,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// TLS configuration. Credentials are not checked until the server opens
/// its socket.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,

    /// PEM file with the certificate chain and private key.
    pub key_store_path: Option<PathBuf>,

    pub key_store_password: Option<String>,

    /// PEM file with CA certificates for client verification.
    pub trust_store_path: Option<PathBuf>,

    pub trust_store_password: Option<String>,

    pub client_auth_required: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9000".to_string(),
        }
    }
}
