//! Transport-agnostic RPC server library.
//!
//! A server is assembled from a processor, transport factories and protocol
//! factories through a tiered fluent builder, then driven through
//! `serve()` / `stop()`.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod processor;
pub mod protocol;
pub mod server;
pub mod transport;

pub use config::RpcConfig;
pub use lifecycle::Shutdown;
pub use processor::{Processor, ProcessorError, ProcessorFactory, SessionInfo};
pub use protocol::{Message, MessageType};
pub use server::{Server, ServerError, SimpleServer, ThreadedServer};
