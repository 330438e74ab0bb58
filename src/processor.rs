//! Request processing contracts.
//!
//! A processor turns one decoded request into at most one reply. The server
//! never owns processing logic itself, it only asks a [`ProcessorFactory`]
//! for a processor per session.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::net::connection::ConnectionId;
use crate::protocol::Message;

/// Error raised by a processor. Ends the session it occurred on.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },
    #[error("processor failure: {0}")]
    Internal(String),
}

/// Identity of one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    /// Whether the session runs over TLS.
    pub secure: bool,
}

/// Handles one decoded request.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Process `request`. `Ok(None)` means nothing is written back.
    async fn process(&self, request: Message) -> Result<Option<Message>, ProcessorError>;
}

/// Produces the processor used by one session.
pub trait ProcessorFactory: Send + Sync + 'static {
    fn processor(&self, session: &SessionInfo) -> Arc<dyn Processor>;
}

/// Hands the same processor instance to every session.
#[derive(Clone)]
pub struct SingletonProcessorFactory {
    processor: Arc<dyn Processor>,
}

impl SingletonProcessorFactory {
    pub fn new(processor: Arc<dyn Processor>) -> Self {
        Self { processor }
    }

    /// The wrapped processor.
    pub fn inner(&self) -> &Arc<dyn Processor> {
        &self.processor
    }
}

impl ProcessorFactory for SingletonProcessorFactory {
    fn processor(&self, _session: &SessionInfo) -> Arc<dyn Processor> {
        Arc::clone(&self.processor)
    }
}
