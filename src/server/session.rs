//! Per-connection request loop.
//!
//! # Data Flow
//! ```text
//! TcpStream
//!     → optional TLS handshake
//!     → split: read half → input transport → input protocol
//!              write half → output transport → output protocol
//!     → create_context
//!     → loop { read → process_context → processor → write + flush }
//!     → delete_context
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::processor::{Processor, ProcessorError, ProcessorFactory, SessionInfo};
use crate::protocol::{InputProtocol, OutputProtocol, ProtocolError};
use crate::server::event::{ServerContext, ServerEventHandler};
use crate::server::ServerConfig;

/// Error that ended a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl SessionError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Handshake(_) => "handshake",
            SessionError::Protocol(_) => "protocol",
            SessionError::Processor(_) => "processor",
        }
    }
}

/// Everything a session needs besides the socket.
#[derive(Clone)]
pub(crate) struct SessionParts {
    pub(crate) config: ServerConfig,
    pub(crate) processor_factory: Arc<dyn ProcessorFactory>,
    pub(crate) acceptor: Option<TlsAcceptor>,
    pub(crate) handler: Option<Arc<dyn ServerEventHandler>>,
    pub(crate) shutdown: ShutdownSignal,
}

/// Serve one accepted connection until the peer leaves, an error occurs or
/// shutdown is signalled.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: ConnectionId,
    parts: SessionParts,
) {
    let SessionParts {
        config,
        processor_factory,
        acceptor,
        handler,
        mut shutdown,
    } = parts;

    let info = SessionInfo {
        id,
        peer_addr,
        secure: acceptor.is_some(),
    };
    metrics::record_connection_opened(info.secure);
    tracing::debug!(connection_id = %id, peer_addr = %peer_addr, secure = info.secure, "Session started");

    let result = match acceptor {
        Some(acceptor) => {
            let handshake = tokio::select! {
                _ = shutdown.recv() => None,
                accepted = acceptor.accept(stream) => Some(accepted),
            };
            match handshake {
                None => Ok(()),
                Some(Ok(tls_stream)) => {
                    drive(tls_stream, &info, &config, &processor_factory, handler.as_ref(), shutdown).await
                }
                Some(Err(e)) => Err(SessionError::Handshake(e)),
            }
        }
        None => drive(stream, &info, &config, &processor_factory, handler.as_ref(), shutdown).await,
    };

    match result {
        Ok(()) => tracing::debug!(connection_id = %id, "Session finished"),
        Err(e) => {
            metrics::record_session_error(e.kind());
            tracing::warn!(connection_id = %id, peer_addr = %peer_addr, error = %e, "Session ended with error");
        }
    }
}

async fn drive<S>(
    stream: S,
    info: &SessionInfo,
    config: &ServerConfig,
    processor_factory: &Arc<dyn ProcessorFactory>,
    handler: Option<&Arc<dyn ServerEventHandler>>,
    mut shutdown: ShutdownSignal,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let input_transport = config.input_transport_factory().wrap_reader(Box::new(read_half));
    let output_transport = config.output_transport_factory().wrap_writer(Box::new(write_half));
    let mut input = config.input_protocol_factory().input_protocol(input_transport);
    let mut output = config.output_protocol_factory().output_protocol(output_transport);

    let processor = processor_factory.processor(info);
    let context = ContextGuard {
        handler,
        context: handler.and_then(|h| h.create_context(info)),
        info,
    };

    exchange(
        input.as_mut(),
        output.as_mut(),
        processor.as_ref(),
        handler,
        context.context.as_ref(),
        info,
        &mut shutdown,
    )
    .await
}

/// Hands the session context back to the handler when the session ends,
/// including when the session future is dropped mid-request.
struct ContextGuard<'a> {
    handler: Option<&'a Arc<dyn ServerEventHandler>>,
    context: Option<ServerContext>,
    info: &'a SessionInfo,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(handler) = self.handler {
            handler.delete_context(self.context.take(), self.info);
        }
    }
}

async fn exchange(
    input: &mut dyn InputProtocol,
    output: &mut dyn OutputProtocol,
    processor: &dyn Processor,
    handler: Option<&Arc<dyn ServerEventHandler>>,
    context: Option<&ServerContext>,
    info: &SessionInfo,
    shutdown: &mut ShutdownSignal,
) -> Result<(), SessionError> {
    loop {
        let read = tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!(connection_id = %info.id, "Session interrupted by shutdown");
                return Ok(());
            }
            read = input.read_message() => read?,
        };
        let Some(request) = read else {
            return Ok(());
        };

        if let Some(handler) = handler {
            handler.process_context(context, info);
        }

        let method = request.name.clone();
        let started = Instant::now();
        let reply = processor.process(request).await?;
        metrics::record_message(&method, started);

        if let Some(reply) = reply {
            output.write_message(&reply).await?;
            output.flush().await?;
        }
    }
}
