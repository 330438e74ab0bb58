//! Single-task server: one connection at a time, served on the task that
//! called `serve()`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::net::listener::ListenerError;
use crate::server::args::{ServerArgs, ServerBuilder};
use crate::server::session::{self, SessionParts};
use crate::server::socket::{Opened, SocketState};
use crate::server::ssl::{TlsArgs, TlsBuilder, TlsServerArgs};
use crate::server::{Server, ServerCore, ServerError, DEFAULT_DRAIN_TIMEOUT};

/// Builder for [`SimpleServer`].
#[derive(Clone)]
pub struct SimpleServerArgs {
    pub inner: TlsServerArgs,
    /// Address to bind, e.g. `127.0.0.1:9090`.
    pub bind_address: String,
    /// How long stop waits for the in-flight session before dropping it.
    pub drain_timeout: Duration,
}

impl SimpleServerArgs {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            inner: TlsServerArgs::new(),
            bind_address: bind_address.into(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

impl ServerBuilder for SimpleServerArgs {
    fn server_args(&mut self) -> &mut ServerArgs {
        self.inner.server_args()
    }
}

impl TlsBuilder for SimpleServerArgs {
    fn tls_args(&mut self) -> &mut TlsArgs {
        self.inner.tls_args()
    }
}

/// Serves connections strictly one after another.
///
/// `stop()` is asynchronous: it closes the listener and signals the current
/// session. `serve()` returns once the session has wound down or
/// `drain_timeout` has passed, whichever comes first. A stopped server may
/// be served again.
pub struct SimpleServer {
    core: ServerCore,
    socket: SocketState,
    drain_timeout: Duration,
}

impl SimpleServer {
    pub fn new(args: SimpleServerArgs) -> Self {
        let SimpleServerArgs {
            inner,
            bind_address,
            drain_timeout,
        } = args;
        Self {
            core: ServerCore::new(inner.args.finish()),
            socket: SocketState::new(bind_address, inner.tls),
            drain_timeout,
        }
    }

    /// Bound address while serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr()
    }

    /// 1 while a session is being served, else 0.
    pub fn active_connections(&self) -> u64 {
        self.socket.tracker().active_count()
    }
}

#[async_trait]
impl Server for SimpleServer {
    fn core(&self) -> &ServerCore {
        &self.core
    }

    async fn serve(&self) -> Result<(), ServerError> {
        let _running = self.socket.begin()?;
        let Opened {
            listener,
            acceptor,
            processor_factory,
            serving,
        } = self.socket.open(&self.core, 1).await?;
        let mut signal = self.socket.shutdown().subscribe();
        let mut interrupted = None;

        loop {
            let accepted = tokio::select! {
                _ = signal.recv() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr, permit)) => {
                    let guard = self.socket.tracker().track();
                    let parts = SessionParts {
                        config: self.core.config().clone(),
                        processor_factory: processor_factory.clone(),
                        acceptor: acceptor.clone(),
                        handler: self.core.event_handler(),
                        shutdown: signal.clone(),
                    };
                    let mut in_flight = Box::pin(async move {
                        let _permit = permit;
                        session::handle_connection(stream, peer_addr, guard.id(), parts).await;
                        drop(guard);
                    });

                    tokio::select! {
                        _ = &mut in_flight => {}
                        _ = signal.recv() => {
                            interrupted = Some(in_flight);
                            break;
                        }
                    }
                }
                Err(ListenerError::Closed) => break,
                Err(e) => tracing::warn!(error = %e, "Accept failed"),
            }
        }

        drop(listener);
        drop(serving);

        if let Some(in_flight) = interrupted {
            if tokio::time::timeout(self.drain_timeout, in_flight).await.is_err() {
                tracing::warn!(
                    timeout = ?self.drain_timeout,
                    "Drain timeout elapsed, dropping session"
                );
            }
        }
        Ok(())
    }

    fn stop(&self) {
        tracing::info!("Stop requested");
        self.socket.shutdown().trigger();
    }
}
