//! Task-per-connection server.
//!
//! # Responsibilities
//! - Accept connections up to `max_connections` live sessions
//! - Run each session on its own tokio task
//! - On stop: close the listener, signal sessions, drain with a deadline
//!
//! # Design Decisions
//! - The connection permit is acquired before accept (backpressure)
//! - The serving flag drops as soon as the listener closes, before draining
//! - Sessions still running after `drain_timeout` are aborted

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::net::listener::ListenerError;
use crate::server::args::{ServerArgs, ServerBuilder};
use crate::server::session::{self, SessionParts};
use crate::server::socket::{Opened, SocketState};
use crate::server::ssl::{TlsArgs, TlsBuilder, TlsServerArgs};
use crate::server::{Server, ServerCore, ServerError, DEFAULT_DRAIN_TIMEOUT};

pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Builder for [`ThreadedServer`].
#[derive(Clone)]
pub struct ThreadedServerArgs {
    pub inner: TlsServerArgs,
    pub bind_address: String,
    /// Upper bound on concurrently served connections.
    pub max_connections: usize,
    /// How long stop waits for live sessions before aborting them.
    pub drain_timeout: Duration,
}

impl ThreadedServerArgs {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            inner: TlsServerArgs::new(),
            bind_address: bind_address.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Cap on live sessions. Values below 1 are raised to 1, since a
    /// listener without permits could never accept.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

impl ServerBuilder for ThreadedServerArgs {
    fn server_args(&mut self) -> &mut ServerArgs {
        self.inner.server_args()
    }
}

impl TlsBuilder for ThreadedServerArgs {
    fn tls_args(&mut self) -> &mut TlsArgs {
        self.inner.tls_args()
    }
}

/// Serves each connection on its own task.
///
/// `stop()` is asynchronous; `serve()` returns after draining. A stopped
/// server may be served again.
pub struct ThreadedServer {
    core: ServerCore,
    socket: SocketState,
    max_connections: usize,
    drain_timeout: Duration,
}

impl ThreadedServer {
    pub fn new(args: ThreadedServerArgs) -> Self {
        let ThreadedServerArgs {
            inner,
            bind_address,
            max_connections,
            drain_timeout,
        } = args;
        Self {
            core: ServerCore::new(inner.args.finish()),
            socket: SocketState::new(bind_address, inner.tls),
            max_connections: max_connections.max(1),
            drain_timeout,
        }
    }

    /// Bound address while serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr()
    }

    /// Number of sessions currently being served.
    pub fn active_connections(&self) -> u64 {
        self.socket.tracker().active_count()
    }

    async fn drain(&self, sessions: &mut JoinSet<()>) {
        if sessions.is_empty() {
            return;
        }
        tracing::info!(active = sessions.len(), "Draining sessions");

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(joined) = sessions.join_next().await {
                log_join(joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = sessions.len(),
                timeout = ?self.drain_timeout,
                "Drain timeout elapsed, aborting sessions"
            );
            sessions.shutdown().await;
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "Session task panicked");
        }
    }
}

#[async_trait]
impl Server for ThreadedServer {
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
        } = self.socket.open(&self.core, self.max_connections).await?;
        let mut signal = self.socket.shutdown().subscribe();
        let mut sessions = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                _ = signal.recv() => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    log_join(joined);
                    continue;
                }
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
                    sessions.spawn(async move {
                        let _permit = permit;
                        session::handle_connection(stream, peer_addr, guard.id(), parts).await;
                        drop(guard);
                    });
                }
                Err(ListenerError::Closed) => break,
                Err(e) => tracing::warn!(error = %e, "Accept failed"),
            }
        }

        drop(listener);
        drop(serving);
        self.drain(&mut sessions).await;
        Ok(())
    }

    fn stop(&self) {
        tracing::info!("Stop requested");
        self.socket.shutdown().trigger();
    }
}
