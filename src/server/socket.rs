//! Listening-socket plumbing shared by the TCP servers.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_rustls::TlsAcceptor;

use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::Listener;
use crate::net::tls::TlsSettings;
use crate::processor::ProcessorFactory;
use crate::server::ssl::TlsArgs;
use crate::server::{ServerCore, ServerError};

pub(crate) struct SocketState {
    bind_address: String,
    tls: TlsArgs,
    serve_lock: tokio::sync::Mutex<()>,
    shutdown: Shutdown,
    local_addr: Mutex<Option<SocketAddr>>,
    tracker: ConnectionTracker,
}

impl SocketState {
    pub(crate) fn new(bind_address: String, tls: TlsArgs) -> Self {
        Self {
            bind_address,
            tls,
            serve_lock: tokio::sync::Mutex::new(()),
            shutdown: Shutdown::new(),
            local_addr: Mutex::new(None),
            tracker: ConnectionTracker::new(),
        }
    }

    pub(crate) fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub(crate) fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_local_addr(&self, addr: Option<SocketAddr>) {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = addr;
    }

    /// Claim the right to run serve(). Fails while another serve() runs.
    pub(crate) fn begin(&self) -> Result<ServeGuard<'_>, ServerError> {
        let lock = self
            .serve_lock
            .try_lock()
            .map_err(|_| ServerError::AlreadyServing)?;
        Ok(ServeGuard {
            _lock: lock,
            shutdown: &self.shutdown,
        })
    }

    /// Resolve the processor factory, apply TLS, bind, then mark the server
    /// as serving.
    pub(crate) async fn open<'a>(
        &'a self,
        core: &'a ServerCore,
        max_connections: usize,
    ) -> Result<Opened<'a>, ServerError> {
        let processor_factory = core
            .config()
            .processor_factory()
            .cloned()
            .ok_or(ServerError::MissingProcessorFactory)?;

        let mut tls = TlsSettings::default();
        self.tls.configure_ssl(&mut tls);
        let acceptor = tls.acceptor()?;

        let listener = Listener::bind(&self.bind_address, max_connections).await?;
        let local_addr = listener.local_addr()?;
        self.set_local_addr(Some(local_addr));

        if let Some(handler) = core.event_handler() {
            handler.pre_serve();
        }
        core.set_serving(true);

        tracing::info!(
            address = %local_addr,
            tls = acceptor.is_some(),
            client_auth = tls.client_auth_required,
            "Server ready"
        );

        Ok(Opened {
            listener,
            acceptor,
            processor_factory,
            serving: ServingGuard { core, socket: self },
        })
    }
}

/// Held for the whole of serve(). Re-arms the stop signal when released.
pub(crate) struct ServeGuard<'a> {
    _lock: tokio::sync::MutexGuard<'a, ()>,
    shutdown: &'a Shutdown,
}

impl Drop for ServeGuard<'_> {
    fn drop(&mut self) {
        self.shutdown.reset();
    }
}

/// Marks the server stopped when dropped.
pub(crate) struct ServingGuard<'a> {
    core: &'a ServerCore,
    socket: &'a SocketState,
}

impl Drop for ServingGuard<'_> {
    fn drop(&mut self) {
        self.core.set_serving(false);
        self.socket.set_local_addr(None);
        tracing::info!("Server stopped accepting");
    }
}

/// A bound listener ready to accept. Fields drop in order, so the socket
/// is closed before the serving flag is cleared.
pub(crate) struct Opened<'a> {
    pub(crate) listener: Listener,
    pub(crate) acceptor: Option<TlsAcceptor>,
    pub(crate) processor_factory: Arc<dyn ProcessorFactory>,
    pub(crate) serving: ServingGuard<'a>,
}
