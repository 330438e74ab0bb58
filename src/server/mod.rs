//! Server lifecycle and composition.
//!
//! # Data Flow
//! ```text
//! ServerArgs / TlsServerArgs / <Concrete>ServerArgs   (fluent builder tiers)
//!     → finish() → ServerConfig                       (immutable snapshot)
//!     → <Concrete>Server::new                         (owns ServerCore)
//!     → serve()                                       (STOPPED → RUNNING)
//!     → stop() / accept loop exit                     (RUNNING → STOPPED)
//! ```
//!
//! # Design Decisions
//! - The base only stores the snapshot, the serving flag and the handler slot
//! - Concrete servers decide when the flag flips and how stop behaves
//! - TLS intent stays on the builder until the listening socket is opened

pub mod args;
pub mod event;
pub mod session;
pub mod simple;
pub mod ssl;
pub mod threaded;

mod socket;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::net::listener::ListenerError;
use crate::net::tls::TlsError;

pub use args::{ServerArgs, ServerBuilder, ServerConfig};
pub use event::{EventHandlerSlot, ServerContext, ServerEventHandler};
pub use simple::{SimpleServer, SimpleServerArgs};
pub use ssl::{SslSupport, TlsArgs, TlsBuilder, TlsServerArgs};
pub use threaded::{ThreadedServer, ThreadedServerArgs};

/// How long stop waits for in-flight sessions unless configured otherwise.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("no processor factory configured")]
    MissingProcessorFactory,
    #[error("serve() is already running on this server")]
    AlreadyServing,
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// State every server carries: the configuration snapshot, the serving
/// flag and the event handler slot.
#[derive(Debug)]
pub struct ServerCore {
    config: ServerConfig,
    serving: AtomicBool,
    event_handler: EventHandlerSlot,
}

impl ServerCore {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            serving: AtomicBool::new(false),
            event_handler: EventHandlerSlot::default(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Flip the serving flag. Meant for server implementations: `true` once
    /// the accept loop is ready, `false` when it stops accepting.
    pub fn set_serving(&self, serving: bool) {
        self.serving.store(serving, Ordering::Release);
        tracing::debug!(serving, "Serving state changed");
    }

    pub fn set_event_handler(&self, handler: Arc<dyn ServerEventHandler>) {
        self.event_handler.set(handler);
    }

    pub fn event_handler(&self) -> Option<Arc<dyn ServerEventHandler>> {
        self.event_handler.get()
    }
}

/// Contract implemented by every server.
#[async_trait]
pub trait Server: Send + Sync {
    fn core(&self) -> &ServerCore;

    /// Run the server. Resolves when the server has stopped accepting work.
    async fn serve(&self) -> Result<(), ServerError>;

    /// Request a stop. Not every server can be stopped; the default does
    /// nothing. Returning does not imply the server is already stopped.
    fn stop(&self) {}

    fn is_serving(&self) -> bool {
        self.core().is_serving()
    }

    /// Attach the event handler, replacing any previous one.
    fn set_server_event_handler(&self, handler: Arc<dyn ServerEventHandler>) {
        self.core().set_event_handler(handler);
    }

    fn event_handler(&self) -> Option<Arc<dyn ServerEventHandler>> {
        self.core().event_handler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Server that is "ready" as soon as serve() runs and exits when notified.
    struct Manual {
        core: ServerCore,
        exit: Notify,
    }

    #[async_trait]
    impl Server for Manual {
        fn core(&self) -> &ServerCore {
            &self.core
        }

        async fn serve(&self) -> Result<(), ServerError> {
            self.core.set_serving(true);
            self.exit.notified().await;
            self.core.set_serving(false);
            Ok(())
        }
    }

    struct Quiet;
    impl ServerEventHandler for Quiet {}

    fn manual() -> Manual {
        Manual {
            core: ServerCore::new(ServerArgs::new().finish()),
            exit: Notify::new(),
        }
    }

    #[test]
    fn fresh_server_is_stopped() {
        let server = manual();
        assert!(!server.is_serving());
        assert!(server.event_handler().is_none());
    }

    #[test]
    fn default_stop_is_a_no_op() {
        let server = manual();
        server.core().set_serving(true);
        server.stop();
        assert!(server.is_serving());
    }

    #[test]
    fn second_handler_replaces_first() {
        let server = manual();
        let first: Arc<dyn ServerEventHandler> = Arc::new(Quiet);
        let second: Arc<dyn ServerEventHandler> = Arc::new(Quiet);

        server.set_server_event_handler(first.clone());
        server.set_server_event_handler(second.clone());

        let current = server.event_handler().unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert!(!Arc::ptr_eq(&current, &first));
    }

    #[tokio::test]
    async fn flag_visible_across_tasks() {
        let server = Arc::new(manual());
        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move { running.serve().await });

        tokio::time::timeout(Duration::from_secs(2), async {
            while !server.is_serving() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        server.exit.notify_one();
        handle.await.unwrap().unwrap();
        assert!(!server.is_serving());
    }
}
