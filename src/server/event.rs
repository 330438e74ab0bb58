//! Server event hooks.

use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};

use crate::processor::SessionInfo;

/// Per-session state created by an event handler.
pub type ServerContext = Box<dyn Any + Send + Sync>;

/// Receives lifecycle and connection notifications from a server.
///
/// Every method defaults to doing nothing.
pub trait ServerEventHandler: Send + Sync + 'static {
    /// The server is bound and about to accept connections.
    fn pre_serve(&self) {}

    /// A client connected. The returned context is passed to the other
    /// callbacks of the same session.
    fn create_context(&self, _session: &SessionInfo) -> Option<ServerContext> {
        None
    }

    /// A request was read and is about to be dispatched.
    fn process_context(&self, _context: Option<&ServerContext>, _session: &SessionInfo) {}

    /// The session ended, for any reason.
    fn delete_context(&self, _context: Option<ServerContext>, _session: &SessionInfo) {}
}

/// Single-slot handler storage. Last write wins; a replaced handler is not
/// told about it.
#[derive(Default)]
pub struct EventHandlerSlot {
    handler: RwLock<Option<Arc<dyn ServerEventHandler>>>,
}

impl EventHandlerSlot {
    pub fn set(&self, handler: Arc<dyn ServerEventHandler>) {
        let mut slot = self.handler.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(handler);
    }

    pub fn get(&self) -> Option<Arc<dyn ServerEventHandler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for EventHandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlerSlot")
            .field("attached", &self.get().is_some())
            .finish()
    }
}
