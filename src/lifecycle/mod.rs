//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! serve():
//!     Bind listener → pre_serve → mark RUNNING → accept loop
//!
//! stop():
//!     Trigger shutdown → accept loop exits → sessions drain → mark STOPPED
//! ```
//!
//! # Design Decisions
//! - The stop signal is level-triggered so an early stop is never lost
//! - The signal is re-armed when serve() returns, allowing a restart

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
