//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (permit, then accept)
//!     → connection.rs (id + active count)
//!     → tls.rs (optional handshake, built from the TLS builder tier)
//!     → hand off to server::session
//! ```
//!
//! # Design Decisions
//! - Bounded accept: no permit, no accept
//! - TLS is optional and handled before any protocol bytes are read

pub mod connection;
pub mod listener;
pub mod tls;
