//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Servers and sessions produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every session log line carries its connection id
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
