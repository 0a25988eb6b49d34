//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! listener, dispatcher, store, lifecycle
//!     → logging.rs (tracing events, text or JSON on stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Service manager journal / log shipper
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached to every request span
//! - Metrics are cheap (atomic increments) and off unless configured

pub mod logging;
pub mod metrics;
