//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Filter and server produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Spoofing attempts and load failures are both logged and counted
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
