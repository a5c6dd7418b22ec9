//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, one span per intent)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → Log aggregation (stderr; stdout carries command output)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging with typed fields (user, address, nonce, tx_hash)
//! - Private keys and raw signed bytes never appear in any field
//! - Metrics are cheap (atomic increments); the exporter is opt-in

pub mod logging;
pub mod metrics;
