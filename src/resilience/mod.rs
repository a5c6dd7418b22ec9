//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Chain call from the pipeline:
//!     → client.rs (per-request timeout, provider failover)
//!     → On transient failure: retries.rs (retry with backoff)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - Only transport failures are retried; node rejections are final
//! - Broadcasts re-send identical signed bytes, so a retry can never
//!   produce a second transaction for the same nonce
//! - Jittered backoff prevents a burst of agents hammering a recovering node

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{retry_transient, RetryPolicy};
