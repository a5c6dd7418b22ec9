//! Transaction lifecycle.
//!
//! # Data Flow
//! ```text
//! TransactionIntent (intent.rs)
//!     → builder.rs (resolve contracts, scale amounts, encode calldata)
//!     → pipeline.rs (lane, nonce, gas price, sign, submit, classify)
//! ```
//!
//! # States
//! ```text
//! Built → Signed → Submitted → Confirmed | Failed
//! ```
//! Composite operations (swap, stake) first drive an approval through the
//! same states; a failed approval ends the operation before the dependent
//! call is built.

pub mod builder;
pub mod intent;
pub mod pipeline;

pub use builder::{PreparedCall, TransactionBuilder};
pub use intent::{Operation, OperationKind, TokenRef, TransactionIntent};
pub use pipeline::TransactionPipeline;
