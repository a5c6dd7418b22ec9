//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Built transaction
//!     → nonce.rs (per-account lane, sequential nonce)
//!     → signer.rs (EIP-155 legacy signing with the account's key)
//!     → submitter.rs (broadcast, receipt wait, outcome classification)
//!     → client.rs (JSON-RPC with timeouts and failover)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or raw signed bytes
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the chain is unreachable

pub mod client;
pub mod nonce;
pub mod signer;
pub mod submitter;
pub mod types;

pub use client::{ChainClient, RpcChainClient};
pub use nonce::{AccountLane, NonceSequencer};
pub use signer::{SigningError, TransactionSigner};
pub use submitter::Submitter;
pub use types::{
    ChainError, ChainId, ChainResult, SignedTransaction, SubmissionError, TxReceipt,
    UnsignedTransaction,
};
