//! Agent-facing wallet operations.
//!
//! [`AgentWallet`] ties the key store to the transaction pipeline: every
//! call names a user, the user's key signs, and the result is a `0x` hash
//! string or a typed [`WalletError`](crate::error::WalletError).

pub mod wallet;

pub use wallet::AgentWallet;
