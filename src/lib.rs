//! Custodial key management and transaction signing for autonomous agents.
//!
//! # Architecture Overview
//!
//! ```text
//!     Agent request (user id + operation)
//!         │
//!         ▼
//!  ┌──────────────┐     ┌──────────────┐
//!  │    agent     │────▶│   keystore   │  per-user keys, atomic registry
//!  │ AgentWallet  │     └──────────────┘
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐     ┌──────────────┐
//!  │ transactions │────▶│  contracts   │  addresses, ABIs, decimals
//!  │   pipeline   │     └──────────────┘
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐     ┌──────────────┐
//!  │  blockchain  │────▶│  resilience  │  retries with backoff
//!  │ nonce/sign/  │     └──────────────┘
//!  │   submit     │
//!  └──────┬───────┘
//!         ▼
//!     JSON-RPC node
//! ```
//!
//! Cross-cutting: `config` (TOML + env), `observability` (tracing, metrics),
//! `error` (typed failures per layer).

pub mod agent;
pub mod blockchain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod keystore;
pub mod observability;
pub mod resilience;
pub mod transactions;

pub use agent::AgentWallet;
pub use blockchain::{ChainClient, RpcChainClient};
pub use config::CustodyConfig;
pub use error::{ApprovalOutcome, ConfigurationError, WalletError, WalletResult};
pub use keystore::KeyStore;
