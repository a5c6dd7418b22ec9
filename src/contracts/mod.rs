//! Contract addresses, ABIs and amount scaling.
//!
//! # Data Flow
//! ```text
//! [contracts] config section
//!     → book.rs (asset/protocol lookup, decimals, router, headroom)
//!     → abi.rs (compiled-in token, staking and router interfaces)
//! ```
//!
//! # Design Decisions
//! - Identifiers are case-insensitive and trimmed ("Origin Protocol" works)
//! - Every address is parsed once at startup; lookups never fail on format
//! - Logical amounts are decimal strings scaled exactly once

pub mod abi;
pub mod book;

pub use abi::{IStaking, ISwapRouter, IToken};
pub use book::{scale_amount, ContractBook, ProtocolInfo, TokenInfo, TokenRef};
