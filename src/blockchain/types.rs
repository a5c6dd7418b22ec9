//! Chain-specific types and error definitions.

use alloy::consensus::TxLegacy;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use thiserror::Error;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors returned by a [`ChainClient`](crate::blockchain::ChainClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Transport-level failure; the node may never have seen the request.
    #[error("RPC unavailable: {0}")]
    Unavailable(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with an error (e.g. underpriced, nonce too low).
    #[error("Node rejected request: {0}")]
    Rejected(String),

    /// Invalid RPC endpoint.
    #[error("Invalid RPC URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl ChainError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Unavailable(_) | ChainError::Timeout(_))
    }
}

/// Result type for chain client calls.
pub type ChainResult<T> = Result<T, ChainError>;

/// Confirmation data for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was mined in.
    pub block_number: Option<u64>,
    /// Execution status; false means reverted.
    pub success: bool,
    /// Gas consumed.
    pub gas_used: u64,
    /// Price paid per unit of gas, in wei.
    pub effective_gas_price: u128,
}

impl TxReceipt {
    /// `0x`-prefixed transaction hash.
    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.tx_hash)
    }

    /// Total fee paid in wei.
    pub fn fee(&self) -> u128 {
        self.gas_used as u128 * self.effective_gas_price
    }
}

/// A fully parameterised, not yet signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    tx: TxLegacy,
}

impl UnsignedTransaction {
    pub fn new(tx: TxLegacy) -> Self {
        Self { tx }
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.tx.chain_id
    }

    pub fn gas_limit(&self) -> u64 {
        self.tx.gas_limit
    }

    pub fn gas_price(&self) -> u128 {
        self.tx.gas_price
    }

    /// Call target; `None` for contract creation.
    pub fn to(&self) -> Option<Address> {
        match self.tx.to {
            TxKind::Call(to) => Some(to),
            TxKind::Create => None,
        }
    }

    pub fn value(&self) -> U256 {
        self.tx.value
    }

    /// ABI-encoded calldata.
    pub fn input(&self) -> &Bytes {
        &self.tx.input
    }

    pub(crate) fn into_inner(self) -> TxLegacy {
        self.tx
    }
}

/// A signed transaction ready for broadcast.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Transaction hash.
    pub hash: TxHash,
    /// Signing account.
    pub from: Address,
    /// Nonce the transaction consumes.
    pub nonce: u64,
    raw: Bytes,
}

impl SignedTransaction {
    pub(crate) fn new(hash: TxHash, from: Address, nonce: u64, raw: Bytes) -> Self {
        Self {
            hash,
            from,
            nonce,
            raw,
        }
    }

    /// EIP-2718 encoded bytes for `eth_sendRawTransaction`.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

// Raw bytes stay out of logs.
impl std::fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("hash", &self.hash)
            .field("from", &self.from)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

/// Classified failure of a broadcast-and-confirm attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// Never mined within the receipt timeout. The same nonce may be reused
    /// with a higher gas price once the account's nonce is reconciled.
    #[error("Transaction {tx_hash:#x} not mined within {timeout_secs} seconds")]
    Dropped { tx_hash: TxHash, timeout_secs: u64 },

    /// Mined, but execution failed. Not retryable with the same parameters.
    #[error("Transaction {tx_hash:#x} reverted")]
    Reverted {
        tx_hash: TxHash,
        block_number: Option<u64>,
    },

    /// Transient node or network failure.
    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    /// The node refused the transaction (underpriced, bad nonce, no funds).
    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

impl SubmissionError {
    /// Only transport failures may be retried without touching the nonce.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionError::RpcUnavailable(_))
    }

    /// Whether the account's cached nonce must be re-read from chain.
    pub fn requires_nonce_reconciliation(&self) -> bool {
        !matches!(self, SubmissionError::Reverted { .. })
    }

    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionError::Dropped { .. } => "dropped",
            SubmissionError::Reverted { .. } => "reverted",
            SubmissionError::RpcUnavailable(_) => "rpc_unavailable",
            SubmissionError::Rejected(_) => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(57054u64);
        assert_eq!(chain_id.0, 57054);
        assert_eq!(u64::from(chain_id), 57054);
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = SubmissionError::Dropped {
            tx_hash: TxHash::ZERO,
            timeout_secs: 120,
        };
        assert!(err.to_string().contains("0x0000"));
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn test_classification() {
        assert!(ChainError::Unavailable("eof".into()).is_transient());
        assert!(!ChainError::Rejected("nonce too low".into()).is_transient());

        let reverted = SubmissionError::Reverted {
            tx_hash: TxHash::ZERO,
            block_number: Some(7),
        };
        assert!(!reverted.is_retryable());
        assert!(!reverted.requires_nonce_reconciliation());
        assert!(SubmissionError::RpcUnavailable("down".into()).is_retryable());
        assert!(SubmissionError::Rejected("underpriced".into()).requires_nonce_reconciliation());
    }

    #[test]
    fn test_receipt_fee() {
        let receipt = TxReceipt {
            tx_hash: TxHash::ZERO,
            block_number: Some(1),
            success: true,
            gas_used: 21_000,
            effective_gas_price: 2_000_000_000,
        };
        assert_eq!(receipt.fee(), 42_000_000_000_000);
        assert_eq!(receipt.hash_hex().len(), 66);
    }
}
