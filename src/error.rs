//! Error types surfaced by the custody core.

use thiserror::Error;

use crate::blockchain::{ChainError, SigningError, SubmissionError};
use crate::keystore::KeystoreError;

/// Invalid request or configuration; never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Invalid address for {field}: '{value}'")]
    InvalidAddress { field: String, value: String },

    #[error("Gas limit {requested} exceeds the configured ceiling of {ceiling}")]
    GasLimitExceeded { requested: u64, ceiling: u64 },
}

/// Result of the approval step of a composite operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The approval confirmed; the dependent call may proceed.
    Approved { tx_hash: String },
    /// The approval did not confirm.
    Failed { reason: String },
}

/// Errors returned by wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// No key is registered for the user; create a wallet first.
    #[error("No wallet data found for user address: {0}")]
    AccountNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The approval a composite operation depends on did not confirm.
    /// The dependent transaction was never built.
    #[error("Approval for {step} failed: {reason}")]
    ApprovalFailed { step: String, reason: String },

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Registry persistence failed.
    #[error("Key registry error: {0}")]
    RegistryIo(String),

    #[error(transparent)]
    Signing(#[from] SigningError),

    /// A chain call needed before signing failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Treasury key missing or unusable.
    #[error("Funding unavailable: {0}")]
    Funding(String),

    /// Network gas price is above the configured cap.
    #[error("Gas price {current_gwei} gwei exceeds the maximum of {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u128, max_gwei: u64 },
}

impl From<KeystoreError> for WalletError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::AccountNotFound(user) => WalletError::AccountNotFound(user),
            other => WalletError::RegistryIo(other.to_string()),
        }
    }
}

impl WalletError {
    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletError::AccountNotFound(_) => "account_not_found",
            WalletError::Configuration(_) => "configuration",
            WalletError::ApprovalFailed { .. } => "approval_failed",
            WalletError::Submission(e) => e.as_str(),
            WalletError::RegistryIo(_) => "registry_io",
            WalletError::Signing(_) => "signing",
            WalletError::Chain(_) => "rpc_unavailable",
            WalletError::Funding(_) => "funding",
            WalletError::GasPriceTooHigh { .. } => "gas_price_too_high",
        }
    }
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
