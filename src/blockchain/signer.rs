//! Transaction signing.
//!
//! # Security
//! - The signer borrows key material from the key store and never exposes it
//! - Keys and signed raw bytes are never logged or serialized
//! - Signing is pure: the same transaction and key yield the same bytes

use alloy::consensus::{SignableTransaction, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes};
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;

use crate::blockchain::types::{SignedTransaction, UnsignedTransaction};
use crate::keystore::PrivateKey;

/// Signing failures.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Key material could not be loaded.
    #[error("Signer key unavailable: {0}")]
    Key(String),

    /// The signature could not be produced.
    #[error("Signing failed: {0}")]
    Signature(String),
}

/// Signs transactions for a single account.
#[derive(Clone)]
pub struct TransactionSigner {
    signer: PrivateKeySigner,
    address: Address,
}

impl TransactionSigner {
    /// Signer for a key held by the key store.
    pub fn new(key: &PrivateKey) -> Self {
        Self {
            signer: key.signer().clone(),
            address: key.address(),
        }
    }

    /// Signer for a hex-encoded key (with or without 0x prefix).
    ///
    /// The private key is parsed and stored securely. It is never logged.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, SigningError> {
        let key = PrivateKey::from_hex(private_key_hex)
            .map_err(|e| SigningError::Key(e.to_string()))?;
        Ok(Self::new(&key))
    }

    /// Load a signer from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, SigningError> {
        let private_key = std::env::var(var)
            .map_err(|_| SigningError::Key(format!("Environment variable {} not set", var)))?;
        Self::from_hex(&private_key)
    }

    /// The signing account's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a legacy EIP-155 transaction.
    pub fn sign(&self, unsigned: UnsignedTransaction) -> Result<SignedTransaction, SigningError> {
        let nonce = unsigned.nonce();
        let mut tx = unsigned.into_inner();

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| SigningError::Signature(e.to_string()))?;

        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let envelope = TxEnvelope::Legacy(signed);
        let raw = Bytes::from(envelope.encoded_2718());

        Ok(SignedTransaction::new(hash, self.address, nonce, raw))
    }
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
