//! Private key material.

use alloy::primitives::{hex, Address, B256};
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;

/// Key material could not be parsed. Carries no detail about the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid private key material")]
pub struct InvalidKeyMaterial;

/// A validated secp256k1 private key.
///
/// Only the key store and the transaction signer can read the secret.
#[derive(Clone)]
pub struct PrivateKey(PrivateKeySigner);

impl PrivateKey {
    /// Generate a fresh key from the OS random source.
    pub fn generate() -> Self {
        Self(PrivateKeySigner::random())
    }

    /// Parse a hex-encoded key, with or without `0x` prefix.
    pub fn from_hex(key_hex: &str) -> Result<Self, InvalidKeyMaterial> {
        let bytes: B256 = key_hex.trim().parse().map_err(|_| InvalidKeyMaterial)?;
        PrivateKeySigner::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| InvalidKeyMaterial)
    }

    /// Public address derived from the key.
    pub fn address(&self) -> Address {
        self.0.address()
    }

    pub(crate) fn to_hex(&self) -> String {
        hex::encode_prefixed(self.0.to_bytes())
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.0
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for PrivateKey {}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
