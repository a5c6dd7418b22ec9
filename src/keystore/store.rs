//! The key store service.

use alloy::primitives::Address;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::keystore::key::PrivateKey;
use crate::keystore::registry::{AccountRecord, RegistryFile};
use crate::keystore::{KeystoreError, KeystoreResult};
use crate::observability::metrics;

/// Result of [`KeyStore::create_account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new key was generated and persisted.
    Created(Address),
    /// The user already had a key; nothing was written.
    AlreadyExists(Address),
}

impl CreateOutcome {
    /// Address of the user's account.
    pub fn address(&self) -> Address {
        match self {
            CreateOutcome::Created(address) | CreateOutcome::AlreadyExists(address) => *address,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Generates, persists and retrieves per-user private keys.
///
/// Writes are serialized by a store-wide lock and, across processes and
/// other handles on the same file, by the registry's file lock. Reads
/// proceed concurrently.
#[derive(Debug)]
pub struct KeyStore {
    registry: RegistryFile,
    lock: RwLock<()>,
}

impl KeyStore {
    /// Open the store backed by the registry file at `path`.
    ///
    /// The file is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            registry: RegistryFile::new(path),
            lock: RwLock::new(()),
        }
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        self.registry.path()
    }

    /// Create a key for `user_address` unless one exists.
    ///
    /// Calling this again for the same user is a no-op that reports
    /// [`CreateOutcome::AlreadyExists`]; the stored key never changes.
    pub async fn create_account(&self, user_address: &str) -> KeystoreResult<CreateOutcome> {
        let user_address = normalize_user(user_address)?;
        let _guard = self.lock.write().await;
        let _file_lock = self.registry.lock().await?;

        let mut records = self.registry.load().await?;
        if let Some(existing) = records.iter().find(|r| r.user_address == user_address) {
            let address = decode(existing)?.address();
            tracing::info!(user = %user_address, address = %address, "Wallet already exists");
            return Ok(CreateOutcome::AlreadyExists(address));
        }

        let key = PrivateKey::generate();
        let address = key.address();
        records.push(AccountRecord {
            user_address: user_address.to_string(),
            data: key.to_hex(),
        });
        self.registry.store(&records).await?;

        metrics::record_account_created();
        tracing::info!(user = %user_address, address = %address, "Wallet created");
        Ok(CreateOutcome::Created(address))
    }

    /// Fetch the stored key of `user_address`.
    pub async fn private_key(&self, user_address: &str) -> KeystoreResult<PrivateKey> {
        let user_address = normalize_user(user_address)?;
        let _guard = self.lock.read().await;

        let records = self.registry.load().await?;
        records
            .iter()
            .find(|r| r.user_address == user_address)
            .ok_or_else(|| KeystoreError::AccountNotFound(user_address.to_string()))
            .and_then(decode)
    }

    /// Public address derived from the stored key of `user_address`.
    pub async fn resolve_address(&self, user_address: &str) -> KeystoreResult<Address> {
        Ok(self.private_key(user_address).await?.address())
    }

    /// All registered user identifiers, in creation order.
    pub async fn users(&self) -> KeystoreResult<Vec<String>> {
        let _guard = self.lock.read().await;
        let records = self.registry.load().await?;
        Ok(records.into_iter().map(|r| r.user_address).collect())
    }
}

fn normalize_user(user_address: &str) -> KeystoreResult<&str> {
    let trimmed = user_address.trim();
    if trimmed.is_empty() {
        return Err(KeystoreError::EmptyUserAddress);
    }
    Ok(trimmed)
}

fn decode(record: &AccountRecord) -> KeystoreResult<PrivateKey> {
    PrivateKey::from_hex(&record.data).map_err(|_| KeystoreError::InvalidKey {
        user: record.user_address.clone(),
    })
}
