//! Custodial key storage.
//!
//! # Data Flow
//! ```text
//! create_account(user)
//!     → store.rs (global write lock, read-modify-write)
//!     → registry.rs (exclusive file lock, unique staging file, fsync, rename)
//!
//! private_key(user) / resolve_address(user)
//!     → store.rs (shared read lock)
//!     → registry.rs (load, missing file = empty registry)
//!     → key.rs (validated secp256k1 key, address derivation)
//! ```
//!
//! # Security Constraints
//! - Keys come from the OS CSPRNG and are never logged
//! - `Debug` output of keys and records is redacted
//! - Registry writes are atomic; readers never observe a partial file
//! - Writers in separate processes are serialized through `<registry>.lock`
//! - On Unix the registry is created with mode 0600

pub mod key;
pub mod registry;
pub mod store;

use thiserror::Error;

pub use key::{InvalidKeyMaterial, PrivateKey};
pub use registry::{AccountRecord, RegistryFile, RegistryLock};
pub use store::{CreateOutcome, KeyStore};

/// Errors from the key store.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// No key registered for the user.
    #[error("No wallet data found for user address: {0}")]
    AccountNotFound(String),

    /// User identifiers must be non-empty.
    #[error("User address must not be empty")]
    EmptyUserAddress,

    /// Reading or writing the registry failed.
    #[error("Registry I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The registry file does not hold a valid record list.
    #[error("Registry file {path} is not valid JSON: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored key could not be decoded.
    #[error("Stored key for user '{user}' is invalid")]
    InvalidKey { user: String },
}

/// Result type for key store operations.
pub type KeystoreResult<T> = Result<T, KeystoreError>;
