//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → CustodyConfig (validated, immutable)
//!     → handed by reference to each component at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; contract addresses never change mid-flight
//! - All fields have defaults to allow minimal configs
//! - Secrets stay out of the file; only the name of the env var holding them is configured

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AssetConfig, ChainConfig, ContractsConfig, CustodyConfig, FundingConfig, KeystoreConfig,
    ObservabilityConfig, ProtocolConfig, RetryConfig,
};
pub use validation::{validate_config, ValidationError, MAX_DECIMALS};
