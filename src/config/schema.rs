//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the custody
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the custody service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CustodyConfig {
    /// Account registry location.
    pub keystore: KeystoreConfig,

    /// Chain connectivity and fixed transaction parameters.
    pub chain: ChainConfig,

    /// Token, staking and router contract addresses.
    pub contracts: ContractsConfig,

    /// Treasury account used to fund new wallets.
    pub funding: FundingConfig,

    /// Retry configuration for transient RPC failures.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Account registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Path to the JSON account registry.
    pub path: String,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/wallet.json".to_string(),
        }
    }
}

/// Chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID used for EIP-155 replay protection.
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Maximum time to wait for a receipt before a transaction counts as dropped.
    pub receipt_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Gas limit ceiling applied to every transaction.
    pub gas_limit: u64,

    /// Gas price multiplier (1.0 = node quote, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum quoted gas price in gwei (protection against spikes); 0 disables the cap.
    pub max_gas_price_gwei: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 57054, // Sonic Blaze testnet
            rpc_timeout_secs: 10,
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 1000,
            gas_limit: 1_000_000,
            gas_price_multiplier: 1.0,
            max_gas_price_gwei: 500,
        }
    }
}

/// A token contract and the decimal precision its amounts are scaled by.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetConfig {
    /// Token contract address.
    pub address: String,

    /// Number of decimals of the token.
    pub decimals: u8,
}

/// A staking protocol contract.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Staking contract address.
    pub address: String,

    /// Pool passed as the first argument of `stake`.
    #[serde(default)]
    pub pool_index: u64,
}

/// Contract address book.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Asset identifier -> token contract.
    pub assets: BTreeMap<String, AssetConfig>,

    /// Protocol identifier -> staking contract.
    pub protocols: BTreeMap<String, ProtocolConfig>,

    /// Swap router contract address.
    pub swap_router: String,

    /// Decimals assumed for token contracts referenced by address only.
    pub default_decimals: u8,

    /// Raw units granted on top of the scaled amount by approvals.
    pub approval_headroom: u64,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        // The deployed testnet mocks all use 6 decimals.
        let assets = [
            ("s", "0xC42F6EBD1499c8099cbdde8f108c870fD7Baffa4"),
            ("os", "0xa99027852475c77bC3C340DB883e11632A5A172f"),
            ("ws", "0x09E49F7dB7369B5D36273f96Da18347968889134"),
            ("usdce", "0x038310f0F5971A025Ff40c0B0BDbC751965dCD72"),
            ("lbtc", "0xf7b6e1d2fE5C493b1A22e3E93A4c4DE2f1a9b85E"),
        ]
        .into_iter()
        .map(|(id, address)| {
            (
                id.to_string(),
                AssetConfig {
                    address: address.to_string(),
                    decimals: 6,
                },
            )
        })
        .collect();

        let protocols = [
            ("silov2", "0xC8d619C991066233DC281564Ba8d076e785328CB"),
            ("origin protocol", "0xaC60B68dDc47938b4e27b0bBf8b3bb46Afa2619c"),
            ("eulerv2", "0xB5B9a84B4cEc5381D2F56cB3c05253E9bf060d72"),
            ("spectrav2", "0xd7256AeD9e1e04fD9dC5D6eAa38297C8A19C7EF8"),
            ("lombard finance", "0x6604Cdd55C119361B6890Bd7e9523e0772e0DC49"),
        ]
        .into_iter()
        .map(|(id, address)| {
            (
                id.to_string(),
                ProtocolConfig {
                    address: address.to_string(),
                    pool_index: 0,
                },
            )
        })
        .collect();

        Self {
            assets,
            protocols,
            swap_router: "0x0b561A287588675AccE2f190FFa2AdCb30145e01".to_string(),
            default_decimals: 6,
            approval_headroom: 10,
        }
    }
}

/// Treasury funding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FundingConfig {
    /// Environment variable holding the treasury private key.
    pub admin_key_env: String,

    /// Native amount sent to a funded wallet, in ether.
    pub amount_ether: String,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            admin_key_env: "CUSTODY_ADMIN_PRIVATE_KEY".to_string(),
            amount_ether: "0.5".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
