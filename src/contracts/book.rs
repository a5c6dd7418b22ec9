//! Asset and protocol address book.

use alloy::primitives::{Address, U256};
use std::collections::HashMap;

use crate::config::{ContractsConfig, MAX_DECIMALS};
use crate::error::ConfigurationError;

/// How an operation names its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRef {
    /// Configured asset identifier, e.g. `"usdce"`.
    Asset(String),
    /// Token contract address.
    Contract(Address),
}

impl std::fmt::Display for TokenRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenRef::Asset(id) => f.write_str(id),
            TokenRef::Contract(address) => write!(f, "{}", address),
        }
    }
}

/// A resolved token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub decimals: u8,
}

/// A resolved staking contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub address: Address,
    pub pool_index: u64,
}

/// Validated contract configuration.
#[derive(Debug, Clone)]
pub struct ContractBook {
    assets: HashMap<String, TokenInfo>,
    protocols: HashMap<String, ProtocolInfo>,
    swap_router: Address,
    default_decimals: u8,
    approval_headroom: U256,
}

impl ContractBook {
    pub fn from_config(config: &ContractsConfig) -> Result<Self, ConfigurationError> {
        let mut assets = HashMap::with_capacity(config.assets.len());
        for (id, asset) in &config.assets {
            let field = format!("contracts.assets.{}", id);
            assets.insert(
                normalize(id),
                TokenInfo {
                    address: parse_address(&field, &asset.address)?,
                    decimals: asset.decimals,
                },
            );
        }

        let mut protocols = HashMap::with_capacity(config.protocols.len());
        for (id, protocol) in &config.protocols {
            let field = format!("contracts.protocols.{}", id);
            protocols.insert(
                normalize(id),
                ProtocolInfo {
                    address: parse_address(&field, &protocol.address)?,
                    pool_index: protocol.pool_index,
                },
            );
        }

        Ok(Self {
            assets,
            protocols,
            swap_router: parse_address("contracts.swap_router", &config.swap_router)?,
            default_decimals: config.default_decimals,
            approval_headroom: U256::from(config.approval_headroom),
        })
    }

    pub fn asset(&self, id: &str) -> Result<TokenInfo, ConfigurationError> {
        self.assets
            .get(&normalize(id))
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownAsset(id.to_string()))
    }

    /// Resolve a token reference.
    ///
    /// A bare contract address takes the decimals of the configured asset at
    /// that address, or the default decimals if none matches.
    pub fn token(&self, token: &TokenRef) -> Result<TokenInfo, ConfigurationError> {
        match token {
            TokenRef::Asset(id) => self.asset(id),
            TokenRef::Contract(address) => Ok(self
                .assets
                .values()
                .find(|info| info.address == *address)
                .copied()
                .unwrap_or(TokenInfo {
                    address: *address,
                    decimals: self.default_decimals,
                })),
        }
    }

    pub fn protocol(&self, id: &str) -> Result<ProtocolInfo, ConfigurationError> {
        self.protocols
            .get(&normalize(id))
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownProtocol(id.to_string()))
    }

    pub fn swap_router(&self) -> Address {
        self.swap_router
    }

    /// Raw units added to every approval.
    pub fn approval_headroom(&self) -> U256 {
        self.approval_headroom
    }
}

/// Scale a decimal string by `10^decimals`.
///
/// `"5"` with 6 decimals is `5_000_000`; `"1.25"` is `1_250_000`. Negative
/// values, malformed input and more fractional digits than `decimals` are
/// rejected.
pub fn scale_amount(amount: &str, decimals: u8) -> Result<U256, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidAmount {
        amount: amount.to_string(),
        reason,
    };

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty amount".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("amount must not be negative".to_string()));
    }
    if decimals > MAX_DECIMALS {
        return Err(invalid(format!("{} decimals is not supported", decimals)));
    }

    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(invalid("not a decimal number".to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(invalid(format!(
            "more than {} fractional digits",
            decimals
        )));
    }

    let digits = format!("{}{:0<width$}", whole, fraction, width = decimals as usize);
    U256::from_str_radix(&digits, 10).map_err(|e| invalid(e.to_string()))
}

fn normalize(id: &str) -> String {
    id.trim().to_lowercase()
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        })
}
