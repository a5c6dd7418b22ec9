//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every configured contract address parses
//! - Validate value ranges (timeouts > 0, gas limit > 0, decimals bounded)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CustodyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::fmt;

use crate::config::schema::CustodyConfig;

/// Largest decimal precision accepted for a token.
pub const MAX_DECIMALS: u8 = 36;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CustodyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let chain = &config.chain;
    if chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("chain.rpc_url", "not a valid URL"));
    }
    for (i, url) in chain.failover_urls.iter().enumerate() {
        if url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                format!("chain.failover_urls[{}]", i),
                "not a valid URL",
            ));
        }
    }
    if chain.chain_id == 0 {
        errors.push(ValidationError::new("chain.chain_id", "must be greater than 0"));
    }
    if chain.gas_limit == 0 {
        errors.push(ValidationError::new("chain.gas_limit", "must be greater than 0"));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be greater than 0"));
    }
    if chain.receipt_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "chain.receipt_timeout_secs",
            "must be greater than 0",
        ));
    }
    if !(chain.gas_price_multiplier.is_finite() && chain.gas_price_multiplier >= 1.0) {
        errors.push(ValidationError::new(
            "chain.gas_price_multiplier",
            "must be a finite value >= 1.0",
        ));
    }

    let contracts = &config.contracts;
    for (id, asset) in &contracts.assets {
        check_address(&mut errors, format!("contracts.assets.{}.address", id), &asset.address);
        if asset.decimals > MAX_DECIMALS {
            errors.push(ValidationError::new(
                format!("contracts.assets.{}.decimals", id),
                format!("must be at most {}", MAX_DECIMALS),
            ));
        }
    }
    for (id, protocol) in &contracts.protocols {
        check_address(
            &mut errors,
            format!("contracts.protocols.{}.address", id),
            &protocol.address,
        );
    }
    check_address(&mut errors, "contracts.swap_router".to_string(), &contracts.swap_router);
    if contracts.default_decimals > MAX_DECIMALS {
        errors.push(ValidationError::new(
            "contracts.default_decimals",
            format!("must be at most {}", MAX_DECIMALS),
        ));
    }

    if config.keystore.path.trim().is_empty() {
        errors.push(ValidationError::new("keystore.path", "must not be empty"));
    }
    if config.funding.admin_key_env.trim().is_empty() {
        errors.push(ValidationError::new("funding.admin_key_env", "must not be empty"));
    }
    if alloy::primitives::utils::parse_ether(&config.funding.amount_ether).is_err() {
        errors.push(ValidationError::new(
            "funding.amount_ether",
            "not a valid ether amount",
        ));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: String, value: &str) {
    if value.parse::<Address>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not an address", value)));
    }
}
