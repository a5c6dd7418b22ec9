//! Requested chain operations.

use alloy::primitives::{Address, U256};
use uuid::Uuid;

pub use crate::contracts::TokenRef;

/// A chain mutation an agent can request.
///
/// Amounts are logical decimal strings scaled by the token's decimals,
/// except where noted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Native value transfer, in wei.
    Fund { to: Address, value: U256 },
    Transfer {
        token: TokenRef,
        to: Address,
        amount: String,
    },
    Mint {
        asset: String,
        to: Address,
        amount: String,
    },
    /// Token allowance, in raw units.
    Approve {
        token: TokenRef,
        spender: Address,
        amount: U256,
    },
    Swap {
        token_in: TokenRef,
        token_out: TokenRef,
        amount: String,
    },
    Stake {
        asset: String,
        protocol: String,
        amount: String,
    },
    Unstake { protocol: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Fund { .. } => OperationKind::Fund,
            Operation::Transfer { .. } => OperationKind::Transfer,
            Operation::Mint { .. } => OperationKind::Mint,
            Operation::Approve { .. } => OperationKind::Approve,
            Operation::Swap { .. } => OperationKind::Swap,
            Operation::Stake { .. } => OperationKind::Stake,
            Operation::Unstake { .. } => OperationKind::Unstake,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Fund,
    Transfer,
    Mint,
    Approve,
    Swap,
    Stake,
    Unstake,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Fund => "fund",
            OperationKind::Transfer => "transfer",
            OperationKind::Mint => "mint",
            OperationKind::Approve => "approve",
            OperationKind::Swap => "swap",
            OperationKind::Stake => "stake",
            OperationKind::Unstake => "unstake",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation requested on behalf of one user. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    /// Correlates all log lines of one run.
    pub id: Uuid,
    /// Signing user; for `Fund` this names the recipient.
    pub user_address: String,
    pub operation: Operation,
    /// Overrides the configured gas limit; may not exceed it.
    pub gas_limit: Option<u64>,
}

impl TransactionIntent {
    pub fn new(user_address: impl Into<String>, operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_address: user_address.into(),
            operation,
            gas_limit: None,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }
}
