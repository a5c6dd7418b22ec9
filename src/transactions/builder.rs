//! Transaction construction.
//!
//! Building is split in two: [`TransactionBuilder::prepare`] resolves
//! identifiers, scales amounts and encodes calldata without touching the
//! chain; [`TransactionBuilder::finalize`] stamps nonce, gas price and chain
//! id onto a prepared call. Configuration errors therefore surface before
//! any nonce is reserved.

use alloy::consensus::TxLegacy;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::sol_types::SolCall;
use std::sync::Arc;

use crate::blockchain::UnsignedTransaction;
use crate::contracts::{scale_amount, ContractBook, IStaking, ISwapRouter, IToken, TokenRef};
use crate::error::ConfigurationError;
use crate::transactions::intent::{Operation, OperationKind};

/// Calldata and target of one transaction, without nonce or gas price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub kind: OperationKind,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
}

/// Encodes operations into legacy EIP-155 transactions.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    contracts: Arc<ContractBook>,
    chain_id: u64,
    /// Default and ceiling for every transaction.
    gas_limit: u64,
}

impl TransactionBuilder {
    pub fn new(contracts: Arc<ContractBook>, chain_id: u64, gas_limit: u64) -> Self {
        Self {
            contracts,
            chain_id,
            gas_limit,
        }
    }

    pub fn contracts(&self) -> &ContractBook {
        &self.contracts
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Resolve and encode `operation`.
    pub fn prepare(
        &self,
        operation: &Operation,
        gas_limit: Option<u64>,
    ) -> Result<PreparedCall, ConfigurationError> {
        let gas_limit = self.checked_gas_limit(gas_limit)?;
        let contracts = &self.contracts;

        let (to, value, input) = match operation {
            Operation::Fund { to, value } => (*to, *value, Vec::new()),
            Operation::Transfer { token, to, amount } => {
                let token = contracts.token(token)?;
                let amount = scale_amount(amount, token.decimals)?;
                (
                    token.address,
                    U256::ZERO,
                    IToken::transferCall { to: *to, amount }.abi_encode(),
                )
            }
            Operation::Mint { asset, to, amount } => {
                let token = contracts.asset(asset)?;
                let amount = scale_amount(amount, token.decimals)?;
                (
                    token.address,
                    U256::ZERO,
                    IToken::mintCall { to: *to, amount }.abi_encode(),
                )
            }
            Operation::Approve {
                token,
                spender,
                amount,
            } => {
                let token = contracts.token(token)?;
                (
                    token.address,
                    U256::ZERO,
                    IToken::approveCall {
                        spender: *spender,
                        amount: *amount,
                    }
                    .abi_encode(),
                )
            }
            Operation::Swap {
                token_in,
                token_out,
                amount,
            } => {
                let token_in = contracts.token(token_in)?;
                let token_out = contracts.token(token_out)?;
                let amount = scale_amount(amount, token_in.decimals)?;
                (
                    contracts.swap_router(),
                    U256::ZERO,
                    ISwapRouter::swapCall {
                        tokenIn: token_in.address,
                        tokenOut: token_out.address,
                        amount,
                    }
                    .abi_encode(),
                )
            }
            Operation::Stake {
                asset,
                protocol,
                amount,
            } => {
                let token = contracts.asset(asset)?;
                let protocol = contracts.protocol(protocol)?;
                let amount = scale_amount(amount, token.decimals)?;
                (
                    protocol.address,
                    U256::ZERO,
                    IStaking::stakeCall {
                        poolIndex: U256::from(protocol.pool_index),
                        amount,
                    }
                    .abi_encode(),
                )
            }
            Operation::Unstake { protocol } => {
                let protocol = contracts.protocol(protocol)?;
                (
                    protocol.address,
                    U256::ZERO,
                    IStaking::withdrawAllCall {}.abi_encode(),
                )
            }
        };

        Ok(PreparedCall {
            kind: operation.kind(),
            to,
            value,
            input: Bytes::from(input),
            gas_limit,
        })
    }

    /// The approval `operation` depends on, if any.
    ///
    /// Swaps approve the router to pull the input token; stakes approve the
    /// protocol's staking contract. Both grant the scaled amount plus the
    /// configured headroom.
    pub fn approval_for(
        &self,
        operation: &Operation,
    ) -> Result<Option<Operation>, ConfigurationError> {
        let contracts = &self.contracts;
        let approval = match operation {
            Operation::Swap {
                token_in, amount, ..
            } => {
                let token = contracts.token(token_in)?;
                let amount = scale_amount(amount, token.decimals)?;
                Some(Operation::Approve {
                    token: TokenRef::Contract(token.address),
                    spender: contracts.swap_router(),
                    amount: amount.saturating_add(contracts.approval_headroom()),
                })
            }
            Operation::Stake {
                asset,
                protocol,
                amount,
            } => {
                let token = contracts.asset(asset)?;
                let protocol = contracts.protocol(protocol)?;
                let amount = scale_amount(amount, token.decimals)?;
                Some(Operation::Approve {
                    token: TokenRef::Contract(token.address),
                    spender: protocol.address,
                    amount: amount.saturating_add(contracts.approval_headroom()),
                })
            }
            _ => None,
        };
        Ok(approval)
    }

    /// Stamp nonce and gas price onto a prepared call.
    pub fn finalize(&self, call: &PreparedCall, nonce: u64, gas_price: u128) -> UnsignedTransaction {
        UnsignedTransaction::new(TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit: call.gas_limit,
            to: TxKind::Call(call.to),
            value: call.value,
            input: call.input.clone(),
        })
    }

    /// Prepare and finalize in one step.
    pub fn build(
        &self,
        operation: &Operation,
        nonce: u64,
        gas_price: u128,
        gas_limit: Option<u64>,
    ) -> Result<UnsignedTransaction, ConfigurationError> {
        let call = self.prepare(operation, gas_limit)?;
        Ok(self.finalize(&call, nonce, gas_price))
    }

    fn checked_gas_limit(&self, requested: Option<u64>) -> Result<u64, ConfigurationError> {
        match requested {
            Some(requested) if requested > self.gas_limit => {
                Err(ConfigurationError::GasLimitExceeded {
                    requested,
                    ceiling: self.gas_limit,
                })
            }
            Some(requested) => Ok(requested),
            None => Ok(self.gas_limit),
        }
    }
}
