//! Shared utilities for integration tests.
//!
//! [`MockChain`] is an in-memory EVM stand-in: it decodes signed legacy
//! transactions, recovers the sender, enforces nonces, charges gas and
//! applies the token, router and staking calls the custody core emits.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_custody::agent::AgentWallet;
use agent_custody::blockchain::{ChainClient, ChainError, ChainResult, TransactionSigner, TxReceipt};
use agent_custody::config::CustodyConfig;
use agent_custody::contracts::{IStaking, ISwapRouter, IToken};
use agent_custody::keystore::KeyStore;
use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

/// Anvil's first account; used as the treasury.
pub const ADMIN_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const GAS_PRICE: u128 = 1_000_000_000;

/// One broadcast the chain accepted.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: TxHash,
    pub from: Address,
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
}

impl SentTx {
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }
}

#[derive(Default)]
struct ChainState {
    block: u64,
    nonces: HashMap<Address, u64>,
    native: HashMap<Address, U256>,
    /// (token, holder)
    tokens: HashMap<(Address, Address), U256>,
    /// (token, owner, spender)
    allowances: HashMap<(Address, Address, Address), U256>,
    /// (staking contract, staker) → staked (token, amount)
    stakes: HashMap<(Address, Address), Vec<(Address, U256)>>,
    receipts: HashMap<TxHash, TxReceipt>,
    sent: Vec<SentTx>,
    calls: HashMap<&'static str, usize>,
    revert_selectors: HashSet<[u8; 4]>,
    drop_next: usize,
    failing_sends: usize,
    failing_nonce_queries: usize,
    gas_price: Option<u128>,
}

/// In-memory chain implementing [`ChainClient`].
pub struct MockChain {
    chain_id: u64,
    router: Address,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(chain_id: u64, router: Address) -> Self {
        Self {
            chain_id,
            router,
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn set_native_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().native.insert(address, balance);
    }

    pub fn native_balance(&self, address: Address) -> U256 {
        self.state.lock().unwrap().native.get(&address).copied().unwrap_or_default()
    }

    pub fn set_token_balance(&self, token: Address, holder: Address, balance: U256) {
        self.state.lock().unwrap().tokens.insert((token, holder), balance);
    }

    pub fn token_balance(&self, token: Address, holder: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn staked(&self, staking: Address, staker: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .stakes
            .get(&(staking, staker))
            .map(|s| s.iter().map(|(_, amount)| *amount).sum())
            .unwrap_or_default()
    }

    /// Confirmed transaction count.
    pub fn nonce(&self, address: Address) -> u64 {
        self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or(0)
    }

    /// Mine calls with this selector as reverted.
    pub fn revert_selector(&self, selector: [u8; 4]) {
        self.state.lock().unwrap().revert_selectors.insert(selector);
    }

    /// Accept the next `n` broadcasts but never mine them.
    pub fn drop_next(&self, n: usize) {
        self.state.lock().unwrap().drop_next = n;
    }

    /// Fail the next `n` broadcasts with a transport error.
    pub fn fail_sends(&self, n: usize) {
        self.state.lock().unwrap().failing_sends = n;
    }

    /// Fail the next `n` transaction count queries with a transport error.
    pub fn fail_nonce_queries(&self, n: usize) {
        self.state.lock().unwrap().failing_nonce_queries = n;
    }

    /// Quote `price` wei instead of [`GAS_PRICE`].
    pub fn set_gas_price(&self, price: u128) {
        self.state.lock().unwrap().gas_price = Some(price);
    }

    /// Accepted broadcasts, in order.
    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    fn count(state: &mut ChainState, method: &'static str) {
        *state.calls.entry(method).or_default() += 1;
    }

    /// Apply calldata effects; `false` reverts the whole transaction.
    fn apply(&self, state: &mut ChainState, from: Address, to: Address, input: &[u8]) -> bool {
        let Some(selector) = input.get(..4) else {
            return true;
        };

        if selector == IToken::transferCall::SELECTOR {
            let Ok(call) = IToken::transferCall::abi_decode(input) else {
                return false;
            };
            debit(&mut state.tokens, (to, from), call.amount)
                && credit(&mut state.tokens, (to, call.to), call.amount)
        } else if selector == IToken::mintCall::SELECTOR {
            let Ok(call) = IToken::mintCall::abi_decode(input) else {
                return false;
            };
            credit(&mut state.tokens, (to, call.to), call.amount)
        } else if selector == IToken::approveCall::SELECTOR {
            let Ok(call) = IToken::approveCall::abi_decode(input) else {
                return false;
            };
            state.allowances.insert((to, from, call.spender), call.amount);
            true
        } else if selector == ISwapRouter::swapCall::SELECTOR {
            let Ok(call) = ISwapRouter::swapCall::abi_decode(input) else {
                return false;
            };
            to == self.router
                && debit(&mut state.allowances, (call.tokenIn, from, to), call.amount)
                && debit(&mut state.tokens, (call.tokenIn, from), call.amount)
                && credit(&mut state.tokens, (call.tokenOut, from), call.amount)
        } else if selector == IStaking::stakeCall::SELECTOR {
            let Ok(call) = IStaking::stakeCall::abi_decode(input) else {
                return false;
            };
            // The vault pulls whichever token the staker approved it for.
            let token = state
                .allowances
                .iter()
                .find(|((_, owner, spender), allowed)| {
                    *owner == from && *spender == to && **allowed >= call.amount
                })
                .map(|((token, _, _), _)| *token);
            let Some(token) = token else {
                return false;
            };
            if !(debit(&mut state.allowances, (token, from, to), call.amount)
                && debit(&mut state.tokens, (token, from), call.amount))
            {
                return false;
            }
            state.stakes.entry((to, from)).or_default().push((token, call.amount));
            true
        } else if selector == IStaking::withdrawAllCall::SELECTOR {
            let stakes = state.stakes.remove(&(to, from)).unwrap_or_default();
            for (token, amount) in stakes {
                credit(&mut state.tokens, (token, from), amount);
            }
            true
        } else {
            true
        }
    }
}

fn debit<K: std::hash::Hash + Eq>(map: &mut HashMap<K, U256>, key: K, amount: U256) -> bool {
    let balance = map.entry(key).or_default();
    match balance.checked_sub(amount) {
        Some(rest) => {
            *balance = rest;
            true
        }
        None => false,
    }
}

fn credit<K: std::hash::Hash + Eq>(map: &mut HashMap<K, U256>, key: K, amount: U256) -> bool {
    let balance = map.entry(key).or_default();
    *balance = balance.saturating_add(amount);
    true
}

fn word(value: U256) -> Bytes {
    Bytes::from(value.to_be_bytes::<32>().to_vec())
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_transaction_count(&self, address: Address) -> ChainResult<u64> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "get_transaction_count");
        if state.failing_nonce_queries > 0 {
            state.failing_nonce_queries -= 1;
            return Err(ChainError::Unavailable("connection reset".into()));
        }
        Ok(state.nonces.get(&address).copied().unwrap_or(0))
    }

    async fn get_gas_price(&self) -> ChainResult<u128> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "get_gas_price");
        Ok(state.gas_price.unwrap_or(GAS_PRICE))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<TxHash> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "send_raw_transaction");

        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(ChainError::Unavailable("connection reset by peer".into()));
        }

        let envelope = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| ChainError::Rejected(format!("invalid transaction: {}", e)))?;
        let TxEnvelope::Legacy(signed) = envelope else {
            return Err(ChainError::Rejected("only legacy transactions supported".into()));
        };
        if signed.tx().chain_id != Some(self.chain_id) {
            return Err(ChainError::Rejected("invalid chain id".into()));
        }
        let from = signed
            .recover_signer()
            .map_err(|e| ChainError::Rejected(format!("invalid signature: {}", e)))?;
        let hash = *signed.hash();
        let tx = signed.tx();

        if state.receipts.contains_key(&hash) {
            return Err(ChainError::Rejected("already known".into()));
        }
        let expected = state.nonces.get(&from).copied().unwrap_or(0);
        if tx.nonce < expected {
            return Err(ChainError::Rejected("nonce too low".into()));
        }
        if tx.nonce > expected {
            return Err(ChainError::Rejected("nonce too high".into()));
        }

        let to = match tx.to {
            TxKind::Call(to) => Some(to),
            TxKind::Create => None,
        };
        let gas_used: u64 = if tx.input.is_empty() { 21_000 } else { 50_000 };
        let fee = U256::from(gas_used as u128 * tx.gas_price);
        let max_cost = U256::from(tx.gas_limit as u128 * tx.gas_price) + tx.value;
        if state.native.get(&from).copied().unwrap_or_default() < max_cost {
            return Err(ChainError::Rejected(
                "insufficient funds for gas * price + value".into(),
            ));
        }

        state.sent.push(SentTx {
            hash,
            from,
            nonce: tx.nonce,
            to,
            value: tx.value,
            input: tx.input.clone(),
            gas_limit: tx.gas_limit,
        });

        if state.drop_next > 0 {
            state.drop_next -= 1;
            return Ok(hash);
        }

        state.nonces.insert(from, expected + 1);
        debit(&mut state.native, from, fee);

        let reverted = tx
            .input
            .get(..4)
            .is_some_and(|s| state.revert_selectors.iter().any(|r| r.as_slice() == s));
        let success = match to {
            Some(to) if !reverted => {
                // Effects are applied to a scratch copy so a failure leaves no trace.
                let mut scratch = ChainState {
                    tokens: state.tokens.clone(),
                    allowances: state.allowances.clone(),
                    stakes: state.stakes.clone(),
                    native: state.native.clone(),
                    ..ChainState::default()
                };
                let ok = debit(&mut scratch.native, from, tx.value)
                    && credit(&mut scratch.native, to, tx.value)
                    && self.apply(&mut scratch, from, to, &tx.input);
                if ok {
                    state.tokens = scratch.tokens;
                    state.allowances = scratch.allowances;
                    state.stakes = scratch.stakes;
                    state.native = scratch.native;
                }
                ok
            }
            _ => false,
        };

        state.block += 1;
        let receipt = TxReceipt {
            tx_hash: hash,
            block_number: Some(state.block),
            success,
            gas_used,
            effective_gas_price: tx.gas_price,
        };
        state.receipts.insert(hash, receipt);
        Ok(hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        _wait: Duration,
    ) -> ChainResult<Option<TxReceipt>> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "wait_for_receipt");
        Ok(state.receipts.get(&tx_hash).cloned())
    }

    async fn get_balance(&self, address: Address) -> ChainResult<U256> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "get_balance");
        Ok(state.native.get(&address).copied().unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "call");

        if let Ok(call) = IToken::balanceOfCall::abi_decode(&data) {
            let balance = state.tokens.get(&(to, call.account)).copied().unwrap_or_default();
            return Ok(word(balance));
        }
        if let Ok(call) = IToken::allowanceCall::abi_decode(&data) {
            let allowed = state
                .allowances
                .get(&(to, call.owner, call.spender))
                .copied()
                .unwrap_or_default();
            return Ok(word(allowed));
        }
        Err(ChainError::Rejected("execution reverted".into()))
    }
}

/// Test configuration with the registry under `dir` and fast retries.
pub fn test_config(dir: &tempfile::TempDir) -> CustodyConfig {
    let mut config = CustodyConfig::default();
    config.keystore.path = dir.path().join("wallet.json").display().to_string();
    config.chain.receipt_timeout_secs = 1;
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config
}

pub fn admin_signer() -> TransactionSigner {
    TransactionSigner::from_hex(ADMIN_PRIVATE_KEY).unwrap()
}

/// Mock chain for `config`, with a well funded treasury.
pub fn mock_chain(config: &CustodyConfig) -> Arc<MockChain> {
    let router = config.contracts.swap_router.parse().unwrap();
    let chain = Arc::new(MockChain::new(config.chain.chain_id, router));
    chain.set_native_balance(admin_signer().address(), ether(1_000));
    chain
}

/// Wallet over `chain` with the treasury signer installed.
pub fn wallet(config: &CustodyConfig, chain: Arc<MockChain>) -> AgentWallet {
    let keystore = Arc::new(KeyStore::open(&config.keystore.path));
    AgentWallet::new(config, keystore, chain, Some(admin_signer())).unwrap()
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000_000_000_000u128)
}
