//! Per-account nonce sequencing.
//!
//! # Responsibilities
//! - Hand out strictly sequential, gap-free nonces per account
//! - Serialize each account's transactions end-to-end through its lane
//! - Re-sync from chain after a transaction of unknown fate
//!
//! # Design Decisions
//! - One async mutex per account; accounts never contend with each other
//! - The cached counter is advanced optimistically so back-to-back
//!   transactions do not re-query the chain
//! - A stale counter is only re-read while the lane is held

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::ChainResult;

#[derive(Debug, Default)]
struct NonceState {
    /// Next nonce to hand out; `None` means re-read from chain.
    next: Option<u64>,
}

/// Issues nonces per account.
#[derive(Debug, Default)]
pub struct NonceSequencer {
    lanes: DashMap<Address, Arc<Mutex<NonceState>>>,
}

impl NonceSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive use of `address`'s lane.
    ///
    /// Waits while another transaction from the same account is in flight.
    pub async fn lane(&self, address: Address) -> AccountLane {
        let slot = self.lanes.entry(address).or_default().value().clone();
        AccountLane {
            address,
            state: slot.lock_owned().await,
        }
    }

    /// Reserve the next nonce for `address`, releasing the lane immediately.
    pub async fn reserve(&self, client: &dyn ChainClient, address: Address) -> ChainResult<u64> {
        self.lane(address).await.reserve(client).await
    }

    /// Force the next reservation for `address` to re-read the chain.
    pub async fn invalidate(&self, address: Address) {
        self.lane(address).await.invalidate();
    }

    /// Number of accounts with a lane.
    pub fn tracked_accounts(&self) -> usize {
        self.lanes.len()
    }
}

/// Exclusive handle on one account's nonce counter.
///
/// Held from reservation through confirmation; dropping it lets the next
/// transaction for the account proceed.
#[derive(Debug)]
pub struct AccountLane {
    address: Address,
    state: OwnedMutexGuard<NonceState>,
}

impl AccountLane {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Next nonce that would be handed out, if known without a chain query.
    pub fn peek(&self) -> Option<u64> {
        self.state.next
    }

    /// Reserve the next nonce.
    pub async fn reserve(&mut self, client: &dyn ChainClient) -> ChainResult<u64> {
        let nonce = match self.state.next {
            Some(next) => next,
            None => {
                let count = client.get_transaction_count(self.address).await?;
                tracing::debug!(address = %self.address, nonce = count, "Nonce synced from chain");
                count
            }
        };
        self.state.next = Some(nonce + 1);
        Ok(nonce)
    }

    /// Seed the counter with the chain's confirmed transaction count.
    pub fn sync(&mut self, confirmed: u64) {
        tracing::debug!(address = %self.address, nonce = confirmed, "Nonce synced from chain");
        self.state.next = Some(confirmed);
    }

    /// Return a nonce whose transaction was never broadcast.
    pub fn release(&mut self, nonce: u64) {
        if self.state.next == Some(nonce + 1) {
            self.state.next = Some(nonce);
        } else {
            self.state.next = None;
        }
    }

    /// Drop the cached counter; the next reservation re-reads the chain.
    pub fn invalidate(&mut self) {
        tracing::debug!(address = %self.address, "Nonce invalidated");
        self.state.next = None;
    }
}
