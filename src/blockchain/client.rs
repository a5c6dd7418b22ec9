//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Define the [`ChainClient`] calls the signing pipeline needs
//! - Connect to JSON-RPC endpoints with failover
//! - Distinguish transport failures from node rejections
//! - Poll for receipts with a bounded wait

use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::types::{ChainError, ChainId, ChainResult, TxReceipt};
use crate::config::ChainConfig;

/// The chain calls consumed by the custody core.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Confirmed transaction count (next nonce) of `address`.
    async fn get_transaction_count(&self, address: Address) -> ChainResult<u64>;

    /// Current gas price in wei.
    async fn get_gas_price(&self) -> ChainResult<u128>;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<TxHash>;

    /// Wait up to `wait` for the receipt of `tx_hash`.
    ///
    /// Returns `Ok(None)` if the node answered but no receipt appeared in
    /// time, and an error if no poll reached a node at all.
    async fn wait_for_receipt(&self, tx_hash: TxHash, wait: Duration)
        -> ChainResult<Option<TxReceipt>>;

    /// Native balance of `address` in wei.
    async fn get_balance(&self, address: Address) -> ChainResult<U256>;

    /// Read-only contract call.
    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes>;
}

/// JSON-RPC client over alloy HTTP providers with failover.
#[derive(Clone)]
pub struct RpcChainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider<Ethereum>>,
    /// Configuration.
    config: ChainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
    /// Receipt polling interval.
    poll_interval: Duration,
}

impl RpcChainClient {
    /// Create a new client.
    ///
    /// An unreachable node does not fail construction; the chain ID check is
    /// logged and retried on first use.
    pub async fn new(config: &ChainConfig) -> ChainResult<Self> {
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e: url::ParseError| {
            ChainError::InvalidUrl {
                url: config.rpc_url.clone(),
                reason: e.to_string(),
            }
        })?;
        providers.push(ProviderBuilder::new().connect_http(primary_url).erased());

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(ProviderBuilder::new().connect_http(url).erased()),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms.max(50)),
        };

        match client.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %config.rpc_url,
                chain_id = config.chain_id,
                "Chain client initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Chain client initialized but chain verification failed"
            ),
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> ChainResult<ChainId> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(result)) => return Ok(ChainId(result)),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        Err(ChainError::Unavailable("All RPC providers failed".to_string()))
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> ChainResult<Option<TxReceipt>> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_receipt(tx_hash)).await {
                Ok(Ok(receipt)) => {
                    return Ok(receipt.map(|r| TxReceipt {
                        tx_hash: r.transaction_hash,
                        block_number: r.block_number,
                        success: r.status(),
                        gas_used: r.gas_used,
                        effective_gas_price: r.effective_gas_price,
                    }))
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Unavailable("All providers failed to get receipt".to_string()))
    }
}

/// Map a transport error, keeping node error responses distinct.
fn classify(err: RpcError<TransportErrorKind>) -> ChainError {
    match err {
        RpcError::ErrorResp(payload) => ChainError::Rejected(payload.message.to_string()),
        other => ChainError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_transaction_count(&self, address: Address) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_count(address)).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Unavailable(
            "All providers failed to get transaction count".to_string(),
        ))
    }

    async fn get_gas_price(&self) -> ChainResult<u128> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_gas_price()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Unavailable("All providers failed to get gas price".to_string()))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<TxHash> {
        let mut last_error = ChainError::Unavailable("No RPC providers configured".to_string());
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.send_raw_transaction(raw)).await {
                Ok(Ok(pending)) => return Ok(*pending.tx_hash()),
                Ok(Err(e)) => match classify(e) {
                    // A node verdict is final; another provider would agree.
                    rejected @ ChainError::Rejected(_) => return Err(rejected),
                    other => {
                        tracing::warn!(provider_idx = i, error = %other, "Broadcast failed, trying next provider");
                        last_error = other;
                    }
                },
                Err(_) => {
                    tracing::warn!(provider_idx = i, "Broadcast timeout, trying next provider");
                    last_error = ChainError::Timeout(self.config.rpc_timeout_secs);
                }
            }
        }
        Err(last_error)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        wait: Duration,
    ) -> ChainResult<Option<TxReceipt>> {
        let mut answered = false;
        let mut last_error = None;
        let result = timeout(wait, async {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.fetch_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {
                        answered = true;
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    }
                    // Keep polling until the deadline; the node may come back.
                    Err(e) => {
                        tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                        last_error = Some(e);
                    }
                }
            }
        })
        .await;

        match result {
            Ok(receipt) => Ok(Some(receipt)),
            Err(_) if answered => Ok(None),
            // No node answered during the whole wait: the fate is unknown, not dropped.
            Err(_) => Err(last_error.unwrap_or_else(|| {
                ChainError::Unavailable("No receipt poll completed before the deadline".to_string())
            })),
        }
    }

    async fn get_balance(&self, address: Address) -> ChainResult<U256> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_balance(address)).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Unavailable("All providers failed to get balance".to_string()))
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.call(request.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => match classify(e) {
                    rejected @ ChainError::Rejected(_) => return Err(rejected),
                    other => tracing::warn!(provider_idx = i, error = %other, "RPC error"),
                },
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Unavailable("All providers failed to execute call".to_string()))
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("providers", &self.providers.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
