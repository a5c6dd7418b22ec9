//! Transaction pipeline: nonce, gas, sign, submit, confirm.
//!
//! # Responsibilities
//! - Hold the account's lane for the whole operation, approval included
//! - Drive each transaction through Built → Signed → Submitted → Confirmed
//! - Collapse the approval step into an [`ApprovalOutcome`]
//! - Reconcile the nonce after any failure of unknown fate
//!
//! # Design Decisions
//! - Everything that can fail on configuration is resolved before the lane
//!   is taken, so a bad request never touches the chain
//! - A nonce is released only if its transaction was never broadcast

use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::blockchain::{
    AccountLane, ChainClient, NonceSequencer, Submitter, TransactionSigner, TxReceipt,
};
use crate::config::CustodyConfig;
use crate::contracts::ContractBook;
use crate::error::{ApprovalOutcome, ConfigurationError, WalletError, WalletResult};
use crate::observability::metrics;
use crate::resilience::{retry_transient, RetryPolicy};
use crate::transactions::builder::{PreparedCall, TransactionBuilder};
use crate::transactions::intent::{OperationKind, TransactionIntent};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Executes intents against the chain.
pub struct TransactionPipeline {
    client: Arc<dyn ChainClient>,
    nonces: NonceSequencer,
    builder: TransactionBuilder,
    submitter: Submitter,
    retry: RetryPolicy,
    gas_price_multiplier: f64,
    /// Zero disables the cap.
    max_gas_price_gwei: u64,
}

impl TransactionPipeline {
    pub fn new(
        config: &CustodyConfig,
        client: Arc<dyn ChainClient>,
    ) -> Result<Self, ConfigurationError> {
        let contracts = Arc::new(ContractBook::from_config(&config.contracts)?);
        let builder = TransactionBuilder::new(contracts, config.chain.chain_id, config.chain.gas_limit);
        let retry = RetryPolicy::from(&config.retries);
        let submitter = Submitter::new(
            client.clone(),
            Duration::from_secs(config.chain.receipt_timeout_secs),
            retry,
        );

        Ok(Self {
            client,
            nonces: NonceSequencer::new(),
            builder,
            submitter,
            retry,
            gas_price_multiplier: config.chain.gas_price_multiplier,
            max_gas_price_gwei: config.chain.max_gas_price_gwei,
        })
    }

    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    pub fn nonces(&self) -> &NonceSequencer {
        &self.nonces
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// Run `intent`, signing with `signer`, until it is confirmed or fails.
    pub async fn execute(
        &self,
        intent: &TransactionIntent,
        signer: &TransactionSigner,
    ) -> WalletResult<TxReceipt> {
        let span = tracing::info_span!(
            "intent",
            intent_id = %intent.id,
            user = %intent.user_address,
            operation = %intent.kind(),
            address = %signer.address(),
        );
        self.run(intent, signer).instrument(span).await
    }

    async fn run(
        &self,
        intent: &TransactionIntent,
        signer: &TransactionSigner,
    ) -> WalletResult<TxReceipt> {
        let kind = intent.kind();
        let (approval, call) = match self.prepare(intent) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(error = %e, "Intent rejected");
                metrics::record_transaction(kind.as_str(), "configuration");
                return Err(e.into());
            }
        };

        let mut lane = self.nonces.lane(signer.address()).await;

        if let Some(approval) = approval {
            match self.approve(&mut lane, &approval, signer).await {
                ApprovalOutcome::Approved { tx_hash } => {
                    tracing::info!(tx_hash = %tx_hash, "Approval confirmed");
                }
                ApprovalOutcome::Failed { reason } => {
                    tracing::warn!(reason = %reason, "Approval failed, dependent call not sent");
                    metrics::record_transaction(kind.as_str(), "approval_failed");
                    return Err(WalletError::ApprovalFailed {
                        step: kind.to_string(),
                        reason,
                    });
                }
            }
        }

        let result = self.run_step(&mut lane, &call, signer).await;
        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(e) => e.as_str(),
        };
        metrics::record_transaction(kind.as_str(), outcome);
        result
    }

    fn prepare(
        &self,
        intent: &TransactionIntent,
    ) -> Result<(Option<PreparedCall>, PreparedCall), ConfigurationError> {
        let approval = self
            .builder
            .approval_for(&intent.operation)?
            .map(|approval| self.builder.prepare(&approval, intent.gas_limit))
            .transpose()?;
        let call = self.builder.prepare(&intent.operation, intent.gas_limit)?;
        Ok((approval, call))
    }

    async fn approve(
        &self,
        lane: &mut AccountLane,
        call: &PreparedCall,
        signer: &TransactionSigner,
    ) -> ApprovalOutcome {
        match self.run_step(lane, call, signer).await {
            Ok(receipt) => {
                metrics::record_transaction(OperationKind::Approve.as_str(), "confirmed");
                ApprovalOutcome::Approved {
                    tx_hash: receipt.hash_hex(),
                }
            }
            Err(e) => {
                metrics::record_transaction(OperationKind::Approve.as_str(), e.as_str());
                ApprovalOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// One transaction through all states, on an already held lane.
    async fn run_step(
        &self,
        lane: &mut AccountLane,
        call: &PreparedCall,
        signer: &TransactionSigner,
    ) -> WalletResult<TxReceipt> {
        let nonce = self.reserve_nonce(lane).await?;

        let gas_price = match self.gas_price().await {
            Ok(price) => price,
            Err(e) => {
                lane.release(nonce);
                return Err(e);
            }
        };

        let unsigned = self.builder.finalize(call, nonce, gas_price);
        tracing::debug!(
            state = "built",
            step = %call.kind,
            nonce,
            gas_price,
            to = %call.to,
            "Transaction built"
        );

        let signed = match signer.sign(unsigned) {
            Ok(signed) => signed,
            Err(e) => {
                lane.release(nonce);
                tracing::warn!(state = "failed", step = %call.kind, nonce, error = %e, "Signing failed");
                return Err(e.into());
            }
        };
        tracing::debug!(state = "signed", step = %call.kind, nonce, tx_hash = %signed.hash, "Transaction signed");

        match self.submitter.submit(&signed).await {
            Ok(receipt) => {
                tracing::info!(
                    state = "confirmed",
                    step = %call.kind,
                    nonce,
                    tx_hash = %receipt.tx_hash,
                    block_number = ?receipt.block_number,
                    gas_used = receipt.gas_used,
                    "Transaction confirmed"
                );
                Ok(receipt)
            }
            Err(e) => {
                if e.requires_nonce_reconciliation() {
                    lane.invalidate();
                }
                tracing::warn!(
                    state = "failed",
                    step = %call.kind,
                    nonce,
                    tx_hash = %signed.hash,
                    error = %e,
                    "Transaction failed"
                );
                Err(e.into())
            }
        }
    }

    async fn reserve_nonce(&self, lane: &mut AccountLane) -> WalletResult<u64> {
        let client = self.client.as_ref();
        if lane.peek().is_none() {
            let address = lane.address();
            let confirmed = retry_transient(&self.retry, "get_transaction_count", |_| {
                client.get_transaction_count(address)
            })
            .await?;
            lane.sync(confirmed);
        }
        Ok(lane.reserve(client).await?)
    }

    async fn gas_price(&self) -> WalletResult<u128> {
        let client = self.client.as_ref();
        let quoted = retry_transient(&self.retry, "get_gas_price", |_| client.get_gas_price()).await?;

        let max_wei = u128::from(self.max_gas_price_gwei) * WEI_PER_GWEI;
        if self.max_gas_price_gwei > 0 && quoted > max_wei {
            return Err(WalletError::GasPriceTooHigh {
                current_gwei: quoted / WEI_PER_GWEI,
                max_gwei: self.max_gas_price_gwei,
            });
        }

        Ok(apply_multiplier(quoted, self.gas_price_multiplier))
    }
}

impl std::fmt::Debug for TransactionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionPipeline")
            .field("chain_id", &self.builder.chain_id())
            .field("tracked_accounts", &self.nonces.tracked_accounts())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Scale a quoted gas price; multipliers at or below 1.0 leave it unchanged.
fn apply_multiplier(gas_price: u128, multiplier: f64) -> u128 {
    if !multiplier.is_finite() || multiplier <= 1.0 {
        return gas_price;
    }
    (gas_price as f64 * multiplier) as u128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_multiplier() {
        assert_eq!(apply_multiplier(1_000, 1.0), 1_000);
        assert_eq!(apply_multiplier(1_000, 1.2), 1_200);
        assert_eq!(apply_multiplier(1_000, 0.5), 1_000);
        assert_eq!(apply_multiplier(1_000, f64::NAN), 1_000);
    }
}
