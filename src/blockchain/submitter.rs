//! Broadcast and confirmation of signed transactions.
//!
//! # Responsibilities
//! - Broadcast signed bytes, retrying transport failures with the same bytes
//! - Treat "already known" answers to a re-send as acceptance
//! - Wait for a receipt within a bounded window
//! - Classify the outcome as confirmed, dropped, reverted, rejected or
//!   unavailable

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{ChainError, SignedTransaction, SubmissionError, TxReceipt};
use crate::observability::metrics;
use crate::resilience::{retry_transient, RetryPolicy};

/// Sends signed transactions and waits for their receipts.
#[derive(Clone)]
pub struct Submitter {
    client: Arc<dyn ChainClient>,
    receipt_timeout: Duration,
    retry: RetryPolicy,
}

impl Submitter {
    pub fn new(client: Arc<dyn ChainClient>, receipt_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            receipt_timeout,
            retry,
        }
    }

    /// Broadcast `tx` and wait for it to be mined successfully.
    pub async fn submit(&self, tx: &SignedTransaction) -> Result<TxReceipt, SubmissionError> {
        let hash = self.broadcast(tx).await?;
        tracing::info!(state = "submitted", tx_hash = %hash, nonce = tx.nonce, "Transaction submitted");

        let started = Instant::now();
        let result = self.confirm(hash).await;
        if result.is_ok() {
            metrics::record_confirmation_latency(started.elapsed().as_secs_f64());
        }
        result
    }

    /// Broadcast `tx`, returning its hash once a node has accepted it.
    pub async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxHash, SubmissionError> {
        let client = self.client.as_ref();
        let result = retry_transient(&self.retry, "send_raw_transaction", |attempt| async move {
            match client.send_raw_transaction(tx.raw()).await {
                Err(ChainError::Rejected(message)) if already_accepted(&message, attempt) => {
                    tracing::debug!(tx_hash = %tx.hash, reason = %message, "Node already has transaction");
                    Ok(tx.hash)
                }
                other => other,
            }
        })
        .await;

        match result {
            Ok(hash) => {
                if hash != tx.hash {
                    tracing::warn!(expected = %tx.hash, reported = %hash, "Node reported a different transaction hash");
                }
                Ok(tx.hash)
            }
            Err(ChainError::Rejected(message)) => Err(SubmissionError::Rejected(message)),
            Err(other) => Err(SubmissionError::RpcUnavailable(other.to_string())),
        }
    }

    /// Wait for the receipt of `tx_hash` and classify it.
    pub async fn confirm(&self, tx_hash: TxHash) -> Result<TxReceipt, SubmissionError> {
        match self.client.wait_for_receipt(tx_hash, self.receipt_timeout).await {
            Ok(Some(receipt)) if receipt.success => Ok(receipt),
            Ok(Some(receipt)) => Err(SubmissionError::Reverted {
                tx_hash,
                block_number: receipt.block_number,
            }),
            Ok(None) => Err(SubmissionError::Dropped {
                tx_hash,
                timeout_secs: self.receipt_timeout.as_secs(),
            }),
            Err(e) => Err(SubmissionError::RpcUnavailable(e.to_string())),
        }
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("receipt_timeout", &self.receipt_timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Node answers meaning an earlier send of the same bytes got through.
fn already_accepted(message: &str, attempt: u32) -> bool {
    let message = message.to_ascii_lowercase();
    if message.contains("already known") || message.contains("known transaction") {
        return true;
    }
    // Only a re-send can collide with itself.
    attempt > 0 && message.contains("nonce too low")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signer::TransactionSigner;
    use crate::blockchain::types::{ChainResult, UnsignedTransaction};
    use alloy::consensus::TxLegacy;
    use alloy::primitives::{Address, Bytes, TxKind, U256};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    /// Replays scripted broadcast results; receipts are fixed per test.
    #[derive(Default)]
    struct ScriptedChain {
        sends: Mutex<VecDeque<ChainResult<TxHash>>>,
        send_calls: Mutex<Vec<Vec<u8>>>,
        receipt: Mutex<Option<ChainResult<Option<TxReceipt>>>>,
    }

    impl ScriptedChain {
        fn new(sends: Vec<ChainResult<TxHash>>, receipt: ChainResult<Option<TxReceipt>>) -> Self {
            Self {
                sends: Mutex::new(sends.into()),
                send_calls: Mutex::new(Vec::new()),
                receipt: Mutex::new(Some(receipt)),
            }
        }

        fn send_count(&self) -> usize {
            self.send_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChainClient for ScriptedChain {
        async fn get_transaction_count(&self, _address: Address) -> ChainResult<u64> {
            Ok(0)
        }
        async fn get_gas_price(&self) -> ChainResult<u128> {
            Ok(1)
        }
        async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<TxHash> {
            self.send_calls.lock().unwrap().push(raw.to_vec());
            self.sends
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChainError::Unavailable("script exhausted".into())))
        }
        async fn wait_for_receipt(
            &self,
            _tx_hash: TxHash,
            _wait: Duration,
        ) -> ChainResult<Option<TxReceipt>> {
            self.receipt.lock().unwrap().clone().unwrap_or(Ok(None))
        }
        async fn get_balance(&self, _address: Address) -> ChainResult<U256> {
            Ok(U256::ZERO)
        }
        async fn call(&self, _to: Address, _data: Bytes) -> ChainResult<Bytes> {
            Ok(Bytes::new())
        }
    }

    fn signed() -> SignedTransaction {
        let signer = TransactionSigner::from_hex(TEST_PRIVATE_KEY).unwrap();
        signer
            .sign(UnsignedTransaction::new(TxLegacy {
                chain_id: Some(57054),
                nonce: 4,
                gas_price: 1_000_000_000,
                gas_limit: 1_000_000,
                to: TxKind::Call(Address::repeat_byte(0x22)),
                value: U256::ZERO,
                input: Bytes::new(),
            }))
            .unwrap()
    }

    fn receipt(tx_hash: TxHash, success: bool) -> TxReceipt {
        TxReceipt {
            tx_hash,
            block_number: Some(10),
            success,
            gas_used: 50_000,
            effective_gas_price: 1_000_000_000,
        }
    }

    fn submitter(chain: Arc<ScriptedChain>) -> Submitter {
        Submitter::new(
            chain,
            Duration::from_secs(2),
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
        )
    }

    #[tokio::test]
    async fn test_confirmed() {
        let tx = signed();
        let chain = Arc::new(ScriptedChain::new(vec![Ok(tx.hash)], Ok(Some(receipt(tx.hash, true)))));

        let confirmed = submitter(chain.clone()).submit(&tx).await.unwrap();
        assert_eq!(confirmed.tx_hash, tx.hash);
        assert_eq!(chain.send_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_resends_same_bytes() {
        let tx = signed();
        let chain = Arc::new(ScriptedChain::new(
            vec![Err(ChainError::Timeout(1)), Ok(tx.hash)],
            Ok(Some(receipt(tx.hash, true))),
        ));

        submitter(chain.clone()).submit(&tx).await.unwrap();

        let calls = chain.send_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(calls[0], tx.raw());
    }

    #[tokio::test]
    async fn test_resend_already_known_is_accepted() {
        let tx = signed();
        let chain = Arc::new(ScriptedChain::new(
            vec![
                Err(ChainError::Unavailable("connection reset".into())),
                Err(ChainError::Rejected("nonce too low".into())),
            ],
            Ok(Some(receipt(tx.hash, true))),
        ));

        assert!(submitter(chain).submit(&tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_first_nonce_too_low_is_rejected() {
        let tx = signed();
        let chain = Arc::new(ScriptedChain::new(
            vec![Err(ChainError::Rejected("nonce too low".into()))],
            Ok(None),
        ));

        let err = submitter(chain.clone()).submit(&tx).await.unwrap_err();
        assert_eq!(err, SubmissionError::Rejected("nonce too low".into()));
        assert!(err.requires_nonce_reconciliation());
        assert_eq!(chain.send_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_after_retries() {
        let tx = signed();
        let chain = Arc::new(ScriptedChain::new(Vec::new(), Ok(None)));

        let err = submitter(chain.clone()).submit(&tx).await.unwrap_err();
        assert!(matches!(err, SubmissionError::RpcUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(chain.send_count(), 3);
    }

    #[tokio::test]
    async fn test_dropped() {
        let tx = signed();
        let chain = Arc::new(ScriptedChain::new(vec![Ok(tx.hash)], Ok(None)));

        let err = submitter(chain).submit(&tx).await.unwrap_err();
        assert_eq!(
            err,
            SubmissionError::Dropped {
                tx_hash: tx.hash,
                timeout_secs: 2
            }
        );
    }

    #[tokio::test]
    async fn test_reverted() {
        let tx = signed();
        let chain = Arc::new(ScriptedChain::new(vec![Ok(tx.hash)], Ok(Some(receipt(tx.hash, false)))));

        let err = submitter(chain).submit(&tx).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Reverted { block_number: Some(10), .. }));
        assert!(!err.requires_nonce_reconciliation());
    }

    #[test]
    fn test_already_accepted_messages() {
        assert!(already_accepted("already known", 0));
        assert!(already_accepted("Known transaction: 0xabc", 0));
        assert!(!already_accepted("nonce too low", 0));
        assert!(already_accepted("nonce too low", 1));
        assert!(!already_accepted("insufficient funds for gas * price + value", 2));
    }
}
