//! The custodial wallet facade.

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use std::sync::Arc;

use crate::blockchain::{ChainClient, ChainError, RpcChainClient, TransactionSigner, TxReceipt};
use crate::config::CustodyConfig;
use crate::contracts::abi::decode_uint;
use crate::contracts::IToken;
use crate::error::{ConfigurationError, WalletError, WalletResult};
use crate::keystore::{CreateOutcome, KeyStore, PrivateKey};
use crate::transactions::{Operation, OperationKind, TokenRef, TransactionIntent, TransactionPipeline};

/// Custodial wallets for autonomous agents.
pub struct AgentWallet {
    keystore: Arc<KeyStore>,
    pipeline: TransactionPipeline,
    admin: Option<TransactionSigner>,
    admin_key_env: String,
    funding_amount: U256,
}

impl AgentWallet {
    /// Assemble a wallet from its parts.
    ///
    /// `admin` signs `fund` transactions; without it funding fails with
    /// [`WalletError::Funding`].
    pub fn new(
        config: &CustodyConfig,
        keystore: Arc<KeyStore>,
        client: Arc<dyn ChainClient>,
        admin: Option<TransactionSigner>,
    ) -> WalletResult<Self> {
        let funding_amount = parse_ether(&config.funding.amount_ether).map_err(|e| {
            ConfigurationError::InvalidAmount {
                amount: config.funding.amount_ether.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            keystore,
            pipeline: TransactionPipeline::new(config, client)?,
            admin,
            admin_key_env: config.funding.admin_key_env.clone(),
            funding_amount,
        })
    }

    /// Wallet over a JSON-RPC node, with the admin key read from the
    /// configured environment variable if present.
    pub async fn from_config(config: &CustodyConfig) -> WalletResult<Self> {
        let keystore = Arc::new(KeyStore::open(&config.keystore.path));
        let client: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(&config.chain).await?);

        let admin = match TransactionSigner::from_env(&config.funding.admin_key_env) {
            Ok(signer) => {
                tracing::info!(address = %signer.address(), "Admin signer loaded");
                Some(signer)
            }
            Err(e) => {
                tracing::warn!(error = %e, "No admin signer; funding disabled");
                None
            }
        };

        Self::new(config, keystore, client, admin)
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    pub fn pipeline(&self) -> &TransactionPipeline {
        &self.pipeline
    }

    /// Create the user's wallet unless it exists.
    pub async fn create_wallet(&self, user_address: &str) -> WalletResult<CreateOutcome> {
        Ok(self.keystore.create_account(user_address).await?)
    }

    /// The user's stored key.
    pub async fn private_key(&self, user_address: &str) -> WalletResult<PrivateKey> {
        Ok(self.keystore.private_key(user_address).await?)
    }

    /// The user's on-chain address.
    pub async fn address(&self, user_address: &str) -> WalletResult<Address> {
        Ok(self.keystore.resolve_address(user_address).await?)
    }

    /// Send the configured native amount from the admin account to the user.
    pub async fn fund_wallet(&self, user_address: &str) -> WalletResult<String> {
        let to = self.address(user_address).await?;
        let intent = TransactionIntent::new(
            user_address,
            Operation::Fund {
                to,
                value: self.funding_amount,
            },
        );
        self.execute(&intent).await
    }

    /// Transfer a configured asset.
    pub async fn transfer(
        &self,
        user_address: &str,
        asset: &str,
        to: Address,
        amount: &str,
    ) -> WalletResult<String> {
        self.run(
            user_address,
            Operation::Transfer {
                token: TokenRef::Asset(asset.to_string()),
                to,
                amount: amount.to_string(),
            },
        )
        .await
    }

    /// Transfer a token given by contract address.
    pub async fn transfer_token(
        &self,
        user_address: &str,
        contract: Address,
        to: Address,
        amount: &str,
    ) -> WalletResult<String> {
        self.run(
            user_address,
            Operation::Transfer {
                token: TokenRef::Contract(contract),
                to,
                amount: amount.to_string(),
            },
        )
        .await
    }

    /// Mint test tokens to the user's own address.
    pub async fn mint(&self, user_address: &str, asset: &str, amount: &str) -> WalletResult<String> {
        let to = self.address(user_address).await?;
        self.run(
            user_address,
            Operation::Mint {
                asset: asset.to_string(),
                to,
                amount: amount.to_string(),
            },
        )
        .await
    }

    /// Approve the router for `token_in`, then swap.
    pub async fn swap(
        &self,
        user_address: &str,
        token_in: TokenRef,
        token_out: TokenRef,
        amount: &str,
    ) -> WalletResult<String> {
        self.run(
            user_address,
            Operation::Swap {
                token_in,
                token_out,
                amount: amount.to_string(),
            },
        )
        .await
    }

    /// Approve the protocol's staking contract, then stake.
    pub async fn stake(
        &self,
        user_address: &str,
        asset: &str,
        protocol: &str,
        amount: &str,
    ) -> WalletResult<String> {
        self.run(
            user_address,
            Operation::Stake {
                asset: asset.to_string(),
                protocol: protocol.to_string(),
                amount: amount.to_string(),
            },
        )
        .await
    }

    /// Withdraw everything staked with `protocol`.
    pub async fn unstake(&self, user_address: &str, protocol: &str) -> WalletResult<String> {
        self.run(
            user_address,
            Operation::Unstake {
                protocol: protocol.to_string(),
            },
        )
        .await
    }

    /// Run an intent and return the confirmed transaction hash.
    ///
    /// `Fund` is signed by the admin account; everything else by the user.
    pub async fn execute(&self, intent: &TransactionIntent) -> WalletResult<String> {
        Ok(self.execute_for_receipt(intent).await?.hash_hex())
    }

    /// Like [`execute`](Self::execute), returning the full receipt.
    pub async fn execute_for_receipt(&self, intent: &TransactionIntent) -> WalletResult<TxReceipt> {
        let signer = match intent.kind() {
            OperationKind::Fund => self.admin.clone().ok_or_else(|| {
                WalletError::Funding(format!(
                    "admin key not configured; set {}",
                    self.admin_key_env
                ))
            })?,
            _ => TransactionSigner::new(&self.keystore.private_key(&intent.user_address).await?),
        };
        self.pipeline.execute(intent, &signer).await
    }

    /// Native balance of the user's address, in wei.
    pub async fn native_balance(&self, user_address: &str) -> WalletResult<U256> {
        let address = self.address(user_address).await?;
        Ok(self.pipeline.client().get_balance(address).await?)
    }

    /// Token balance of the user's address, in raw units.
    pub async fn token_balance(&self, user_address: &str, token: &TokenRef) -> WalletResult<U256> {
        let token = self.pipeline.builder().contracts().token(token)?;
        let account = self.address(user_address).await?;
        let data = IToken::balanceOfCall { account }.abi_encode();

        let output = self
            .pipeline
            .client()
            .call(token.address, data.into())
            .await?;
        decode_uint(&output).ok_or_else(|| {
            WalletError::Chain(ChainError::Rejected(format!(
                "unexpected balanceOf response of {} bytes",
                output.len()
            )))
        })
    }

    async fn run(&self, user_address: &str, operation: Operation) -> WalletResult<String> {
        self.execute(&TransactionIntent::new(user_address, operation)).await
    }
}

impl std::fmt::Debug for AgentWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentWallet")
            .field("keystore", &self.keystore.path())
            .field("pipeline", &self.pipeline)
            .field("admin", &self.admin.as_ref().map(|a| a.address()))
            .finish_non_exhaustive()
    }
}
