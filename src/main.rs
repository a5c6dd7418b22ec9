//! `agent-custody` command line.
//!
//! Each subcommand performs one wallet operation and prints the result as
//! JSON on stdout. Logs go to stderr.

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use agent_custody::agent::AgentWallet;
use agent_custody::config::load_config;
use agent_custody::observability::{logging, metrics};
use agent_custody::transactions::TokenRef;

#[derive(Parser)]
#[command(name = "agent-custody")]
#[command(about = "Custodial wallets for autonomous agents", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/custody.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a wallet for a user (no-op if it exists)
    CreateWallet { user: String },
    /// Print a user's address
    Address { user: String },
    /// Send the configured native amount from the admin account
    Fund { user: String },
    /// Transfer tokens; TO may be an address or another user id
    Transfer {
        user: String,
        /// Asset id or token contract address
        token: String,
        to: String,
        amount: String,
    },
    /// Mint test tokens to the user's own address
    Mint {
        user: String,
        asset: String,
        amount: String,
    },
    /// Approve the router and swap
    Swap {
        user: String,
        token_in: String,
        token_out: String,
        amount: String,
    },
    /// Approve the staking contract and stake
    Stake {
        user: String,
        asset: String,
        protocol: String,
        amount: String,
    },
    /// Withdraw everything staked with a protocol
    Unstake { user: String, protocol: String },
    /// Native balance, or token balance with --token
    Balance {
        user: String,
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_handle = logging::init(logging::BOOTSTRAP_LEVEL);
    let config = load_config(&cli.config)?;
    if let Some(handle) = &log_handle {
        handle.set_level(&config.observability.log_level);
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let wallet = AgentWallet::from_config(&config).await?;
    let output = run(&wallet, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(wallet: &AgentWallet, command: Commands) -> Result<Value, Box<dyn std::error::Error>> {
    let output = match command {
        Commands::CreateWallet { user } => {
            let outcome = wallet.create_wallet(&user).await?;
            json!({
                "user": user,
                "address": format!("{:#x}", outcome.address()),
                "created": outcome.is_created(),
            })
        }
        Commands::Address { user } => {
            let address = wallet.address(&user).await?;
            json!({ "user": user, "address": format!("{:#x}", address) })
        }
        Commands::Fund { user } => tx_output(wallet.fund_wallet(&user).await?),
        Commands::Transfer {
            user,
            token,
            to,
            amount,
        } => {
            let to = recipient(wallet, &to).await?;
            let hash = match token_ref(&token) {
                TokenRef::Contract(contract) => {
                    wallet.transfer_token(&user, contract, to, &amount).await?
                }
                TokenRef::Asset(asset) => wallet.transfer(&user, &asset, to, &amount).await?,
            };
            tx_output(hash)
        }
        Commands::Mint {
            user,
            asset,
            amount,
        } => tx_output(wallet.mint(&user, &asset, &amount).await?),
        Commands::Swap {
            user,
            token_in,
            token_out,
            amount,
        } => tx_output(
            wallet
                .swap(&user, token_ref(&token_in), token_ref(&token_out), &amount)
                .await?,
        ),
        Commands::Stake {
            user,
            asset,
            protocol,
            amount,
        } => tx_output(wallet.stake(&user, &asset, &protocol, &amount).await?),
        Commands::Unstake { user, protocol } => tx_output(wallet.unstake(&user, &protocol).await?),
        Commands::Balance { user, token } => {
            let balance = match token {
                Some(token) => wallet.token_balance(&user, &token_ref(&token)).await?,
                None => wallet.native_balance(&user).await?,
            };
            json!({ "user": user, "balance": balance.to_string() })
        }
    };
    Ok(output)
}

fn tx_output(tx_hash: String) -> Value {
    json!({ "tx_hash": tx_hash })
}

/// A token contract address, or else an asset id.
fn token_ref(token: &str) -> TokenRef {
    match token.parse::<Address>() {
        Ok(address) => TokenRef::Contract(address),
        Err(_) => TokenRef::Asset(token.to_string()),
    }
}

/// An address, or else the address of a registered user.
async fn recipient(wallet: &AgentWallet, to: &str) -> Result<Address, Box<dyn std::error::Error>> {
    match to.parse::<Address>() {
        Ok(address) => Ok(address),
        Err(_) => Ok(wallet.address(to).await?),
    }
}
