//! Agent Wallet CLI
//!
//! Inspect, manage and use the wallets known to the wallet manager.
//! Results go to stdout as pretty JSON; logs go to stderr.

use agent_wallet::chain;
use agent_wallet::config::REMOTE_API_KEY_ENV;
use agent_wallet::{
    Error, ManagerSettings, Result, TxRequest, WalletBackend, WalletManager, WalletRecord,
};
use alloy::primitives::{Address, Bytes, U256};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "agent-wallet")]
#[command(about = "Multi-backend wallet for DeFi agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the wallets config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List wallets with their addresses and chains
    List,

    /// Print a wallet's address
    Address {
        /// Wallet nickname (defaults to the default wallet)
        #[arg(short, long)]
        wallet: Option<String>,

        /// Solana address instead (remote agent wallets only)
        #[arg(long)]
        solana: bool,
    },

    /// Add a wallet to the config file
    Add {
        nickname: String,

        #[arg(short, long, value_enum)]
        source: SourceArg,

        /// Local key file path
        #[arg(long)]
        path: Option<PathBuf>,

        /// Remote agent API key (defaults to BANKR_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Remote agent API URL
        #[arg(long)]
        api_url: Option<String>,

        /// Environment variable holding the private key
        #[arg(long)]
        env_var: Option<String>,

        /// Expected address (env wallets)
        #[arg(long)]
        address: Option<String>,

        /// Restrict the wallet to these chains
        #[arg(long = "chain")]
        chains: Vec<String>,
    },

    /// Rename a wallet
    Rename { from: String, to: String },

    /// Remove a wallet
    Remove { nickname: String },

    /// Make a wallet the default
    SetDefault { nickname: String },

    /// Execute a raw transaction
    Send {
        #[arg(short, long)]
        wallet: Option<String>,

        /// Target address
        #[arg(long)]
        to: String,

        /// Calldata (hex encoded)
        #[arg(long, default_value = "0x")]
        data: String,

        /// Value in wei
        #[arg(long, default_value = "0")]
        value: String,

        /// Chain, prefixed or bare (e.g. base, 0x2105.base)
        #[arg(long)]
        chain: String,

        /// Wait for the receipt (key-holding wallets)
        #[arg(long)]
        wait: bool,
    },

    /// Show how a chain identifier normalizes
    Chain { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    LocalKey,
    Env,
    RemoteAgent,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainReport {
    input: String,
    normalized: String,
    prefixed: String,
    evm_chain_id: Option<u64>,
    remote_agent_supported: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = tracing_subscriber::registry().with(filter);
    if cli.json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    if let Commands::Chain { id } = &cli.command {
        return print_json(&ChainReport {
            input: id.clone(),
            normalized: chain::normalize(id),
            prefixed: chain::to_prefixed(id),
            evm_chain_id: chain::evm_chain_id(id),
            remote_agent_supported: chain::is_supported_by_remote_agent(id),
        });
    }

    let mut settings = ManagerSettings::from_env()?;
    if let Some(path) = cli.config {
        settings.config_path = path;
    }
    let manager = WalletManager::new(settings);

    match cli.command {
        Commands::List => print_json(&manager.list_wallets().await)?,
        Commands::Address { wallet, solana } => {
            let backend = manager.resolve(wallet.as_deref()).await?;
            let address = if solana {
                let remote = backend.as_remote().ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "Wallet \"{}\" has no Solana address",
                        backend.nickname()
                    ))
                })?;
                remote.solana_address().await?
            } else {
                backend.address().await?.to_checksum(None)
            };
            print_json(&serde_json::json!({
                "wallet": backend.nickname(),
                "address": address,
            }))?;
        }
        Commands::Add {
            nickname,
            source,
            path,
            api_key,
            api_url,
            env_var,
            address,
            chains,
        } => {
            let mut record = match source {
                SourceArg::LocalKey => WalletRecord::local_key(path),
                SourceArg::Env => WalletRecord::env(address, None, env_var),
                SourceArg::RemoteAgent => {
                    let api_key = api_key
                        .or_else(|| std::env::var(REMOTE_API_KEY_ENV).ok())
                        .ok_or_else(|| {
                            Error::InvalidArgument(format!(
                                "--api-key or {} is required",
                                REMOTE_API_KEY_ENV
                            ))
                        })?;
                    WalletRecord::remote_agent(api_key, api_url)
                }
            };
            if !chains.is_empty() {
                record = record.with_chains(chains);
            }
            manager.add_wallet(&nickname, record).await?;
            print_json(&serde_json::json!({ "added": nickname.to_lowercase() }))?;
        }
        Commands::Rename { from, to } => {
            manager.rename_wallet(&from, &to).await?;
            print_json(&serde_json::json!({
                "renamed": { "from": from.to_lowercase(), "to": to.to_lowercase() }
            }))?;
        }
        Commands::Remove { nickname } => {
            manager.remove_wallet(&nickname).await?;
            print_json(&serde_json::json!({
                "removed": nickname.to_lowercase(),
                "default": manager.default_wallet_name().await,
            }))?;
        }
        Commands::SetDefault { nickname } => {
            manager.set_default_wallet(&nickname).await?;
            print_json(&serde_json::json!({ "default": nickname.to_lowercase() }))?;
        }
        Commands::Send {
            wallet,
            to,
            data,
            value,
            chain,
            wait,
        } => {
            let backend = manager.resolve(wallet.as_deref()).await?;
            run_send(&backend, &to, &data, &value, &chain, wait).await?;
        }
        Commands::Chain { .. } => {}
    }

    Ok(())
}

async fn run_send(
    backend: &WalletBackend,
    to: &str,
    data: &str,
    value: &str,
    chain_id: &str,
    wait: bool,
) -> Result<()> {
    let to: Address = to
        .parse()
        .map_err(|e| Error::InvalidArgument(format!("Invalid --to address: {}", e)))?;
    let data: Bytes = data
        .parse()
        .map_err(|e| Error::InvalidArgument(format!("Invalid --data: {}", e)))?;
    let value: U256 = value
        .parse()
        .map_err(|e| Error::InvalidArgument(format!("Invalid --value: {}", e)))?;

    let tx = TxRequest::new(to, data, value, chain_id);
    tracing::info!(
        wallet = %backend.nickname(),
        kind = %backend.kind(),
        to = %to,
        chain = %chain_id,
        "Sending transaction"
    );
    let hash = backend.send_transaction(&tx).await?;

    let receipt = match (wait, backend) {
        (true, WalletBackend::LocalKey(b)) => Some(b.wait_for_transaction(hash, chain_id).await?),
        (true, WalletBackend::Env(b)) => Some(b.wait_for_transaction(hash, chain_id).await?),
        _ => None,
    };

    print_json(&serde_json::json!({
        "wallet": backend.nickname(),
        "transactionHash": hash,
        "receipt": receipt,
    }))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
