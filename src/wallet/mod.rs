//! Wallet backends
//!
//! Every execution strategy sits behind [`WalletBackend`], a tagged union over
//! the concrete backends. Matching on the variant is how a caller learns which
//! operations exist: only [`LocalKeyBackend`] and [`EnvBackend`] can hand out a
//! private key, and only [`RemoteAgentBackend`] accepts a raw transaction.
//!
//! Private keys NEVER leave [`SecureWallet`] except through an explicit
//! `private_key()` call on a key-holding variant.

pub mod env;
pub mod local_key;
mod signer;

pub use env::{load_env_wallets, parse_env_wallets, EnvBackend, EnvKeySource, EnvWalletEntry};
pub use local_key::{KeyFile, LocalKeyBackend};
pub use signer::SecureWallet;

use crate::chain;
use crate::remote::RemoteAgentBackend;
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use serde::Serialize;
use std::time::Duration;

/// Receipt polling cadence for key-holding backends
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const RECEIPT_MAX_ATTEMPTS: u32 = 60;

/// Which execution strategy a backend uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    LocalKey,
    Env,
    RemoteAgent,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::LocalKey => "local-key",
            BackendKind::Env => "env",
            BackendKind::RemoteAgent => "remote-agent",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction to execute, as produced by an upstream payload builder.
///
/// Immutable once built; backends only read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    to: Address,
    value: U256,
    data: Bytes,
    chain: String,
}

impl TxRequest {
    pub fn new(to: Address, data: Bytes, value: U256, chain: impl Into<String>) -> Self {
        Self {
            to,
            value,
            data,
            chain: chain.into(),
        }
    }

    pub fn to(&self) -> Address {
        self.to
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Target chain, in either notation
    pub fn chain(&self) -> &str {
        &self.chain
    }
}

/// Outcome of waiting for a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceiptSummary {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Poll `rpc_url` until a receipt for `hash` shows up.
pub async fn wait_for_receipt(
    rpc_url: &str,
    hash: B256,
    interval: Duration,
    max_attempts: u32,
) -> Result<TxReceiptSummary> {
    let url: url::Url = rpc_url
        .parse()
        .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
    let provider = ProviderBuilder::new().connect_http(url);

    for attempt in 1..=max_attempts {
        let receipt = provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| Error::Rpc(format!("Failed to fetch receipt: {}", e)))?;

        if let Some(receipt) = receipt {
            let summary = TxReceiptSummary {
                transaction_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
                gas_used: receipt.gas_used,
                success: receipt.status(),
            };
            tracing::info!(
                tx_hash = %hash,
                block = ?summary.block_number,
                success = summary.success,
                "Transaction confirmed"
            );
            return Ok(summary);
        }

        tracing::debug!(tx_hash = %hash, attempt, "Receipt not available yet");
        tokio::time::sleep(interval).await;
    }

    Err(Error::Rpc(format!(
        "No receipt for {} after {} attempts",
        hash, max_attempts
    )))
}

/// Resolve the RPC endpoint and numeric id for a key-holding backend's chain
pub(crate) fn evm_target(rpc: &crate::config::RpcConfig, chain_id: &str) -> Result<(String, u64)> {
    let numeric = chain::evm_chain_id(chain_id)
        .ok_or_else(|| Error::UnsupportedChain(chain_id.to_string()))?;
    let url = rpc
        .get(numeric)
        .ok_or_else(|| Error::Config(format!("No RPC URL configured for chain {}", chain_id)))?;
    Ok((url.to_string(), numeric))
}

/// Chains a backend accepts: its configured restriction, or a default table
pub(crate) fn effective_chains(restriction: &Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match restriction {
        Some(chains) if !chains.is_empty() => chains.iter().map(|c| chain::normalize(c)).collect(),
        _ => defaults.iter().map(|c| c.to_string()).collect(),
    }
}

/// A resolved wallet, one variant per execution strategy
#[derive(Debug, Clone)]
pub enum WalletBackend {
    LocalKey(LocalKeyBackend),
    Env(EnvBackend),
    RemoteAgent(RemoteAgentBackend),
}

impl WalletBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            WalletBackend::LocalKey(_) => BackendKind::LocalKey,
            WalletBackend::Env(_) => BackendKind::Env,
            WalletBackend::RemoteAgent(_) => BackendKind::RemoteAgent,
        }
    }

    pub fn nickname(&self) -> &str {
        match self {
            WalletBackend::LocalKey(b) => b.nickname(),
            WalletBackend::Env(b) => b.nickname(),
            WalletBackend::RemoteAgent(b) => b.nickname(),
        }
    }

    /// The same backend registered under another nickname
    pub fn renamed(self, nickname: &str) -> Self {
        match self {
            WalletBackend::LocalKey(b) => b.with_nickname(nickname).into(),
            WalletBackend::Env(b) => b.with_nickname(nickname).into(),
            WalletBackend::RemoteAgent(b) => b.with_nickname(nickname).into(),
        }
    }

    /// Canonical names of the chains this wallet can execute on
    pub fn supported_chains(&self) -> Vec<String> {
        match self {
            WalletBackend::LocalKey(b) => b.supported_chains(),
            WalletBackend::Env(b) => b.supported_chains(),
            WalletBackend::RemoteAgent(b) => b.supported_chains(),
        }
    }

    pub fn supports_chain(&self, chain_id: &str) -> bool {
        chain::contains_chain(&self.supported_chains(), chain_id)
    }

    pub async fn address(&self) -> Result<Address> {
        match self {
            WalletBackend::LocalKey(b) => b.address().await,
            WalletBackend::Env(b) => b.address(),
            WalletBackend::RemoteAgent(b) => b.address().await,
        }
    }

    /// Whether work can be routed here. Never errors.
    pub async fn is_ready(&self) -> bool {
        match self {
            WalletBackend::LocalKey(b) => b.is_ready().await,
            WalletBackend::Env(b) => b.is_ready(),
            WalletBackend::RemoteAgent(b) => b.is_ready().await,
        }
    }

    /// Execute `tx` and return its hash.
    ///
    /// Key-holding variants return right after broadcast. The remote variant
    /// returns once the remote job reaches a terminal state.
    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<B256> {
        match self {
            WalletBackend::LocalKey(b) => b.send_transaction(tx).await,
            WalletBackend::Env(b) => b.send_transaction(tx).await,
            WalletBackend::RemoteAgent(b) => b.send_transaction(tx).await,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteAgentBackend> {
        match self {
            WalletBackend::RemoteAgent(b) => Some(b),
            _ => None,
        }
    }
}

impl From<LocalKeyBackend> for WalletBackend {
    fn from(backend: LocalKeyBackend) -> Self {
        WalletBackend::LocalKey(backend)
    }
}

impl From<EnvBackend> for WalletBackend {
    fn from(backend: EnvBackend) -> Self {
        WalletBackend::Env(backend)
    }
}

impl From<RemoteAgentBackend> for WalletBackend {
    fn from(backend: RemoteAgentBackend) -> Self {
        WalletBackend::RemoteAgent(backend)
    }
}
