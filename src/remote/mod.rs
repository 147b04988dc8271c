//! Remote agent backend
//!
//! The remote agent holds the keys; this side never sees them. Work is sent
//! as a prompt to an asynchronous job API and the result is read back from
//! the completed job, so every operation here goes through [`AsyncJobClient`].
//!
//! # Configuration
//!
//! ```bash
//! export BANKR_API_KEY="bk_..."
//! export BANKR_API_URL="https://api.bankr.bot"   # optional
//! ```

pub mod address_cache;
pub mod client;
pub mod extract;
pub mod job;
pub mod transport;

pub use address_cache::{AddressCache, AddressKind};
pub use client::{AsyncJobClient, PollConfig};
pub use job::{JobStatus, RemoteJob};
pub use transport::{HttpJobTransport, JobTransport};

use crate::chain::{self, REMOTE_AGENT_SUPPORTED_CHAINS};
use crate::config::DEFAULT_REMOTE_API_URL;
use crate::wallet::{effective_chains, TxRequest};
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, B256, U256};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const EVM_ADDRESS_PROMPT: &str = "What is my EVM wallet address?";
pub const SOLANA_ADDRESS_PROMPT: &str = "What is my Solana wallet address?";

/// A transaction in the form the remote agent executes verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Numeric chain id
    pub chain_id: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptPayload {
    to: String,
    data: String,
    value: String,
    chain_id: u64,
}

impl RawTransaction {
    pub fn from_request(tx: &TxRequest) -> Result<Self> {
        Ok(Self {
            to: tx.to(),
            data: tx.data().clone(),
            value: tx.value(),
            chain_id: chain::numeric_id(tx.chain())?,
        })
    }

    /// The submission prompt: a fixed preamble and the transaction as JSON
    pub fn to_prompt(&self) -> Result<String> {
        let payload = PromptPayload {
            to: self.to.to_checksum(None),
            data: alloy::hex::encode_prefixed(&self.data),
            value: self.value.to_string(),
            chain_id: self.chain_id,
        };
        Ok(format!(
            "Submit this transaction:\n{}",
            serde_json::to_string_pretty(&payload)?
        ))
    }
}

/// Limits checked locally before anything is submitted
#[derive(Debug, Clone, Default)]
pub struct ExecutionPolicy {
    pub max_value_per_tx: Option<U256>,
    /// Empty means any destination
    pub allowed_contracts: Vec<Address>,
}

impl ExecutionPolicy {
    pub fn check(&self, tx: &RawTransaction) -> Result<()> {
        if let Some(max) = self.max_value_per_tx {
            if tx.value > max {
                return Err(Error::PolicyViolation(format!(
                    "Transaction value {} exceeds max allowed {}",
                    tx.value, max
                )));
            }
        }
        if !self.allowed_contracts.is_empty() && !self.allowed_contracts.contains(&tx.to) {
            return Err(Error::PolicyViolation(format!(
                "Contract {} is not in the allowed contracts list",
                tx.to
            )));
        }
        Ok(())
    }
}

/// Backend delegating signing and broadcast to the remote agent
#[derive(Debug, Clone)]
pub struct RemoteAgentBackend {
    nickname: String,
    api_key: Option<SecretString>,
    api_url: Option<String>,
    client: AsyncJobClient,
    cache: AddressCache,
    policy: Option<ExecutionPolicy>,
    chains: Option<Vec<String>>,
    address: Arc<RwLock<Option<Address>>>,
    solana_address: Arc<RwLock<Option<String>>>,
}

impl RemoteAgentBackend {
    /// Backend talking HTTP to `api_url` (or the public endpoint)
    pub fn new(
        nickname: impl Into<String>,
        api_key: SecretString,
        api_url: Option<String>,
        cache_dir: impl Into<PathBuf>,
        poll: PollConfig,
    ) -> Self {
        let base_url = api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_REMOTE_API_URL.to_string());
        let transport = Arc::new(HttpJobTransport::new(base_url, api_key.clone()));
        let mut backend =
            Self::with_transport(nickname, transport, AddressCache::new(cache_dir), poll);
        backend.api_key = Some(api_key);
        backend.api_url = api_url;
        backend
    }

    /// Backend over an arbitrary job transport
    pub fn with_transport(
        nickname: impl Into<String>,
        transport: Arc<dyn JobTransport>,
        cache: AddressCache,
        poll: PollConfig,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            api_key: None,
            api_url: None,
            client: AsyncJobClient::new(transport, poll),
            cache,
            policy: None,
            chains: None,
            address: Arc::new(RwLock::new(None)),
            solana_address: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_chains(mut self, chains: Option<Vec<String>>) -> Self {
        self.chains = chains;
        self
    }

    pub(crate) fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref()
    }

    pub fn chain_restriction(&self) -> Option<&[String]> {
        self.chains.as_deref()
    }

    pub fn client(&self) -> &AsyncJobClient {
        &self.client
    }

    /// Remote-supported chains, narrowed by the configured restriction
    pub fn supported_chains(&self) -> Vec<String> {
        effective_chains(&self.chains, REMOTE_AGENT_SUPPORTED_CHAINS)
            .into_iter()
            .filter(|c| chain::is_supported_by_remote_agent(c))
            .collect()
    }

    /// Live connectivity probe; a blank API key is never ready
    pub async fn is_ready(&self) -> bool {
        if self
            .api_key
            .as_ref()
            .is_some_and(|key| key.expose_secret().trim().is_empty())
        {
            tracing::debug!(nickname = %self.nickname, "Remote wallet has an empty API key");
            return false;
        }
        self.client.ping().await
    }

    /// EVM address: process cache, then disk cache, then ask the agent
    pub async fn address(&self) -> Result<Address> {
        if let Some(address) = *self.address.read().await {
            return Ok(address);
        }

        if let Some(cached) = self.cache.load(&self.nickname, AddressKind::Evm).await {
            if let Ok(address) = cached.parse::<Address>() {
                tracing::debug!(nickname = %self.nickname, %address, "Using cached remote address");
                *self.address.write().await = Some(address);
                return Ok(address);
            }
        }

        tracing::info!(nickname = %self.nickname, "Fetching wallet address from remote agent");
        let job = self.client.run(EVM_ADDRESS_PROMPT).await?;
        let address = extract::evm_address(&job).ok_or_else(|| {
            Error::UnrecognizedJobResult(format!(
                "no EVM address in response: {}",
                job.response_text()
            ))
        })?;

        self.cache
            .store(&self.nickname, AddressKind::Evm, &address.to_checksum(None))
            .await;
        *self.address.write().await = Some(address);
        tracing::info!(nickname = %self.nickname, %address, "Remote wallet address resolved");
        Ok(address)
    }

    /// Solana address, cached the same way as the EVM one
    pub async fn solana_address(&self) -> Result<String> {
        if let Some(address) = self.solana_address.read().await.clone() {
            return Ok(address);
        }

        if let Some(cached) = self.cache.load(&self.nickname, AddressKind::Solana).await {
            *self.solana_address.write().await = Some(cached.clone());
            return Ok(cached);
        }

        let job = self.client.run(SOLANA_ADDRESS_PROMPT).await?;
        let address = extract::solana_address(&job).ok_or_else(|| {
            Error::UnrecognizedJobResult(format!(
                "no Solana address in response: {}",
                job.response_text()
            ))
        })?;

        self.cache
            .store(&self.nickname, AddressKind::Solana, &address)
            .await;
        *self.solana_address.write().await = Some(address.clone());
        Ok(address)
    }

    /// Submit a raw transaction and wait for the agent to execute it
    pub async fn send_raw_transaction(&self, tx: &RawTransaction) -> Result<B256> {
        if let Some(policy) = &self.policy {
            policy.check(tx)?;
        }

        tracing::info!(
            nickname = %self.nickname,
            to = %tx.to,
            chain_id = tx.chain_id,
            value = %tx.value,
            "Submitting transaction to remote agent"
        );

        let job = self.client.run(&tx.to_prompt()?).await?;
        let hash = extract::transaction_hash(&job)?;

        tracing::info!(nickname = %self.nickname, tx_hash = %hash, "Remote transaction executed");
        Ok(hash)
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<B256> {
        if !chain::contains_chain(&self.supported_chains(), tx.chain()) {
            return Err(Error::UnsupportedChain(format!(
                "{} is not supported by remote wallet \"{}\". Supported: {}",
                tx.chain(),
                self.nickname,
                self.supported_chains().join(", ")
            )));
        }
        let raw = RawTransaction::from_request(tx)?;
        self.send_raw_transaction(&raw).await
    }
}
