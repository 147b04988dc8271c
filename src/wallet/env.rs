//! Environment-sourced backend
//!
//! Same signing path as the local key backend, but the key comes from process
//! configuration: either inline (`AGENT_WALLETS_JSON`, config records) or a
//! named environment variable read at use time.

use super::{effective_chains, evm_target, wait_for_receipt, SecureWallet, TxReceiptSummary, TxRequest};
use super::{RECEIPT_MAX_ATTEMPTS, RECEIPT_POLL_INTERVAL};
use crate::chain::{self, EVM_SUPPORTED_CHAINS};
use crate::config::RpcConfig;
use crate::{Error, Result};
use alloy::primitives::{Address, B256};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Where an env backend finds its key
#[derive(Debug, Clone)]
pub enum EnvKeySource {
    Inline(SecretString),
    Var(String),
    /// Address-only wallet
    None,
}

/// One entry of the `AGENT_WALLETS_JSON` map
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvWalletEntry {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub chains: Option<Vec<String>>,
}

impl std::fmt::Debug for EnvWalletEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvWalletEntry")
            .field("address", &self.address)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("chains", &self.chains)
            .finish()
    }
}

/// Parse a bulk wallet map (`{"name": {"address": .., "privateKey": ..}}`)
pub fn parse_env_wallets(json: &str) -> Result<BTreeMap<String, EnvWalletEntry>> {
    serde_json::from_str(json)
        .map_err(|e| Error::Config(format!("Invalid wallets JSON: {}", e)))
}

/// Build env backends for every entry of a bulk wallet map
pub fn load_env_wallets(json: &str, rpc: &RpcConfig) -> Result<Vec<EnvBackend>> {
    let entries = parse_env_wallets(json)?;
    Ok(entries
        .into_iter()
        .map(|(name, entry)| {
            let key = match entry.private_key {
                Some(key) => EnvKeySource::Inline(SecretString::from(key)),
                None => EnvKeySource::None,
            };
            EnvBackend::new(name, key, entry.address, entry.chains, rpc.clone())
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct EnvBackend {
    nickname: String,
    key: EnvKeySource,
    declared_address: Option<String>,
    chains: Option<Vec<String>>,
    rpc: RpcConfig,
}

impl EnvBackend {
    pub fn new(
        nickname: impl Into<String>,
        key: EnvKeySource,
        declared_address: Option<String>,
        chains: Option<Vec<String>>,
        rpc: RpcConfig,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            key,
            declared_address,
            chains,
            rpc,
        }
    }

    pub(crate) fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn env_var(&self) -> Option<&str> {
        match &self.key {
            EnvKeySource::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn declared_address(&self) -> Option<&str> {
        self.declared_address.as_deref()
    }

    pub fn chain_restriction(&self) -> Option<&[String]> {
        self.chains.as_deref()
    }

    pub fn supported_chains(&self) -> Vec<String> {
        effective_chains(&self.chains, EVM_SUPPORTED_CHAINS)
    }

    fn wallet(&self) -> Result<SecureWallet> {
        match &self.key {
            EnvKeySource::Inline(key) => SecureWallet::from_secret(key),
            EnvKeySource::Var(name) => SecureWallet::from_env(name),
            EnvKeySource::None => Err(Error::NoCredentials(format!(
                "Wallet \"{}\" has no private key or key variable",
                self.nickname
            ))),
        }
    }

    fn parsed_declared_address(&self) -> Result<Option<Address>> {
        self.declared_address
            .as_deref()
            .map(|a| {
                a.parse::<Address>()
                    .map_err(|e| Error::Config(format!("Invalid address for \"{}\": {}", self.nickname, e)))
            })
            .transpose()
    }

    /// Declared address if present, otherwise the key's address
    pub fn address(&self) -> Result<Address> {
        match self.parsed_declared_address()? {
            Some(address) => Ok(address),
            None => Ok(self.wallet()?.address()),
        }
    }

    pub fn private_key(&self) -> Result<SecretString> {
        Ok(self.wallet()?.private_key())
    }

    /// Key resolves, and agrees with the declared address if one is given
    pub fn is_ready(&self) -> bool {
        let check = || -> Result<()> {
            let wallet = self.wallet()?;
            if let Some(declared) = self.parsed_declared_address()? {
                if declared != wallet.address() {
                    return Err(Error::Config(format!(
                        "Declared address {} does not match key",
                        declared
                    )));
                }
            }
            Ok(())
        };
        match check() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(nickname = %self.nickname, error = %e, "Env wallet not ready");
                false
            }
        }
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<B256> {
        if !chain::contains_chain(&self.supported_chains(), tx.chain()) {
            return Err(Error::UnsupportedChain(format!(
                "{} is not enabled for wallet \"{}\"",
                tx.chain(),
                self.nickname
            )));
        }
        let (rpc_url, chain_id) = evm_target(&self.rpc, tx.chain())?;
        let wallet = self.wallet()?;

        tracing::info!(
            nickname = %self.nickname,
            chain = %tx.chain(),
            to = %tx.to(),
            value = %tx.value(),
            "Sending transaction"
        );
        let hash = wallet.send_transaction(&rpc_url, chain_id, tx).await?;
        tracing::info!(nickname = %self.nickname, tx_hash = %hash, "Transaction broadcast");
        Ok(hash)
    }

    pub async fn wait_for_transaction(&self, hash: B256, chain_id: &str) -> Result<TxReceiptSummary> {
        let (rpc_url, _) = evm_target(&self.rpc, chain_id)?;
        wait_for_receipt(&rpc_url, hash, RECEIPT_POLL_INTERVAL, RECEIPT_MAX_ATTEMPTS).await
    }
}
