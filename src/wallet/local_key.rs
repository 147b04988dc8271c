//! Local key file backend
//!
//! Loads a private key from a JSON key file (`{"privateKey": "0x..", "address": "0x.."}`)
//! and signs in-process.

use super::{effective_chains, evm_target, wait_for_receipt, SecureWallet, TxReceiptSummary, TxRequest};
use super::{RECEIPT_MAX_ATTEMPTS, RECEIPT_POLL_INTERVAL};
use crate::chain::{self, EVM_SUPPORTED_CHAINS};
use crate::config::RpcConfig;
use crate::{Error, Result};
use alloy::primitives::{Address, B256};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// On-disk key file
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    private_key: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl KeyFile {
    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NoCredentials(format!("Key file not found: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid key file {}: {}", path.display(), e)))
    }

    /// Build the signer, checking it against the recorded address if there is one
    pub fn into_wallet(self) -> Result<SecureWallet> {
        let wallet = SecureWallet::from_hex(&self.private_key)?;
        if let Some(recorded) = self.address.as_deref() {
            let recorded: Address = recorded
                .parse()
                .map_err(|e| Error::Config(format!("Invalid address in key file: {}", e)))?;
            if recorded != wallet.address() {
                return Err(Error::Config(format!(
                    "Key file address {} does not match its private key",
                    recorded
                )));
            }
        }
        Ok(wallet)
    }
}

/// Backend signing with a key read from a local file
#[derive(Debug, Clone)]
pub struct LocalKeyBackend {
    nickname: String,
    path: PathBuf,
    chains: Option<Vec<String>>,
    rpc: RpcConfig,
    wallet: Arc<OnceCell<SecureWallet>>,
}

impl LocalKeyBackend {
    pub fn new(
        nickname: impl Into<String>,
        path: impl Into<PathBuf>,
        chains: Option<Vec<String>>,
        rpc: RpcConfig,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            path: path.into(),
            chains,
            rpc,
            wallet: Arc::new(OnceCell::new()),
        }
    }

    pub(crate) fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chain_restriction(&self) -> Option<&[String]> {
        self.chains.as_deref()
    }

    pub fn supported_chains(&self) -> Vec<String> {
        effective_chains(&self.chains, EVM_SUPPORTED_CHAINS)
    }

    /// Load the key file once; later calls reuse the signer
    async fn wallet(&self) -> Result<&SecureWallet> {
        self.wallet
            .get_or_try_init(|| async {
                let wallet = KeyFile::read(&self.path).await?.into_wallet()?;
                tracing::debug!(
                    nickname = %self.nickname,
                    address = %wallet.address(),
                    "Loaded local key"
                );
                Ok::<_, Error>(wallet)
            })
            .await
    }

    pub async fn address(&self) -> Result<Address> {
        Ok(self.wallet().await?.address())
    }

    pub async fn private_key(&self) -> Result<SecretString> {
        Ok(self.wallet().await?.private_key())
    }

    pub async fn is_ready(&self) -> bool {
        match self.wallet().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(nickname = %self.nickname, error = %e, "Local key not ready");
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
        let wallet = self.wallet().await?;

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
