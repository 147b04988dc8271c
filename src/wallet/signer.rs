//! Secure key custody
//!
//! SECURITY: the key-holding backends keep their private key here and nowhere else.
//! - Keys are held in alloy's PrivateKeySigner which handles crypto securely
//! - The raw hex is kept as a `SecretString` and only leaves via `private_key()`
//! - Keys are never serialized and never logged

use super::TxRequest;
use crate::{Error, Result};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};

/// Secure wallet that protects private keys
///
/// The private key is:
/// - Stored in alloy's PrivateKeySigner
/// - Never serialized (no Serialize impl)
/// - Only reachable through signing, broadcasting or an explicit `private_key()` call
#[derive(Clone)]
pub struct SecureWallet {
    /// Public address (safe to expose)
    address: Address,
    /// Ethereum wallet for alloy providers
    wallet: EthereumWallet,
    key: SecretString,
}

impl SecureWallet {
    /// Create a wallet from an environment variable holding a hex private key
    pub fn from_env(var_name: &str) -> Result<Self> {
        let key_hex = std::env::var(var_name).map_err(|_| {
            Error::NoCredentials(format!("Environment variable {} not set", var_name))
        })?;

        Self::from_hex(&key_hex)
    }

    /// Create a wallet from a hex-encoded private key, with or without `0x`
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let trimmed = key_hex.trim();
        let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let signer: PrivateKeySigner = bare
            .parse()
            .map_err(|e| Error::Signing(format!("Invalid private key: {}", e)))?;

        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        Ok(Self {
            address,
            wallet,
            key: SecretString::from(format!("0x{}", bare)),
        })
    }

    pub fn from_secret(key: &SecretString) -> Result<Self> {
        Self::from_hex(key.expose_secret())
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as a checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Get a reference to the EthereumWallet for use with alloy providers
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }

    /// The `0x`-prefixed private key
    pub fn private_key(&self) -> SecretString {
        self.key.clone()
    }

    /// Sign `tx` and broadcast it through `rpc_url`.
    ///
    /// Returns as soon as the node accepts the transaction; confirmation is
    /// a separate step (see [`super::wait_for_receipt`]).
    pub async fn send_transaction(
        &self,
        rpc_url: &str,
        chain_id: u64,
        tx: &TxRequest,
    ) -> Result<B256> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .connect_http(url);

        let request = TransactionRequest::default()
            .from(self.address)
            .to(tx.to())
            .input(tx.data().clone().into())
            .value(tx.value())
            .with_chain_id(chain_id);

        let pending = provider
            .send_transaction(request)
            .await
            .map_err(|e| Error::Rpc(format!("Failed to send transaction: {}", e)))?;

        Ok(*pending.tx_hash())
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
