//! Configuration for the wallet core
//!
//! Two layers live here:
//! - [`WalletsConfigFile`], the persisted `wallets.json` store owned by the manager
//! - [`ManagerSettings`], everything read from process configuration

pub mod rpc;

use crate::remote::PollConfig;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use rpc::RpcConfig;

/// Wallets file path override
pub const WALLETS_CONFIG_ENV: &str = "AGENT_WALLET_CONFIG";
/// Well-known local key file override
pub const LOCAL_KEY_PATH_ENV: &str = "EVM_WALLET_PATH";
/// Address cache directory override
pub const CACHE_DIR_ENV: &str = "AGENT_WALLET_CACHE_DIR";
/// Remote agent API key
pub const REMOTE_API_KEY_ENV: &str = "BANKR_API_KEY";
/// Remote agent API base URL
pub const REMOTE_API_URL_ENV: &str = "BANKR_API_URL";
/// Bulk named wallets, `{"name": {"address": "0x..", "privateKey": "0x.."}}`
pub const ENV_WALLETS_JSON_ENV: &str = "AGENT_WALLETS_JSON";
/// Registry mode, `execute` or `prepare`
pub const WALLET_MODE_ENV: &str = "AGENT_WALLET_MODE";

pub const DEFAULT_REMOTE_API_URL: &str = "https://api.bankr.bot";

/// Per-wallet address lookup budget when listing
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a persisted wallet comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletSource {
    #[serde(rename = "local-key", alias = "evm-wallet-skill", alias = "localKey")]
    LocalKey,
    #[serde(rename = "remote-agent", alias = "bankr")]
    RemoteAgent,
    #[serde(rename = "env")]
    Env,
    #[serde(other, rename = "unknown")]
    Unknown,
}

/// One persisted wallet entry
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub source: Option<WalletSource>,
    /// Local key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Remote agent credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Env wallets: variable holding the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Restrict the wallet to these chains
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chains: Option<Vec<String>>,
}

impl WalletRecord {
    pub fn local_key(path: Option<PathBuf>) -> Self {
        Self {
            source: Some(WalletSource::LocalKey),
            path,
            ..Default::default()
        }
    }

    pub fn remote_agent(api_key: impl Into<String>, api_url: Option<String>) -> Self {
        Self {
            source: Some(WalletSource::RemoteAgent),
            api_key: Some(api_key.into()),
            api_url,
            ..Default::default()
        }
    }

    pub fn env(
        address: Option<String>,
        private_key: Option<String>,
        env_var: Option<String>,
    ) -> Self {
        Self {
            source: Some(WalletSource::Env),
            address,
            private_key,
            env_var,
            ..Default::default()
        }
    }

    pub fn with_chains(mut self, chains: Vec<String>) -> Self {
        self.chains = Some(chains);
        self
    }

    pub fn source(&self) -> WalletSource {
        self.source.unwrap_or(WalletSource::Unknown)
    }
}

// Keys and API tokens must never reach logs
impl std::fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("WalletRecord")
            .field("source", &self.source)
            .field("path", &self.path)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("env_var", &self.env_var)
            .field("address", &self.address)
            .field("private_key", &redact(&self.private_key))
            .field("chains", &self.chains)
            .finish()
    }
}

/// The persisted `wallets.json` document
///
/// Updates are a plain read-modify-write of the whole file with no locking.
/// Two processes editing the store at once can lose an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletsConfigFile {
    #[serde(default)]
    pub wallets: BTreeMap<String, WalletRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl WalletsConfigFile {
    /// Read the store; a missing file is an empty store.
    ///
    /// Nicknames and the default are lowercased. On a case-only clash the
    /// first key in sorted order wins.
    pub async fn load(path: &Path) -> Result<Self> {
        let file: Self = match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Invalid wallets file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(file.with_lowercase_nicknames())
    }

    fn with_lowercase_nicknames(self) -> Self {
        let mut wallets = BTreeMap::new();
        for (name, record) in self.wallets {
            let lower = name.to_lowercase();
            if wallets.contains_key(&lower) {
                tracing::warn!(nickname = %name, "Dropping wallet record that differs only by case");
                continue;
            }
            wallets.insert(lower, record);
        }
        Self {
            wallets,
            default: self.default.map(|d| d.to_lowercase()),
        }
    }

    /// Write the whole store, creating parent directories as needed
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        tracing::debug!(path = %path.display(), "Wallets config saved");
        Ok(())
    }
}

/// Process-level configuration for the wallet manager
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Persisted wallets store
    pub config_path: PathBuf,
    /// Well-known local key file, auto-registered as "main"
    pub local_key_path: PathBuf,
    /// Remote agent address cache directory
    pub cache_dir: PathBuf,
    /// Remote agent credential, auto-registered as "bankr"
    pub remote_api_key: Option<SecretString>,
    pub remote_api_url: String,
    /// Raw JSON of additional named env wallets
    pub env_wallets_json: Option<String>,
    /// Per-wallet address lookup timeout in `list_wallets`
    pub list_timeout: Duration,
    pub poll: PollConfig,
    pub rpc: RpcConfig,
}

/// `EVM_WALLET_PATH`, else `~/.evm-wallet.json`
pub fn default_local_key_path() -> Option<PathBuf> {
    std::env::var(LOCAL_KEY_PATH_ENV)
        .ok()
        .map(PathBuf::from)
        .or_else(|| directories::UserDirs::new().map(|dirs| dirs.home_dir().join(".evm-wallet.json")))
}

impl ManagerSettings {
    /// Settings rooted in an explicit directory, with no ambient credentials.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            config_path: dir.join("wallets.json"),
            local_key_path: dir.join(".evm-wallet.json"),
            cache_dir: dir.join("cache"),
            remote_api_key: None,
            remote_api_url: DEFAULT_REMOTE_API_URL.to_string(),
            env_wallets_json: None,
            list_timeout: DEFAULT_LIST_TIMEOUT,
            poll: PollConfig::default(),
            rpc: RpcConfig::default(),
        }
    }

    /// Build settings from environment variables and the user's home directory
    pub fn from_env() -> Result<Self> {
        let home = directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| Error::Config("Could not resolve home directory".to_string()))?;
        let app_dir = home.join(".agent-wallet");

        let path_var = |name: &str| std::env::var(name).ok().map(PathBuf::from);

        Ok(Self {
            config_path: path_var(WALLETS_CONFIG_ENV)
                .unwrap_or_else(|| app_dir.join("wallets.json")),
            local_key_path: path_var(LOCAL_KEY_PATH_ENV)
                .unwrap_or_else(|| home.join(".evm-wallet.json")),
            cache_dir: path_var(CACHE_DIR_ENV).unwrap_or_else(|| app_dir.join("cache")),
            remote_api_key: std::env::var(REMOTE_API_KEY_ENV)
                .ok()
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            remote_api_url: std::env::var(REMOTE_API_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_REMOTE_API_URL.to_string()),
            env_wallets_json: std::env::var(ENV_WALLETS_JSON_ENV).ok(),
            list_timeout: DEFAULT_LIST_TIMEOUT,
            poll: PollConfig::default(),
            rpc: RpcConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_deserializes_legacy_source_names() {
        let value = serde_json::json!({
            "wallets": {
                "main": { "source": "evm-wallet-skill", "path": "/tmp/key.json" },
                "bankr": { "source": "bankr", "apiKey": "k" },
                "ops": { "source": "env", "envVar": "OPS_KEY", "chains": ["base"] },
                "odd": { "source": "carrier-pigeon" }
            },
            "default": "main"
        });
        let parsed: WalletsConfigFile = serde_json::from_value(value).expect("parse config");

        assert_eq!(parsed.wallets["main"].source(), WalletSource::LocalKey);
        assert_eq!(parsed.wallets["bankr"].source(), WalletSource::RemoteAgent);
        assert_eq!(parsed.wallets["ops"].env_var.as_deref(), Some("OPS_KEY"));
        assert_eq!(parsed.wallets["odd"].source(), WalletSource::Unknown);
        assert_eq!(parsed.default.as_deref(), Some("main"));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = WalletRecord::remote_agent("secret", None).with_chains(vec!["base".into()]);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["source"], "remote-agent");
        assert_eq!(value["apiKey"], "secret");
        assert!(value.get("apiUrl").is_none());
        assert_eq!(value["chains"][0], "base");
    }

    #[test]
    fn test_record_debug_redacts_secrets() {
        let record = WalletRecord::env(None, Some("0xdeadbeef".into()), None);
        let debug_str = format!("{:?}", record);

        assert!(!debug_str.contains("deadbeef"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = WalletsConfigFile::load(&dir.path().join("nope.json"))
            .await
            .unwrap();
        assert!(file.wallets.is_empty());
        assert!(file.default.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("wallets.json");

        let mut file = WalletsConfigFile::default();
        file.wallets
            .insert("main".into(), WalletRecord::local_key(None));
        file.default = Some("main".into());
        file.save(&path).await.unwrap();

        let loaded = WalletsConfigFile::load(&path).await.unwrap();
        assert_eq!(loaded, file);
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            WalletsConfigFile::load(&path).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_load_lowercases_nicknames() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "wallets": {
                    "Ops": { "source": "env", "envVar": "OPS_KEY" },
                    "ops": { "source": "env", "envVar": "OTHER_KEY" },
                    "Trading": { "source": "local-key" }
                },
                "default": "TRADING"
            })
            .to_string(),
        )
        .unwrap();

        let file = WalletsConfigFile::load(&path).await.unwrap();

        assert_eq!(
            file.wallets.keys().collect::<Vec<_>>(),
            vec!["ops", "trading"]
        );
        assert_eq!(file.wallets["ops"].env_var.as_deref(), Some("OPS_KEY"));
        assert_eq!(file.default.as_deref(), Some("trading"));
    }
}
