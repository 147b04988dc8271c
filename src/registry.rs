//! Flat wallet registry
//!
//! A simpler resolution path than [`crate::manager::WalletManager`]: a map of
//! wallet id to `{address, privateKey}` loaded once from `AGENT_WALLETS_JSON`,
//! plus a process-wide mode.
//!
//! - `execute`: entries must carry a private key
//! - `prepare`: address-only entries are fine, nothing is signed
//!
//! Lookups that fail validation return `None` and log why, so callers can
//! degrade instead of aborting. [`WalletRegistry::resolve_wallet`] also asks
//! an optional [`WalletResolver`] before giving up.

use crate::config::{default_local_key_path, ENV_WALLETS_JSON_ENV, WALLET_MODE_ENV};
use crate::wallet::{KeyFile, SecureWallet};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Execute,
    Prepare,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Execute => "execute",
            Mode::Prepare => "prepare",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "execute" => Ok(Mode::Execute),
            "prepare" => Ok(Mode::Prepare),
            other => Err(Error::InvalidArgument(format!(
                "Unknown wallet mode \"{}\" (expected execute or prepare)",
                other
            ))),
        }
    }
}

/// A resolved registry entry
#[derive(Clone)]
pub struct RegistryEntry {
    pub address: String,
    pub private_key: Option<SecretString>,
    pub mode: Mode,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("address", &self.address)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("mode", &self.mode)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
}

/// Fallback source consulted by [`WalletRegistry::resolve_wallet`]
#[async_trait]
pub trait WalletResolver: Send + Sync {
    /// Ids this resolver can answer
    fn wallet_ids(&self) -> Vec<String>;

    async fn resolve(&self, wallet_id: &str) -> Result<SecureWallet>;
}

/// Answers `default` and `main` from the well-known local key file
#[derive(Debug, Clone)]
pub struct KeyFileResolver {
    path: PathBuf,
}

impl KeyFileResolver {
    pub const IDS: [&'static str; 2] = ["default", "main"];

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WalletResolver for KeyFileResolver {
    fn wallet_ids(&self) -> Vec<String> {
        if self.path.exists() {
            Self::IDS.iter().map(|id| id.to_string()).collect()
        } else {
            Vec::new()
        }
    }

    async fn resolve(&self, wallet_id: &str) -> Result<SecureWallet> {
        if !Self::IDS.contains(&wallet_id) {
            return Err(Error::wallet_not_found(wallet_id, Self::IDS));
        }
        KeyFile::read(&self.path).await?.into_wallet()
    }
}

#[derive(Debug, Clone)]
enum RegistrySource {
    Env,
    Inline { json: String, mode: Mode },
}

pub struct WalletRegistry {
    wallets: BTreeMap<String, StoredEntry>,
    mode: Mode,
    source: RegistrySource,
    fallback: Option<Arc<dyn WalletResolver>>,
}

/// Parsed entry; the key stays wrapped until it is handed out
#[derive(Clone)]
struct StoredEntry {
    address: Option<String>,
    private_key: Option<SecretString>,
}

fn parse_wallets(json: &str) -> BTreeMap<String, StoredEntry> {
    match serde_json::from_str::<BTreeMap<String, RawEntry>>(json) {
        Ok(raw) => raw
            .into_iter()
            .map(|(id, entry)| {
                let private_key = entry.private_key.map(SecretString::from);
                (
                    id,
                    StoredEntry {
                        address: entry.address,
                        private_key,
                    },
                )
            })
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse wallets JSON; registry is empty");
            BTreeMap::new()
        }
    }
}

fn mode_from_env() -> Mode {
    match std::env::var(WALLET_MODE_ENV) {
        Ok(value) if !value.trim().is_empty() => value.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to execute mode");
            Mode::Execute
        }),
        _ => Mode::Execute,
    }
}

impl WalletRegistry {
    /// Registry over an explicit wallets JSON object
    pub fn from_json(json: &str, mode: Mode) -> Self {
        let wallets = parse_wallets(json);
        tracing::info!(count = wallets.len(), %mode, "Loaded wallet registry");
        Self {
            wallets,
            mode,
            source: RegistrySource::Inline {
                json: json.to_string(),
                mode,
            },
            fallback: None,
        }
    }

    /// Registry from `AGENT_WALLETS_JSON` and `AGENT_WALLET_MODE`
    pub fn from_env() -> Self {
        let mode = mode_from_env();
        let wallets = match std::env::var(ENV_WALLETS_JSON_ENV) {
            Ok(json) => parse_wallets(&json),
            Err(_) => {
                tracing::warn!("{} not set", ENV_WALLETS_JSON_ENV);
                BTreeMap::new()
            }
        };
        tracing::info!(count = wallets.len(), %mode, "Loaded wallet registry");
        Self {
            wallets,
            mode,
            source: RegistrySource::Env,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn WalletResolver>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_execute_mode(&self) -> bool {
        self.mode == Mode::Execute
    }

    pub fn is_prepare_mode(&self) -> bool {
        self.mode == Mode::Prepare
    }

    /// Local lookup only. `None` when missing or invalid for the current mode.
    pub fn get_wallet(&self, wallet_id: &str) -> Option<RegistryEntry> {
        let Some(entry) = self.wallets.get(wallet_id) else {
            tracing::debug!(wallet_id, "Wallet not in registry");
            return None;
        };

        if self.mode == Mode::Execute && entry.private_key.is_none() {
            tracing::error!(wallet_id, "Wallet is missing privateKey in execute mode");
            return None;
        }

        match entry.address.as_deref() {
            Some(address) if ADDRESS_RE.is_match(address) => Some(RegistryEntry {
                address: address.to_string(),
                private_key: entry.private_key.clone(),
                mode: self.mode,
            }),
            other => {
                tracing::error!(wallet_id, address = ?other, "Wallet has an invalid address");
                None
            }
        }
    }

    /// Local lookup, then the fallback resolver
    pub async fn resolve_wallet(&self, wallet_id: &str) -> Option<RegistryEntry> {
        if let Some(entry) = self.get_wallet(wallet_id) {
            return Some(entry);
        }

        let fallback = self.fallback.as_ref()?;
        match fallback.resolve(wallet_id).await {
            Ok(wallet) => Some(RegistryEntry {
                address: wallet.address_string(),
                private_key: Some(wallet.private_key()),
                mode: self.mode,
            }),
            Err(e) => {
                tracing::error!(wallet_id, error = %e, "Wallet not found");
                None
            }
        }
    }

    /// Local ids followed by fallback ids, without duplicates
    pub fn wallet_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.wallets.keys().cloned().collect();
        if let Some(fallback) = &self.fallback {
            for id in fallback.wallet_ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    pub fn wallet_count(&self) -> usize {
        self.wallet_ids().len()
    }

    /// Re-read the wallets (and, for env registries, the mode) from their source
    pub fn reload(&mut self) {
        match &self.source {
            RegistrySource::Env => {
                self.mode = mode_from_env();
                self.wallets = std::env::var(ENV_WALLETS_JSON_ENV)
                    .map(|json| parse_wallets(&json))
                    .unwrap_or_default();
            }
            RegistrySource::Inline { json, mode } => {
                self.mode = *mode;
                self.wallets = parse_wallets(json);
            }
        }
        tracing::debug!(count = self.wallets.len(), "Reloaded wallet registry");
    }
}

impl std::fmt::Debug for WalletRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRegistry")
            .field("wallets", &self.wallets.keys().collect::<Vec<_>>())
            .field("mode", &self.mode)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

static DEFAULT_REGISTRY: Mutex<Option<Arc<WalletRegistry>>> = Mutex::new(None);

/// Process-wide registry from the environment, with the local key file as fallback
pub fn default_registry() -> Arc<WalletRegistry> {
    let mut slot = DEFAULT_REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(registry) = slot.as_ref() {
        return registry.clone();
    }

    let mut registry = WalletRegistry::from_env();
    if let Some(path) = default_local_key_path() {
        registry = registry.with_fallback(Arc::new(KeyFileResolver::new(path)));
    }
    let registry = Arc::new(registry);
    *slot = Some(registry.clone());
    registry
}

pub fn reset_default_registry() {
    *DEFAULT_REGISTRY.lock().unwrap_or_else(|e| e.into_inner()) = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use tempfile::TempDir;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn wallets_json() -> String {
        json!({
            "hot": { "address": TEST_ADDRESS, "privateKey": TEST_KEY },
            "watch": { "address": "0x00000000000000000000000000000000000000aa" },
            "broken": { "address": "not-an-address", "privateKey": TEST_KEY },
            "short": { "address": "0x1234", "privateKey": TEST_KEY }
        })
        .to_string()
    }

    #[test]
    fn test_execute_mode_requires_private_key() {
        let registry = WalletRegistry::from_json(&wallets_json(), Mode::Execute);

        let hot = registry.get_wallet("hot").unwrap();
        assert_eq!(hot.address, TEST_ADDRESS);
        assert_eq!(hot.private_key.unwrap().expose_secret(), TEST_KEY);
        assert!(registry.get_wallet("watch").is_none());
        assert!(registry.is_execute_mode());
    }

    #[test]
    fn test_prepare_mode_accepts_address_only() {
        let registry = WalletRegistry::from_json(&wallets_json(), Mode::Prepare);

        let watch = registry.get_wallet("watch").unwrap();
        assert!(watch.private_key.is_none());
        assert_eq!(watch.mode, Mode::Prepare);
        assert!(registry.is_prepare_mode());
    }

    #[test]
    fn test_invalid_address_is_not_found() {
        let registry = WalletRegistry::from_json(&wallets_json(), Mode::Execute);
        assert!(registry.get_wallet("broken").is_none());
        assert!(registry.get_wallet("short").is_none());
        assert!(registry.get_wallet("missing").is_none());
    }

    #[test]
    fn test_malformed_json_gives_empty_registry() {
        let registry = WalletRegistry::from_json("{not json", Mode::Execute);
        assert_eq!(registry.wallet_count(), 0);
        assert!(registry.wallet_ids().is_empty());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("PREPARE".parse::<Mode>().unwrap(), Mode::Prepare);
        assert_eq!(" execute ".parse::<Mode>().unwrap(), Mode::Execute);
        assert!(matches!("dry-run".parse::<Mode>(), Err(Error::InvalidArgument(_))));
        assert_eq!(Mode::default(), Mode::Execute);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_key_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".evm-wallet.json");
        std::fs::write(&path, json!({ "privateKey": TEST_KEY }).to_string()).unwrap();
        let registry = WalletRegistry::from_json(&wallets_json(), Mode::Execute)
            .with_fallback(Arc::new(KeyFileResolver::new(&path)));

        let main = registry.resolve_wallet("main").await.unwrap();
        assert_eq!(main.address, TEST_ADDRESS);
        assert!(main.private_key.is_some());

        assert!(registry.resolve_wallet("default").await.is_some());
        assert!(registry.resolve_wallet("elsewhere").await.is_none());
        assert_eq!(registry.resolve_wallet("hot").await.unwrap().address, TEST_ADDRESS);
    }

    #[tokio::test]
    async fn test_resolve_without_fallback() {
        let registry = WalletRegistry::from_json(&wallets_json(), Mode::Execute);
        assert!(registry.resolve_wallet("main").await.is_none());
    }

    #[test]
    fn test_wallet_ids_merge_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(&path, json!({ "privateKey": TEST_KEY }).to_string()).unwrap();
        let json = json!({ "main": { "address": TEST_ADDRESS, "privateKey": TEST_KEY } }).to_string();
        let registry = WalletRegistry::from_json(&json, Mode::Execute)
            .with_fallback(Arc::new(KeyFileResolver::new(&path)));

        assert_eq!(registry.wallet_ids(), vec!["main".to_string(), "default".to_string()]);
        assert_eq!(registry.wallet_count(), 2);
    }

    #[test]
    fn test_key_file_resolver_without_file_has_no_ids() {
        let dir = TempDir::new().unwrap();
        let resolver = KeyFileResolver::new(dir.path().join("missing.json"));
        assert!(resolver.wallet_ids().is_empty());
    }

    #[test]
    fn test_reload_inline_source() {
        let mut registry = WalletRegistry::from_json(&wallets_json(), Mode::Prepare);
        registry.reload();
        assert_eq!(registry.mode(), Mode::Prepare);
        assert!(registry.get_wallet("watch").is_some());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let registry = WalletRegistry::from_json(&wallets_json(), Mode::Execute);
        let entry = registry.get_wallet("hot").unwrap();
        let rendered = format!("{:?} {:?}", entry, registry);
        assert!(!rendered.contains(&TEST_KEY[2..]));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_default_registry_is_shared_until_reset() {
        reset_default_registry();
        let first = default_registry();
        assert!(Arc::ptr_eq(&first, &default_registry()));
        reset_default_registry();
        assert!(!Arc::ptr_eq(&first, &default_registry()));
    }
}
