//! Wallet manager
//!
//! Turns "a nickname or nothing" into a ready [`WalletBackend`] and owns the
//! persisted wallets file.
//!
//! Discovery runs once, lazily, in this order. A nickname registered by an
//! earlier source is never overwritten by a later one.
//! 1. Entries of the wallets config file
//! 2. The well-known local key file, as `main`, if it loads
//! 3. A remote agent API key, as `bankr`, if the service answers
//! 4. Named wallets from `AGENT_WALLETS_JSON`
//!
//! Nicknames are case-insensitive and stored lowercase.

use crate::config::{ManagerSettings, WalletRecord, WalletSource, WalletsConfigFile};
use crate::remote::RemoteAgentBackend;
use crate::wallet::{load_env_wallets, BackendKind, EnvBackend, EnvKeySource, LocalKeyBackend, WalletBackend};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OnceCell, RwLock};

/// Nickname of the auto-discovered local key wallet
pub const MAIN_WALLET: &str = "main";
/// Nickname of the auto-discovered remote agent wallet
pub const REMOTE_WALLET: &str = "bankr";
/// Shown in listings when a wallet's address cannot be resolved in time
pub const ADDRESS_PLACEHOLDER: &str = "0x...";

const NO_WALLET_REMEDIATION: &str = "Configure one of:\n\
    - a local key file at ~/.evm-wallet.json (or set EVM_WALLET_PATH)\n\
    - BANKR_API_KEY for the remote agent wallet\n\
    - AGENT_WALLETS_JSON with named wallets\n\
    - `agent-wallet add <nickname> ...` to add a wallet to the config file";

/// One row of [`WalletManager::list_wallets`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub nickname: String,
    pub kind: BackendKind,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solana_address: Option<String>,
    pub chains: Vec<String>,
    pub is_default: bool,
}

/// Registered backends in registration order, plus the default pointer
#[derive(Debug, Default)]
struct ManagerState {
    wallets: Vec<(String, WalletBackend)>,
    default: Option<String>,
}

impl ManagerState {
    fn position(&self, name: &str) -> Option<usize> {
        self.wallets.iter().position(|(n, _)| n == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn get(&self, name: &str) -> Option<&WalletBackend> {
        self.wallets.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.wallets.iter().map(|(n, _)| n.as_str())
    }

    /// Register unless taken; returns whether it was inserted
    fn insert_new(&mut self, name: String, backend: WalletBackend) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.wallets.push((name, backend));
        true
    }

    fn upsert(&mut self, name: String, backend: WalletBackend) {
        match self.position(&name) {
            Some(i) => self.wallets[i] = (name, backend),
            None => self.wallets.push((name, backend)),
        }
    }

    fn remove(&mut self, name: &str) -> Option<WalletBackend> {
        let i = self.position(name)?;
        Some(self.wallets.remove(i).1)
    }

    /// Keep a valid default, else prefer `main`, else the first registered wallet
    fn determine_default(&mut self) {
        if let Some(current) = self.default.as_deref() {
            if self.contains(current) {
                return;
            }
            tracing::warn!(default = %current, "Configured default wallet is not registered");
        }
        self.default = if self.contains(MAIN_WALLET) {
            Some(MAIN_WALLET.to_string())
        } else {
            self.wallets.first().map(|(n, _)| n.clone())
        };
    }
}

fn chain_restriction(backend: &WalletBackend) -> Option<&[String]> {
    match backend {
        WalletBackend::LocalKey(b) => b.chain_restriction(),
        WalletBackend::Env(b) => b.chain_restriction(),
        WalletBackend::RemoteAgent(b) => b.chain_restriction(),
    }
}

fn normalize_nickname(nickname: &str) -> Result<String> {
    let name = nickname.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::InvalidArgument("Wallet nickname cannot be empty".to_string()));
    }
    Ok(name)
}

pub struct WalletManager {
    settings: ManagerSettings,
    state: RwLock<ManagerState>,
    initialized: OnceCell<()>,
    /// Serializes config-file mutations within this process
    crud: AsyncMutex<()>,
}

impl WalletManager {
    pub fn new(settings: ManagerSettings) -> Self {
        Self {
            settings,
            state: RwLock::new(ManagerState::default()),
            initialized: OnceCell::new(),
            crud: AsyncMutex::new(()),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    async fn ensure_initialized(&self) {
        self.initialized
            .get_or_init(|| async {
                let state = self.discover().await;
                tracing::info!(
                    wallets = state.wallets.len(),
                    default = ?state.default,
                    "Wallet manager initialized"
                );
                *self.state.write().await = state;
            })
            .await;
    }

    async fn discover(&self) -> ManagerState {
        let mut state = ManagerState::default();

        match WalletsConfigFile::load(&self.settings.config_path).await {
            Ok(file) => {
                for (name, record) in file.wallets {
                    let name = name.to_lowercase();
                    match self.backend_from_record(&name, &record) {
                        Ok(backend) => {
                            state.insert_new(name, backend);
                        }
                        Err(e) => {
                            tracing::warn!(nickname = %name, error = %e, "Skipping configured wallet")
                        }
                    }
                }
                state.default = file.default.map(|d| d.to_lowercase());
            }
            Err(e) => tracing::warn!(
                path = %self.settings.config_path.display(),
                error = %e,
                "Failed to load wallets config"
            ),
        }

        let key_path = &self.settings.local_key_path;
        if !state.contains(MAIN_WALLET) && tokio::fs::try_exists(key_path).await.unwrap_or(false) {
            let backend = LocalKeyBackend::new(MAIN_WALLET, key_path, None, self.settings.rpc.clone());
            if backend.is_ready().await {
                state.insert_new(MAIN_WALLET.to_string(), backend.into());
                tracing::info!(path = %key_path.display(), "Auto-discovered local key wallet as \"main\"");
            } else {
                tracing::debug!(path = %key_path.display(), "Local key file present but not usable");
            }
        }

        if !state.contains(REMOTE_WALLET) {
            if let Some(api_key) = &self.settings.remote_api_key {
                let backend = RemoteAgentBackend::new(
                    REMOTE_WALLET,
                    api_key.clone(),
                    Some(self.settings.remote_api_url.clone()),
                    &self.settings.cache_dir,
                    self.settings.poll,
                );
                if backend.is_ready().await {
                    state.insert_new(REMOTE_WALLET.to_string(), backend.into());
                    tracing::info!("Auto-discovered remote agent wallet as \"bankr\"");
                } else {
                    tracing::warn!("Remote agent API key present but connectivity check failed");
                }
            }
        }

        if let Some(json) = &self.settings.env_wallets_json {
            match load_env_wallets(json, &self.settings.rpc) {
                Ok(wallets) => {
                    for wallet in wallets {
                        let name = wallet.nickname().to_lowercase();
                        let backend = WalletBackend::from(wallet).renamed(&name);
                        if state.insert_new(name.clone(), backend) {
                            tracing::info!(nickname = %name, "Auto-discovered env wallet");
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring AGENT_WALLETS_JSON"),
            }
        }

        state.determine_default();
        state
    }

    /// Build a backend for a persisted record
    pub fn backend_from_record(&self, nickname: &str, record: &WalletRecord) -> Result<WalletBackend> {
        let chains = record.chains.clone();
        match record.source() {
            WalletSource::LocalKey => {
                let path = record
                    .path
                    .clone()
                    .unwrap_or_else(|| self.settings.local_key_path.clone());
                Ok(LocalKeyBackend::new(nickname, path, chains, self.settings.rpc.clone()).into())
            }
            WalletSource::RemoteAgent => {
                let api_key = record
                    .api_key
                    .as_deref()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        Error::Config(format!("Remote wallet \"{}\" is missing apiKey", nickname))
                    })?;
                Ok(RemoteAgentBackend::new(
                    nickname,
                    SecretString::from(api_key),
                    record.api_url.clone(),
                    &self.settings.cache_dir,
                    self.settings.poll,
                )
                .with_chains(chains)
                .into())
            }
            WalletSource::Env => {
                let key = match (&record.private_key, &record.env_var) {
                    (Some(key), _) => EnvKeySource::Inline(SecretString::from(key.as_str())),
                    (None, Some(var)) => EnvKeySource::Var(var.clone()),
                    (None, None) => EnvKeySource::None,
                };
                Ok(EnvBackend::new(
                    nickname,
                    key,
                    record.address.clone(),
                    chains,
                    self.settings.rpc.clone(),
                )
                .into())
            }
            WalletSource::Unknown => Err(Error::Config(format!(
                "Unknown wallet source for \"{}\"",
                nickname
            ))),
        }
    }

    /// Persistable record for a registered backend. Private keys are never included.
    fn backend_to_record(&self, backend: &WalletBackend) -> Result<WalletRecord> {
        let mut record = match backend {
            WalletBackend::LocalKey(b) => WalletRecord::local_key(Some(b.path().to_path_buf())),
            WalletBackend::Env(b) => {
                let address = match b.declared_address() {
                    Some(a) => Some(a.to_string()),
                    None => b.address().ok().map(|a| a.to_checksum(None)),
                };
                WalletRecord::env(address, None, b.env_var().map(str::to_string))
            }
            WalletBackend::RemoteAgent(b) => {
                let api_key = b
                    .api_key()
                    .or(self.settings.remote_api_key.as_ref())
                    .ok_or_else(|| {
                        Error::Config(format!(
                            "No API key available to persist remote wallet \"{}\"",
                            b.nickname()
                        ))
                    })?;
                WalletRecord::remote_agent(
                    api_key.expose_secret(),
                    b.api_url().map(str::to_string),
                )
            }
        };
        record.chains = chain_restriction(backend).map(<[String]>::to_vec);
        Ok(record)
    }

    /// Resolve a nickname, or the default wallet when `None`
    pub async fn resolve(&self, nickname: Option<&str>) -> Result<WalletBackend> {
        self.ensure_initialized().await;
        let state = self.state.read().await;

        let name = match nickname {
            Some(n) => normalize_nickname(n)?,
            None => state.default.clone().ok_or_else(|| Error::NoWalletConfigured {
                remediation: NO_WALLET_REMEDIATION.to_string(),
            })?,
        };

        state
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::wallet_not_found(&name, state.names()))
    }

    pub async fn has(&self, nickname: &str) -> bool {
        self.ensure_initialized().await;
        let name = nickname.trim().to_lowercase();
        self.state.read().await.contains(&name)
    }

    pub async fn default_wallet_name(&self) -> Option<String> {
        self.ensure_initialized().await;
        self.state.read().await.default.clone()
    }

    pub async fn wallet_ids(&self) -> Vec<String> {
        self.ensure_initialized().await;
        self.state.read().await.names().map(str::to_string).collect()
    }

    /// Register a backend in memory only. Replaces any wallet of the same name.
    pub async fn register_wallet(&self, nickname: &str, backend: WalletBackend) -> Result<()> {
        self.ensure_initialized().await;
        let name = normalize_nickname(nickname)?;
        let mut state = self.state.write().await;
        state.upsert(name.clone(), backend.renamed(&name));
        state.determine_default();
        tracing::debug!(nickname = %name, "Registered wallet");
        Ok(())
    }

    /// Every wallet with its address, chains and default flag.
    ///
    /// Address lookups run concurrently, each bounded by the listing timeout;
    /// a wallet that errors or runs out of time gets [`ADDRESS_PLACEHOLDER`].
    pub async fn list_wallets(&self) -> Vec<WalletInfo> {
        self.ensure_initialized().await;
        let (wallets, default) = {
            let state = self.state.read().await;
            (state.wallets.clone(), state.default.clone())
        };
        let timeout = self.settings.list_timeout;

        let lookups = wallets.into_iter().map(|(name, backend)| {
            let is_default = default.as_deref() == Some(name.as_str());
            async move {
                let address = match tokio::time::timeout(timeout, backend.address()).await {
                    Ok(Ok(address)) => Some(address.to_checksum(None)),
                    Ok(Err(e)) => {
                        tracing::warn!(nickname = %name, error = %e, "Could not resolve wallet address");
                        None
                    }
                    Err(_) => {
                        tracing::warn!(nickname = %name, ?timeout, "Timed out resolving wallet address");
                        None
                    }
                };

                let solana_address = match (backend.as_remote(), address.is_some()) {
                    (Some(remote), true) => tokio::time::timeout(timeout, remote.solana_address())
                        .await
                        .ok()
                        .and_then(|r| r.ok()),
                    _ => None,
                };

                WalletInfo {
                    kind: backend.kind(),
                    chains: backend.supported_chains(),
                    address: address.unwrap_or_else(|| ADDRESS_PLACEHOLDER.to_string()),
                    solana_address,
                    is_default,
                    nickname: name,
                }
            }
        });

        futures::future::join_all(lookups).await
    }

    /// Validate and persist a new wallet.
    ///
    /// The backend must report ready before anything is written.
    pub async fn add_wallet(&self, nickname: &str, record: WalletRecord) -> Result<()> {
        self.ensure_initialized().await;
        let _crud = self.crud.lock().await;
        let name = normalize_nickname(nickname)?;

        if self.state.read().await.contains(&name) {
            return Err(Error::WalletExists(name));
        }

        let backend = self.backend_from_record(&name, &record)?;
        if !backend.is_ready().await {
            return Err(Error::WalletNotReady(name));
        }

        let path = &self.settings.config_path;
        let mut file = WalletsConfigFile::load(path).await?;
        file.wallets.insert(name.clone(), record);
        file.save(path).await?;

        let mut state = self.state.write().await;
        state.insert_new(name.clone(), backend);
        state.determine_default();
        tracing::info!(nickname = %name, "Added wallet");
        Ok(())
    }

    /// Rename a wallet, moving its record and any default pointer in one write
    pub async fn rename_wallet(&self, current: &str, new: &str) -> Result<()> {
        self.ensure_initialized().await;
        let _crud = self.crud.lock().await;
        let current = normalize_nickname(current)?;
        let new = normalize_nickname(new)?;

        let backend = {
            let state = self.state.read().await;
            let backend = state
                .get(&current)
                .cloned()
                .ok_or_else(|| Error::wallet_not_found(&current, state.names()))?;
            if state.contains(&new) {
                return Err(Error::WalletExists(new));
            }
            backend
        };

        let path = &self.settings.config_path;
        let mut file = WalletsConfigFile::load(path).await?;
        if file.wallets.contains_key(&new) {
            return Err(Error::WalletExists(new));
        }
        let record = match file.wallets.remove(&current) {
            Some(record) => record,
            // Auto-discovered wallets have no record yet
            None => self.backend_to_record(&backend)?,
        };
        file.wallets.insert(new.clone(), record);
        if file.default.as_deref() == Some(current.as_str()) {
            file.default = Some(new.clone());
        }
        file.save(path).await?;

        let mut state = self.state.write().await;
        if let Some(i) = state.position(&current) {
            state.wallets[i] = (new.clone(), backend.renamed(&new));
        }
        if state.default.as_deref() == Some(current.as_str()) {
            state.default = Some(new.clone());
        }
        tracing::info!(from = %current, to = %new, "Renamed wallet");
        Ok(())
    }

    /// Remove a wallet; a default pointing at it is cleared and re-derived
    pub async fn remove_wallet(&self, nickname: &str) -> Result<()> {
        self.ensure_initialized().await;
        let _crud = self.crud.lock().await;
        let name = normalize_nickname(nickname)?;

        {
            let state = self.state.read().await;
            if !state.contains(&name) {
                return Err(Error::wallet_not_found(&name, state.names()));
            }
        }

        let path = &self.settings.config_path;
        let mut file = WalletsConfigFile::load(path).await?;
        file.wallets.remove(&name);
        if file.default.as_deref() == Some(name.as_str()) {
            file.default = None;
        }
        file.save(path).await?;

        let mut state = self.state.write().await;
        state.remove(&name);
        if state.default.as_deref() == Some(name.as_str()) {
            state.default = None;
        }
        state.determine_default();
        tracing::info!(nickname = %name, "Removed wallet");
        Ok(())
    }

    pub async fn set_default_wallet(&self, nickname: &str) -> Result<()> {
        self.ensure_initialized().await;
        let _crud = self.crud.lock().await;
        let name = normalize_nickname(nickname)?;

        {
            let state = self.state.read().await;
            if !state.contains(&name) {
                return Err(Error::wallet_not_found(&name, state.names()));
            }
        }

        let path = &self.settings.config_path;
        let mut file = WalletsConfigFile::load(path).await?;
        file.default = Some(name.clone());
        file.save(path).await?;

        self.state.write().await.default = Some(name.clone());
        tracing::info!(nickname = %name, "Set default wallet");
        Ok(())
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("config_path", &self.settings.config_path)
            .field("initialized", &self.initialized.initialized())
            .finish_non_exhaustive()
    }
}

static DEFAULT_MANAGER: Mutex<Option<Arc<WalletManager>>> = Mutex::new(None);

/// Process-wide manager built from the environment on first use
pub fn default_manager() -> Result<Arc<WalletManager>> {
    let mut slot = DEFAULT_MANAGER.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(manager) = slot.as_ref() {
        return Ok(manager.clone());
    }
    let manager = Arc::new(WalletManager::new(ManagerSettings::from_env()?));
    *slot = Some(manager.clone());
    Ok(manager)
}

/// Drop the process-wide manager; the next call rebuilds it
pub fn reset_default_manager() {
    *DEFAULT_MANAGER.lock().unwrap_or_else(|e| e.into_inner()) = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::transport::testing::HangingTransport;
    use crate::remote::{AddressCache, PollConfig};
    use alloy::primitives::Address;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const OTHER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn write_key(path: &Path, key: &str) {
        std::fs::write(path, serde_json::json!({ "privateKey": key }).to_string()).unwrap();
    }

    fn key_file(dir: &TempDir, name: &str, key: &str) -> PathBuf {
        let path = dir.path().join(name);
        write_key(&path, key);
        path
    }

    fn manager(dir: &TempDir) -> WalletManager {
        WalletManager::new(ManagerSettings::rooted_at(dir.path()))
    }

    fn read_config(dir: &TempDir) -> WalletsConfigFile {
        let content = std::fs::read_to_string(dir.path().join("wallets.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_without_wallets_fails() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert!(matches!(
            manager.resolve(None).await,
            Err(Error::NoWalletConfigured { .. })
        ));
        assert!(manager.list_wallets().await.is_empty());
        assert_eq!(manager.default_wallet_name().await, None);
    }

    #[tokio::test]
    async fn test_local_key_file_becomes_main_and_default() {
        let dir = TempDir::new().unwrap();
        write_key(&dir.path().join(".evm-wallet.json"), TEST_KEY);
        let manager = manager(&dir);

        let backend = manager.resolve(None).await.unwrap();

        assert_eq!(backend.nickname(), MAIN_WALLET);
        assert_eq!(backend.kind(), BackendKind::LocalKey);
        assert_eq!(backend.address().await.unwrap(), TEST_ADDRESS.parse::<Address>().unwrap());
        assert!(manager.has("MAIN").await);
    }

    #[tokio::test]
    async fn test_stale_default_is_repaired() {
        let dir = TempDir::new().unwrap();
        write_key(&dir.path().join(".evm-wallet.json"), TEST_KEY);
        std::fs::write(
            dir.path().join("wallets.json"),
            serde_json::json!({
                "wallets": { "odd": { "source": "carrier-pigeon" } },
                "default": "gone"
            })
            .to_string(),
        )
        .unwrap();
        let manager = manager(&dir);

        assert_eq!(manager.default_wallet_name().await.as_deref(), Some(MAIN_WALLET));
        assert_eq!(manager.wallet_ids().await, vec![MAIN_WALLET.to_string()]);
    }

    #[tokio::test]
    async fn test_config_entries_win_over_discovery() {
        let dir = TempDir::new().unwrap();
        write_key(&dir.path().join(".evm-wallet.json"), TEST_KEY);
        let other = key_file(&dir, "other.json", OTHER_KEY);
        let mut file = WalletsConfigFile::default();
        file.wallets
            .insert("main".into(), WalletRecord::local_key(Some(other.clone())));
        file.save(&dir.path().join("wallets.json")).await.unwrap();

        let mut settings = ManagerSettings::rooted_at(dir.path());
        settings.env_wallets_json = Some(
            serde_json::json!({
                "main": { "privateKey": TEST_KEY },
                "Trader": { "privateKey": TEST_KEY }
            })
            .to_string(),
        );
        let manager = WalletManager::new(settings);

        match manager.resolve(Some("main")).await.unwrap() {
            WalletBackend::LocalKey(b) => assert_eq!(b.path(), other.as_path()),
            unexpected => panic!("unexpected backend {:?}", unexpected.kind()),
        }
        let trader = manager.resolve(Some("trader")).await.unwrap();
        assert_eq!(trader.kind(), BackendKind::Env);
        assert_eq!(trader.nickname(), "trader");
    }

    #[tokio::test]
    async fn test_add_then_remove_clears_record_and_default() {
        let dir = TempDir::new().unwrap();
        let path = key_file(&dir, "ops.json", TEST_KEY);
        let manager = manager(&dir);

        manager
            .add_wallet("ops", WalletRecord::local_key(Some(path)))
            .await
            .unwrap();
        manager.set_default_wallet("ops").await.unwrap();
        assert!(read_config(&dir).wallets.contains_key("ops"));
        assert_eq!(read_config(&dir).default.as_deref(), Some("ops"));

        manager.remove_wallet("ops").await.unwrap();

        let file = read_config(&dir);
        assert!(!file.wallets.contains_key("ops"));
        assert_eq!(file.default, None);
        assert!(!manager.has("ops").await);
        assert!(matches!(
            manager.resolve(None).await,
            Err(Error::NoWalletConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_rejects_duplicates_and_unready_wallets() {
        let dir = TempDir::new().unwrap();
        let path = key_file(&dir, "ops.json", TEST_KEY);
        let manager = manager(&dir);

        assert!(matches!(
            manager
                .add_wallet("ghost", WalletRecord::local_key(Some(dir.path().join("nope.json"))))
                .await,
            Err(Error::WalletNotReady(_))
        ));
        assert!(!dir.path().join("wallets.json").exists());

        manager
            .add_wallet("ops", WalletRecord::local_key(Some(path.clone())))
            .await
            .unwrap();
        assert!(matches!(
            manager.add_wallet("OPS", WalletRecord::local_key(Some(path))).await,
            Err(Error::WalletExists(_))
        ));
        assert!(matches!(
            manager.add_wallet("x", WalletRecord::default()).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_add_rejects_blank_remote_api_key() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert!(matches!(
            manager
                .add_wallet(
                    "broken",
                    WalletRecord::remote_agent("", Some("http://127.0.0.1:9".to_string()))
                )
                .await,
            Err(Error::Config(_))
        ));
        assert!(!dir.path().join("wallets.json").exists());
        assert!(!manager.has("broken").await);
    }

    #[tokio::test]
    async fn test_remove_clears_mixed_case_record() {
        let dir = TempDir::new().unwrap();
        let path = key_file(&dir, "ops.json", TEST_KEY);
        std::fs::write(
            dir.path().join("wallets.json"),
            serde_json::json!({
                "wallets": { "Ops": { "source": "local-key", "path": path } },
                "default": "Ops"
            })
            .to_string(),
        )
        .unwrap();
        let manager = manager(&dir);
        assert_eq!(manager.default_wallet_name().await.as_deref(), Some("ops"));

        manager.remove_wallet("ops").await.unwrap();

        let file = read_config(&dir);
        assert!(file.wallets.is_empty());
        assert_eq!(file.default, None);
    }

    #[tokio::test]
    async fn test_rename_onto_existing_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let a = key_file(&dir, "a.json", TEST_KEY);
        let b = key_file(&dir, "b.json", OTHER_KEY);
        let manager = manager(&dir);
        manager.add_wallet("a", WalletRecord::local_key(Some(a))).await.unwrap();
        manager.add_wallet("b", WalletRecord::local_key(Some(b))).await.unwrap();
        let before = std::fs::read(dir.path().join("wallets.json")).unwrap();

        assert!(matches!(
            manager.rename_wallet("a", "b").await,
            Err(Error::WalletExists(_))
        ));
        assert!(matches!(
            manager.rename_wallet("missing", "c").await,
            Err(Error::WalletNotFound { .. })
        ));

        assert_eq!(std::fs::read(dir.path().join("wallets.json")).unwrap(), before);
        assert!(manager.has("a").await);
    }

    #[tokio::test]
    async fn test_rename_moves_record_and_default() {
        let dir = TempDir::new().unwrap();
        let a = key_file(&dir, "a.json", TEST_KEY);
        let manager = manager(&dir);
        manager.add_wallet("a", WalletRecord::local_key(Some(a))).await.unwrap();
        manager.set_default_wallet("a").await.unwrap();

        manager.rename_wallet("a", "Trading").await.unwrap();

        let file = read_config(&dir);
        assert!(!file.wallets.contains_key("a"));
        assert!(file.wallets.contains_key("trading"));
        assert_eq!(file.default.as_deref(), Some("trading"));
        let backend = manager.resolve(None).await.unwrap();
        assert_eq!(backend.nickname(), "trading");
    }

    #[tokio::test]
    async fn test_rename_discovered_wallet_persists_record() {
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join(".evm-wallet.json");
        write_key(&key_path, TEST_KEY);
        let manager = manager(&dir);

        manager.rename_wallet("main", "primary").await.unwrap();

        let record = &read_config(&dir).wallets["primary"];
        assert_eq!(record.source(), WalletSource::LocalKey);
        assert_eq!(record.path.as_deref(), Some(key_path.as_path()));
        assert_eq!(record.private_key, None);
        assert_eq!(manager.default_wallet_name().await.as_deref(), Some("primary"));
    }

    #[tokio::test]
    async fn test_set_default_requires_registered_wallet() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert!(matches!(
            manager.set_default_wallet("nobody").await,
            Err(Error::WalletNotFound { .. })
        ));
        assert!(!dir.path().join("wallets.json").exists());
    }

    #[tokio::test]
    async fn test_list_with_slow_wallet_uses_placeholder() {
        let dir = TempDir::new().unwrap();
        write_key(&dir.path().join(".evm-wallet.json"), TEST_KEY);
        let mut settings = ManagerSettings::rooted_at(dir.path());
        settings.list_timeout = Duration::from_millis(50);
        let manager = WalletManager::new(settings);

        let slow = RemoteAgentBackend::with_transport(
            "slow",
            Arc::new(HangingTransport),
            AddressCache::new(dir.path().join("cache")),
            PollConfig::default(),
        );
        manager.register_wallet("slow", slow.into()).await.unwrap();

        let listed = manager.list_wallets().await;

        assert_eq!(listed.len(), 2);
        let main = listed.iter().find(|w| w.nickname == MAIN_WALLET).unwrap();
        assert_eq!(main.address, TEST_ADDRESS);
        assert!(main.is_default);
        let slow = listed.iter().find(|w| w.nickname == "slow").unwrap();
        assert_eq!(slow.address, ADDRESS_PLACEHOLDER);
        assert_eq!(slow.kind, BackendKind::RemoteAgent);
        assert_eq!(slow.solana_address, None);
        assert!(!slow.is_default);
    }

    #[tokio::test]
    async fn test_unknown_nickname_lists_available() {
        let dir = TempDir::new().unwrap();
        write_key(&dir.path().join(".evm-wallet.json"), TEST_KEY);
        let manager = manager(&dir);

        match manager.resolve(Some("nope")).await {
            Err(Error::WalletNotFound { nickname, available }) => {
                assert_eq!(nickname, "nope");
                assert_eq!(available, "main");
            }
            other => panic!("unexpected result: {:?}", other.map(|b| b.kind())),
        }
    }

    #[test]
    fn test_default_manager_is_shared_until_reset() {
        reset_default_manager();
        let (Ok(first), Ok(second)) = (default_manager(), default_manager()) else {
            // No resolvable home directory in this environment
            return;
        };
        assert!(Arc::ptr_eq(&first, &second));

        reset_default_manager();
        let third = default_manager().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
