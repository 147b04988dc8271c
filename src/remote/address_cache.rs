//! On-disk cache of remote wallet addresses
//!
//! One small JSON file per wallet and address kind, `{"address", "timestamp"}`
//! with the timestamp in epoch milliseconds. Missing, stale or unreadable
//! entries are cache misses.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Evm,
    Solana,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedAddress {
    address: String,
    timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct AddressCache {
    dir: PathBuf,
    max_age: Duration,
}

impl AddressCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, nickname: &str, kind: AddressKind) -> PathBuf {
        let safe: String = nickname
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let file = match kind {
            AddressKind::Evm => format!("bankr-{}-address.json", safe),
            AddressKind::Solana => format!("bankr-{}-solana-address.json", safe),
        };
        self.dir.join(file)
    }

    /// Cached address, if present and fresh
    pub async fn load(&self, nickname: &str, kind: AddressKind) -> Option<String> {
        let path = self.path(nickname, kind);
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        let cached: CachedAddress = match serde_json::from_str(&content) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable address cache");
                return None;
            }
        };

        let age_ms = Utc::now().timestamp_millis().saturating_sub(cached.timestamp);
        if age_ms < 0 || age_ms as u128 >= self.max_age.as_millis() {
            tracing::debug!(nickname, ?kind, "Address cache is stale");
            return None;
        }
        Some(cached.address)
    }

    /// Best effort; failures are logged and otherwise ignored
    pub async fn store(&self, nickname: &str, kind: AddressKind, address: &str) {
        let path = self.path(nickname, kind);
        let entry = CachedAddress {
            address: address.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let content = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
            tokio::fs::write(&path, content).await
        }
        .await;

        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "Cached wallet address"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to cache wallet address"),
        }
    }
}
