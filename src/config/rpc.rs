//! RPC endpoint configuration
//!
//! Resolution order, per chain:
//! 1. `RPC_URLS_JSON` - a JSON object keyed by chain name (either notation)
//! 2. Per-chain env vars (`ETHEREUM_RPC_URL`, `BASE_RPC_URL`, ...; `ETH_RPC_URL` also works)
//! 3. Public RPC fallbacks - rate limited, for testing only
//!
//! # Examples
//!
//! ```bash
//! export RPC_URLS_JSON='{"base": "https://base-mainnet.g.alchemy.com/v2/KEY"}'
//! export ARBITRUM_RPC_URL="https://arb-mainnet.g.alchemy.com/v2/KEY"
//! ```

use crate::chain;
use std::collections::HashMap;

/// Environment variable holding a name -> url JSON map
pub const RPC_URLS_JSON_ENV: &str = "RPC_URLS_JSON";

/// RPC configuration for multiple chains
#[derive(Debug, Clone, Default)]
pub struct RpcConfig {
    /// RPC URLs indexed by EVM chain ID
    urls: HashMap<u64, String>,
}

/// Public RPC endpoints (rate limited, for testing only)
fn public_rpc(chain_name: &str) -> Option<&'static str> {
    match chain_name {
        "ethereum" => Some("https://ethereum.publicnode.com"),
        "arbitrum" => Some("https://arb1.arbitrum.io/rpc"),
        "base" => Some("https://mainnet.base.org"),
        "optimism" => Some("https://mainnet.optimism.io"),
        "avalanche" => Some("https://api.avax.network/ext/bc/C/rpc"),
        "bsc" => Some("https://bsc-dataseed.binance.org"),
        "polygon" => Some("https://polygon-bor-rpc.publicnode.com"),
        "sonic" => Some("https://rpc.soniclabs.com"),
        "lightlink" => Some("https://replicator.phoenix.lightlink.io/rpc/v1"),
        "hyperevm" => Some("https://rpc.hyperliquid.xyz/evm"),
        "kaia" => Some("https://public-en.node.kaia.io"),
        _ => None,
    }
}

fn env_var_name(chain_name: &str) -> String {
    format!("{}_RPC_URL", chain_name.to_uppercase())
}

impl RpcConfig {
    /// Create RPC config from environment variables
    pub fn from_env() -> Self {
        let overrides = std::env::var(RPC_URLS_JSON_ENV)
            .ok()
            .and_then(|raw| match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => Some(map),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse {}", RPC_URLS_JSON_ENV);
                    None
                }
            })
            .unwrap_or_default();

        let mut urls = HashMap::new();

        // Priority 1: JSON overrides
        for (name, url) in overrides {
            match chain::evm_chain_id(&name) {
                Some(id) => {
                    urls.insert(id, url);
                }
                None => tracing::warn!(chain = %name, "Ignoring RPC override for unknown chain"),
            }
        }

        // Priority 2: per-chain env vars
        for name in chain::EVM_SUPPORTED_CHAINS {
            let Some(id) = chain::evm_chain_id(name) else {
                continue;
            };
            if urls.contains_key(&id) {
                continue;
            }
            let var = env_var_name(name);
            let mut url = std::env::var(&var).ok();
            if url.is_none() && *name == "ethereum" {
                url = std::env::var("ETH_RPC_URL").ok();
            }
            if let Some(url) = url {
                tracing::debug!(chain = %name, "Using {} for RPC", var);
                urls.insert(id, url);
            }
        }

        // Priority 3: public fallbacks for anything still missing
        for name in chain::EVM_SUPPORTED_CHAINS {
            let (Some(id), Some(url)) = (chain::evm_chain_id(name), public_rpc(name)) else {
                continue;
            };
            urls.entry(id).or_insert_with(|| {
                tracing::debug!(chain = %name, "No RPC configured, using public RPC (rate limited)");
                url.to_string()
            });
        }

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }

    /// Get RPC URL for a chain given by name in either notation
    pub fn for_chain(&self, chain: &str) -> Option<&str> {
        chain::evm_chain_id(chain).and_then(|id| self.get(id))
    }

    /// Check if a chain is configured
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.urls.contains_key(&chain_id)
    }
}
