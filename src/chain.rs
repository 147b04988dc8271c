//! Chain identity
//!
//! Chains are named in two notations:
//! - a prefixed form carrying the hex EVM chain id (`0x2105.base`, `0x89.polygon`)
//! - a bare name (`base`, `polygon`, `ethereum`)
//!
//! Everything in this crate compares chains through [`normalize`], which maps
//! both notations onto the bare canonical name. Normalization is pure and
//! idempotent.

use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static PREFIXED_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[a-fA-F0-9]+\.(.+)$").expect("valid chain prefix regex"));

/// Chains the remote agent backend can execute on
pub const REMOTE_AGENT_SUPPORTED_CHAINS: &[&str] = &["ethereum", "polygon", "base"];

/// EVM chains the key-holding backends can sign for
pub const EVM_SUPPORTED_CHAINS: &[&str] = &[
    "ethereum",
    "base",
    "polygon",
    "arbitrum",
    "optimism",
    "sonic",
    "avalanche",
    "bsc",
    "lightlink",
    "hyperevm",
    "kaia",
];

/// Prefixed (or alias) notation to canonical bare name
fn prefixed_to_bare(id: &str) -> Option<&'static str> {
    match id {
        "0x2105.base" => Some("base"),
        "0x89.polygon" => Some("polygon"),
        "0xa4b1.arbitrum" => Some("arbitrum"),
        "0xa.optimism" => Some("optimism"),
        "0x38.bsc" => Some("bsc"),
        "0xa86a.avax" => Some("avalanche"),
        "0x2019.kaia" => Some("kaia"),
        "avax" => Some("avalanche"),
        "ethereum" => Some("ethereum"),
        "sonic" => Some("sonic"),
        "lightlink" => Some("lightlink"),
        "hyper" => Some("hyperevm"),
        "kaia" => Some("kaia"),
        _ => None,
    }
}

/// Canonical bare name to prefixed notation
fn bare_to_prefixed(name: &str) -> Option<&'static str> {
    match name {
        "base" => Some("0x2105.base"),
        "polygon" => Some("0x89.polygon"),
        "arbitrum" => Some("0xa4b1.arbitrum"),
        "optimism" => Some("0xa.optimism"),
        "bsc" => Some("0x38.bsc"),
        "avalanche" => Some("0xa86a.avax"),
        "kaia" => Some("0x2019.kaia"),
        "ethereum" => Some("ethereum"),
        "sonic" => Some("sonic"),
        "lightlink" => Some("lightlink"),
        "hyperevm" | "hyper" => Some("hyper"),
        _ => None,
    }
}

/// Normalize a chain id to its bare canonical name.
///
/// Unknown ids with a `0x<hex>.` prefix lose the prefix; anything else is
/// returned unchanged.
pub fn normalize(id: &str) -> String {
    if let Some(bare) = prefixed_to_bare(id) {
        return bare.to_string();
    }
    if bare_to_prefixed(id).is_some() {
        return id.to_string();
    }
    if let Some(suffix) = PREFIXED_ID_RE.captures(id).and_then(|c| c.get(1)) {
        // Recurse so `0x1.0x2.foo` and `0x2.foo` land on the same name.
        return normalize(suffix.as_str());
    }
    id.to_string()
}

/// Convert a chain id to the prefixed notation where one exists.
pub fn to_prefixed(id: &str) -> String {
    if id.starts_with("0x") && id.contains('.') {
        return id.to_string();
    }
    bare_to_prefixed(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

/// Whether two ids, in either notation, name the same chain
pub fn same_chain(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

pub fn is_supported_by_remote_agent(id: &str) -> bool {
    let normalized = normalize(id);
    REMOTE_AGENT_SUPPORTED_CHAINS.contains(&normalized.as_str())
}

/// Numeric chain id understood by the remote agent service
pub fn numeric_id(id: &str) -> Result<u64> {
    let normalized = normalize(id);
    match normalized.as_str() {
        "ethereum" => Ok(1),
        "polygon" => Ok(137),
        "base" => Ok(8453),
        "unichain" => Ok(130),
        _ => Err(Error::UnsupportedChain(format!(
            "{} (normalized: {}) not supported by the remote agent. Supported: {}",
            id,
            normalized,
            REMOTE_AGENT_SUPPORTED_CHAINS.join(", ")
        ))),
    }
}

/// EVM chain id for any chain the key-holding backends know about
pub fn evm_chain_id(id: &str) -> Option<u64> {
    match normalize(id).as_str() {
        "ethereum" => Some(1),
        "arbitrum" => Some(42161),
        "optimism" => Some(10),
        "base" => Some(8453),
        "polygon" => Some(137),
        "bsc" => Some(56),
        "avalanche" => Some(43114),
        "sonic" => Some(146),
        "lightlink" => Some(1890),
        "hyperevm" => Some(999),
        "kaia" => Some(8217),
        _ => None,
    }
}

/// Whether `id` is contained in `chains`, comparing in normalized form
pub fn contains_chain<S: AsRef<str>>(chains: &[S], id: &str) -> bool {
    let normalized = normalize(id);
    chains.iter().any(|c| normalize(c.as_ref()) == normalized)
}
