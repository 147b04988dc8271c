//! Result extraction from completed remote jobs
//!
//! The remote agent answers conversationally, so results are pulled out in
//! layers: structured `richData` entries first, then pattern matches over the
//! free-text response.

use super::job::RemoteJob;
use crate::{Error, Result};
use alloy::primitives::{Address, B256};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TX_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b0x[a-fA-F0-9]{64}\b").expect("valid tx hash regex"));

static EVM_ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b0x[a-fA-F0-9]{40}\b").expect("valid address regex"));

static SOLANA_ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[1-9A-HJ-NP-Za-km-z]{32,44}\b").expect("valid base58 address regex")
});

const HASH_KEYS: &[&str] = &["transactionHash", "txHash", "hash"];

/// Text that marks a nominally completed job as a failed transaction
const FAILURE_KEYWORDS: &[&str] = &["reverted", "failed", "insufficient"];

fn rich_string<'a>(job: &'a RemoteJob, keys: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
    job.rich_data().iter().flat_map(move |entry| {
        keys.iter()
            .filter_map(move |key| entry.get(*key).and_then(Value::as_str))
    })
}

/// Pull the transaction hash out of a completed job.
///
/// A hash found anywhere wins over failure keywords in the text.
pub fn transaction_hash(job: &RemoteJob) -> Result<B256> {
    if let Some(hash) = rich_string(job, HASH_KEYS).find_map(|s| s.parse::<B256>().ok()) {
        return Ok(hash);
    }

    let text = job.response_text();
    if let Some(hash) = TX_HASH_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<B256>().ok())
    {
        return Ok(hash);
    }

    let lowered = text.to_lowercase();
    if FAILURE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return Err(Error::SemanticTxFailure(text.to_string()));
    }

    Err(Error::UnrecognizedJobResult(
        job.error_message()
            .unwrap_or_else(|| summarize(text)),
    ))
}

/// EVM address from a completed job, if one can be found
pub fn evm_address(job: &RemoteJob) -> Option<Address> {
    rich_string(job, &["address", "evmAddress"])
        .find_map(|s| s.parse::<Address>().ok())
        .or_else(|| {
            EVM_ADDRESS_RE
                .find(job.response_text())
                .and_then(|m| m.as_str().parse().ok())
        })
}

/// Base58 Solana address from a completed job, if one can be found
pub fn solana_address(job: &RemoteJob) -> Option<String> {
    rich_string(job, &["solanaAddress", "address"])
        .find(|s| is_solana_address(s))
        .or_else(|| {
            SOLANA_ADDRESS_RE
                .find(job.response_text())
                .map(|m| m.as_str())
        })
        .map(str::to_string)
}

fn is_solana_address(s: &str) -> bool {
    SOLANA_ADDRESS_RE
        .find(s)
        .is_some_and(|m| m.start() == 0 && m.end() == s.len())
}

fn summarize(text: &str) -> String {
    if text.is_empty() {
        return "empty response".to_string();
    }
    let head: String = text.chars().take(200).collect();
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head
    }
}
