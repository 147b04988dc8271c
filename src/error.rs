//! Error types for the wallet core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No credentials available: {0}")]
    NoCredentials(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Wallet \"{0}\" already exists")]
    WalletExists(String),

    #[error("Wallet \"{nickname}\" not found. Available wallets: {available}")]
    WalletNotFound { nickname: String, available: String },

    #[error("No wallet configured.\n\n{remediation}")]
    NoWalletConfigured { remediation: String },

    #[error("Wallet \"{0}\" configuration is invalid or not accessible")]
    WalletNotReady(String),

    #[error("Invalid job submission response: {0}")]
    MalformedSubmitResponse(String),

    #[error("Job submission rejected ({status}): {body}")]
    SubmitRejected { status: u16, body: String },

    #[error("Remote job failed: {0}")]
    RemoteJobFailed(String),

    #[error("Remote job {0} was cancelled")]
    RemoteJobCancelled(String),

    #[error("Remote job {job_id} timed out after {attempts} polls")]
    RemoteJobTimeout { job_id: String, attempts: u32 },

    #[error("Failed to poll job status: {0}")]
    PollTransport(String),

    #[error("Transaction failed: {0}")]
    SemanticTxFailure(String),

    #[error("Could not extract a result from remote job: {0}")]
    UnrecognizedJobResult(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn wallet_not_found<'a>(
        nickname: &str,
        available: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let available = available.into_iter().collect::<Vec<_>>().join(", ");
        Error::WalletNotFound {
            nickname: nickname.to_string(),
            available: if available.is_empty() {
                "(none)".to_string()
            } else {
                available
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
