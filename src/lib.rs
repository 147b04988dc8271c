//! Agent Wallet
//!
//! Wallet core for autonomous DeFi agents. One interface over three ways of
//! holding funds:
//! - a local JSON key file, signed in-process
//! - private keys from the environment
//! - a remote agent service that holds the keys and executes submitted jobs
//!
//! [`WalletManager`] discovers wallets, persists nicknames and resolves
//! "which wallet" to a [`WalletBackend`]. [`WalletRegistry`] is a flatter
//! id-to-credentials lookup for callers that do not need discovery.
//!
//! # Security Model
//!
//! - Private keys stay inside [`wallet::SecureWallet`] and `secrecy` wrappers
//! - Types holding keys or API tokens redact them in `Debug`
//! - The config file never stores keys for auto-discovered wallets

pub mod chain;
pub mod config;
pub mod manager;
pub mod registry;
pub mod remote;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{ManagerSettings, RpcConfig, WalletRecord, WalletSource, WalletsConfigFile};
pub use error::{Error, Result};
pub use manager::{default_manager, reset_default_manager, WalletInfo, WalletManager};
pub use registry::{default_registry, reset_default_registry, Mode, WalletRegistry};
pub use remote::{AsyncJobClient, PollConfig, RemoteAgentBackend};
pub use wallet::{BackendKind, TxRequest, WalletBackend};
