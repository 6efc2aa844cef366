//! Error types for RPC calls and contract deployment.

use std::time::Duration;

/// Failure talking to a JSON-RPC node.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),
    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("unexpected RPC response for {method}: {reason}")]
    Decode { method: String, reason: String },
    #[error("invalid block header: {0}")]
    InvalidHeader(String),
}

/// Failure (or intentional skip) of a deployment attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Deployment preconditions are absent. Not a fault.
    #[error("{0}")]
    Skipped(String),
    #[error("failed to connect to RPC endpoint: {0}")]
    NotConnected(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("failed to install solc {version}: {reason}")]
    CompilerInstall { version: String, reason: String },
    #[error("compilation failed: {0}")]
    Compilation(String),
    #[error("Contract '{0}' not found in compiled artifacts.")]
    ContractNotFound(String),
    #[error("signer error: {0}")]
    Signer(String),
    #[error("deployment transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
    #[error("receipt for {tx_hash} has no contract address")]
    MissingContractAddress { tx_hash: String },
    /// The deadline passed. `tx_hash` is set when the transaction was already broadcast.
    #[error("deployment timed out after {waited:?}{}", .tx_hash.as_ref().map(|h| format!(" waiting for receipt of {h}")).unwrap_or_default())]
    Timeout { tx_hash: Option<String>, waited: Duration },
}

impl DeployError {
    /// True when deployment was intentionally not attempted.
    pub fn is_skipped(&self) -> bool {
        matches!(self, DeployError::Skipped(_))
    }
}
