//! Chain configuration for the deployment engine.

use std::fmt;
use std::time::Duration;

/// Default network display name.
pub const DEFAULT_NETWORK_NAME: &str = "Base Sepolia";
/// Default explorer URL template. `{address}` is replaced with the contract address.
pub const DEFAULT_EXPLORER_TEMPLATE: &str = "https://sepolia.basescan.org/address/{address}";

/// How long and how often to poll for a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    /// Hard ceiling used when the caller does not supply its own deadline.
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Everything the deployment engine reads from the environment.
///
/// Missing `rpc_url` or `private_key` is not an error: the engine reports
/// `DeployError::Skipped` instead.
#[derive(Clone)]
pub struct ChainConfig {
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub network_name: String,
    pub explorer_template: String,
    pub receipt: ReceiptPolicy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            private_key: None,
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            explorer_template: DEFAULT_EXPLORER_TEMPLATE.to_string(),
            receipt: ReceiptPolicy::default(),
        }
    }
}

impl ChainConfig {
    /// Read `RPC_URL`, `PRIVATE_KEY`, `CONTRACT_NETWORK_NAME` and
    /// `CONTRACT_EXPLORER_TEMPLATE`. Blank values count as absent.
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            rpc_url: var("RPC_URL"),
            private_key: var("PRIVATE_KEY"),
            network_name: var("CONTRACT_NETWORK_NAME")
                .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string()),
            explorer_template: var("CONTRACT_EXPLORER_TEMPLATE")
                .unwrap_or_else(|| DEFAULT_EXPLORER_TEMPLATE.to_string()),
            receipt: ReceiptPolicy::default(),
        }
    }

    /// Format the explorer URL for a deployed address.
    pub fn explorer_url(&self, address: &str) -> String {
        self.explorer_template.replace("{address}", address)
    }

    /// Both credentials, or `None` when deployment must be skipped.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.rpc_url.as_deref(), self.private_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("network_name", &self.network_name)
            .field("explorer_template", &self.explorer_template)
            .field("receipt", &self.receipt)
            .finish()
    }
}
