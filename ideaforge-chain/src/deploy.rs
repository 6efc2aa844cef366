//! Deployment engine: Solidity source in, confirmed contract address out.
//!
//! Flow:
//! 1. Bail out with `DeployError::Skipped` when RPC URL or key is missing
//! 2. Resolve and install a compiler (requested version, then default)
//! 3. Compile and pick the named contract's bytecode
//! 4. Connect, with the proof-of-authority shim at layer 0, and check liveness
//! 5. Build, sign, and broadcast a constructor-only legacy transaction
//! 6. Poll for the receipt
//!
//! The caller's deadline bounds all of it, compiler download included.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;

use crate::config::{ChainConfig, ReceiptPolicy};
use crate::error::DeployError;
use crate::rpc::{HttpTransport, ProofOfAuthority, Receipt, RpcClient, Transport, to_quantity};
use crate::signer::{LocalSigner, checksum, parse_address};
use crate::solc::{Compiler, artifact_key, detect_solc_version, select_compiler};
use crate::tx;

/// Per-HTTP-call timeout for the default transport.
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Placeholders a generated connection helper may carry.
pub const ADDRESS_PLACEHOLDERS: [&str; 2] = ["<DEPLOYED_CONTRACT_ADDRESS>", "{DEPLOYED_CONTRACT_ADDRESS}"];

/// Result of a confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDetails {
    /// EIP-55 checksummed.
    pub address: String,
    pub network: String,
    pub explorer_url: String,
    pub tx_hash: String,
    /// The compiler that actually built the bytecode.
    pub compiler_version: String,
    /// The compiler the source's pragma asked for.
    pub requested_compiler_version: String,
}

/// Anything that can take a Solidity source and put it on chain.
#[async_trait]
pub trait ContractDeployer: Send + Sync {
    async fn deploy_contract(
        &self,
        source: &str,
        contract_name: &str,
        deadline: Instant,
    ) -> Result<DeploymentDetails, DeployError>;
}

/// The real engine.
pub struct Deployer {
    config: ChainConfig,
    compiler: Arc<dyn Compiler>,
    transport: Option<Arc<dyn Transport>>,
}

impl Deployer {
    pub fn new(config: ChainConfig, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            config,
            compiler,
            transport: None,
        }
    }

    /// Use this transport instead of building an HTTP one from the RPC URL.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// A deadline `receipt.timeout` from now.
    pub fn default_deadline(&self) -> Instant {
        Instant::now() + self.config.receipt.timeout
    }

    fn connect(&self, rpc_url: &str) -> Result<RpcClient, DeployError> {
        let transport: Arc<dyn Transport> = match &self.transport {
            Some(t) => Arc::clone(t),
            None => Arc::new(HttpTransport::with_timeout(rpc_url, RPC_CALL_TIMEOUT)?),
        };
        let mut rpc = RpcClient::new(transport);
        rpc.inject(Arc::new(ProofOfAuthority), 0);
        Ok(rpc)
    }

    /// Everything after the skip check. `broadcast` is set once the node has
    /// accepted the transaction, so a timeout can still name it.
    async fn run(
        &self,
        source: &str,
        contract_name: &str,
        rpc_url: &str,
        private_key: &str,
        deadline: Instant,
        broadcast: &mut Option<String>,
    ) -> Result<DeploymentDetails, DeployError> {
        let requested = detect_solc_version(source);
        let selection = select_compiler(self.compiler.as_ref(), &requested).await?;
        let artifacts = self.compiler.compile(source, &selection.used).await?;
        let artifact = artifacts
            .get(&artifact_key(contract_name))
            .ok_or_else(|| DeployError::ContractNotFound(contract_name.to_string()))?;
        if artifact.bytecode.is_empty() {
            return Err(DeployError::Compilation(format!(
                "contract '{contract_name}' has no creation bytecode (abstract?)"
            )));
        }
        let bytecode = hex::decode(&artifact.bytecode)
            .map_err(|e| DeployError::Compilation(format!("bytecode is not hex: {e}")))?;

        let signer = LocalSigner::from_hex(private_key)?;
        let rpc = self.connect(rpc_url)?;
        let head = rpc
            .latest_block()
            .await
            .map_err(|e| DeployError::NotConnected(e.to_string()))?;
        tracing::debug!(block = head.number, "RPC endpoint is live");

        let sender = signer.address();
        let sender_text = checksum(&sender);
        let nonce = rpc.transaction_count(&sender).await?;
        let gas_price = rpc.gas_price().await?;
        let chain_id = rpc.chain_id().await?;

        let data_hex = format!("0x{}", artifact.bytecode);
        let estimated = rpc
            .estimate_gas(json!({
                "from": sender_text,
                "data": data_hex,
                "value": "0x0",
                "gasPrice": to_quantity(gas_price),
            }))
            .await?;
        let gas = with_safety_margin(estimated);

        let signed = tx::sign(tx::deployment(bytecode, nonce, gas_price, gas, chain_id), &signer)?;
        tracing::info!(
            contract = %contract_name,
            from = %sender_text,
            nonce,
            gas,
            chain_id,
            "Broadcasting deployment transaction"
        );
        let node_hash = rpc.send_raw_transaction(&signed.raw_hex()).await?;
        if !node_hash.eq_ignore_ascii_case(&signed.hash_hex()) {
            tracing::warn!(local = %signed.hash_hex(), node = %node_hash, "Node returned a different tx hash");
        }
        *broadcast = Some(node_hash.clone());

        let receipt = wait_for_receipt(&rpc, &node_hash, deadline, &self.config.receipt).await?;
        if receipt.status == Some(0) {
            return Err(DeployError::Reverted { tx_hash: node_hash });
        }
        let raw_address = receipt
            .contract_address
            .ok_or_else(|| DeployError::MissingContractAddress {
                tx_hash: node_hash.clone(),
            })?;
        let address = checksum(&parse_address(&raw_address)?);

        let details = DeploymentDetails {
            explorer_url: self.config.explorer_url(&address),
            address,
            network: self.config.network_name.clone(),
            tx_hash: node_hash,
            compiler_version: selection.used,
            requested_compiler_version: selection.requested,
        };
        tracing::info!(
            contract = %contract_name,
            network = %details.network,
            address = %details.address,
            "Deployed contract"
        );
        Ok(details)
    }
}

#[async_trait]
impl ContractDeployer for Deployer {
    async fn deploy_contract(
        &self,
        source: &str,
        contract_name: &str,
        deadline: Instant,
    ) -> Result<DeploymentDetails, DeployError> {
        let Some((rpc_url, private_key)) = self.config.credentials() else {
            return Err(DeployError::Skipped(
                "RPC_URL or PRIVATE_KEY not configured. Skipping on-chain deployment.".into(),
            ));
        };

        let started = Instant::now();
        let mut broadcast = None;
        let attempt = self.run(source, contract_name, rpc_url, private_key, deadline, &mut broadcast);
        let outcome = tokio::time::timeout_at(deadline, attempt).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(contract = %contract_name, tx_hash = ?broadcast, "Deployment deadline reached");
                Err(DeployError::Timeout {
                    tx_hash: broadcast,
                    waited: started.elapsed(),
                })
            }
        }
    }
}

/// Gas limit = estimate + 20%.
pub fn with_safety_margin(estimated: u64) -> u64 {
    estimated.saturating_mul(12) / 10
}

/// Poll for a receipt with exponential backoff, giving up at `deadline`.
pub async fn wait_for_receipt(
    rpc: &RpcClient,
    tx_hash: &str,
    deadline: Instant,
    policy: &ReceiptPolicy,
) -> Result<Receipt, DeployError> {
    let started = Instant::now();
    let timed_out = |now: Instant| DeployError::Timeout {
        tx_hash: Some(tx_hash.to_string()),
        waited: now - started,
    };
    let mut backoff = policy.initial_backoff;

    loop {
        match tokio::time::timeout_at(deadline, rpc.transaction_receipt(tx_hash)).await {
            Ok(Ok(Some(receipt))) => return Ok(receipt),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(timed_out(Instant::now())),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out(now));
        }
        tokio::time::sleep(backoff.min(deadline - now)).await;
        backoff = (backoff * 2).min(policy.max_backoff);
    }
}

/// Point a generated connection helper at the deployed contract.
///
/// Known placeholders are replaced in place; otherwise a comment header with
/// the address is prepended.
pub fn inject_contract_address(file_content: &str, deployment: &DeploymentDetails) -> String {
    if deployment.address.is_empty() {
        return file_content.to_string();
    }
    if ADDRESS_PLACEHOLDERS.iter().any(|p| file_content.contains(p)) {
        return ADDRESS_PLACEHOLDERS
            .iter()
            .fold(file_content.to_string(), |acc, p| acc.replace(p, &deployment.address));
    }
    format!(
        "// Auto-generated connection details\n// Deployed contract: {} on {}\n\n{}",
        deployment.address, deployment.network, file_content
    )
}
