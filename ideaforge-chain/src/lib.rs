//! ideaforge-chain: EVM plumbing for the ideaforge project generator.
//!
//! Everything needed to take a single Solidity source string and end up
//! with a confirmed contract on an EVM-compatible chain:
//! - `rpc`: JSON-RPC transport, middleware stack, proof-of-authority shim
//! - `signer` / `tx`: local key handling and legacy EIP-155 transactions (alloy)
//! - `solc`: compiler version detection, installation, and compilation
//! - `deploy`: the deployment engine tying it all together

pub mod config;
pub mod deploy;
pub mod error;
pub mod rpc;
pub mod signer;
pub mod solc;
pub mod tx;

pub use config::{ChainConfig, ReceiptPolicy};
pub use deploy::{ContractDeployer, DeploymentDetails, Deployer, inject_contract_address};
pub use error::{DeployError, RpcError};
pub use solc::{Compiler, SolcManager, DEFAULT_SOLC_VERSION, detect_solc_version};
