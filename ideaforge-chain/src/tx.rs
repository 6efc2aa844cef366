//! Legacy (type 0) transactions with EIP-155 replay protection.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{B256, Bytes, TxKind, U256};

use crate::error::DeployError;
use crate::signer::LocalSigner;

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: B256,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.hash)
    }
}

/// A constructor-only deployment: no recipient, no value, bytecode as input.
pub fn deployment(bytecode: Vec<u8>, nonce: u64, gas_price: u128, gas_limit: u64, chain_id: u64) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price,
        gas_limit,
        to: TxKind::Create,
        value: U256::ZERO,
        input: Bytes::from(bytecode),
    }
}

/// Sign over the EIP-155 payload and encode the raw transaction.
pub fn sign(tx: TxLegacy, signer: &LocalSigner) -> Result<SignedTransaction, DeployError> {
    let sig = signer.sign_hash(&tx.signature_hash())?;
    let signed = tx.into_signed(sig);
    let hash = *signed.hash();
    let raw = TxEnvelope::from(signed).encoded_2718();
    Ok(SignedTransaction { raw, hash })
}
