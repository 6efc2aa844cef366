//! Local deployer key.
//!
//! The private key stays inside this process: it is parsed once, used for
//! signing, and never logged or serialized.

use std::fmt;

use alloy::primitives::{Address, B256, Signature};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;

use crate::error::DeployError;

/// EIP-55 text for an address.
pub fn checksum(address: &Address) -> String {
    address.to_checksum(None)
}

/// Parse a node-supplied address, any casing.
pub fn parse_address(s: &str) -> Result<Address, DeployError> {
    s.trim()
        .parse::<Address>()
        .map_err(|e| DeployError::Signer(format!("bad address {s}: {e}")))
}

/// Signs transaction hashes with a private key held in memory.
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, DeployError> {
        let raw = private_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let inner = raw
            .parse::<PrivateKeySigner>()
            .map_err(|_| DeployError::Signer("private key is not a valid secp256k1 key".into()))?;
        Ok(Self { inner })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Sign a 32-byte prehash. RFC 6979 nonces, always low-S.
    pub fn sign_hash(&self, hash: &B256) -> Result<Signature, DeployError> {
        self.inner
            .sign_hash_sync(hash)
            .map_err(|e| DeployError::Signer(format!("signing failed: {e}")))
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
