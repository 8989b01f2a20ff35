//! Core domain types used by the chain.
//!
//! This module defines strongly-typed hashes and addresses that are shared
//! across the chain implementation. The goal is to avoid "naked" byte
//! buffers in public APIs and instead use domain-specific newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod block;
pub mod miner;
pub mod slash;
pub mod tx;
pub mod vote;

pub use block::{Block, PendingBlock, PendingBlockHeader};
pub use miner::Miner;
pub use slash::SlashProof;
pub use tx::Tx;
pub use vote::Vote;

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Length in bytes of an account/miner address.
pub const ADDRESS_LEN: usize = 20;

/// Strongly-typed 256-bit hash wrapper (Keccak-256).
///
/// This is the backing representation for all fixed-size hashes in the
/// chain (transaction hashes, block hashes, vote hashes). It is always
/// exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; HASH_LEN]);

    /// Computes a new [`Hash256`] as the Keccak-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        use sha3::{Digest, Keccak256};
        let mut hasher = Keccak256::new();
        hasher.update(data);
        let out = hasher.finalize();
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(&out);
        Hash256(bytes)
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Uppercase hex representation, matching the external wire format.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        if bytes.len() != HASH_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Hash256(arr))
    }
}

impl rlp::Encodable for Hash256 {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for Hash256 {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            if bytes.len() != HASH_LEN {
                return Err(rlp::DecoderError::RlpInvalidLength);
            }
            let mut arr = [0u8; HASH_LEN];
            arr.copy_from_slice(bytes);
            Ok(Hash256(arr))
        })
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// 20-byte account/miner address. Compared case-insensitively when parsed
/// from hex, but always stored and displayed as uppercase hex externally.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl rlp::Encodable for Address {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for Address {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            if bytes.len() != ADDRESS_LEN {
                return Err(rlp::DecoderError::RlpInvalidLength);
            }
            let mut arr = [0u8; ADDRESS_LEN];
            arr.copy_from_slice(bytes);
            Ok(Address(arr))
        })
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Address(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash256_hex_roundtrips() {
        let h = Hash256::compute(b"hello");
        let hex = h.to_hex();
        assert_eq!(Hash256::from_hex(&hex).unwrap(), h);
    }

    #[test]
    fn address_parses_case_insensitively() {
        let a = Address([0xABu8; ADDRESS_LEN]);
        let upper = a.to_hex();
        let lower = upper.to_lowercase();
        assert_eq!(Address::from_str(&upper).unwrap(), a);
        assert_eq!(Address::from_str(&lower).unwrap(), a);
    }
}
