//! Equivocation proofs carried inside slash transactions.

use serde::{Deserialize, Serialize};

use crate::types::Vote;

/// Penalty applied to an offender's stake when a slash transaction
/// carrying a valid proof is applied: `stake *= (1 - SLASH_PENALTY_PERCENTAGE)`.
pub const SLASH_PENALTY_PERCENTAGE: f64 = 0.20;

/// Two conflicting votes by the same miner at the same `(height, round)`.
/// Carried inside a slash transaction's `data` field as
/// `{"tx_type":"slash","byzantine_behavior_proof":<hex>}`, where `<hex>`
/// is the hex encoding of this struct's JSON serialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlashProof {
    pub first: Vote,
    pub second: Vote,
}

impl SlashProof {
    pub fn to_hex(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, ProofDecodeError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let proof: SlashProof = serde_json::from_slice(&bytes)?;
        Ok(proof)
    }

    /// Structural shape check, independent of signatures: same
    /// equivocation key, different block hash, two distinct vote hashes.
    /// Signature verification is layered on top by the slasher (it needs
    /// the crypto module, which this type does not depend on).
    pub fn is_structurally_valid(&self) -> bool {
        self.first.equivocation_key() == self.second.equivocation_key()
            && self.first.block_hash != self.second.block_hash
            && self.first.hash != self.second.hash
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProofDecodeError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid proof json: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, Hash256};

    fn vote(round: u32, block_hash: Hash256) -> Vote {
        let mut v = Vote {
            miner_address: Address([1u8; 20]),
            block_number: 10,
            block_hash,
            voting_round: round,
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
            hash: Hash256::ZERO,
        };
        v.finalize();
        v
    }

    #[test]
    fn structurally_valid_proof_roundtrips_through_hex() {
        let proof = SlashProof {
            first: vote(0, Hash256::compute(b"H1")),
            second: vote(0, Hash256::compute(b"H2")),
        };
        assert!(proof.is_structurally_valid());

        let hex = proof.to_hex().unwrap();
        let decoded = SlashProof::from_hex(&hex).unwrap();
        assert!(decoded.is_structurally_valid());
    }

    #[test]
    fn same_block_hash_is_not_a_proof() {
        let h = Hash256::compute(b"H1");
        let proof = SlashProof {
            first: vote(0, h),
            second: vote(0, h),
        };
        assert!(!proof.is_structurally_valid());
    }
}
