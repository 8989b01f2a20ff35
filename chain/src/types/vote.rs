//! Vote type used by the voting state machine.

use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::types::{Address, Hash256};

/// A single miner's vote for a candidate block at a given height/round.
///
/// Identity for deduplication is `hash`. The equivocation key is
/// `(miner_address, block_number, voting_round)`: two votes sharing that
/// key but disagreeing on `block_hash` are proof of equivocation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub miner_address: Address,
    pub block_number: u64,
    pub block_hash: Hash256,
    pub voting_round: u32,
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub hash: Hash256,
}

impl Vote {
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(4);
        s.append(&self.miner_address);
        s.append(&self.block_number);
        s.append(&self.block_hash);
        s.append(&self.voting_round);
        s.out().to_vec()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(7);
        s.append(&self.miner_address);
        s.append(&self.block_number);
        s.append(&self.block_hash);
        s.append(&self.voting_round);
        s.append(&self.v);
        s.append(&self.r.as_slice());
        s.append(&self.s.as_slice());
        s.out().to_vec()
    }

    pub fn signing_hash(&self) -> Hash256 {
        codec::hash256(&self.encode_unsigned())
    }

    pub fn finalize(&mut self) {
        self.hash = codec::hash256(&self.encode());
    }

    /// The `(miner, height, round)` key equivocating votes share.
    pub fn equivocation_key(&self) -> (Address, u64, u32) {
        (self.miner_address, self.block_number, self.voting_round)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let rlp = Rlp::new(bytes);
        if rlp.item_count()? != 7 {
            return Err(CodecError::Malformed);
        }
        let miner_address: Address = rlp.val_at(0)?;
        let block_number: u64 = rlp.val_at(1)?;
        let block_hash: Hash256 = rlp.val_at(2)?;
        let voting_round: u32 = rlp.val_at(3)?;
        let v: u8 = rlp.val_at(4)?;
        let r_bytes: Vec<u8> = rlp.val_at(5)?;
        let s_bytes: Vec<u8> = rlp.val_at(6)?;
        if r_bytes.len() != 32 || s_bytes.len() != 32 {
            return Err(CodecError::Malformed);
        }
        let mut r = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        let mut s = [0u8; 32];
        s.copy_from_slice(&s_bytes);

        let mut vote = Vote {
            miner_address,
            block_number,
            block_hash,
            voting_round,
            v,
            r,
            s,
            hash: Hash256::ZERO,
        };
        vote.finalize();
        Ok(vote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vote() -> Vote {
        let mut vote = Vote {
            miner_address: Address([3u8; 20]),
            block_number: 10,
            block_hash: Hash256::compute(b"H1"),
            voting_round: 0,
            v: 0,
            r: [1u8; 32],
            s: [2u8; 32],
            hash: Hash256::ZERO,
        };
        vote.finalize();
        vote
    }

    #[test]
    fn encode_decode_roundtrips() {
        let vote = sample_vote();
        let bytes = vote.encode();
        let decoded = Vote::decode(&bytes).unwrap();
        assert_eq!(decoded, vote);
    }

    #[test]
    fn equivocation_key_ignores_block_hash() {
        let mut other = sample_vote();
        other.block_hash = Hash256::compute(b"H2");
        other.finalize();
        assert_eq!(sample_vote().equivocation_key(), other.equivocation_key());
        assert_ne!(sample_vote().hash, other.hash);
    }
}
