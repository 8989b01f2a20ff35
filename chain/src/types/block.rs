//! Pending and confirmed block types.
//!
//! A [`PendingBlockHeader`] is the hashed, content-addressed part of a
//! block; its transaction body lives separately in the trie store (see
//! `crate::storage::trie`) and is only attached in memory while a
//! [`PendingBlock`] is being assembled or voted on. A [`Block`] is the
//! confirmed form: header plus its full transaction list, immutable once
//! written.

use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::types::{Hash256, Tx};

/// Hash of the MPT root of an empty transaction list. There is no
/// receipt/execution trace in this core (smart-contract execution is a
/// non-goal), so `receipt_root` is always this constant.
pub const EMPTY_TRIE_ROOT: Hash256 = Hash256([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
]);

/// Header of a pending or confirmed block.
///
/// Invariant: `hash = H(rlp([prev_hash, number, state_root, receipt_root,
/// tx_root]))`. `tx_root` must equal the MPT root over the block's
/// transaction list in the order they appear in the body.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PendingBlockHeader {
    pub prev_hash: Hash256,
    pub number: u64,
    pub state_root: Hash256,
    pub receipt_root: Hash256,
    pub tx_root: Hash256,
    pub hash: Hash256,
}

impl PendingBlockHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(5);
        s.append(&self.prev_hash);
        s.append(&self.number);
        s.append(&self.state_root);
        s.append(&self.receipt_root);
        s.append(&self.tx_root);
        s.out().to_vec()
    }

    pub fn compute_hash(&self) -> Hash256 {
        codec::hash256(&self.encode())
    }

    /// Builds a header and populates `hash` from the other fields.
    pub fn new(
        prev_hash: Hash256,
        number: u64,
        state_root: Hash256,
        receipt_root: Hash256,
        tx_root: Hash256,
    ) -> Self {
        let mut header = Self {
            prev_hash,
            number,
            state_root,
            receipt_root,
            tx_root,
            hash: Hash256::ZERO,
        };
        header.hash = header.compute_hash();
        header
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let rlp = Rlp::new(bytes);
        if rlp.item_count()? != 5 {
            return Err(CodecError::Malformed);
        }
        let prev_hash: Hash256 = rlp.val_at(0)?;
        let number: u64 = rlp.val_at(1)?;
        let state_root: Hash256 = rlp.val_at(2)?;
        let receipt_root: Hash256 = rlp.val_at(3)?;
        let tx_root: Hash256 = rlp.val_at(4)?;
        Ok(Self::new(prev_hash, number, state_root, receipt_root, tx_root))
    }
}

/// A proposed but uncommitted block. `body` is only present while the
/// block is in memory (being assembled or voted on); once persisted the
/// body moves into the on-disk trie store keyed by `header.hash` and is
/// cleared from the header row (`Store::get_pending_block` returns a
/// header with `body = None`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingBlock {
    pub header: PendingBlockHeader,
    pub body: Option<Vec<Tx>>,
}

impl PendingBlock {
    pub fn hash(&self) -> Hash256 {
        self.header.hash
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}

/// A confirmed block. Same hash domain as [`PendingBlock`]; once written
/// to the `blocks` table it is immutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: PendingBlockHeader,
    pub txs: Vec<Tx>,
}

impl Block {
    pub fn hash(&self) -> Hash256 {
        self.header.hash
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// The block's coinbase transaction, by convention placed last.
    pub fn coinbase(&self) -> Option<&Tx> {
        self.txs.last().filter(|tx| tx.is_tx_type("coinbase"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_hash_is_deterministic() {
        let h1 = PendingBlockHeader::new(
            Hash256::ZERO,
            1,
            Hash256::compute(b"state"),
            EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        );
        let h2 = PendingBlockHeader::new(
            Hash256::ZERO,
            1,
            Hash256::compute(b"state"),
            EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        );
        assert_eq!(h1.hash, h2.hash);
    }

    #[test]
    fn header_encode_decode_roundtrips() {
        let header = PendingBlockHeader::new(
            Hash256::compute(b"prev"),
            7,
            Hash256::compute(b"state"),
            EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        );
        let bytes = header.encode();
        let decoded = PendingBlockHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
    }
}
