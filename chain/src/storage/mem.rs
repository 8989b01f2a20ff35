//! In-memory [`Store`] for tests.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::{Address, Block, Hash256, Miner, PendingBlockHeader, Tx, Vote};

use super::{Store, StorageError};

#[derive(Default)]
struct Tables {
    pending_txs: HashMap<Hash256, Tx>,
    pending_blocks: HashMap<Hash256, PendingBlockHeader>,
    blocks: HashMap<Hash256, Block>,
    votes: HashMap<Hash256, Vote>,
    miners: HashMap<Address, Miner>,
    bodies: HashMap<Hash256, Vec<Tx>>,
    slashes: std::collections::HashSet<(Address, u64, u32)>,
}

/// Store backed by in-process `HashMap`s, guarded by a single mutex.
/// Intended for unit tests, not for production use.
#[derive(Default)]
pub struct MemStore {
    tables: Mutex<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn write_pending_tx(&self, tx: &Tx) -> Result<(), StorageError> {
        self.tables.lock().pending_txs.insert(tx.hash, tx.clone());
        Ok(())
    }

    fn get_pending_tx(&self, hash: &Hash256) -> Result<Option<Tx>, StorageError> {
        Ok(self.tables.lock().pending_txs.get(hash).cloned())
    }

    fn delete_pending_tx(&self, hash: &Hash256) -> Result<(), StorageError> {
        self.tables.lock().pending_txs.remove(hash);
        Ok(())
    }

    fn list_pending_txs(&self, limit: usize) -> Result<Vec<Tx>, StorageError> {
        Ok(self.tables.lock().pending_txs.values().take(limit).cloned().collect())
    }

    fn write_pending_block(&self, header: &PendingBlockHeader) -> Result<(), StorageError> {
        self.tables.lock().pending_blocks.insert(header.hash, header.clone());
        Ok(())
    }

    fn get_pending_block(&self, hash: &Hash256) -> Result<Option<PendingBlockHeader>, StorageError> {
        Ok(self.tables.lock().pending_blocks.get(hash).cloned())
    }

    fn list_pending_blocks_at(&self, number: u64) -> Result<Vec<PendingBlockHeader>, StorageError> {
        Ok(self
            .tables
            .lock()
            .pending_blocks
            .values()
            .filter(|h| h.number == number)
            .cloned()
            .collect())
    }

    fn delete_pending_block(&self, hash: &Hash256) -> Result<(), StorageError> {
        self.tables.lock().pending_blocks.remove(hash);
        Ok(())
    }

    fn write_block(&self, block: &Block) -> Result<(), StorageError> {
        self.tables.lock().blocks.insert(block.hash(), block.clone());
        Ok(())
    }

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, StorageError> {
        Ok(self.tables.lock().blocks.get(hash).cloned())
    }

    fn list_blocks(&self, limit: usize) -> Result<Vec<Block>, StorageError> {
        Ok(self.tables.lock().blocks.values().take(limit).cloned().collect())
    }

    fn head(&self) -> Result<Option<Block>, StorageError> {
        Ok(self.tables.lock().blocks.values().max_by_key(|b| b.number()).cloned())
    }

    fn list_preceding_blocks(&self, block: &Block) -> Result<Vec<Block>, StorageError> {
        let tables = self.tables.lock();
        let mut out = Vec::new();
        let mut cursor = block.header.prev_hash;
        while cursor != Hash256::ZERO {
            match tables.blocks.get(&cursor) {
                Some(parent) => {
                    cursor = parent.header.prev_hash;
                    out.push(parent.clone());
                }
                None => break,
            }
        }
        Ok(out)
    }

    fn write_vote(&self, vote: &Vote) -> Result<(), StorageError> {
        self.tables.lock().votes.insert(vote.hash, vote.clone());
        Ok(())
    }

    fn get_vote(&self, hash: &Hash256) -> Result<Option<Vote>, StorageError> {
        Ok(self.tables.lock().votes.get(hash).cloned())
    }

    fn list_votes_for_height(&self, height: u64) -> Result<Vec<Vote>, StorageError> {
        Ok(self
            .tables
            .lock()
            .votes
            .values()
            .filter(|v| v.block_number == height)
            .cloned()
            .collect())
    }

    fn write_miner(&self, miner: &Miner) -> Result<(), StorageError> {
        self.tables.lock().miners.insert(miner.address, miner.clone());
        Ok(())
    }

    fn get_miner(&self, address: &Address) -> Result<Option<Miner>, StorageError> {
        Ok(self.tables.lock().miners.get(address).cloned())
    }

    fn list_miners(&self, limit: usize) -> Result<Vec<Miner>, StorageError> {
        Ok(self.tables.lock().miners.values().take(limit).cloned().collect())
    }

    fn has_slash_applied(&self, offender: &Address, height: u64, round: u32) -> Result<bool, StorageError> {
        Ok(self.tables.lock().slashes.contains(&(*offender, height, round)))
    }

    fn mark_slash_applied(&self, offender: &Address, height: u64, round: u32) -> Result<(), StorageError> {
        self.tables.lock().slashes.insert((*offender, height, round));
        Ok(())
    }

    fn write_body(&self, block_hash: &Hash256, txs: &[Tx]) -> Result<Hash256, StorageError> {
        let root = super::trie::compute_tx_root(txs);
        self.tables.lock().bodies.insert(*block_hash, txs.to_vec());
        Ok(root)
    }

    fn get_body(&self, block_hash: &Hash256) -> Result<Vec<Tx>, StorageError> {
        self.tables
            .lock()
            .bodies
            .get(block_hash)
            .cloned()
            .ok_or(StorageError::TrieMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::EMPTY_TRIE_ROOT;

    #[test]
    fn mem_store_round_trips_pending_block() {
        let store = MemStore::new();
        let header = PendingBlockHeader::new(
            Hash256::ZERO,
            1,
            Hash256::compute(b"state"),
            EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        );
        store.write_pending_block(&header).unwrap();
        assert_eq!(store.get_pending_block(&header.hash).unwrap().unwrap().number, 1);
    }

    #[test]
    fn mem_store_body_missing_is_trie_missing() {
        let store = MemStore::new();
        let err = store.get_body(&Hash256::compute(b"nope")).unwrap_err();
        assert!(matches!(err, StorageError::TrieMissing));
    }
}
