//! Storage backends for the chain.
//!
//! This module defines the [`Store`] abstraction used by every other
//! component (accounts, mempool, assembler, vote manager, slasher) and
//! two concrete implementations:
//!
//! - [`mem::MemStore`], an in-memory store for unit tests,
//! - [`rocksdb::RocksStore`], a RocksDB-backed store for real nodes, with
//!   one column family per table plus a trie-nodes column family backing
//!   [`trie`].

pub mod mem;
pub mod rocksdb;
pub mod trie;

pub use mem::MemStore;
pub use rocksdb::{RocksDbConfig, RocksStore};

use crate::types::{Address, Block, Hash256, Miner, PendingBlockHeader, Tx, Vote};

/// Default bound on unbounded `list_*` calls, per the on-disk listing
/// contract.
pub const DEFAULT_LIST_LIMIT: usize = 2000;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("entity not found")]
    NotFound,
    #[error("trie error: {0}")]
    Trie(String),
    #[error("trie data missing for this block")]
    TrieMissing,
    #[error("write failed: {0}")]
    WriteFailed(String),
}

impl From<rocksdb::RocksDbError> for StorageError {
    fn from(e: rocksdb::RocksDbError) -> Self {
        StorageError::WriteFailed(e.to_string())
    }
}

/// Typed key/value tables plus a content-addressed trie namespace for
/// pending-block bodies (§4.3).
///
/// Implementations must make writes durable before returning `Ok`
/// (single-writer discipline per table; concurrent readers are fine).
pub trait Store: Send + Sync {
    fn write_pending_tx(&self, tx: &Tx) -> Result<(), StorageError>;
    fn get_pending_tx(&self, hash: &Hash256) -> Result<Option<Tx>, StorageError>;
    fn delete_pending_tx(&self, hash: &Hash256) -> Result<(), StorageError>;
    fn list_pending_txs(&self, limit: usize) -> Result<Vec<Tx>, StorageError>;

    fn write_pending_block(&self, header: &PendingBlockHeader) -> Result<(), StorageError>;
    fn get_pending_block(&self, hash: &Hash256) -> Result<Option<PendingBlockHeader>, StorageError>;
    fn list_pending_blocks_at(&self, number: u64) -> Result<Vec<PendingBlockHeader>, StorageError>;
    fn delete_pending_block(&self, hash: &Hash256) -> Result<(), StorageError>;

    fn write_block(&self, block: &Block) -> Result<(), StorageError>;
    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, StorageError>;
    fn list_blocks(&self, limit: usize) -> Result<Vec<Block>, StorageError>;
    /// The confirmed block with the highest `number`, if any.
    fn head(&self) -> Result<Option<Block>, StorageError>;
    /// Walks `prev_hash` back to genesis, starting at (but excluding)
    /// `block`.
    fn list_preceding_blocks(&self, block: &Block) -> Result<Vec<Block>, StorageError>;

    fn write_vote(&self, vote: &Vote) -> Result<(), StorageError>;
    fn get_vote(&self, hash: &Hash256) -> Result<Option<Vote>, StorageError>;
    fn list_votes_for_height(&self, height: u64) -> Result<Vec<Vote>, StorageError>;

    fn write_miner(&self, miner: &Miner) -> Result<(), StorageError>;
    fn get_miner(&self, address: &Address) -> Result<Option<Miner>, StorageError>;
    fn list_miners(&self, limit: usize) -> Result<Vec<Miner>, StorageError>;

    /// `true` if a slash for this `(offender, height, round)` has
    /// already been applied, so the slasher can stay idempotent when the
    /// same equivocation is proven by more than one emitted transaction.
    fn has_slash_applied(&self, offender: &Address, height: u64, round: u32) -> Result<bool, StorageError>;
    /// Records that a slash for this `(offender, height, round)` has
    /// been applied.
    fn mark_slash_applied(&self, offender: &Address, height: u64, round: u32) -> Result<(), StorageError>;

    /// Computes the trie over `txs`, persists it under `block_hash`, and
    /// returns the resulting `tx_root`.
    fn write_body(&self, block_hash: &Hash256, txs: &[Tx]) -> Result<Hash256, StorageError>;
    /// Fetches a previously written body. Returns `Err(TrieMissing)` if
    /// the trie was pruned by the garbage collector.
    fn get_body(&self, block_hash: &Hash256) -> Result<Vec<Tx>, StorageError>;
}
