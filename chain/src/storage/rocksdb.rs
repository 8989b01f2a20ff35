//! RocksDB-backed [`Store`] implementation.
//!
//! Each table gets its own column family; pending-block bodies live in a
//! sixth column family of raw trie nodes, addressed through
//! `super::trie::RocksTrieDb`.

use std::path::Path;
use std::sync::Arc;

use ::rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};

type DB = DBWithThreadMode<MultiThreaded>;

use crate::types::{Address, Block, Hash256, Miner, PendingBlockHeader, Tx, Vote};

use super::trie::{self, RocksTrieDb};
use super::{Store, StorageError};

/// Re-exported so `storage::mod` can convert it without naming the
/// external crate directly.
pub type RocksDbError = ::rocksdb::Error;

const CF_PENDING_TXS: &str = "pending_transactions";
const CF_PENDING_BLOCKS: &str = "pending_blocks";
const CF_BLOCKS: &str = "blocks";
const CF_VOTES: &str = "votes";
const CF_MINERS: &str = "miners";
const CF_SLASHES: &str = "slashes";

/// Configuration for [`RocksStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory
    /// (`<cwd>/leveldb` by convention, matching the on-disk layout).
    pub path: String,
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "leveldb".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`Store`].
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_PENDING_TXS, Options::default()),
            ColumnFamilyDescriptor::new(CF_PENDING_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_VOTES, Options::default()),
            ColumnFamilyDescriptor::new(CF_MINERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_SLASHES, Options::default()),
            ColumnFamilyDescriptor::new(trie::TRIE_NODES_CF, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(StorageError::from)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &'static str) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::WriteFailed(format!("missing column family {name}")))
    }

    fn put(&self, cf: &'static str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put_cf(&self.cf(cf)?, key, value)
            .map_err(StorageError::from)
    }

    fn get(&self, cf: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.db.get_cf(&self.cf(cf)?, key).map_err(StorageError::from)
    }

    fn delete(&self, cf: &'static str, key: &[u8]) -> Result<(), StorageError> {
        self.db.delete_cf(&self.cf(cf)?, key).map_err(StorageError::from)
    }

    fn list<T>(
        &self,
        cf: &'static str,
        limit: usize,
        decode: impl Fn(&[u8]) -> Option<T>,
    ) -> Result<Vec<T>, StorageError> {
        let handle = self.cf(cf)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&handle, ::rocksdb::IteratorMode::Start) {
            let (_, value) = item.map_err(StorageError::from)?;
            if let Some(decoded) = decode(&value) {
                out.push(decoded);
            }
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    fn trie_db(&self) -> Arc<RocksTrieDb> {
        Arc::new(RocksTrieDb::new(self.db.clone()))
    }
}

/// Key for the `slashes` column family: offender address followed by the
/// big-endian height and round, so a single offender's entries sort
/// together.
fn slash_key(offender: &Address, height: u64, round: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + 8 + 4);
    key.extend_from_slice(offender.as_bytes());
    key.extend_from_slice(&height.to_be_bytes());
    key.extend_from_slice(&round.to_be_bytes());
    key
}

fn encode_bincode<T: serde::Serialize>(value: &T) -> Vec<u8> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .expect("in-memory entity encoding never fails")
}

fn decode_bincode<T: for<'de> serde::Deserialize<'de>>(bytes: &[u8]) -> Option<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .ok()
        .map(|(value, _)| value)
}

impl Store for RocksStore {
    fn write_pending_tx(&self, tx: &Tx) -> Result<(), StorageError> {
        self.put(CF_PENDING_TXS, tx.hash.as_bytes(), &encode_bincode(tx))
    }

    fn get_pending_tx(&self, hash: &Hash256) -> Result<Option<Tx>, StorageError> {
        Ok(self.get(CF_PENDING_TXS, hash.as_bytes())?.and_then(|b| decode_bincode(&b)))
    }

    fn delete_pending_tx(&self, hash: &Hash256) -> Result<(), StorageError> {
        self.delete(CF_PENDING_TXS, hash.as_bytes())
    }

    fn list_pending_txs(&self, limit: usize) -> Result<Vec<Tx>, StorageError> {
        self.list(CF_PENDING_TXS, limit, |b| decode_bincode(b))
    }

    fn write_pending_block(&self, header: &PendingBlockHeader) -> Result<(), StorageError> {
        self.put(CF_PENDING_BLOCKS, header.hash.as_bytes(), &encode_bincode(header))
    }

    fn get_pending_block(
        &self,
        hash: &Hash256,
    ) -> Result<Option<PendingBlockHeader>, StorageError> {
        Ok(self
            .get(CF_PENDING_BLOCKS, hash.as_bytes())?
            .and_then(|b| decode_bincode(&b)))
    }

    fn list_pending_blocks_at(&self, number: u64) -> Result<Vec<PendingBlockHeader>, StorageError> {
        let all: Vec<PendingBlockHeader> =
            self.list(CF_PENDING_BLOCKS, super::DEFAULT_LIST_LIMIT, |b| decode_bincode(b))?;
        Ok(all.into_iter().filter(|h| h.number == number).collect())
    }

    fn delete_pending_block(&self, hash: &Hash256) -> Result<(), StorageError> {
        self.delete(CF_PENDING_BLOCKS, hash.as_bytes())
    }

    fn write_block(&self, block: &Block) -> Result<(), StorageError> {
        self.put(CF_BLOCKS, block.hash().as_bytes(), &encode_bincode(block))
    }

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, StorageError> {
        Ok(self.get(CF_BLOCKS, hash.as_bytes())?.and_then(|b| decode_bincode(&b)))
    }

    fn list_blocks(&self, limit: usize) -> Result<Vec<Block>, StorageError> {
        self.list(CF_BLOCKS, limit, |b| decode_bincode(b))
    }

    fn head(&self) -> Result<Option<Block>, StorageError> {
        let blocks = self.list_blocks(super::DEFAULT_LIST_LIMIT)?;
        Ok(blocks.into_iter().max_by_key(|b| b.number()))
    }

    fn list_preceding_blocks(&self, block: &Block) -> Result<Vec<Block>, StorageError> {
        let mut out = Vec::new();
        let mut cursor = block.header.prev_hash;
        while cursor != Hash256::ZERO {
            match self.get_block(&cursor)? {
                Some(parent) => {
                    cursor = parent.header.prev_hash;
                    out.push(parent);
                }
                None => break,
            }
        }
        Ok(out)
    }

    fn write_vote(&self, vote: &Vote) -> Result<(), StorageError> {
        self.put(CF_VOTES, vote.hash.as_bytes(), &encode_bincode(vote))
    }

    fn get_vote(&self, hash: &Hash256) -> Result<Option<Vote>, StorageError> {
        Ok(self.get(CF_VOTES, hash.as_bytes())?.and_then(|b| decode_bincode(&b)))
    }

    fn list_votes_for_height(&self, height: u64) -> Result<Vec<Vote>, StorageError> {
        let all: Vec<Vote> = self.list(CF_VOTES, super::DEFAULT_LIST_LIMIT, |b| decode_bincode(b))?;
        Ok(all.into_iter().filter(|v| v.block_number == height).collect())
    }

    fn write_miner(&self, miner: &Miner) -> Result<(), StorageError> {
        self.put(CF_MINERS, miner.address.as_bytes(), &encode_bincode(miner))
    }

    fn get_miner(&self, address: &Address) -> Result<Option<Miner>, StorageError> {
        Ok(self.get(CF_MINERS, address.as_bytes())?.and_then(|b| decode_bincode(&b)))
    }

    fn list_miners(&self, limit: usize) -> Result<Vec<Miner>, StorageError> {
        self.list(CF_MINERS, limit, |b| decode_bincode(b))
    }

    fn has_slash_applied(&self, offender: &Address, height: u64, round: u32) -> Result<bool, StorageError> {
        Ok(self.get(CF_SLASHES, &slash_key(offender, height, round))?.is_some())
    }

    fn mark_slash_applied(&self, offender: &Address, height: u64, round: u32) -> Result<(), StorageError> {
        self.put(CF_SLASHES, &slash_key(offender, height, round), &[1u8])
    }

    fn write_body(&self, block_hash: &Hash256, txs: &[Tx]) -> Result<Hash256, StorageError> {
        trie::write_body(self.trie_db(), block_hash, txs)
    }

    fn get_body(&self, block_hash: &Hash256) -> Result<Vec<Tx>, StorageError> {
        trie::read_body(self.trie_db(), block_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::EMPTY_TRIE_ROOT;
    use crate::types::PendingBlockHeader;
    use tempfile::TempDir;

    fn dummy_header(number: u64) -> PendingBlockHeader {
        PendingBlockHeader::new(
            Hash256::ZERO,
            number,
            Hash256::compute(b"state"),
            EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        )
    }

    #[test]
    fn rocksdb_store_roundtrips_pending_block() {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = RocksStore::open(&cfg).expect("open rocksdb store");

        let header = dummy_header(1);
        store.write_pending_block(&header).unwrap();

        let fetched = store.get_pending_block(&header.hash).unwrap().unwrap();
        assert_eq!(fetched.number, 1);
    }

    #[test]
    fn rocksdb_store_lists_miners() {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = RocksStore::open(&cfg).expect("open rocksdb store");

        let miner = Miner::new(
            Address([9u8; 20]),
            crate::codec::Decimal::from(100),
            0,
        );
        store.write_miner(&miner).unwrap();

        let listed = store.list_miners(super::super::DEFAULT_LIST_LIMIT).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].address, miner.address);
    }
}
