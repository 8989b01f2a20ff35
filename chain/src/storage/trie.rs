//! Merkle-Patricia-Trie storage for pending-block transaction bodies.
//!
//! `tx_root` is always computed the same way (over an in-memory trie);
//! only persistence of the resulting nodes differs between [`MemStore`]
//! (kept in the body map directly) and [`RocksStore`] (written through
//! [`RocksTrieDb`] into the `trie_nodes` column family).
//!
//! [`MemStore`]: super::MemStore
//! [`RocksStore`]: super::rocksdb::RocksStore

use std::sync::Arc;

use eth_trie::{DB, EthTrie, MemoryDB, Trie};

use crate::types::{Hash256, Tx};

use super::StorageError;

pub const TRIE_NODES_CF: &str = "trie_nodes";

/// Adapts a RocksDB handle to [`eth_trie::DB`], storing every trie node
/// in the `trie_nodes` column family.
pub struct RocksTrieDb {
    db: Arc<::rocksdb::DBWithThreadMode<::rocksdb::MultiThreaded>>,
}

impl RocksTrieDb {
    pub fn new(db: Arc<::rocksdb::DBWithThreadMode<::rocksdb::MultiThreaded>>) -> Self {
        Self { db }
    }

    fn cf(&self) -> Arc<::rocksdb::BoundColumnFamily<'_>> {
        self.db
            .cf_handle(TRIE_NODES_CF)
            .expect("trie_nodes column family is created at open time")
    }
}

impl DB for RocksTrieDb {
    type Error = StorageError;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        self.db
            .get_cf(&self.cf(), key)
            .map_err(|e| StorageError::Trie(e.to_string()))
    }

    fn insert(&self, key: &[u8], value: Vec<u8>) -> Result<(), Self::Error> {
        self.db
            .put_cf(&self.cf(), key, value)
            .map_err(|e| StorageError::Trie(e.to_string()))
    }

    fn remove(&self, key: &[u8]) -> Result<(), Self::Error> {
        self.db
            .delete_cf(&self.cf(), key)
            .map_err(|e| StorageError::Trie(e.to_string()))
    }

    fn flush(&self) -> Result<(), Self::Error> {
        self.db.flush().map_err(|e| StorageError::Trie(e.to_string()))
    }
}

/// RLP-encodes `txs` as a list of per-tx byte strings, the body format
/// stored at each trie leaf key.
fn encode_body(txs: &[Tx]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = txs.iter().map(Tx::encode).collect();
    rlp::encode_list::<Vec<u8>, Vec<u8>>(&encoded).to_vec()
}

fn decode_body(bytes: &[u8]) -> Result<Vec<Tx>, StorageError> {
    let rlp = rlp::Rlp::new(bytes);
    let items: Vec<Vec<u8>> = rlp
        .as_list()
        .map_err(|e| StorageError::Trie(format!("malformed body rlp: {e}")))?;
    items
        .iter()
        .map(|raw| Tx::decode(raw).map_err(|e| StorageError::Trie(format!("malformed tx in body: {e}"))))
        .collect()
}

const BODY_KEY: &[u8] = b"body";

/// Computes `tx_root` over `txs` using a throwaway in-memory trie. Used
/// by the Block Assembler before a body has a home to persist to.
pub fn compute_tx_root(txs: &[Tx]) -> Hash256 {
    let db = Arc::new(MemoryDB::new(true));
    let mut trie = EthTrie::new(db);
    trie.insert(BODY_KEY, &encode_body(txs))
        .expect("insert into an in-memory trie never fails");
    let root = trie.root_hash().expect("root hash of a freshly built trie never fails");
    Hash256(root.0)
}

/// Persists `txs` into the trie backing `db`, keyed by `block_hash`, and
/// returns the resulting `tx_root`.
pub fn write_body<D: DB>(
    db: Arc<D>,
    block_hash: &Hash256,
    txs: &[Tx],
) -> Result<Hash256, StorageError>
where
    D::Error: std::fmt::Display,
{
    let mut trie = EthTrie::new(db);
    let key = [block_hash.as_bytes().as_slice(), BODY_KEY].concat();
    trie.insert(&key, &encode_body(txs))
        .map_err(|e| StorageError::Trie(e.to_string()))?;
    let root = trie.root_hash().map_err(|e| StorageError::Trie(e.to_string()))?;
    Ok(Hash256(root.0))
}

/// Reads back a body written by [`write_body`]. Returns
/// [`StorageError::TrieMissing`] if no body is stored under `block_hash`.
pub fn read_body<D: DB>(db: Arc<D>, block_hash: &Hash256) -> Result<Vec<Tx>, StorageError>
where
    D::Error: std::fmt::Display,
{
    let trie = EthTrie::new(db);
    let key = [block_hash.as_bytes().as_slice(), BODY_KEY].concat();
    let bytes = trie
        .get(&key)
        .map_err(|e| StorageError::Trie(e.to_string()))?
        .ok_or(StorageError::TrieMissing)?;
    decode_body(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    fn sample_tx(nonce: u64) -> Tx {
        let mut tx = Tx {
            nonce,
            to: Address([7u8; 20]),
            value: crate::codec::decimal_from_str("1.5").unwrap(),
            fee: crate::codec::decimal_from_str("0.01").unwrap(),
            data: Vec::new(),
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
            hash: Hash256::ZERO,
        };
        tx.finalize();
        tx
    }

    #[test]
    fn compute_tx_root_is_deterministic() {
        let txs = vec![sample_tx(0), sample_tx(1)];
        assert_eq!(compute_tx_root(&txs), compute_tx_root(&txs));
    }

    #[test]
    fn write_then_read_body_roundtrips() {
        let db = Arc::new(MemoryDB::new(true));
        let block_hash = Hash256::compute(b"block");
        let txs = vec![sample_tx(0), sample_tx(1)];

        write_body(db.clone(), &block_hash, &txs).unwrap();
        let fetched = read_body(db, &block_hash).unwrap();

        assert_eq!(fetched.len(), txs.len());
        assert_eq!(fetched[0].hash, txs[0].hash);
    }
}
