//! Mempool admission, validation, and fee-ordered batching.
//!
//! The mempool is a thin layer over [`Store`]'s `pending_transactions`
//! table: it adds signature/nonce/balance checks on admission and a
//! deterministic ordering for block assembly. It holds no state of its
//! own beyond a soft size cap enforced by evicting the lowest-fee entry.

use std::sync::Arc;

use crate::accounts;
use crate::crypto;
use crate::storage::{Store, StorageError};
use crate::types::{Hash256, Tx};

/// Why a transaction was rejected at admission time.
#[derive(thiserror::Error, Debug)]
pub enum MempoolError {
    #[error("signature does not recover to a sender")]
    InvalidSignature,
    #[error("transaction {0} is already in the mempool")]
    AlreadyKnown(Hash256),
    #[error("nonce {got} does not match expected {expected} for this sender")]
    NonceGap { expected: u64, got: u64 },
    #[error("sender balance is insufficient to cover value + fee")]
    InsufficientBalance,
    #[error("transaction payload could not be parsed")]
    MalformedPayload,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Soft upper bound on the number of transactions the mempool will
/// hold before evicting the lowest-fee entry to make room.
pub const DEFAULT_MAX_SIZE: usize = 50_000;

pub struct Mempool {
    store: Arc<dyn Store>,
    max_size: usize,
}

impl Mempool {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    pub fn with_max_size(store: Arc<dyn Store>, max_size: usize) -> Self {
        Self { store, max_size }
    }

    /// Validates `tx` against the confirmed chain and the current
    /// mempool contents, without mutating anything.
    pub fn valid_tx(&self, tx: &Tx) -> Result<(), MempoolError> {
        if self.store.get_pending_tx(&tx.hash)?.is_some() {
            return Err(MempoolError::AlreadyKnown(tx.hash));
        }

        let sender = crypto::recover_address(&tx.signing_hash(), tx.v, &tx.r, &tx.s)
            .map_err(|_| MempoolError::InvalidSignature)?;

        let state = accounts::state_at(self.store.as_ref(), &sender)?;
        let expected = state.nonce + 1;
        if tx.nonce != expected {
            return Err(MempoolError::NonceGap {
                expected,
                got: tx.nonce,
            });
        }

        let required = &tx.value + &tx.fee;
        if state.balance < required {
            return Err(MempoolError::InsufficientBalance);
        }

        Ok(())
    }

    /// Validates and, on success, admits `tx` into the pending set.
    /// Evicts the lowest-fee pending transaction if admitting `tx`
    /// would exceed `max_size`.
    pub fn admit(&self, tx: Tx) -> Result<(), MempoolError> {
        self.valid_tx(&tx)?;

        let pending = self.store.list_pending_txs(self.max_size + 1)?;
        if pending.len() >= self.max_size {
            if let Some(lowest) = pending.iter().min_by(|a, b| a.fee.cmp(&b.fee)) {
                self.store.delete_pending_tx(&lowest.hash)?;
            }
        }

        self.store.write_pending_tx(&tx)?;
        Ok(())
    }

    /// Selects up to `max_txs` pending transactions for block
    /// inclusion, re-validating each one (the mempool is not revalidated
    /// continuously, so a transaction can go stale between admission and
    /// assembly). Ordered by fee descending, tie-broken by hash
    /// ascending so every node picks the same batch from the same pool.
    pub fn get_batch_of_valid_pending_transactions(
        &self,
        max_txs: usize,
    ) -> Result<Vec<Tx>, StorageError> {
        let mut candidates = self.store.list_pending_txs(usize::MAX)?;
        candidates.retain(|tx| self.valid_tx(tx).is_ok());
        candidates.sort_by(|a, b| b.fee.cmp(&a.fee).then_with(|| a.hash.cmp(&b.hash)));
        candidates.truncate(max_txs);
        Ok(candidates)
    }

    /// All transactions still sitting in the pending table, i.e. not yet
    /// included in a confirmed block.
    pub fn unmined(&self) -> Result<Vec<Tx>, StorageError> {
        self.store.list_pending_txs(usize::MAX)
    }

    /// Removes transactions that made it into a confirmed block from the
    /// pending set. Called by the assembler once a block commits.
    pub fn remove_mined(&self, txs: &[Tx]) -> Result<(), StorageError> {
        for tx in txs {
            self.store.delete_pending_tx(&tx.hash)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStore;
    use secp256k1::SecretKey;

    fn funded_sender(store: &MemStore) -> (SecretKey, crate::types::Address) {
        let secret = SecretKey::from_slice(&[3u8; 32]).unwrap();
        let public = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, &secret);
        let sender = crypto::address_from_pubkey(&public);

        let header = crate::types::PendingBlockHeader::new(
            Hash256::ZERO,
            1,
            Hash256::ZERO,
            crate::types::block::EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        );
        let funding_tx = Tx {
            nonce: 0,
            to: sender,
            value: crate::codec::decimal_from_str("1000").unwrap(),
            fee: crate::codec::decimal_from_str("0").unwrap(),
            data: Vec::new(),
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
            hash: Hash256::ZERO,
        };
        let block = crate::types::Block {
            header,
            txs: vec![funding_tx],
        };
        store.write_block(&block).unwrap();
        (secret, sender)
    }

    fn make_tx(secret: &SecretKey, nonce: u64, to: crate::types::Address) -> Tx {
        let mut tx = Tx {
            nonce,
            to,
            value: crate::codec::decimal_from_str("10").unwrap(),
            fee: crate::codec::decimal_from_str("1").unwrap(),
            data: Vec::new(),
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
            hash: Hash256::ZERO,
        };
        let (v, r, s) = crypto::sign(secret, &tx.signing_hash());
        tx.v = v;
        tx.r = r;
        tx.s = s;
        tx.finalize();
        tx
    }

    #[test]
    fn admit_rejects_nonce_gap() {
        let store = Arc::new(MemStore::new());
        let (secret, _sender) = funded_sender(&store);
        let mempool = Mempool::new(store);

        let tx = make_tx(&secret, 5, crate::types::Address([9u8; 20]));
        let err = mempool.admit(tx).unwrap_err();
        assert!(matches!(err, MempoolError::NonceGap { .. }));
    }

    #[test]
    fn admit_then_batch_orders_by_fee_descending() {
        let store = Arc::new(MemStore::new());
        let (secret, _sender) = funded_sender(&store);
        let mempool = Mempool::new(store);

        let tx0 = make_tx(&secret, 1, crate::types::Address([9u8; 20]));
        mempool.admit(tx0.clone()).unwrap();

        let batch = mempool.get_batch_of_valid_pending_transactions(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].hash, tx0.hash);
    }
}
