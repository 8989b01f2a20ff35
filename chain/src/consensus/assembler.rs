//! Block Assembler (C6).
//!
//! Builds a [`PendingBlockHeader`] on top of the confirmed chain's head:
//! pulls a fee-ordered batch from the mempool, appends a coinbase paying
//! the assembling miner, computes `tx_root` over the resulting body, and
//! asks an injected [`StateRootProvider`] for `state_root`. Execution of
//! transactions against state is out of scope for this core; the state
//! root is whatever the external provider says it is.
//!
//! An empty mempool batch always fails assembly with
//! [`ConsensusError::NoTxs`] before a coinbase is ever minted; there is
//! no configuration knob to mint coinbase-only blocks.

use std::sync::Arc;

use crate::consensus::coinbase;
use crate::consensus::config::ConsensusConfig;
use crate::consensus::error::{ConsensusError, ExternalError};
use crate::mempool::Mempool;
use crate::storage::{trie, Store};
use crate::types::{Address, Hash256, PendingBlock, PendingBlockHeader, Tx};

/// Computes the state root a candidate block would produce, given its
/// transaction body. Kept as a trait so the assembler does not need to
/// know whether state execution lives in this process, a sidecar, or a
/// stub (tests use a fixed-root stub).
pub trait StateRootProvider: Send + Sync {
    fn state_root(&self, prev_state_root: &Hash256, txs: &[Tx]) -> Result<Hash256, ExternalError>;
}

/// Stub provider that carries the previous state root forward unchanged.
/// Stands in until a real state-execution engine is wired up; every
/// block it touches is still correctly content-addressed, it just never
/// reflects transaction side effects.
pub struct PassthroughStateRoot;

impl StateRootProvider for PassthroughStateRoot {
    fn state_root(&self, prev_state_root: &Hash256, _txs: &[Tx]) -> Result<Hash256, ExternalError> {
        Ok(*prev_state_root)
    }
}

pub struct Assembler<S: StateRootProvider> {
    config: ConsensusConfig,
    store: Arc<dyn Store>,
    mempool: Arc<Mempool>,
    state_root: S,
}

impl<S: StateRootProvider> Assembler<S> {
    pub fn new(config: ConsensusConfig, store: Arc<dyn Store>, mempool: Arc<Mempool>, state_root: S) -> Self {
        Self {
            config,
            store,
            mempool,
            state_root,
        }
    }

    /// Assembles a candidate block. `miner` receives the coinbase.
    /// `miner_nonce` is the assembler's own next nonce for the coinbase
    /// transaction.
    pub fn assemble(&self, miner: Address, miner_nonce: u64) -> Result<PendingBlock, ConsensusError> {
        let (prev_hash, prev_state_root, next_number) = match self.store.head()? {
            Some(head) => (head.hash(), head.header.state_root, head.number() + 1),
            None => (Hash256::ZERO, Hash256::ZERO, 0),
        };

        let mut txs = self
            .mempool
            .get_batch_of_valid_pending_transactions(self.config.max_block_txs)?;

        if txs.is_empty() {
            return Err(ConsensusError::NoTxs(next_number));
        }

        let fee_sum = coinbase::sum_pending_transaction_fees(&txs);
        let coinbase_tx = coinbase::mint(miner, &fee_sum, miner_nonce);
        txs.push(coinbase_tx);

        let tx_root = trie::compute_tx_root(&txs);
        let state_root = self.state_root.state_root(&prev_state_root, &txs)?;

        let header = PendingBlockHeader::new(
            prev_hash,
            next_number,
            state_root,
            crate::types::block::EMPTY_TRIE_ROOT,
            tx_root,
        );

        Ok(PendingBlock {
            header,
            body: Some(txs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStore;

    #[test]
    fn empty_mempool_fails_assembly_without_minting_coinbase() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let mempool = Arc::new(Mempool::new(store.clone()));
        let assembler = Assembler::new(
            ConsensusConfig::default(),
            store,
            mempool,
            PassthroughStateRoot,
        );

        let err = assembler.assemble(Address([1u8; 20]), 0).unwrap_err();
        assert!(matches!(err, ConsensusError::NoTxs(0)));
    }
}
