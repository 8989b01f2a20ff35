//! Block validity predicates.
//!
//! Checked when a pending block (locally assembled or received from a
//! peer) is admitted as a voting candidate: structural limits from
//! [`ConsensusConfig`], `tx_root` consistency, and the coinbase fee-sum
//! invariant from [`crate::consensus::coinbase`].

use crate::consensus::coinbase;
use crate::consensus::error::ValidationError;
use crate::consensus::ConsensusConfig;
use crate::storage::trie;
use crate::types::{PendingBlockHeader, Tx};

/// Validates a candidate block body against `header` and `config`.
pub fn validate_pending_block(
    header: &PendingBlockHeader,
    txs: &[Tx],
    config: &ConsensusConfig,
) -> Result<(), ValidationError> {
    if txs.len() > config.max_block_txs {
        return Err(ValidationError::TooManyTxs {
            max: config.max_block_txs,
            got: txs.len(),
        });
    }

    let size: usize = txs.iter().map(|tx| tx.encode().len()).sum();
    if size > config.max_block_size_bytes {
        return Err(ValidationError::BlockTooLarge {
            max: config.max_block_size_bytes,
            got: size,
        });
    }

    let computed_root = trie::compute_tx_root(txs);
    if computed_root != header.tx_root {
        return Err(ValidationError::TxRootMismatch {
            declared: header.tx_root,
            computed: computed_root,
        });
    }

    if !txs.is_empty() && !coinbase::tx_fee_sums_match(txs) {
        return Err(ValidationError::CoinbaseFeeMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::coinbase as cb;
    use crate::types::{Address, Hash256};
    use secp256k1::SecretKey;

    #[test]
    fn rejects_tx_root_mismatch() {
        let config = ConsensusConfig::default();
        let secret = SecretKey::from_slice(&[8u8; 32]).unwrap();
        let coinbase_tx = cb::sign(
            cb::mint(Address([1u8; 20]), &crate::codec::decimal_from_str("0").unwrap(), 0),
            &secret,
        );
        let txs = vec![coinbase_tx];

        let header = PendingBlockHeader::new(
            Hash256::ZERO,
            0,
            Hash256::ZERO,
            crate::types::block::EMPTY_TRIE_ROOT,
            Hash256::compute(b"wrong root"),
        );

        let err = validate_pending_block(&header, &txs, &config).unwrap_err();
        assert!(matches!(err, ValidationError::TxRootMismatch { .. }));
    }

    #[test]
    fn accepts_well_formed_coinbase_only_block() {
        let config = ConsensusConfig::default();
        let secret = SecretKey::from_slice(&[8u8; 32]).unwrap();
        let coinbase_tx = cb::sign(
            cb::mint(Address([1u8; 20]), &crate::codec::decimal_from_str("0").unwrap(), 0),
            &secret,
        );
        let txs = vec![coinbase_tx];
        let tx_root = trie::compute_tx_root(&txs);

        let header = PendingBlockHeader::new(
            Hash256::ZERO,
            0,
            Hash256::ZERO,
            crate::types::block::EMPTY_TRIE_ROOT,
            tx_root,
        );

        assert!(validate_pending_block(&header, &txs, &config).is_ok());
    }
}
