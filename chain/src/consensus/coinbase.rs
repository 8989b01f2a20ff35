//! Coinbase transaction minting and validation.
//!
//! A block's coinbase transaction pays its assembler the sum of the
//! block's other transaction fees. By convention it is always the last
//! transaction in the block (see [`crate::types::Block::coinbase`]), so
//! fee-sum validation can exclude it positionally instead of needing a
//! `tx_type` tag check on every transaction.

use serde_json::json;

use crate::codec::{self, Decimal};
use crate::crypto;
use crate::types::{Address, Tx};

/// Builds an unsigned coinbase transaction paying `amount` to `miner`.
/// `nonce` is the assembler's next nonce; coinbase transactions are
/// ordinary transactions from the chain's perspective and consume a
/// nonce like any other.
pub fn mint(miner: Address, amount: &Decimal, nonce: u64) -> Tx {
    let data = json!({ "tx_type": "coinbase" }).to_string().into_bytes();
    Tx {
        nonce,
        to: miner,
        value: amount.clone(),
        fee: codec::decimal_from_str("0").expect("zero is a valid decimal literal"),
        data,
        v: 0,
        r: [0u8; 32],
        s: [0u8; 32],
        hash: crate::types::Hash256::ZERO,
    }
}

/// Signs a coinbase transaction built by [`mint`] and finalizes its hash.
pub fn sign(mut tx: Tx, secret: &secp256k1::SecretKey) -> Tx {
    let (v, r, s) = crypto::sign(secret, &tx.signing_hash());
    tx.v = v;
    tx.r = r;
    tx.s = s;
    tx.finalize();
    tx
}

/// Sums the fees of every transaction in `txs` except the last
/// (positional) element, which is assumed to be the coinbase itself.
/// An empty slice sums to zero.
pub fn sum_pending_transaction_fees(txs: &[Tx]) -> Decimal {
    let zero = codec::decimal_from_str("0").expect("zero is a valid decimal literal");
    if txs.len() <= 1 {
        return zero;
    }
    txs[..txs.len() - 1]
        .iter()
        .fold(zero, |acc, tx| &acc + &tx.fee)
}

/// Checks that `coinbase.value` matches the fee sum over the rest of
/// the block.
pub fn tx_fee_sums_match(txs: &[Tx]) -> bool {
    match txs.last() {
        Some(coinbase) if coinbase.is_tx_type("coinbase") => {
            sum_pending_transaction_fees(txs) == coinbase.value
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    fn fee_tx(fee: &str) -> Tx {
        Tx {
            nonce: 0,
            to: Address([1u8; 20]),
            value: codec::decimal_from_str("1").unwrap(),
            fee: codec::decimal_from_str(fee).unwrap(),
            data: Vec::new(),
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
            hash: crate::types::Hash256::ZERO,
        }
    }

    #[test]
    fn empty_block_has_zero_fee_sum() {
        assert_eq!(codec::decimal_to_string(&sum_pending_transaction_fees(&[])), "0");
    }

    #[test]
    fn fee_sum_excludes_coinbase_positionally() {
        let secret = SecretKey::from_slice(&[4u8; 32]).unwrap();
        let mut txs = vec![fee_tx("1.5"), fee_tx("2.5")];
        let coinbase = sign(mint(Address([9u8; 20]), &codec::decimal_from_str("4").unwrap(), 0), &secret);
        txs.push(coinbase);

        assert!(tx_fee_sums_match(&txs));
    }

    #[test]
    fn mismatched_coinbase_value_is_rejected() {
        let secret = SecretKey::from_slice(&[4u8; 32]).unwrap();
        let mut txs = vec![fee_tx("1.5")];
        let coinbase = sign(mint(Address([9u8; 20]), &codec::decimal_from_str("99").unwrap(), 0), &secret);
        txs.push(coinbase);

        assert!(!tx_fee_sums_match(&txs));
    }
}
