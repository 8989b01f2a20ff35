//! Derived account state.
//!
//! There is no persistent account table: nonce and balance are derived
//! on demand by walking confirmed blocks and recovering each
//! transaction's sender from its signature. This keeps the store's
//! write path limited to the tables in [`crate::storage::Store`] and
//! avoids a second source of truth that could drift from the chain.

use std::collections::HashMap;

use crate::codec::Decimal;
use crate::crypto;
use crate::storage::{Store, StorageError};
use crate::types::{Address, Block};

/// Snapshot of one account's derived state as of a given block.
#[derive(Clone, Debug, Default)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: Decimal,
}

/// Applies every transaction in `block` to `accounts`: credits `to`,
/// and for transactions whose signer recovers successfully, debits the
/// sender and advances its nonce. A transaction whose signature fails
/// to recover is skipped; the mempool and assembler never let such a
/// transaction reach a confirmed block, so this only happens when
/// replaying a chain written by a buggy or malicious peer.
///
/// Nonces start at 1 and increment by exactly 1 per confirmed
/// transaction from a sender, so a sender's nonce after folding is
/// simply the last `tx.nonce` it used.
fn fold_block(accounts: &mut HashMap<Address, AccountState>, block: &Block) {
    for tx in &block.txs {
        let recipient = accounts.entry(tx.to).or_default();
        recipient.balance = &recipient.balance + &tx.value;

        let Ok(sender) = crypto::recover_address(&tx.signing_hash(), tx.v, &tx.r, &tx.s) else {
            continue;
        };
        let sender_state = accounts.entry(sender).or_default();
        sender_state.balance = &sender_state.balance - &tx.value - &tx.fee;
        sender_state.nonce = tx.nonce;
    }
}

/// Derives the state of `address` as of the confirmed chain ending at
/// `store.head()`. Returns the zero state for an address that has never
/// appeared in a confirmed block.
pub fn state_at(store: &dyn Store, address: &Address) -> Result<AccountState, StorageError> {
    let Some(head) = store.head()? else {
        return Ok(AccountState::default());
    };

    let mut chain = store.list_preceding_blocks(&head)?;
    chain.push(head);
    chain.reverse();

    let mut accounts: HashMap<Address, AccountState> = HashMap::new();
    for block in &chain {
        fold_block(&mut accounts, block);
    }

    Ok(accounts.remove(address).unwrap_or_default())
}

/// The next nonce a new transaction from `address` must use, i.e. one
/// past the last nonce it has confirmed on chain (or `1` for an address
/// with no confirmed transactions, since nonces start at 1).
pub fn next_nonce(store: &dyn Store, address: &Address) -> Result<u64, StorageError> {
    Ok(state_at(store, address)?.nonce + 1)
}

/// The confirmed balance of `address`.
pub fn balance(store: &dyn Store, address: &Address) -> Result<Decimal, StorageError> {
    Ok(state_at(store, address)?.balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStore;
    use crate::types::block::EMPTY_TRIE_ROOT;
    use crate::types::{Hash256, PendingBlockHeader, Tx};
    use secp256k1::SecretKey;

    fn signed_tx(secret: &SecretKey, nonce: u64, to: Address, value: &str, fee: &str) -> Tx {
        let mut tx = Tx {
            nonce,
            to,
            value: crate::codec::decimal_from_str(value).unwrap(),
            fee: crate::codec::decimal_from_str(fee).unwrap(),
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
    fn balance_and_nonce_reflect_confirmed_blocks() {
        let store = MemStore::new();
        let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, &secret);
        let sender = crypto::address_from_pubkey(&public);
        let receiver = Address([2u8; 20]);

        let tx = signed_tx(&secret, 1, receiver, "10", "1");
        let header = PendingBlockHeader::new(
            Hash256::ZERO,
            1,
            Hash256::ZERO,
            EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        );
        let block = Block { header, txs: vec![tx] };
        store.write_block(&block).unwrap();

        let sender_state = state_at(&store, &sender).unwrap();
        assert_eq!(sender_state.nonce, 1);

        let receiver_state = state_at(&store, &receiver).unwrap();
        assert_eq!(crate::codec::decimal_to_string(&receiver_state.balance), "10");
    }

    #[test]
    fn next_nonce_starts_at_one_and_follows_last_confirmed_nonce() {
        let store = MemStore::new();
        let secret = SecretKey::from_slice(&[8u8; 32]).unwrap();
        let public = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, &secret);
        let sender = crypto::address_from_pubkey(&public);
        let receiver = Address([3u8; 20]);

        assert_eq!(next_nonce(&store, &sender).unwrap(), 1);

        let tx = signed_tx(&secret, 1, receiver, "1", "0");
        let header = PendingBlockHeader::new(
            Hash256::ZERO,
            1,
            Hash256::ZERO,
            EMPTY_TRIE_ROOT,
            Hash256::compute(b"txs"),
        );
        store.write_block(&Block { header, txs: vec![tx] }).unwrap();

        assert_eq!(next_nonce(&store, &sender).unwrap(), 2);
    }
}
