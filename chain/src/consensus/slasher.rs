//! Equivocation detection and slashing.
//!
//! Detection (`find_equivocation`) runs over votes already collected by
//! the vote manager; it is pure and storage-free. Applying a slash
//! (`apply`) is idempotent per `(offender, height, round)`: two
//! independently emitted slash transactions proving the same
//! equivocation must not cut the offender's stake twice.

use std::collections::HashMap;

use serde_json::json;

use crate::consensus::error::ExternalError;
use crate::crypto;
use crate::storage::{Store, StorageError};
use crate::types::slash::{SlashProof, SLASH_PENALTY_PERCENTAGE};
use crate::types::{Address, Hash256, Tx, Vote};

/// Scans `votes` for two entries sharing an equivocation key but
/// disagreeing on `block_hash`, returning the first such pair found.
/// Votes are assumed to already be signature-checked by the caller
/// (the vote manager rejects bad signatures at cast time).
pub fn find_equivocation(votes: &[Vote]) -> Option<SlashProof> {
    let mut seen: HashMap<(Address, u64, u32), &Vote> = HashMap::new();
    for vote in votes {
        let key = vote.equivocation_key();
        match seen.get(&key) {
            Some(prior) if prior.block_hash != vote.block_hash => {
                return Some(SlashProof {
                    first: (*prior).clone(),
                    second: vote.clone(),
                });
            }
            Some(_) => continue,
            None => {
                seen.insert(key, vote);
            }
        }
    }
    None
}

/// Full verification of a proof: both signatures must recover, both
/// signers must be the same miner, and the structural shape (same
/// equivocation key, different block hash) must hold.
pub fn verify_proof(proof: &SlashProof) -> Result<Address, ExternalError> {
    if !proof.is_structurally_valid() {
        return Err(ExternalError::InvalidProof("proof is not structurally valid".to_string()));
    }

    let signer_a = crypto::recover_address(
        &proof.first.signing_hash(),
        proof.first.v,
        &proof.first.r,
        &proof.first.s,
    )?;
    let signer_b = crypto::recover_address(
        &proof.second.signing_hash(),
        proof.second.v,
        &proof.second.r,
        &proof.second.s,
    )?;

    if signer_a != signer_b || signer_a != proof.first.miner_address {
        return Err(ExternalError::InvalidProof(
            "recovered signers do not match the claimed offender".to_string(),
        ));
    }

    Ok(signer_a)
}

/// Builds an unsigned slash transaction carrying `proof`, targeting the
/// offending miner as `to` so the transaction's effect is auditable from
/// its own fields.
pub fn build_slash_tx(offender: Address, proof: &SlashProof, nonce: u64) -> Result<Tx, serde_json::Error> {
    let data = json!({
        "tx_type": "slash",
        "byzantine_behavior_proof": proof.to_hex()?,
    })
    .to_string()
    .into_bytes();

    Ok(Tx {
        nonce,
        to: offender,
        value: crate::codec::decimal_from_str("0").expect("zero is a valid decimal literal"),
        fee: crate::codec::decimal_from_str("0").expect("zero is a valid decimal literal"),
        data,
        v: 0,
        r: [0u8; 32],
        s: [0u8; 32],
        hash: Hash256::ZERO,
    })
}

/// Applies a verified slash transaction: cuts the offender's stake by
/// [`SLASH_PENALTY_PERCENTAGE`]. Skips the cut (but still returns `Ok`)
/// if a slash for this exact `(offender, height, round)` was already
/// applied, so re-delivering the same equivocation proof in a second
/// transaction never double-penalizes the offender's stake.
pub fn apply(
    store: &dyn Store,
    offender: &Address,
    height: u64,
    round: u32,
) -> Result<(), StorageError> {
    if store.has_slash_applied(offender, height, round)? {
        return Ok(());
    }
    let Some(mut miner) = store.get_miner(offender)? else {
        return Ok(());
    };
    let penalty = crate::codec::decimal_from_str(&(1.0 - SLASH_PENALTY_PERCENTAGE).to_string())
        .expect("1 - SLASH_PENALTY_PERCENTAGE is always a valid decimal literal");
    miner.stake_amount = &miner.stake_amount * &penalty;
    store.write_miner(&miner)?;
    store.mark_slash_applied(offender, height, round)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    fn cast_vote(secret: &SecretKey, addr: Address, round: u32, block_hash: Hash256) -> Vote {
        let mut vote = Vote {
            miner_address: addr,
            block_number: 5,
            block_hash,
            voting_round: round,
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
            hash: Hash256::ZERO,
        };
        let (v, r, s) = crypto::sign(secret, &vote.signing_hash());
        vote.v = v;
        vote.r = r;
        vote.s = s;
        vote.finalize();
        vote
    }

    #[test]
    fn finds_equivocating_pair() {
        let secret = SecretKey::from_slice(&[5u8; 32]).unwrap();
        let public = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, &secret);
        let addr = crypto::address_from_pubkey(&public);

        let v1 = cast_vote(&secret, addr, 0, Hash256::compute(b"A"));
        let v2 = cast_vote(&secret, addr, 0, Hash256::compute(b"B"));
        let honest = cast_vote(&secret, Address([2u8; 20]), 0, Hash256::compute(b"A"));

        let proof = find_equivocation(&[v1, v2, honest]).expect("should detect equivocation");
        let offender = verify_proof(&proof).unwrap();
        assert_eq!(offender, addr);
    }

    #[test]
    fn apply_cuts_stake_by_penalty() {
        let store = crate::storage::MemStore::new();
        let addr = Address([1u8; 20]);
        let miner = crate::types::Miner::new(addr, crate::codec::decimal_from_str("100").unwrap(), 0);
        store.write_miner(&miner).unwrap();

        apply(&store, &addr, 5, 0).unwrap();

        let updated = store.get_miner(&addr).unwrap().unwrap();
        assert_eq!(crate::codec::decimal_to_string(&updated.stake_amount), "80");
    }

    #[test]
    fn apply_is_idempotent_per_height_and_round() {
        let store = crate::storage::MemStore::new();
        let addr = Address([1u8; 20]);
        let miner = crate::types::Miner::new(addr, crate::codec::decimal_from_str("100").unwrap(), 0);
        store.write_miner(&miner).unwrap();

        apply(&store, &addr, 5, 0).unwrap();
        apply(&store, &addr, 5, 0).unwrap();

        let updated = store.get_miner(&addr).unwrap().unwrap();
        assert_eq!(crate::codec::decimal_to_string(&updated.stake_amount), "80");
    }

    #[test]
    fn apply_treats_different_rounds_independently() {
        let store = crate::storage::MemStore::new();
        let addr = Address([1u8; 20]);
        let miner = crate::types::Miner::new(addr, crate::codec::decimal_from_str("100").unwrap(), 0);
        store.write_miner(&miner).unwrap();

        apply(&store, &addr, 5, 0).unwrap();
        apply(&store, &addr, 5, 1).unwrap();

        let updated = store.get_miner(&addr).unwrap().unwrap();
        assert_eq!(crate::codec::decimal_to_string(&updated.stake_amount), "64");
    }
}
