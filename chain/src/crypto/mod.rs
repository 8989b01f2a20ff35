//! ECDSA sign/recover over secp256k1 and address derivation.
//!
//! `v` is stored as the raw secp256k1 recovery id (0 or 1), not the
//! Ethereum-style 27/28-offset convention.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey};

use crate::types::{ADDRESS_LEN, Address, Hash256};

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1::Error),
}

/// Signs a 32-byte message digest, returning `(v, r, s)`.
pub fn sign(secret: &SecretKey, msg_hash: &Hash256) -> (u8, [u8; 32], [u8; 32]) {
    let message = Message::from_digest(msg_hash.0);
    let sig = secp256k1::SECP256K1.sign_ecdsa_recoverable(&message, secret);
    let (recovery_id, bytes) = sig.serialize_compact();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[0..32]);
    s.copy_from_slice(&bytes[32..64]);
    (recovery_id.to_i32() as u8, r, s)
}

/// Recovers the public key that produced `(v, r, s)` over `msg_hash`.
pub fn recover(
    msg_hash: &Hash256,
    v: u8,
    r: &[u8; 32],
    s: &[u8; 32],
) -> Result<PublicKey, CryptoError> {
    let recovery_id = RecoveryId::from_i32(v as i32)?;
    let mut compact = [0u8; 64];
    compact[0..32].copy_from_slice(r);
    compact[32..64].copy_from_slice(s);
    let sig = RecoverableSignature::from_compact(&compact, recovery_id)?;
    let message = Message::from_digest(msg_hash.0);
    let pubkey = secp256k1::SECP256K1.recover_ecdsa(&message, &sig)?;
    Ok(pubkey)
}

/// Derives a 20-byte address from a recovered public key: Keccak-256 of
/// the uncompressed key (minus the leading `0x04` byte), last 20 bytes.
pub fn address_from_pubkey(pk: &PublicKey) -> Address {
    let uncompressed = pk.serialize_uncompressed();
    let hash = Hash256::compute(&uncompressed[1..]);
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(&hash.0[HASH_TAIL_START..]);
    Address(bytes)
}

const HASH_TAIL_START: usize = 32 - ADDRESS_LEN;

/// Recovers the sender address directly from a signed message hash.
pub fn recover_address(
    msg_hash: &Hash256,
    v: u8,
    r: &[u8; 32],
    s: &[u8; 32],
) -> Result<Address, CryptoError> {
    let pk = recover(msg_hash, v, r, s)?;
    Ok(address_from_pubkey(&pk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn random_keypair() -> (SecretKey, PublicKey) {
        let secret = SecretKey::new(&mut OsRng);
        let public = PublicKey::from_secret_key(secp256k1::SECP256K1, &secret);
        (secret, public)
    }

    #[test]
    fn sign_then_recover_yields_original_signer() {
        let (secret, public) = random_keypair();
        let expected_addr = address_from_pubkey(&public);

        let msg = Hash256::compute(b"hello world");
        let (v, r, s) = sign(&secret, &msg);

        let recovered_addr = recover_address(&msg, v, &r, &s).unwrap();
        assert_eq!(recovered_addr, expected_addr);
    }

    #[test]
    fn recover_fails_for_tampered_message() {
        let (secret, public) = random_keypair();
        let real_addr = address_from_pubkey(&public);

        let msg = Hash256::compute(b"original");
        let (v, r, s) = sign(&secret, &msg);

        let tampered = Hash256::compute(b"tampered");
        let recovered = recover_address(&tampered, v, &r, &s).unwrap();
        assert_ne!(recovered, real_addr);
    }
}
