//! Transaction type for the consensus layer.
//!
//! A [`Tx`] moves value between accounts and carries an opaque `data`
//! payload tagged with a `tx_type` (coinbase, slash, or an application-
//! defined type). The sender is never stored directly: it is recovered
//! from the signature over the unsigned encoding.

use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError, Decimal};
use crate::types::{ADDRESS_LEN, Address, Hash256};

/// A signed transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tx {
    pub nonce: u64,
    pub to: Address,
    pub value: Decimal,
    pub fee: Decimal,
    pub data: Vec<u8>,
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// `H(rlp(tx including signature))`. Populated by [`Tx::finalize`] or
    /// by [`Tx::decode`]; never trust a caller-supplied hash without
    /// recomputing it when it matters (mempool admission does).
    pub hash: Hash256,
}

impl Tx {
    /// Encodes the transaction without `v, r, s` — this is the payload
    /// that gets signed and later used to recover the sender.
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(5);
        s.append(&self.nonce);
        s.append(&self.to.as_bytes().as_slice());
        codec::append_decimal(&mut s, &self.value);
        codec::append_decimal(&mut s, &self.fee);
        s.append(&self.data);
        s.out().to_vec()
    }

    /// Encodes the transaction including the signature fields. This is
    /// the representation that gets hashed into [`Tx::hash`].
    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(8);
        s.append(&self.nonce);
        s.append(&self.to.as_bytes().as_slice());
        codec::append_decimal(&mut s, &self.value);
        codec::append_decimal(&mut s, &self.fee);
        s.append(&self.data);
        s.append(&self.v);
        s.append(&self.r.as_slice());
        s.append(&self.s.as_slice());
        s.out().to_vec()
    }

    /// The hash that gets signed: `H(rlp(tx without v, r, s))`.
    pub fn signing_hash(&self) -> Hash256 {
        codec::hash256(&self.encode_unsigned())
    }

    /// Recomputes and stores `hash` from the current field values.
    pub fn finalize(&mut self) {
        self.hash = codec::hash256(&self.encode());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let rlp = Rlp::new(bytes);
        if rlp.item_count()? != 8 {
            return Err(CodecError::Malformed);
        }
        let nonce: u64 = rlp.val_at(0)?;
        let to_bytes: Vec<u8> = rlp.val_at(1)?;
        if to_bytes.len() != ADDRESS_LEN {
            return Err(CodecError::Malformed);
        }
        let mut to = [0u8; ADDRESS_LEN];
        to.copy_from_slice(&to_bytes);
        let value = codec::decode_decimal(&rlp, 2)?;
        let fee = codec::decode_decimal(&rlp, 3)?;
        let data: Vec<u8> = rlp.val_at(4)?;
        let v: u8 = rlp.val_at(5)?;
        let r_bytes: Vec<u8> = rlp.val_at(6)?;
        let s_bytes: Vec<u8> = rlp.val_at(7)?;
        if r_bytes.len() != 32 || s_bytes.len() != 32 {
            return Err(CodecError::Malformed);
        }
        let mut r = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        let mut s = [0u8; 32];
        s.copy_from_slice(&s_bytes);

        let mut tx = Tx {
            nonce,
            to: Address(to),
            value,
            fee,
            data,
            v,
            r,
            s,
            hash: Hash256::ZERO,
        };
        tx.finalize();
        Ok(tx)
    }

    /// `true` if `data` declares the given `tx_type` tag. Transaction
    /// payloads are opaque JSON with a recognized `tx_type` field; the
    /// core never interprets anything else in `data`.
    pub fn is_tx_type(&self, tx_type: &str) -> bool {
        self.tx_type().as_deref() == Some(tx_type)
    }

    pub fn tx_type(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.data).ok()?;
        value.get("tx_type")?.as_str().map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_tx() -> Tx {
        let mut tx = Tx {
            nonce: 1,
            to: Address([0x11; 20]),
            value: Decimal::from_str("10.5").unwrap(),
            fee: Decimal::from_str("0.5").unwrap(),
            data: b"{}".to_vec(),
            v: 0,
            r: [7u8; 32],
            s: [9u8; 32],
            hash: Hash256::ZERO,
        };
        tx.finalize();
        tx
    }

    #[test]
    fn encode_decode_roundtrips() {
        let tx = sample_tx();
        let bytes = tx.encode();
        let decoded = Tx::decode(&bytes).unwrap();
        assert_eq!(decoded.nonce, tx.nonce);
        assert_eq!(decoded.to, tx.to);
        assert_eq!(
            codec::decimal_to_string(&decoded.value),
            codec::decimal_to_string(&tx.value)
        );
        assert_eq!(decoded.hash, tx.hash);
    }

    #[test]
    fn unsigned_encoding_excludes_signature() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.v = 1;
        other.r = [0u8; 32];
        other.s = [0u8; 32];
        assert_eq!(tx.encode_unsigned(), other.encode_unsigned());
        assert_ne!(tx.encode(), other.encode());
    }

    #[test]
    fn tx_type_reads_json_tag() {
        let mut tx = sample_tx();
        tx.data = br#"{"tx_type":"coinbase"}"#.to_vec();
        assert!(tx.is_tx_type("coinbase"));
        assert!(!tx.is_tx_type("slash"));
    }
}
