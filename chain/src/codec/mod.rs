//! Deterministic binary encoding for chain entities.
//!
//! All on-chain and on-wire entities are encoded with a length-prefixed
//! recursive RLP-style scheme via the [`rlp`] crate. Integers are
//! big-endian minimal (the crate's native integer encoding); amounts are
//! serialized as canonical decimal strings rather than binary floats, so
//! two nodes computing the same value always produce the same bytes.
//!
//! Two encoding modes exist for signable entities: `unsigned` (omits the
//! signature fields, used as the message that gets signed) and `default`
//! (includes them, used for wire transfer and hashing once signed).

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::types::Hash256;

/// Canonical decimal amount type. Re-exported here so call sites never
/// need to depend on `bigdecimal` directly.
pub type Decimal = BigDecimal;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("malformed rlp payload")]
    Rlp(#[from] rlp::DecoderError),
    #[error("malformed decimal string")]
    Decimal,
    #[error("malformed payload")]
    Malformed,
}

/// Normalizes a decimal into its canonical string form (no trailing
/// zeros, no redundant exponent). This is the only representation of a
/// `Decimal` that ever touches the wire.
pub fn decimal_to_string(d: &Decimal) -> String {
    d.normalized().to_string()
}

pub fn decimal_from_str(s: &str) -> Result<Decimal, CodecError> {
    Decimal::from_str(s).map_err(|_| CodecError::Decimal)
}

pub(crate) fn append_decimal(s: &mut rlp::RlpStream, d: &Decimal) {
    s.append(&decimal_to_string(d).into_bytes());
}

pub(crate) fn decode_decimal(rlp: &rlp::Rlp, idx: usize) -> Result<Decimal, CodecError> {
    let bytes: Vec<u8> = rlp.val_at(idx)?;
    let text = String::from_utf8(bytes).map_err(|_| CodecError::Decimal)?;
    decimal_from_str(&text)
}

/// Hashes arbitrary bytes with the chain's 256-bit hash function
/// (Keccak-256).
pub fn hash256(bytes: &[u8]) -> Hash256 {
    Hash256::compute(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_normalizes_trailing_zeros() {
        let a = decimal_from_str("1.50000").unwrap();
        let b = decimal_from_str("1.5").unwrap();
        assert_eq!(decimal_to_string(&a), decimal_to_string(&b));
    }

    #[test]
    fn decimal_roundtrips_through_canonical_string() {
        let d = decimal_from_str("42.0").unwrap();
        let s = decimal_to_string(&d);
        let back = decimal_from_str(&s).unwrap();
        assert_eq!(decimal_to_string(&back), s);
    }
}
