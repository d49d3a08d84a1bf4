//! Fixed-width big-endian field codec.
//!
//! Every integer that crosses into a parameter block goes through this
//! module: values are written big-endian and left-padded with zero bytes to
//! the field width of the curve, and read back as non-negative integers.

use crate::{Error, Result};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use zeroize::Zeroizing;

/// Encode `value` into `out` as a big-endian integer of exactly `out.len()`
/// bytes.
///
/// Returns [`Error::FieldOverflow`] when the value needs more bytes than the
/// field provides. `out` is left untouched in that case.
pub fn encode_field(value: &BigUint, out: &mut [u8]) -> Result<()> {
    if value.is_zero() {
        out.fill(0);
        return Ok(());
    }

    let bytes = Zeroizing::new(value.to_bytes_be());
    let pad = out
        .len()
        .checked_sub(bytes.len())
        .ok_or(Error::FieldOverflow { len: out.len() })?;

    let (zeros, digits) = out.split_at_mut(pad);
    zeros.fill(0);
    digits.copy_from_slice(&bytes);
    Ok(())
}

/// Encode a signed integer, rejecting negative values.
pub fn encode_scalar(value: &BigInt, out: &mut [u8]) -> Result<()> {
    if value.sign() == Sign::Minus {
        return Err(Error::NegativeValue);
    }

    encode_field(value.magnitude(), out)
}

/// Copy the big-endian integer `bytes` into `out`, left-padded with zeros.
///
/// Used for values that are already serialized, such as secret scalars,
/// so they never pass through a [`BigUint`].
pub fn encode_bytes(bytes: &[u8], out: &mut [u8]) -> Result<()> {
    let pad = out
        .len()
        .checked_sub(bytes.len())
        .ok_or(Error::FieldOverflow { len: out.len() })?;

    let (zeros, digits) = out.split_at_mut(pad);
    zeros.fill(0);
    digits.copy_from_slice(bytes);
    Ok(())
}

/// Decode a big-endian field. Always succeeds.
pub fn decode_field(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Place a message digest into a hash field of `out.len()` bytes.
///
/// A digest shorter than the field is right-aligned behind zero bytes; a
/// longer one keeps its leading (most significant) `out.len()` bytes.
pub fn encode_digest(digest: &[u8], out: &mut [u8]) {
    let len = out.len();
    let off = len - digest.len().min(len);

    out[..off].fill(0);
    out[off..].copy_from_slice(&digest[..len - off]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn encode_pads_left() {
        let mut out = [0xffu8; 8];
        encode_field(&BigUint::from(0x0102u32), &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn encode_zero_clears_field() {
        let mut out = [0xaau8; 4];
        encode_field(&BigUint::zero(), &mut out).unwrap();
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn encode_exact_width() {
        let value = hex!("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551");
        let mut out = [0u8; 32];
        encode_field(&BigUint::from_bytes_be(&value), &mut out).unwrap();
        assert_eq!(out, value);
    }

    #[test]
    fn encode_overflow() {
        let mut out = [0x55u8; 2];
        let err = encode_field(&BigUint::from(0x010000u32), &mut out).unwrap_err();
        assert_eq!(err, Error::FieldOverflow { len: 2 });
        assert_eq!(out, [0x55; 2]);
    }

    #[test]
    fn encode_negative_scalar() {
        let mut out = [0u8; 4];
        assert_eq!(
            encode_scalar(&BigInt::from(-1), &mut out),
            Err(Error::NegativeValue)
        );
        encode_scalar(&BigInt::from(7), &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 7]);
    }

    #[test]
    fn encode_bytes_pads_left() {
        let mut out = [0xffu8; 6];
        encode_bytes(&[9, 8, 7], &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 9, 8, 7]);

        let mut short = [0x11u8; 2];
        assert_eq!(
            encode_bytes(&[1, 2, 3], &mut short),
            Err(Error::FieldOverflow { len: 2 })
        );
        assert_eq!(short, [0x11; 2]);
    }

    #[test]
    fn decode_ignores_leading_zeros() {
        assert_eq!(decode_field(&[0, 0, 0, 0x2a]), BigUint::from(42u8));
        assert_eq!(decode_field(&[0; 16]), BigUint::zero());
    }

    #[test]
    fn digest_shorter_than_field() {
        let mut out = [0xffu8; 8];
        encode_digest(&[1, 2, 3], &mut out);
        assert_eq!(out, [0, 0, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn digest_longer_than_field() {
        let mut out = [0u8; 4];
        encode_digest(&[1, 2, 3, 4, 5, 6], &mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn empty_digest() {
        let mut out = [0xffu8; 4];
        encode_digest(&[], &mut out);
        assert_eq!(out, [0; 4]);
    }
}
