//! Software implementation of the accelerated operations.
//!
//! Used when the CPU lacks the CPACF functions for a curve, and for the
//! operations CPACF has no instruction for (multi-scalar multiplication,
//! negative scalars). Group arithmetic is delegated to the RustCrypto curve
//! crates; this module only converts between their types and [`Point`] /
//! [`BigUint`].
//!
//! Secret scalars (private keys, nonces and their inverses) are only ever
//! held as [`Scalar`]s or serialized field bytes, both of which zeroize.

use crate::{
    Error, Point, Result,
    codec::{decode_field, encode_digest, encode_field},
    curve::{MAX_LEN, NistCurve},
    ecdsa::Signature,
};
use elliptic_curve::{
    AffinePoint, FieldBytes, NonZeroScalar, ProjectivePoint, Scalar,
    ff::{Field, PrimeField},
    group::{Curve as _, Group},
    point::AffineCoordinates,
    sec1::{Coordinates, EncodedPoint, FromEncodedPoint, ToEncodedPoint},
};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

/// Attempts at drawing an in-range scalar before giving up on the RNG.
const MAX_RANDOM_ATTEMPTS: usize = 64;

/// Group order of `C`.
pub fn order<C: NistCurve>() -> BigUint {
    decode_field(C::DESCRIPTOR.order)
}

/// `k mod n`, for any sign and size of `k`.
pub fn reduce<C: NistCurve>(k: &BigInt) -> BigUint {
    let n = order::<C>();
    let r = k.magnitude() % &n;

    if k.sign() == Sign::Minus && !r.is_zero() {
        n - r
    } else {
        r
    }
}

/// Scalar from an integer in `[0, n)`.
pub fn to_scalar<C: NistCurve>(value: &BigUint) -> Result<Scalar<C>> {
    let mut repr = Zeroizing::new(FieldBytes::<C>::default());
    encode_field(value, &mut repr).map_err(|_| Error::InvalidScalar)?;

    Option::<Scalar<C>>::from(Scalar::<C>::from_repr((*repr).clone())).ok_or(Error::InvalidScalar)
}

/// Integer value of a public scalar.
pub fn from_scalar<C: NistCurve>(scalar: &Scalar<C>) -> BigUint {
    decode_field(&scalar.to_repr())
}

/// Scalar stored right-aligned in a CPACF field of any width.
///
/// Returns `None` if the field holds a value of `n` or more.
pub fn field_scalar<C: NistCurve>(field: &[u8]) -> Option<Scalar<C>> {
    let size = C::DESCRIPTOR.field_size;
    let (high, low) = field.split_at(field.len().checked_sub(size)?);
    if high.iter().any(|&b| b != 0) {
        return None;
    }

    let mut repr = Zeroizing::new(FieldBytes::<C>::default());
    repr.copy_from_slice(low);
    Option::<Scalar<C>>::from(Scalar::<C>::from_repr((*repr).clone()))
}

/// A big-endian integer of any length, reduced modulo `n`.
pub fn reduce_bytes<C: NistCurve>(bytes: &[u8]) -> Scalar<C> {
    let radix = Scalar::<C>::from(256u64);
    bytes.iter().fold(Scalar::<C>::ZERO, |acc, &b| {
        acc * radix + Scalar::<C>::from(u64::from(b))
    })
}

/// Convert a [`Point`] into the curve's affine representation, checking that
/// it lies on the curve.
pub fn to_affine<C: NistCurve>(point: &Point) -> Result<AffinePoint<C>> {
    let Some((x, y)) = point.coordinates() else {
        return Ok(ProjectivePoint::<C>::identity().to_affine());
    };

    let mut xb = FieldBytes::<C>::default();
    let mut yb = FieldBytes::<C>::default();
    encode_field(x, &mut xb).map_err(|_| Error::PointNotOnCurve)?;
    encode_field(y, &mut yb).map_err(|_| Error::PointNotOnCurve)?;

    let encoded = EncodedPoint::<C>::from_affine_coordinates(&xb, &yb, false);
    Option::<AffinePoint<C>>::from(AffinePoint::<C>::from_encoded_point(&encoded))
        .ok_or(Error::PointNotOnCurve)
}

/// Convert an affine point of the curve into a [`Point`].
pub fn from_affine<C: NistCurve>(point: &AffinePoint<C>) -> Point {
    match point.to_encoded_point(false).coordinates() {
        Coordinates::Identity => Point::Identity,
        Coordinates::Uncompressed { x, y } => Point::new(decode_field(x), decode_field(y)),
        Coordinates::Compact { .. } | Coordinates::Compressed { .. } => {
            unreachable!("requested uncompressed encoding")
        }
    }
}

/// Does `point` satisfy the curve equation? The point at infinity does.
pub fn is_on_curve<C: NistCurve>(point: &Point) -> bool {
    to_affine::<C>(point).is_ok()
}

/// `scalar·G + Σ kᵢ·Pᵢ`.
pub fn mul<C: NistCurve>(scalar: Option<&BigInt>, terms: &[(&Point, &BigInt)]) -> Result<Point> {
    let mut acc = ProjectivePoint::<C>::identity();

    if let Some(k) = scalar {
        let k = to_scalar::<C>(&reduce::<C>(k))?;
        acc += ProjectivePoint::<C>::generator() * k;
    }

    for (point, k) in terms {
        let point = ProjectivePoint::<C>::from(to_affine::<C>(point)?);
        let k = to_scalar::<C>(&reduce::<C>(k))?;
        acc += point * k;
    }

    Ok(from_affine::<C>(&acc.to_affine()))
}

/// `k·P` for a secret scalar `k`.
pub fn mul_secret<C: NistCurve>(point: &Point, k: &Scalar<C>) -> Result<ProjectivePoint<C>> {
    let point = ProjectivePoint::<C>::from(to_affine::<C>(point)?);
    Ok(point * *k)
}

/// `k⁻¹ mod n`.
pub fn invert<C: NistCurve>(k: &NonZeroScalar<C>) -> NonZeroScalar<C> {
    elliptic_curve::ops::Invert::invert(k)
}

/// Integer `z` of a message digest.
///
/// The digest is first placed into a hash field of the curve's CPACF width
/// (see [`encode_digest`]), then the low `field_size` bytes of that field are
/// reduced modulo `n`. This matches the value the KDSA instruction works
/// with for every digest length.
pub fn digest_to_scalar<C: NistCurve>(digest: &[u8]) -> Result<Scalar<C>> {
    let d = C::DESCRIPTOR;
    let mut field = [0u8; MAX_LEN];
    let field = &mut field[..d.len];
    encode_digest(digest, field);

    let z = decode_field(&field[d.len - d.field_size..]) % order::<C>();
    to_scalar::<C>(&z)
}

/// Uniformly random scalar in `[1, n)`, by rejection sampling.
pub fn random_scalar<C: NistCurve>(rng: &mut impl CryptoRngCore) -> Result<NonZeroScalar<C>> {
    let excess = C::DESCRIPTOR.field_size * 8 - order::<C>().bits() as usize;
    let mut repr = Zeroizing::new(FieldBytes::<C>::default());

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        rng.try_fill_bytes(&mut repr)
            .map_err(|_| Error::RandomNumberGeneration)?;
        repr[0] &= 0xff >> excess;

        if let Some(k) = Option::<NonZeroScalar<C>>::from(NonZeroScalar::<C>::from_repr((*repr).clone())) {
            return Ok(k);
        }
    }

    Err(Error::RandomNumberGeneration)
}

/// `x(k·G) mod n`.
pub fn nonce_r<C: NistCurve>(k: &Scalar<C>) -> Result<Scalar<C>> {
    let point = (ProjectivePoint::<C>::generator() * *k).to_affine();
    x_mod_n::<C>(&point)
}

/// ECDSA signature with private key `d` and nonce `k`.
///
/// Returns [`Error::Arithmetic`] if `r` or `s` comes out as zero; the caller
/// should retry with a fresh nonce.
pub fn sign<C: NistCurve>(digest: &[u8], d: &Scalar<C>, k: &Scalar<C>) -> Result<Signature> {
    if bool::from(k.is_zero()) {
        return Err(Error::InvalidScalar);
    }

    let r = nonce_r::<C>(k)?;
    let kinv = Zeroizing::new(Option::<Scalar<C>>::from(k.invert()).ok_or(Error::Arithmetic)?);
    sign_prepared::<C>(digest, d, &kinv, &r)
}

/// ECDSA signature from a precomputed `k⁻¹` and `r`.
pub fn sign_with_setup<C: NistCurve>(
    digest: &[u8],
    d: &Scalar<C>,
    kinv: &Scalar<C>,
    r: &BigUint,
) -> Result<Signature> {
    let r = to_scalar::<C>(r)?;
    sign_prepared::<C>(digest, d, kinv, &r)
}

fn sign_prepared<C: NistCurve>(
    digest: &[u8],
    d: &Scalar<C>,
    kinv: &Scalar<C>,
    r: &Scalar<C>,
) -> Result<Signature> {
    if bool::from(d.is_zero()) {
        return Err(Error::InvalidScalar);
    }

    let z = digest_to_scalar::<C>(digest)?;
    let s = *kinv * (z + *r * *d);

    if bool::from(r.is_zero()) || bool::from(s.is_zero()) {
        return Err(Error::Arithmetic);
    }

    Ok(Signature::new(from_scalar::<C>(r), from_scalar::<C>(&s)))
}

/// ECDSA verification.
///
/// Returns `Ok(false)` for a signature that does not verify, including one
/// with `r` or `s` outside `[1, n)`, and an error if the public key is not a
/// finite point on the curve.
pub fn verify<C: NistCurve>(digest: &[u8], signature: &Signature, public: &Point) -> Result<bool> {
    if public.is_identity() {
        return Err(Error::PointAtInfinity);
    }
    let q = ProjectivePoint::<C>::from(to_affine::<C>(public)?);

    let (Ok(r), Ok(s)) = (
        to_scalar::<C>(signature.r()),
        to_scalar::<C>(signature.s()),
    ) else {
        return Ok(false);
    };

    if bool::from(r.is_zero()) || bool::from(s.is_zero()) {
        return Ok(false);
    }

    let z = digest_to_scalar::<C>(digest)?;
    let w = Option::<Scalar<C>>::from(s.invert()).ok_or(Error::Arithmetic)?;
    let point = ProjectivePoint::<C>::generator() * (z * w) + q * (r * w);

    if bool::from(point.is_identity()) {
        return Ok(false);
    }

    Ok(x_mod_n::<C>(&point.to_affine())? == r)
}

fn x_mod_n<C: NistCurve>(point: &AffinePoint<C>) -> Result<Scalar<C>> {
    let x = decode_field(&point.x()) % order::<C>();
    to_scalar::<C>(&x)
}

#[cfg(test)]
mod tests {
    use super::*;

    type C = p256::NistP256;

    fn generator() -> Point {
        let d = C::DESCRIPTOR;
        Point::new(decode_field(d.gx), decode_field(d.gy))
    }

    #[test]
    fn reduce_handles_sign() {
        let n = BigInt::from(order::<C>());
        assert_eq!(reduce::<C>(&BigInt::from(5)), BigUint::from(5u8));
        assert_eq!(reduce::<C>(&(&n + 5)), BigUint::from(5u8));
        assert_eq!(reduce::<C>(&-(&n)), BigUint::zero());
        assert_eq!(
            reduce::<C>(&BigInt::from(-1)),
            order::<C>() - BigUint::from(1u8)
        );
    }

    #[test]
    fn order_times_generator_is_identity() {
        let n = BigInt::from(order::<C>());
        assert_eq!(mul::<C>(None, &[(&generator(), &n)]), Ok(Point::Identity));
        assert_eq!(mul::<C>(Some(&n), &[]), Ok(Point::Identity));
    }

    #[test]
    fn scalar_one_is_generator() {
        assert_eq!(mul::<C>(Some(&BigInt::from(1)), &[]), Ok(generator()));
    }

    #[test]
    fn negative_scalar_negates() {
        let p = mul::<C>(Some(&BigInt::from(-3)), &[]).unwrap();
        let q = mul::<C>(Some(&BigInt::from(3)), &[]).unwrap();
        let sum = mul::<C>(None, &[(&p, &BigInt::from(1)), (&q, &BigInt::from(1))]);
        assert_eq!(sum, Ok(Point::Identity));
        assert_eq!(p.x(), q.x());
    }

    #[test]
    fn rejects_off_curve_points() {
        let bad = Point::new(BigUint::from(1u8), BigUint::from(2u8));
        assert!(!is_on_curve::<C>(&bad));
        assert!(is_on_curve::<C>(&Point::Identity));
        assert!(is_on_curve::<C>(&generator()));
        assert_eq!(
            mul::<C>(None, &[(&bad, &BigInt::from(2))]),
            Err(Error::PointNotOnCurve)
        );
    }

    #[test]
    fn oversized_coordinate_is_off_curve() {
        let bad = Point::new(BigUint::from(1u8) << 300, BigUint::from(2u8));
        assert_eq!(to_affine::<C>(&bad), Err(Error::PointNotOnCurve));
    }

    #[test]
    fn to_scalar_range() {
        assert!(to_scalar::<C>(&order::<C>()).is_err());
        assert!(to_scalar::<C>(&(order::<C>() - 1u8)).is_ok());
        assert!(to_scalar::<C>(&BigUint::zero()).is_ok());
    }

    #[test]
    fn digest_longer_than_field_uses_leading_bytes() {
        let digest = [0x11u8; 64];
        assert_eq!(
            digest_to_scalar::<C>(&digest).unwrap(),
            digest_to_scalar::<C>(&digest[..32]).unwrap()
        );
    }

    #[test]
    fn random_scalar_in_range() {
        let mut rng = rand_core::OsRng;
        for _ in 0..16 {
            let k = random_scalar::<p521::NistP521>(&mut rng).unwrap();
            let value = from_scalar::<p521::NistP521>(&k);
            assert!(!value.is_zero());
            assert!(value < order::<p521::NistP521>());
        }
    }

    #[test]
    fn field_scalar_range() {
        let n = C::DESCRIPTOR.order;
        let mut field = [0u8; 40];
        field[8..].copy_from_slice(n);
        assert_eq!(field_scalar::<C>(&field), None);

        field[39] -= 1;
        assert_eq!(
            field_scalar::<C>(&field).map(|k| from_scalar::<C>(&k)),
            Some(order::<C>() - 1u8)
        );

        field[0] = 1;
        assert_eq!(field_scalar::<C>(&field), None);
        assert_eq!(field_scalar::<C>(&[1; 16]), None);
    }

    #[test]
    fn reduce_bytes_matches_integer_reduction() {
        let bytes = [0xa7u8; 80];
        let expected = BigUint::from_bytes_be(&bytes) % order::<C>();
        assert_eq!(from_scalar::<C>(&reduce_bytes::<C>(&bytes)), expected);
        assert_eq!(reduce_bytes::<C>(&[]), Scalar::<C>::ZERO);
        assert_eq!(reduce_bytes::<C>(C::DESCRIPTOR.order), Scalar::<C>::ZERO);
    }

    #[test]
    fn secret_product_matches_public_product() {
        let k = Scalar::<C>::from(0x0bad_cafeu64);
        let p = mul_secret::<C>(&generator(), &k).unwrap().to_affine();
        assert_eq!(
            from_affine::<C>(&p),
            mul::<C>(Some(&BigInt::from(0x0bad_cafeu32)), &[]).unwrap()
        );

        let nz = Option::<NonZeroScalar<C>>::from(NonZeroScalar::new(k)).unwrap();
        assert_eq!(*invert::<C>(&nz) * k, Scalar::<C>::ONE);
    }

    #[test]
    fn sign_then_verify() {
        let d = Scalar::<C>::from(0x1234_5678u64);
        let k = Scalar::<C>::from(0x0bad_cafeu64);
        let q = mul::<C>(Some(&BigInt::from(0x1234_5678u32)), &[]).unwrap();
        let digest = [0x42u8; 32];

        let sig = sign::<C>(&digest, &d, &k).unwrap();
        assert_eq!(verify::<C>(&digest, &sig, &q), Ok(true));
        assert_eq!(verify::<C>(&[0x43u8; 32], &sig, &q), Ok(false));

        let high = Signature::new(order::<C>(), sig.s().clone());
        assert_eq!(verify::<C>(&digest, &high, &q), Ok(false));
        assert_eq!(
            verify::<C>(&digest, &sig, &Point::Identity),
            Err(Error::PointAtInfinity)
        );
    }

    #[test]
    fn zero_s_is_reported() {
        // with d = 1, the digest -r makes z + r·d vanish
        let k = Scalar::<C>::from(2u64);
        let z = -nonce_r::<C>(&k).unwrap();
        assert_eq!(
            sign::<C>(&z.to_repr(), &Scalar::<C>::ONE, &k),
            Err(Error::Arithmetic)
        );
    }
}
