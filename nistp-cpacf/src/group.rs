//! Curve groups and the scalar multiplication dispatcher.

use crate::{
    Error, Point, Result,
    capability::Capabilities,
    codec::{decode_field, encode_bytes, encode_field, encode_scalar},
    cpacf::{Cpacf, Instructions, Outcome},
    curve::{CurveDescriptor, NistCurve},
    key::EcKey,
    param::{MulBlock, MulField, ParamBlock},
    software,
};
use alloc::vec::Vec;
use core::marker::PhantomData;
use elliptic_curve::{
    Scalar,
    ff::{Field, PrimeField},
    group::{Curve as _, Group},
    point::AffineCoordinates,
};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use zeroize::Zeroizing;

/// Implementation backing a group's operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    /// PCC and KDSA.
    Cpacf,
    /// RustCrypto curve arithmetic.
    Software,
}

/// Group configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Installed CPACF functions.
    pub capabilities: Capabilities,
    /// Whether ECDSA signing and verification are allowed.
    pub signing: bool,
}

impl Config {
    /// Configuration for the running CPU.
    pub fn detect() -> Self {
        Self::new(Capabilities::detect())
    }

    /// Configuration with an explicit capability set.
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            signing: true,
        }
    }

    /// Configuration which never uses CPACF.
    pub fn software() -> Self {
        Self::new(Capabilities::none())
    }

    /// Enable or disable ECDSA.
    pub fn with_signing(mut self, signing: bool) -> Self {
        self.signing = signing;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::detect()
    }
}

/// Elliptic curve group `C`, dispatching to CPACF through `I` when the curve
/// is fully supported and to software otherwise.
///
/// The method is chosen once, at construction: either all three operations
/// (multiply, sign, verify) use CPACF or none does.
#[derive(Clone, Debug)]
pub struct EcGroup<C: NistCurve, I = Cpacf> {
    pub(crate) instructions: I,
    pub(crate) method: Method,
    pub(crate) signing: bool,
    curve: PhantomData<C>,
}

impl<C: NistCurve> EcGroup<C> {
    /// Group using the native CPACF instructions.
    pub fn new(config: Config) -> Self {
        Self::with_instructions(config, Cpacf)
    }
}

impl<C: NistCurve> Default for EcGroup<C> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<C: NistCurve, I: Instructions> EcGroup<C, I> {
    /// Group executing CPACF functions through `instructions`.
    pub fn with_instructions(config: Config, instructions: I) -> Self {
        let method = if config.capabilities.supports_curve(&C::DESCRIPTOR) {
            Method::Cpacf
        } else {
            Method::Software
        };

        tracing::debug!(curve = C::DESCRIPTOR.name, ?method, "selected method");

        Self {
            instructions,
            method,
            signing: config.signing,
            curve: PhantomData,
        }
    }

    /// Selected method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Is ECDSA enabled for this group?
    pub fn supports_signing(&self) -> bool {
        self.signing
    }

    /// Instruction executor.
    pub fn instructions(&self) -> &I {
        &self.instructions
    }

    /// Curve constants.
    pub fn descriptor(&self) -> CurveDescriptor {
        C::DESCRIPTOR
    }

    /// Group order `n`.
    pub fn order(&self) -> BigUint {
        software::order::<C>()
    }

    /// Base point `G`.
    pub fn generator(&self) -> Point {
        Point::new(decode_field(C::DESCRIPTOR.gx), decode_field(C::DESCRIPTOR.gy))
    }

    /// Does `point` lie on the curve? The point at infinity does.
    pub fn is_on_curve(&self, point: &Point) -> bool {
        software::is_on_curve::<C>(point)
    }

    /// `scalar·G + Σ kᵢ·Pᵢ`.
    ///
    /// A single non-negative product (`scalar` alone, or one term) runs on
    /// PCC when CPACF is selected. A zero scalar or the point at infinity
    /// short-circuits to the point at infinity. Anything else goes to
    /// software. Once PCC is chosen its failures are returned, not retried
    /// in software.
    pub fn mul(&self, scalar: Option<&BigInt>, terms: &[(&Point, &BigInt)]) -> Result<Point> {
        let mut param = ParamBlock::new();
        self.mul_in(&mut param, scalar, terms)
    }

    /// `k·G`.
    pub fn mul_generator(&self, k: &BigInt) -> Result<Point> {
        self.mul(Some(k), &[])
    }

    /// `k·P`.
    pub fn mul_point(&self, point: &Point, k: &BigInt) -> Result<Point> {
        self.mul(None, &[(point, k)])
    }

    /// ECDH: the x-coordinate of `d·peer` as `field_size` big-endian bytes.
    ///
    /// The shared point never leaves the parameter block or the curve
    /// arithmetic as an integer.
    pub fn compute_shared_secret(
        &self,
        key: &EcKey<C>,
        peer: &Point,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let secret = key.secret().ok_or(Error::MissingParameters)?;
        if !self.is_on_curve(peer) {
            return Err(Error::PointNotOnCurve);
        }
        if peer.is_identity() {
            return Err(Error::PointAtInfinity);
        }

        let d = Zeroizing::new(*secret.to_nonzero_scalar());
        let mut param = ParamBlock::new();

        if self.method == Method::Cpacf {
            let desc = C::DESCRIPTOR;
            return self.pcc_multiply(
                &mut param,
                peer,
                |field| secret_field::<C>(&d, field),
                |fields| {
                    let x = fields.get(MulField::ResultX);
                    Zeroizing::new(x[desc.len - desc.field_size..].to_vec())
                },
            );
        }

        let shared = software::mul_secret::<C>(peer, &d)?;
        if bool::from(shared.is_identity()) {
            return Err(Error::PointAtInfinity);
        }

        let x = Zeroizing::new(shared.to_affine().x());
        Ok(Zeroizing::new(x.to_vec()))
    }

    /// `k·point` for a secret `k`, which is never converted to an integer.
    pub(crate) fn mul_secret(
        &self,
        param: &mut ParamBlock,
        point: &Point,
        k: &Scalar<C>,
    ) -> Result<Point> {
        if point.is_identity() || bool::from(k.is_zero()) {
            return Ok(Point::Identity);
        }

        if self.method == Method::Cpacf {
            return self.pcc_multiply(
                param,
                point,
                |field| secret_field::<C>(k, field),
                read_point,
            );
        }

        let product = software::mul_secret::<C>(point, k)?;
        Ok(software::from_affine::<C>(&product.to_affine()))
    }

    pub(crate) fn mul_in(
        &self,
        param: &mut ParamBlock,
        scalar: Option<&BigInt>,
        terms: &[(&Point, &BigInt)],
    ) -> Result<Point> {
        if self.method == Method::Cpacf {
            let generator;
            let single = match (scalar, terms) {
                (Some(k), []) => {
                    generator = self.generator();
                    Some((&generator, k))
                }
                (None, [(point, k)]) => Some((*point, *k)),
                _ => None,
            };

            if let Some((point, k)) = single {
                if k.sign() != Sign::Minus {
                    if point.is_identity() || k.is_zero() {
                        return Ok(Point::Identity);
                    }

                    return self.pcc_multiply(
                        param,
                        point,
                        |field| encode_scalar(k, field),
                        read_point,
                    );
                }
            }
        }

        tracing::trace!(curve = C::DESCRIPTOR.name, terms = terms.len(), "software multiply");
        software::mul::<C>(scalar, terms)
    }

    /// Run PCC on `point`, with the scalar field filled in by `scalar` and
    /// the result read back by `result` before the block is wiped.
    fn pcc_multiply<T>(
        &self,
        param: &mut ParamBlock,
        point: &Point,
        scalar: impl FnOnce(&mut [u8]) -> Result<()>,
        result: impl FnOnce(&MulBlock<'_>) -> T,
    ) -> Result<T> {
        let desc = C::DESCRIPTOR;
        let (x, y) = point.coordinates().ok_or(Error::PointAtInfinity)?;

        let mut param = param.scrub();
        let mut fields = param.fields::<MulField>(desc.len);
        encode_field(x, fields.get_mut(MulField::SourceX))?;
        encode_field(y, fields.get_mut(MulField::SourceY))?;
        scalar(fields.get_mut(MulField::Scalar))?;

        match self.instructions.pcc(desc.multiply, fields.block_mut()) {
            Outcome::Success => Ok(result(&fields)),
            outcome => {
                tracing::debug!(curve = desc.name, ?outcome, "PCC scalar multiply failed");
                Err(Error::Cpacf)
            }
        }
    }
}

fn read_point(fields: &MulBlock<'_>) -> Point {
    Point::new(
        decode_field(fields.get(MulField::ResultX)),
        decode_field(fields.get(MulField::ResultY)),
    )
}

/// Write a secret scalar into a PCC or KDSA field.
pub(crate) fn secret_field<C: NistCurve>(k: &Scalar<C>, field: &mut [u8]) -> Result<()> {
    let repr = Zeroizing::new(k.to_repr());
    encode_bytes(&repr, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::Emulator;
    use p256::NistP256;
    use p384::NistP384;

    fn accelerated<C: NistCurve>(emulator: &Emulator) -> EcGroup<C, &Emulator> {
        EcGroup::with_instructions(Config::new(Capabilities::all()), emulator)
    }

    fn fallback<C: NistCurve>() -> EcGroup<C, Cpacf> {
        EcGroup::new(Config::software())
    }

    #[test]
    fn method_selection() {
        let emulator = Emulator::new();
        assert_eq!(accelerated::<NistP256>(&emulator).method(), Method::Cpacf);
        assert_eq!(fallback::<NistP256>().method(), Method::Software);
    }

    #[test]
    fn zero_scalar_skips_hardware() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        let zero = BigInt::zero();

        assert_eq!(group.mul_generator(&zero), Ok(Point::Identity));
        assert_eq!(group.mul_point(&group.generator(), &zero), Ok(Point::Identity));
        assert_eq!(emulator.pcc_calls(), 0);
    }

    #[test]
    fn identity_skips_hardware() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP384>(&emulator);

        assert_eq!(
            group.mul_point(&Point::Identity, &BigInt::from(12345)),
            Ok(Point::Identity)
        );
        assert_eq!(emulator.pcc_calls(), 0);
    }

    #[test]
    fn single_product_uses_pcc() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        let k = BigInt::from(0xdead_beefu32);

        let p = group.mul_generator(&k).unwrap();
        assert_eq!(emulator.pcc_calls(), 1);
        assert_eq!(emulator.last_function(), Some(NistP256::DESCRIPTOR.multiply));
        assert_eq!(p, fallback::<NistP256>().mul_generator(&k).unwrap());

        let q = group.mul_point(&p, &BigInt::from(3)).unwrap();
        assert_eq!(emulator.pcc_calls(), 2);
        assert_eq!(q, group.mul_generator(&(k * 3)).unwrap());
    }

    #[test]
    fn negative_scalar_falls_back() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        let minus_one = BigInt::from(-1);

        let p = group.mul_generator(&minus_one).unwrap();
        assert_eq!(emulator.pcc_calls(), 0);

        let g = group.generator();
        assert_eq!(p.x(), g.x());
        assert_eq!(
            p.y().cloned(),
            g.y().map(|y| decode_field(&hex_literal::hex!(
                "ffffffff00000001000000000000000000000000ffffffffffffffffffffffff"
            )) - y)
        );
    }

    #[test]
    fn multi_scalar_falls_back() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        let g = group.generator();

        let two = BigInt::from(2);
        let three = BigInt::from(3);
        let sum = group.mul(Some(&two), &[(&g, &three)]).unwrap();
        let pair = group.mul(None, &[(&g, &two), (&g, &three)]).unwrap();

        assert_eq!(emulator.pcc_calls(), 0);
        assert_eq!(sum, pair);
        assert_eq!(sum, group.mul_generator(&BigInt::from(5)).unwrap());
        assert_eq!(emulator.pcc_calls(), 1);
    }

    #[test]
    fn oversized_scalar_is_hard_error() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        let huge = BigInt::from(1) << 256;

        assert_eq!(
            group.mul_generator(&huge),
            Err(Error::FieldOverflow { len: 32 })
        );
        assert_eq!(emulator.pcc_calls(), 0);

        // the software method reduces instead
        assert!(fallback::<NistP256>().mul_generator(&huge).is_ok());
    }

    #[test]
    fn pcc_failure_is_not_retried() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        emulator.fail_pcc();

        assert_eq!(group.mul_generator(&BigInt::from(7)), Err(Error::Cpacf));
        assert_eq!(emulator.pcc_calls(), 1);
    }

    #[test]
    fn block_wiped_after_success_and_failure() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        let k = BigInt::from(0x0123_4567u32);

        let mut param = ParamBlock::new();
        param.as_bytes_mut().fill(0xa5);
        group.mul_in(&mut param, Some(&k), &[]).unwrap();
        assert!(param.is_zeroed());

        emulator.fail_pcc();
        param.as_bytes_mut().fill(0xa5);
        assert!(group.mul_in(&mut param, Some(&k), &[]).is_err());
        assert!(param.is_zeroed());

        param.as_bytes_mut().fill(0xa5);
        let bad = Point::new(BigUint::from(1u8) << 300, BigUint::from(1u8));
        assert_eq!(
            group.mul_in(&mut param, None, &[(&bad, &k)]),
            Err(Error::FieldOverflow { len: 32 })
        );
        assert!(param.is_zeroed());
    }

    #[test]
    fn secret_multiply_uses_pcc_and_wipes() {
        let emulator = Emulator::new();
        let group = accelerated::<NistP256>(&emulator);
        let k = Scalar::<NistP256>::from(0x0123_4567u64);

        let mut param = ParamBlock::new();
        param.as_bytes_mut().fill(0xa5);
        let p = group.mul_secret(&mut param, &group.generator(), &k).unwrap();
        assert!(param.is_zeroed());
        assert_eq!(emulator.pcc_calls(), 1);
        assert_eq!(
            p,
            fallback::<NistP256>()
                .mul_generator(&BigInt::from(0x0123_4567u32))
                .unwrap()
        );

        let zero = Scalar::<NistP256>::ZERO;
        assert_eq!(
            group.mul_secret(&mut param, &group.generator(), &zero),
            Ok(Point::Identity)
        );
        assert_eq!(emulator.pcc_calls(), 1);
    }

    #[test]
    fn shared_secret_requires_private_key() {
        let group = fallback::<NistP256>();
        let key = EcKey::<NistP256>::from_public(group.generator());
        assert_eq!(
            group.compute_shared_secret(&key, &group.generator()),
            Err(Error::MissingParameters)
        );
    }
}
