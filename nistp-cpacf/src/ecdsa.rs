//! ECDSA signing and verification.
//!
//! Signing on the CPACF method supports two nonce modes:
//!
//! - internal: the nonce field is filled with `len` bytes from the caller's
//!   RNG and KDSA derives an in-range nonce from them;
//! - deterministic: the caller passes a [`SignSetup`], the nonce `k` is
//!   recovered from its `k⁻¹` and KDSA is told to use it as-is.
//!
//! Verification reports a [`Verification`], which keeps "the signature does
//! not match" apart from "the check could not be performed".

use crate::{
    Error, Result,
    codec::{decode_field, encode_bytes, encode_digest, encode_field},
    cpacf::{Instructions, KDSA_DETERMINISTIC, Outcome},
    curve::NistCurve,
    group::{EcGroup, Method, secret_field},
    key::EcKey,
    param::{ParamBlock, SignField, VerifyField},
    point::Point,
    software,
};
use alloc::vec::Vec;
use core::fmt;
use elliptic_curve::{NonZeroScalar, Scalar, SecretKey};
use num_bigint::BigUint;
use num_traits::Zero;
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, Zeroizing};

/// ECDSA signature `(r, s)`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    /// Signature from its components. No range check is made.
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Self { r, s }
    }

    /// The `r` component.
    pub fn r(&self) -> &BigUint {
        &self.r
    }

    /// The `s` component.
    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// Split into `(r, s)`.
    pub fn split(self) -> (BigUint, BigUint) {
        (self.r, self.s)
    }

    /// Fixed-width `r ‖ s` encoding, each component `field_size` bytes.
    pub fn to_bytes(&self, field_size: usize) -> Result<Vec<u8>> {
        let mut bytes = alloc::vec![0u8; field_size * 2];
        let (r, s) = bytes.split_at_mut(field_size);
        encode_field(&self.r, r)?;
        encode_field(&self.s, s)?;
        Ok(bytes)
    }

    /// Parse a fixed-width `r ‖ s` encoding.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() % 2 != 0 {
            return None;
        }

        let (r, s) = bytes.split_at(bytes.len() / 2);
        Some(Self::new(decode_field(r), decode_field(s)))
    }
}

/// Precomputed nonce material for one signature.
///
/// Produced by [`EcGroup::sign_setup`]; passing it to [`EcGroup::sign`]
/// makes signing deterministic. `k⁻¹` is wiped on drop.
pub struct SignSetup<C: NistCurve> {
    kinv: NonZeroScalar<C>,
    r: BigUint,
}

impl<C: NistCurve> SignSetup<C> {
    /// Setup from `k⁻¹ mod n` and `r = x(k·G) mod n`.
    pub fn new(kinv: NonZeroScalar<C>, r: BigUint) -> Self {
        Self { kinv, r }
    }

    /// `k⁻¹ mod n`.
    pub fn kinv(&self) -> &NonZeroScalar<C> {
        &self.kinv
    }

    /// `x(k·G) mod n`.
    pub fn r(&self) -> &BigUint {
        &self.r
    }
}

impl<C: NistCurve> Clone for SignSetup<C> {
    fn clone(&self) -> Self {
        Self::new(self.kinv, self.r.clone())
    }
}

impl<C: NistCurve> Drop for SignSetup<C> {
    fn drop(&mut self) {
        self.kinv.zeroize();
    }
}

impl<C: NistCurve> fmt::Debug for SignSetup<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignSetup")
            .field("r", &self.r)
            .finish_non_exhaustive()
    }
}

/// Result of a signature verification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verification {
    /// The signature matches.
    Valid,
    /// The signature does not match.
    Invalid,
    /// Verification could not be carried out.
    Error(Error),
}

impl Verification {
    /// Is this [`Verification::Valid`]?
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// `Ok(true)` for a valid signature, `Ok(false)` for an invalid one.
    pub fn into_result(self) -> Result<bool> {
        match self {
            Self::Valid => Ok(true),
            Self::Invalid => Ok(false),
            Self::Error(err) => Err(err),
        }
    }
}

impl From<Result<bool>> for Verification {
    fn from(result: Result<bool>) -> Self {
        match result {
            Ok(true) => Self::Valid,
            Ok(false) => Self::Invalid,
            Err(err) => Self::Error(err),
        }
    }
}

impl<C: NistCurve, I: Instructions> EcGroup<C, I> {
    /// Draw a nonce `k` and precompute `k⁻¹` and `r` for a later signature.
    pub fn sign_setup(&self, rng: &mut impl CryptoRngCore, key: &EcKey<C>) -> Result<SignSetup<C>> {
        if key.secret().is_none() {
            return Err(Error::MissingParameters);
        }

        let n = self.order();
        let mut param = ParamBlock::new();
        loop {
            let k = Zeroizing::new(software::random_scalar::<C>(rng)?);
            let point = self.mul_secret(&mut param, &self.generator(), &k)?;
            let r = point.x().ok_or(Error::PointAtInfinity)? % &n;

            if r.is_zero() {
                continue;
            }

            return Ok(SignSetup::new(software::invert::<C>(&k), r));
        }
    }

    /// Sign `digest` with the private key of `key`.
    ///
    /// Without `setup` a fresh nonce is drawn from `rng`; with it the
    /// signature is fully determined by its inputs.
    ///
    /// The digest is placed right-aligned into a field of the curve's CPACF
    /// width (32, 48 or 80 bytes), keeping its leading bytes if it is wider,
    /// and `z` is the last `field_size` bytes of that field reduced mod `n`.
    /// Up to the field width this is standard ECDSA truncation. A P-521
    /// digest longer than 66 bytes differs from bits2int: `z` is taken from
    /// bytes `[14, 80)` of the digest, not from its leading 521 bits.
    pub fn sign(
        &self,
        rng: &mut impl CryptoRngCore,
        digest: &[u8],
        key: &EcKey<C>,
        setup: Option<&SignSetup<C>>,
    ) -> Result<Signature> {
        let mut param = ParamBlock::new();
        self.sign_in(&mut param, rng, digest, key, setup)
    }

    /// Verify `signature` over `digest` against the public key of `key`.
    ///
    /// `z` is derived from `digest` as described for [`EcGroup::sign`], so
    /// a P-521 digest longer than 66 bytes uses its bytes `[14, 80)`.
    pub fn verify(&self, digest: &[u8], signature: &Signature, key: &EcKey<C>) -> Verification {
        let mut param = ParamBlock::new();
        self.verify_in(&mut param, digest, signature, key)
    }

    pub(crate) fn sign_in(
        &self,
        param: &mut ParamBlock,
        rng: &mut impl CryptoRngCore,
        digest: &[u8],
        key: &EcKey<C>,
        setup: Option<&SignSetup<C>>,
    ) -> Result<Signature> {
        let secret = key.secret().ok_or(Error::MissingParameters)?;
        if !self.signing {
            return Err(Error::SigningNotSupported);
        }

        match (self.method, setup) {
            (Method::Cpacf, _) => self.kdsa_sign(param, rng, digest, secret, setup),
            (Method::Software, Some(setup)) => {
                let d = Zeroizing::new(*secret.to_nonzero_scalar());
                software::sign_with_setup::<C>(digest, &d, &setup.kinv, &setup.r)
            }
            (Method::Software, None) => {
                let d = Zeroizing::new(*secret.to_nonzero_scalar());
                loop {
                    let k = Zeroizing::new(software::random_scalar::<C>(rng)?);
                    match software::sign::<C>(digest, &d, &k) {
                        Err(Error::Arithmetic) => {
                            tracing::trace!(curve = C::DESCRIPTOR.name, "zero r or s, new nonce");
                        }
                        result => return result,
                    }
                }
            }
        }
    }

    pub(crate) fn verify_in(
        &self,
        param: &mut ParamBlock,
        digest: &[u8],
        signature: &Signature,
        key: &EcKey<C>,
    ) -> Verification {
        let Some(public) = key.public() else {
            return Verification::Error(Error::MissingParameters);
        };

        if !self.signing {
            return Verification::Error(Error::SigningNotSupported);
        }

        let result = match self.method {
            Method::Cpacf => self.kdsa_verify(param, digest, signature, public),
            Method::Software => software::verify::<C>(digest, signature, public),
        };
        result.into()
    }

    fn kdsa_sign(
        &self,
        param: &mut ParamBlock,
        rng: &mut impl CryptoRngCore,
        digest: &[u8],
        secret: &SecretKey<C>,
        setup: Option<&SignSetup<C>>,
    ) -> Result<Signature> {
        let desc = C::DESCRIPTOR;
        let mut function = desc.sign;

        let mut param = param.scrub();
        let mut fields = param.fields::<SignField>(desc.len);
        encode_digest(digest, fields.get_mut(SignField::Hash));
        let d = Zeroizing::new(secret.to_bytes());
        encode_bytes(&d, fields.get_mut(SignField::PrivateKey))?;

        match setup {
            None => rng
                .try_fill_bytes(fields.get_mut(SignField::Nonce))
                .map_err(|_| Error::RandomNumberGeneration)?,
            Some(setup) => {
                let k: Zeroizing<Scalar<C>> = Zeroizing::new(*software::invert(&setup.kinv));
                secret_field::<C>(&k, fields.get_mut(SignField::Nonce))?;
                function |= KDSA_DETERMINISTIC;
            }
        }

        match self.instructions.kdsa(function, fields.block_mut(), &[]) {
            Outcome::Success => Ok(Signature::new(
                decode_field(fields.get(SignField::R)),
                decode_field(fields.get(SignField::S)),
            )),
            outcome => {
                tracing::debug!(curve = desc.name, ?outcome, "KDSA sign failed");
                Err(Error::Cpacf)
            }
        }
    }

    fn kdsa_verify(
        &self,
        param: &mut ParamBlock,
        digest: &[u8],
        signature: &Signature,
        public: &Point,
    ) -> Result<bool> {
        let desc = C::DESCRIPTOR;
        let (x, y) = public.coordinates().ok_or(Error::PointAtInfinity)?;

        let mut param = param.scrub();
        let mut fields = param.fields::<VerifyField>(desc.len);
        encode_field(&signature.r, fields.get_mut(VerifyField::R))?;
        encode_field(&signature.s, fields.get_mut(VerifyField::S))?;
        encode_digest(digest, fields.get_mut(VerifyField::Hash));
        encode_field(x, fields.get_mut(VerifyField::PublicX))?;
        encode_field(y, fields.get_mut(VerifyField::PublicY))?;

        match self.instructions.kdsa(desc.verify, fields.block_mut(), &[]) {
            Outcome::Success => Ok(true),
            Outcome::VerificationFailed => Ok(false),
            Outcome::Error => {
                tracing::debug!(curve = desc.name, "KDSA verify failed");
                Err(Error::Cpacf)
            }
        }
    }
}
