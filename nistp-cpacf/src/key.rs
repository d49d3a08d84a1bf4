//! EC key pairs.

use crate::{
    Error, Point, Result,
    codec::encode_field,
    cpacf::Instructions,
    curve::NistCurve,
    group::EcGroup,
    param::ParamBlock,
    software,
};
use core::{fmt, marker::PhantomData};
use elliptic_curve::{FieldBytes, SecretKey};
use num_bigint::{BigInt, BigUint};
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

/// Private scalar `d` and/or public point `Q = d·G` on curve `C`.
///
/// Either half may be absent: a key with only `Q` can verify but not sign.
/// The private scalar is kept in a [`SecretKey`], which is wiped on drop.
pub struct EcKey<C: NistCurve> {
    secret: Option<SecretKey<C>>,
    public: Option<Point>,
    curve: PhantomData<C>,
}

impl<C: NistCurve> EcKey<C> {
    /// Key with neither half set.
    pub fn new() -> Self {
        Self {
            secret: None,
            public: None,
            curve: PhantomData,
        }
    }

    /// Generate a key pair: `d` uniform in `[1, n)`, `Q = d·G`.
    pub fn generate<I: Instructions>(
        group: &EcGroup<C, I>,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        let d = software::random_scalar::<C>(rng)?;
        Self::from_secret_key(group, SecretKey::from(d))
    }

    /// Key pair from the private scalar `d`, which must lie in `[1, n)`.
    pub fn from_secret<I: Instructions>(group: &EcGroup<C, I>, d: &BigUint) -> Result<Self> {
        let mut bytes = Zeroizing::new(FieldBytes::<C>::default());
        encode_field(d, &mut bytes).map_err(|_| Error::InvalidScalar)?;

        let secret = SecretKey::from_bytes(&bytes).map_err(|_| Error::InvalidScalar)?;
        Self::from_secret_key(group, secret)
    }

    /// Key pair from a private key, deriving `Q`.
    pub fn from_secret_key<I: Instructions>(
        group: &EcGroup<C, I>,
        secret: SecretKey<C>,
    ) -> Result<Self> {
        let public = derive_public(group, &secret)?;
        Ok(Self {
            secret: Some(secret),
            public: Some(public),
            curve: PhantomData,
        })
    }

    /// Verification-only key.
    pub fn from_public(public: Point) -> Self {
        let mut key = Self::new();
        key.set_public(public);
        key
    }

    /// Set the private key. `Q` is not updated.
    pub fn set_secret(&mut self, secret: SecretKey<C>) {
        self.secret = Some(secret);
    }

    /// Set the public point.
    pub fn set_public(&mut self, public: Point) {
        self.public = Some(public);
    }

    /// Private key, if present.
    pub fn secret(&self) -> Option<&SecretKey<C>> {
        self.secret.as_ref()
    }

    /// Public point, if present.
    pub fn public(&self) -> Option<&Point> {
        self.public.as_ref()
    }

    /// Validate the key against `group`.
    ///
    /// `Q` must be a finite point on the curve with `n·Q = O`. If `d` is
    /// present it must satisfy `d·G = Q`; its range is enforced by
    /// [`SecretKey`].
    pub fn check<I: Instructions>(&self, group: &EcGroup<C, I>) -> Result<()> {
        let public = self.public.as_ref().ok_or(Error::MissingParameters)?;

        if public.is_identity() {
            return Err(Error::PointAtInfinity);
        }

        if !group.is_on_curve(public) {
            return Err(Error::PointNotOnCurve);
        }

        // n is not a valid PCC scalar, so this product always runs in software
        let n = BigInt::from(group.order());
        if !software::mul::<C>(None, &[(public, &n)])?.is_identity() {
            return Err(Error::PointNotOnCurve);
        }

        if let Some(secret) = &self.secret {
            if &derive_public(group, secret)? != public {
                return Err(Error::InvalidScalar);
            }
        }

        Ok(())
    }
}

/// `d·G`, with `d` kept out of integer form.
fn derive_public<C: NistCurve, I: Instructions>(
    group: &EcGroup<C, I>,
    secret: &SecretKey<C>,
) -> Result<Point> {
    let d = Zeroizing::new(*secret.to_nonzero_scalar());
    let mut param = ParamBlock::new();
    group.mul_secret(&mut param, &group.generator(), &d)
}

impl<C: NistCurve> Default for EcKey<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: NistCurve> Clone for EcKey<C> {
    fn clone(&self) -> Self {
        Self {
            secret: self.secret.clone(),
            public: self.public.clone(),
            curve: PhantomData,
        }
    }
}

impl<C: NistCurve> fmt::Debug for EcKey<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKey")
            .field("curve", &C::DESCRIPTOR.name)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
