//! Software emulation of the CPACF elliptic curve functions.
//!
//! [`Emulator`] implements [`Instructions`] on top of the [`software`]
//! module, reading and writing the same parameter block layouts the hardware
//! uses. It lets the CPACF method of [`EcGroup`](crate::EcGroup) run on any
//! target, and records enough about each call for tests to check how the
//! dispatcher drove it.

use crate::{
    Point,
    capability::Capabilities,
    codec::{decode_field, encode_field},
    cpacf::{
        Family, Instructions, KDSA_DETERMINISTIC, KDSA_ECDSA_SIGN_P256, KDSA_ECDSA_SIGN_P384,
        KDSA_ECDSA_SIGN_P521, KDSA_ECDSA_VERIFY_P256, KDSA_ECDSA_VERIFY_P384,
        KDSA_ECDSA_VERIFY_P521, Outcome, PCC_SCALAR_MULTIPLY_P256, PCC_SCALAR_MULTIPLY_P384,
        PCC_SCALAR_MULTIPLY_P521,
    },
    curve::NistCurve,
    ecdsa::Signature,
    param::{Layout, MulField, ParamBlock, SignField, VerifyField},
    software,
};
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use elliptic_curve::{Scalar, ff::Field, group::Curve as _};
use p256::NistP256;
use p384::NistP384;
use p521::NistP521;
use zeroize::Zeroizing;

const NO_FUNCTION: u32 = u32::MAX;

/// CPACF emulator.
#[derive(Debug)]
pub struct Emulator {
    capabilities: Capabilities,
    pcc_calls: AtomicUsize,
    kdsa_calls: AtomicUsize,
    last_function: AtomicU32,
    fail_pcc: AtomicBool,
    fail_kdsa: AtomicBool,
}

impl Emulator {
    /// Emulator with every function installed.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all())
    }

    /// Emulator reporting `capabilities` to queries.
    ///
    /// Functions missing from `capabilities` fail with [`Outcome::Error`].
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            pcc_calls: AtomicUsize::new(0),
            kdsa_calls: AtomicUsize::new(0),
            last_function: AtomicU32::new(NO_FUNCTION),
            fail_pcc: AtomicBool::new(false),
            fail_kdsa: AtomicBool::new(false),
        }
    }

    /// Number of PCC calls so far.
    pub fn pcc_calls(&self) -> usize {
        self.pcc_calls.load(Ordering::Relaxed)
    }

    /// Number of KDSA calls so far.
    pub fn kdsa_calls(&self) -> usize {
        self.kdsa_calls.load(Ordering::Relaxed)
    }

    /// Function code of the most recent PCC or KDSA call, modifier bits
    /// included.
    pub fn last_function(&self) -> Option<u32> {
        match self.last_function.load(Ordering::Relaxed) {
            NO_FUNCTION => None,
            function => Some(function),
        }
    }

    /// Make the next PCC call fail.
    pub fn fail_pcc(&self) {
        self.fail_pcc.store(true, Ordering::Relaxed);
    }

    /// Make the next KDSA call fail.
    pub fn fail_kdsa(&self) {
        self.fail_kdsa.store(true, Ordering::Relaxed);
    }

    fn record(&self, counter: &AtomicUsize, function: u32) {
        counter.fetch_add(1, Ordering::Relaxed);
        self.last_function.store(function, Ordering::Relaxed);
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Instructions for Emulator {
    fn pcc(&self, function: u32, param: &mut ParamBlock) -> Outcome {
        self.record(&self.pcc_calls, function);

        if self.fail_pcc.swap(false, Ordering::Relaxed)
            || !self.capabilities.supports(Family::Pcc, function)
        {
            return Outcome::Error;
        }

        match function {
            PCC_SCALAR_MULTIPLY_P256 => scalar_multiply::<NistP256>(param),
            PCC_SCALAR_MULTIPLY_P384 => scalar_multiply::<NistP384>(param),
            PCC_SCALAR_MULTIPLY_P521 => scalar_multiply::<NistP521>(param),
            _ => Outcome::Error,
        }
    }

    fn kdsa(&self, function: u32, param: &mut ParamBlock, _src: &[u8]) -> Outcome {
        self.record(&self.kdsa_calls, function);

        let deterministic = function & KDSA_DETERMINISTIC != 0;
        let base = function & !KDSA_DETERMINISTIC;

        if self.fail_kdsa.swap(false, Ordering::Relaxed)
            || !self.capabilities.supports(Family::Kdsa, base)
        {
            return Outcome::Error;
        }

        match base {
            KDSA_ECDSA_SIGN_P256 => ecdsa_sign::<NistP256>(param, deterministic),
            KDSA_ECDSA_SIGN_P384 => ecdsa_sign::<NistP384>(param, deterministic),
            KDSA_ECDSA_SIGN_P521 => ecdsa_sign::<NistP521>(param, deterministic),
            KDSA_ECDSA_VERIFY_P256 if !deterministic => ecdsa_verify::<NistP256>(param),
            KDSA_ECDSA_VERIFY_P384 if !deterministic => ecdsa_verify::<NistP384>(param),
            KDSA_ECDSA_VERIFY_P521 if !deterministic => ecdsa_verify::<NistP521>(param),
            _ => Outcome::Error,
        }
    }

    fn query(&self, family: Family) -> [u64; 2] {
        match family {
            Family::Pcc => self.capabilities.pcc,
            Family::Kdsa => self.capabilities.kdsa,
        }
    }
}

/// Does the block hold anything beyond the five fields of the layout?
fn dirty_tail<L: Layout>(param: &mut ParamBlock, len: usize) -> bool {
    param.fields::<L>(len).tail().iter().any(|&b| b != 0)
}

fn scalar_multiply<C: NistCurve>(param: &mut ParamBlock) -> Outcome {
    let len = C::DESCRIPTOR.len;
    if dirty_tail::<MulField>(param, len) {
        return Outcome::Error;
    }

    let mut fields = param.fields::<MulField>(len);
    let source = Point::new(
        decode_field(fields.get(MulField::SourceX)),
        decode_field(fields.get(MulField::SourceY)),
    );
    let scalar = Zeroizing::new(software::reduce_bytes::<C>(fields.get(MulField::Scalar)));

    let Ok(product) = software::mul_secret::<C>(&source, &scalar) else {
        return Outcome::Error;
    };
    let Point::Affine { x, y } = software::from_affine::<C>(&product.to_affine()) else {
        return Outcome::Error;
    };

    if encode_field(&x, fields.get_mut(MulField::ResultX)).is_err()
        || encode_field(&y, fields.get_mut(MulField::ResultY)).is_err()
    {
        return Outcome::Error;
    }

    Outcome::Success
}

fn ecdsa_sign<C: NistCurve>(param: &mut ParamBlock, deterministic: bool) -> Outcome {
    let len = C::DESCRIPTOR.len;
    if dirty_tail::<SignField>(param, len) {
        return Outcome::Error;
    }

    let mut fields = param.fields::<SignField>(len);

    let Some(d) = nonzero_field::<C>(fields.get(SignField::PrivateKey)) else {
        return Outcome::Error;
    };

    let nonce = fields.get(SignField::Nonce);
    let k = if deterministic {
        let Some(k) = nonzero_field::<C>(nonce) else {
            return Outcome::Error;
        };
        k
    } else {
        Zeroizing::new(software::reduce_bytes::<C>(nonce))
    };

    if bool::from(k.is_zero()) {
        return Outcome::Error;
    }

    let Ok(signature) = software::sign::<C>(fields.get(SignField::Hash), &d, &k) else {
        return Outcome::Error;
    };

    if encode_field(signature.r(), fields.get_mut(SignField::R)).is_err()
        || encode_field(signature.s(), fields.get_mut(SignField::S)).is_err()
    {
        return Outcome::Error;
    }

    Outcome::Success
}

/// Scalar held in a field, which must lie in `[1, n)`.
fn nonzero_field<C: NistCurve>(field: &[u8]) -> Option<Zeroizing<Scalar<C>>> {
    let k = Zeroizing::new(software::field_scalar::<C>(field)?);
    (!bool::from(k.is_zero())).then_some(k)
}

fn ecdsa_verify<C: NistCurve>(param: &mut ParamBlock) -> Outcome {
    let len = C::DESCRIPTOR.len;
    if dirty_tail::<VerifyField>(param, len) {
        return Outcome::Error;
    }

    let fields = param.fields::<VerifyField>(len);
    let signature = Signature::new(
        decode_field(fields.get(VerifyField::R)),
        decode_field(fields.get(VerifyField::S)),
    );
    let public = Point::new(
        decode_field(fields.get(VerifyField::PublicX)),
        decode_field(fields.get(VerifyField::PublicY)),
    );

    match software::verify::<C>(fields.get(VerifyField::Hash), &signature, &public) {
        Ok(true) => Outcome::Success,
        Ok(false) => Outcome::VerificationFailed,
        Err(_) => Outcome::Error,
    }
}

/// Integer stored in a field, for tests inspecting a block.
#[cfg(test)]
pub(crate) fn field_value<L: Layout>(
    param: &mut ParamBlock,
    len: usize,
    field: L,
) -> num_bigint::BigUint {
    decode_field(param.fields::<L>(len).get(field))
}
