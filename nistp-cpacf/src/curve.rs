//! Curve descriptors.

use crate::cpacf::{
    KDSA_ECDSA_SIGN_P256, KDSA_ECDSA_SIGN_P384, KDSA_ECDSA_SIGN_P521, KDSA_ECDSA_VERIFY_P256,
    KDSA_ECDSA_VERIFY_P384, KDSA_ECDSA_VERIFY_P521, PCC_SCALAR_MULTIPLY_P256,
    PCC_SCALAR_MULTIPLY_P384, PCC_SCALAR_MULTIPLY_P521,
};
use elliptic_curve::{
    Curve, CurveArithmetic,
    sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint},
};
use hex_literal::hex;

/// Widest CPACF field of any supported curve.
pub const MAX_LEN: usize = 80;

/// Per-curve constants: parameter block geometry, group order, generator and
/// CPACF function codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CurveDescriptor {
    /// Curve name.
    pub name: &'static str,

    /// Width of a CPACF parameter block field in bytes.
    pub len: usize,

    /// Size of a serialized field element in bytes.
    pub field_size: usize,

    /// Group order `n`, big-endian, `field_size` bytes.
    pub order: &'static [u8],

    /// Generator x-coordinate, big-endian, `field_size` bytes.
    pub gx: &'static [u8],

    /// Generator y-coordinate, big-endian, `field_size` bytes.
    pub gy: &'static [u8],

    /// PCC scalar multiply function code.
    pub multiply: u32,

    /// KDSA ECDSA sign function code.
    pub sign: u32,

    /// KDSA ECDSA verify function code.
    pub verify: u32,
}

/// NIST P-256.
pub const P256: CurveDescriptor = CurveDescriptor {
    name: "P-256",
    len: 32,
    field_size: 32,
    order: &hex!("ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551"),
    gx: &hex!("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"),
    gy: &hex!("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"),
    multiply: PCC_SCALAR_MULTIPLY_P256,
    sign: KDSA_ECDSA_SIGN_P256,
    verify: KDSA_ECDSA_VERIFY_P256,
};

/// NIST P-384.
pub const P384: CurveDescriptor = CurveDescriptor {
    name: "P-384",
    len: 48,
    field_size: 48,
    order: &hex!(
        "ffffffffffffffffffffffffffffffffffffffffffffffff"
        "c7634d81f4372ddf581a0db248b0a77aecec196accc52973"
    ),
    gx: &hex!(
        "aa87ca22be8b05378eb1c71ef320ad746e1d3b628ba79b98"
        "59f741e082542a385502f25dbf55296c3a545e3872760ab7"
    ),
    gy: &hex!(
        "3617de4a96262c6f5d9e98bf9292dc29f8f41dbd289a147c"
        "e9da3113b5f0b8c00a60b1ce1d7e819d7a431d7c90ea0e5f"
    ),
    multiply: PCC_SCALAR_MULTIPLY_P384,
    sign: KDSA_ECDSA_SIGN_P384,
    verify: KDSA_ECDSA_VERIFY_P384,
};

/// NIST P-521.
///
/// The CPACF field is 80 bytes wide; coordinates and scalars are
/// right-aligned in it.
pub const P521: CurveDescriptor = CurveDescriptor {
    name: "P-521",
    len: 80,
    field_size: 66,
    order: &hex!(
        "01ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
        "fa51868783bf2f966b7fcc0148f709a5d03bb5c9b8899c47aebb6fb71e91386409"
    ),
    gx: &hex!(
        "00c6858e06b70404e9cd9e3ecb662395b4429c648139053fb521f828af606b4d3d"
        "baa14b5e77efe75928fe1dc127a2ffa8de3348b3c1856a429bf97e7e31c2e5bd66"
    ),
    gy: &hex!(
        "011839296a789a3bc0045c8a5fb42c7d1bd998f54449579b446817afbd17273e66"
        "2c97ee72995ef42640c550b9013fad0761353c7086a272c24088be94769fd16650"
    ),
    multiply: PCC_SCALAR_MULTIPLY_P521,
    sign: KDSA_ECDSA_SIGN_P521,
    verify: KDSA_ECDSA_VERIFY_P521,
};

/// A NIST prime curve with CPACF support.
///
/// Binds a [`CurveDescriptor`] to the RustCrypto curve type which provides
/// the software arithmetic.
pub trait NistCurve:
    CurveArithmetic<AffinePoint: FromEncodedPoint<Self> + ToEncodedPoint<Self>>
    + Curve<FieldBytesSize: ModulusSize>
{
    /// Constants for this curve.
    const DESCRIPTOR: CurveDescriptor;
}

macro_rules! impl_nist_curve {
    ($curve:ty, $descriptor:expr) => {
        impl NistCurve for $curve {
            const DESCRIPTOR: CurveDescriptor = $descriptor;
        }
    };
}

impl_nist_curve!(p256::NistP256, P256);
impl_nist_curve!(p384::NistP384, P384);
impl_nist_curve!(p521::NistP521, P521);
