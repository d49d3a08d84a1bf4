//! Error types.

/// Result type with the `nistp-cpacf` crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the dispatch layer.
///
/// Verification does not use this type to signal a signature mismatch: see
/// [`Verification`](crate::ecdsa::Verification).
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A key component required by the operation is absent.
    #[error("missing key parameters")]
    MissingParameters,

    /// ECDSA was disabled for this group.
    #[error("curve does not support signing")]
    SigningNotSupported,

    /// Integer does not fit in a fixed-width parameter block field.
    #[error("integer does not fit in a {len}-byte field")]
    FieldOverflow {
        /// Width of the destination field in bytes.
        len: usize,
    },

    /// Negative integer passed where only unsigned values are encodable.
    #[error("negative integer cannot be encoded")]
    NegativeValue,

    /// The random number generator failed.
    #[error("random number generation failed")]
    RandomNumberGeneration,

    /// A CPACF instruction did not complete successfully.
    #[error("CPACF instruction failed")]
    Cpacf,

    /// Point coordinates do not satisfy the curve equation.
    #[error("point is not on the curve")]
    PointNotOnCurve,

    /// Point at infinity where a finite point is required.
    #[error("point is at infinity")]
    PointAtInfinity,

    /// Scalar is outside `[1, n)`.
    #[error("scalar out of range")]
    InvalidScalar,

    /// Modular arithmetic failed (e.g. a value is not invertible).
    #[error("arithmetic error")]
    Arithmetic,
}
