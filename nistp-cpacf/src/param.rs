//! CPACF parameter blocks.
//!
//! PCC and KDSA read their operands from, and write their results to, a
//! single contiguous parameter block. Each operation partitions the block
//! into five fields of the curve's field width `n`, at offsets `0, n, .., 4n`.
//!
//! The block transiently holds private keys and nonces, so it is zeroed
//! before it is populated and wiped again when the [`Scrub`] guard returned by
//! [`ParamBlock::scrub`] goes out of scope.

use core::{
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a parameter block in bytes.
pub const PARAM_SIZE: usize = 4096;

/// Number of fields in every parameter block layout.
pub const FIELD_COUNT: usize = 5;

/// Scratch buffer handed to a CPACF instruction.
#[repr(C, align(8))]
pub struct ParamBlock([u8; PARAM_SIZE]);

impl ParamBlock {
    /// Create a zeroed parameter block.
    pub const fn new() -> Self {
        Self([0; PARAM_SIZE])
    }

    /// Zero the block and return a guard which wipes it again on drop.
    pub fn scrub(&mut self) -> Scrub<'_> {
        self.zeroize();
        Scrub(self)
    }

    /// Borrow the raw block.
    pub fn as_bytes(&self) -> &[u8; PARAM_SIZE] {
        &self.0
    }

    /// Mutably borrow the raw block.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PARAM_SIZE] {
        &mut self.0
    }

    /// Is every byte of the block zero?
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Typed view of the block for the layout `L` with field width `len`.
    pub fn fields<L: Layout>(&mut self, len: usize) -> Fields<'_, L> {
        debug_assert!(FIELD_COUNT * len <= PARAM_SIZE);
        Fields {
            block: self,
            len,
            layout: PhantomData,
        }
    }
}

impl Default for ParamBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParamBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamBlock").finish_non_exhaustive()
    }
}

impl Zeroize for ParamBlock {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for ParamBlock {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for ParamBlock {}

/// Guard which wipes a [`ParamBlock`] when dropped.
pub struct Scrub<'a>(&'a mut ParamBlock);

impl Deref for Scrub<'_> {
    type Target = ParamBlock;

    fn deref(&self) -> &ParamBlock {
        &*self.0
    }
}

impl DerefMut for Scrub<'_> {
    fn deref_mut(&mut self) -> &mut ParamBlock {
        &mut *self.0
    }
}

impl Drop for Scrub<'_> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Field layout of one instruction's parameter block.
pub trait Layout: Copy {
    /// Position of the field, counted in units of the field width.
    fn index(self) -> usize;

    /// Byte range of the field for a field width of `len`.
    fn range(self, len: usize) -> core::ops::Range<usize> {
        let start = self.index() * len;
        start..start + len
    }
}

/// PCC scalar-multiply layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MulField {
    /// Result x-coordinate (output).
    ResultX,
    /// Result y-coordinate (output).
    ResultY,
    /// Source point x-coordinate.
    SourceX,
    /// Source point y-coordinate.
    SourceY,
    /// Scalar.
    Scalar,
}

impl Layout for MulField {
    fn index(self) -> usize {
        match self {
            Self::ResultX => 0,
            Self::ResultY => 1,
            Self::SourceX => 2,
            Self::SourceY => 3,
            Self::Scalar => 4,
        }
    }
}

/// KDSA ECDSA-sign layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignField {
    /// Signature `r` (output).
    R,
    /// Signature `s` (output).
    S,
    /// Message digest.
    Hash,
    /// Private key.
    PrivateKey,
    /// Random entropy, or the nonce itself in deterministic mode.
    Nonce,
}

impl Layout for SignField {
    fn index(self) -> usize {
        match self {
            Self::R => 0,
            Self::S => 1,
            Self::Hash => 2,
            Self::PrivateKey => 3,
            Self::Nonce => 4,
        }
    }
}

/// KDSA ECDSA-verify layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerifyField {
    /// Signature `r`.
    R,
    /// Signature `s`.
    S,
    /// Message digest.
    Hash,
    /// Public key x-coordinate.
    PublicX,
    /// Public key y-coordinate.
    PublicY,
}

impl Layout for VerifyField {
    fn index(self) -> usize {
        match self {
            Self::R => 0,
            Self::S => 1,
            Self::Hash => 2,
            Self::PublicX => 3,
            Self::PublicY => 4,
        }
    }
}

/// A parameter block viewed through the layout `L`.
pub struct Fields<'a, L> {
    block: &'a mut ParamBlock,
    len: usize,
    layout: PhantomData<L>,
}

/// PCC parameter block view.
pub type MulBlock<'a> = Fields<'a, MulField>;

/// KDSA sign parameter block view.
pub type SignBlock<'a> = Fields<'a, SignField>;

/// KDSA verify parameter block view.
pub type VerifyBlock<'a> = Fields<'a, VerifyField>;

impl<L: Layout> Fields<'_, L> {
    /// Field width in bytes.
    pub fn width(&self) -> usize {
        self.len
    }

    /// Borrow a field.
    pub fn get(&self, field: L) -> &[u8] {
        &self.block.0[field.range(self.len)]
    }

    /// Mutably borrow a field.
    pub fn get_mut(&mut self, field: L) -> &mut [u8] {
        &mut self.block.0[field.range(self.len)]
    }

    /// Bytes past the last field of the layout.
    pub fn tail(&self) -> &[u8] {
        &self.block.0[FIELD_COUNT * self.len..]
    }

    /// The underlying block, for handing to an instruction.
    pub fn block_mut(&mut self) -> &mut ParamBlock {
        &mut *self.block
    }
}
