//! CPACF instruction interface.
//!
//! Two instructions of the IBM Z message-security-assist extension 9 are
//! used:
//!
//! - PCC (PERFORM CRYPTOGRAPHIC COMPUTATION) for scalar multiplication;
//! - KDSA (COMPUTE DIGITAL SIGNATURE AUTHENTICATION) for ECDSA.
//!
//! Both take a function code in general register 0 and the address of a
//! [`ParamBlock`] in general register 1, and report through the condition
//! code. Condition code 3 (partial completion) is handled by re-issuing the
//! instruction and never surfaces as an [`Outcome`].

use crate::param::ParamBlock;

/// PCC function code: scalar multiply, P-256.
pub const PCC_SCALAR_MULTIPLY_P256: u32 = 64;
/// PCC function code: scalar multiply, P-384.
pub const PCC_SCALAR_MULTIPLY_P384: u32 = 65;
/// PCC function code: scalar multiply, P-521.
pub const PCC_SCALAR_MULTIPLY_P521: u32 = 66;

/// KDSA function code: ECDSA verify, P-256.
pub const KDSA_ECDSA_VERIFY_P256: u32 = 1;
/// KDSA function code: ECDSA verify, P-384.
pub const KDSA_ECDSA_VERIFY_P384: u32 = 2;
/// KDSA function code: ECDSA verify, P-521.
pub const KDSA_ECDSA_VERIFY_P521: u32 = 3;

/// KDSA function code: ECDSA sign, P-256.
pub const KDSA_ECDSA_SIGN_P256: u32 = 9;
/// KDSA function code: ECDSA sign, P-384.
pub const KDSA_ECDSA_SIGN_P384: u32 = 10;
/// KDSA function code: ECDSA sign, P-521.
pub const KDSA_ECDSA_SIGN_P521: u32 = 11;

/// KDSA modifier: use the nonce in the parameter block as-is instead of
/// deriving one internally.
pub const KDSA_DETERMINISTIC: u32 = 0x80;

/// Query function code, valid for both instructions.
pub const QUERY: u32 = 0;

/// Instruction family.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Family {
    /// PERFORM CRYPTOGRAPHIC COMPUTATION.
    Pcc,
    /// COMPUTE DIGITAL SIGNATURE AUTHENTICATION.
    Kdsa,
}

/// Result of a completed instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Condition code 0.
    Success,
    /// Condition code 1: the signature did not verify.
    VerificationFailed,
    /// Any other condition code, or the instruction is not available.
    Error,
}

impl Outcome {
    /// Map a final (non-3) condition code.
    pub fn from_condition_code(cc: u32) -> Self {
        match cc {
            0 => Self::Success,
            1 => Self::VerificationFailed,
            _ => Self::Error,
        }
    }
}

/// Executor for the CPACF elliptic curve instructions.
///
/// [`Cpacf`] runs the real instructions; [`Emulator`](crate::emulator::Emulator)
/// implements the same contract in software.
pub trait Instructions {
    /// Execute PCC with function code `function` on `param`.
    fn pcc(&self, function: u32, param: &mut ParamBlock) -> Outcome;

    /// Execute KDSA with function code `function` on `param`.
    ///
    /// `src` is the second operand. The ECDSA functions do not read it and
    /// callers pass an empty slice.
    fn kdsa(&self, function: u32, param: &mut ParamBlock, src: &[u8]) -> Outcome;

    /// Status words returned by the query function of `family`.
    ///
    /// Bit `63 - fc % 64` of word `fc / 64` is set when function code `fc` is
    /// installed.
    fn query(&self, family: Family) -> [u64; 2];
}

impl<I: Instructions + ?Sized> Instructions for &I {
    fn pcc(&self, function: u32, param: &mut ParamBlock) -> Outcome {
        (**self).pcc(function, param)
    }

    fn kdsa(&self, function: u32, param: &mut ParamBlock, src: &[u8]) -> Outcome {
        (**self).kdsa(function, param, src)
    }

    fn query(&self, family: Family) -> [u64; 2] {
        (**self).query(family)
    }
}

/// The CPACF instructions of the running CPU.
///
/// On targets other than `s390x` nothing is installed: queries return empty
/// status words and every call fails with [`Outcome::Error`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Cpacf;

#[cfg(target_arch = "s390x")]
impl Instructions for Cpacf {
    fn pcc(&self, function: u32, param: &mut ParamBlock) -> Outcome {
        if !s390x::has_msa9() {
            return Outcome::Error;
        }

        Outcome::from_condition_code(s390x::pcc(function, param))
    }

    fn kdsa(&self, function: u32, param: &mut ParamBlock, src: &[u8]) -> Outcome {
        if !s390x::has_msa9() {
            return Outcome::Error;
        }

        Outcome::from_condition_code(s390x::kdsa(function, param, src))
    }

    fn query(&self, family: Family) -> [u64; 2] {
        if !s390x::has_msa9() {
            return [0; 2];
        }

        let mut param = ParamBlock::new();
        let cc = match family {
            Family::Pcc => s390x::pcc(QUERY, &mut param),
            Family::Kdsa => s390x::kdsa(QUERY, &mut param, &[]),
        };

        if cc != 0 {
            return [0; 2];
        }

        let bytes = param.as_bytes();
        let mut words = [0u64; 2];
        for (word, chunk) in words.iter_mut().zip(bytes[..16].chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_be_bytes(buf);
        }
        words
    }
}

#[cfg(not(target_arch = "s390x"))]
impl Instructions for Cpacf {
    fn pcc(&self, _function: u32, _param: &mut ParamBlock) -> Outcome {
        Outcome::Error
    }

    fn kdsa(&self, _function: u32, _param: &mut ParamBlock, _src: &[u8]) -> Outcome {
        Outcome::Error
    }

    fn query(&self, _family: Family) -> [u64; 2] {
        [0; 2]
    }
}

#[cfg(target_arch = "s390x")]
#[allow(unsafe_code)]
mod s390x {
    use crate::param::ParamBlock;
    use core::arch::asm;
    use once_cell::race::OnceBool;

    /// STFLE facility bit for message-security-assist extension 9.
    const FACILITY_MSA9: usize = 155;

    pub(super) static MSA9: OnceBool = OnceBool::new();

    /// Does the CPU implement message-security-assist extension 9?
    ///
    /// STFLE runs once per process.
    pub(super) fn has_msa9() -> bool {
        MSA9.get_or_init(stfle_msa9)
    }

    fn stfle_msa9() -> bool {
        let mut list = [0u64; 3];

        // SAFETY: STFLE stores at most `r0 + 1` doublewords at the operand
        // address; `r0` is set to `list.len() - 1`.
        unsafe {
            asm!(
                "stfle 0({list})",
                list = in(reg_addr) list.as_mut_ptr(),
                inout("r0") (list.len() - 1) as u64 => _,
                options(nostack),
            );
        }

        list[FACILITY_MSA9 / 64] & (1 << (63 - FACILITY_MSA9 % 64)) != 0
    }

    /// Issue PCC until it completes and return the final condition code.
    pub(super) fn pcc(function: u32, param: &mut ParamBlock) -> u32 {
        let cc: u32;

        // SAFETY: every PCC function reads and writes at most the 4096-byte
        // parameter block addressed by `r1`.
        unsafe {
            asm!(
                "0:",
                ".insn rre,0xb92c0000,0,0",
                "jo 0b",
                "ipm {cc}",
                "srl {cc},28",
                cc = out(reg) cc,
                in("r0") u64::from(function),
                in("r1") param.as_bytes_mut().as_mut_ptr(),
                options(nostack),
            );
        }

        cc
    }

    /// Issue KDSA until it completes and return the final condition code.
    pub(super) fn kdsa(function: u32, param: &mut ParamBlock, src: &[u8]) -> u32 {
        let cc: u32;

        // SAFETY: KDSA reads and writes the parameter block addressed by `r1`
        // and reads at most `r3` bytes from `r2`, advancing both.
        unsafe {
            asm!(
                "0:",
                ".insn rre,0xb93a0000,0,2",
                "jo 0b",
                "ipm {cc}",
                "srl {cc},28",
                cc = out(reg) cc,
                in("r0") u64::from(function),
                in("r1") param.as_bytes_mut().as_mut_ptr(),
                inout("r2") src.as_ptr() => _,
                inout("r3") src.len() => _,
                options(nostack),
            );
        }

        cc
    }
}
