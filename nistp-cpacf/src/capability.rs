//! CPACF capability detection.
//!
//! The query function of PCC and KDSA returns a 128-bit status vector per
//! instruction. A curve is accelerated only when all three of its functions
//! (multiply, sign, verify) are reported; see [`Capabilities::supports_curve`].

use crate::{
    cpacf::{Cpacf, Instructions},
    curve::CurveDescriptor,
};
use alloc::boxed::Box;
use once_cell::race::OnceBox;

pub use crate::cpacf::Family;

/// Environment variable holding a capability mask.
///
/// The format follows `OPENSSL_s390xcap` for the two families used here,
/// e.g. `pcc:0:0;kdsa:~0:~0`. Each word is hexadecimal with a `0x` prefix or
/// decimal, and a leading `~` complements it. Omitted families are left as
/// detected. The mask is intersected with the detected set, so it can only
/// disable functions.
pub const OVERRIDE_VAR: &str = "CPACF_NISTP_CAP";

/// Installed PCC and KDSA function codes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Capabilities {
    /// PCC query status words.
    pub pcc: [u64; 2],
    /// KDSA query status words.
    pub kdsa: [u64; 2],
}

impl Capabilities {
    /// No function installed.
    pub const fn none() -> Self {
        Self {
            pcc: [0; 2],
            kdsa: [0; 2],
        }
    }

    /// Every function installed.
    pub const fn all() -> Self {
        Self {
            pcc: [u64::MAX; 2],
            kdsa: [u64::MAX; 2],
        }
    }

    /// Query `instructions` for both families.
    pub fn query<I: Instructions + ?Sized>(instructions: &I) -> Self {
        Self {
            pcc: instructions.query(Family::Pcc),
            kdsa: instructions.query(Family::Kdsa),
        }
    }

    /// Capabilities of the running CPU.
    ///
    /// The CPU is queried once per process. With the `std` feature the result
    /// is masked by [`OVERRIDE_VAR`].
    pub fn detect() -> Self {
        static DETECTED: OnceBox<Capabilities> = OnceBox::new();

        *DETECTED.get_or_init(|| {
            let caps = Self::query(&Cpacf);

            #[cfg(feature = "std")]
            let caps = match env_mask() {
                Some(mask) => caps.intersect(&mask),
                None => caps,
            };

            tracing::debug!(pcc = ?caps.pcc, kdsa = ?caps.kdsa, "detected CPACF capabilities");
            Box::new(caps)
        })
    }

    /// Is function code `function` of `family` installed?
    pub fn supports(&self, family: Family, function: u32) -> bool {
        let words = match family {
            Family::Pcc => &self.pcc,
            Family::Kdsa => &self.kdsa,
        };

        let function = function as usize;
        match words.get(function / 64) {
            Some(&word) => word & (1 << (63 - function % 64)) != 0,
            None => false,
        }
    }

    /// Are multiply, sign and verify all installed for `curve`?
    pub fn supports_curve(&self, curve: &CurveDescriptor) -> bool {
        self.supports(Family::Pcc, curve.multiply)
            && self.supports(Family::Kdsa, curve.sign)
            && self.supports(Family::Kdsa, curve.verify)
    }

    /// Functions installed in both `self` and `other`.
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            pcc: [self.pcc[0] & other.pcc[0], self.pcc[1] & other.pcc[1]],
            kdsa: [self.kdsa[0] & other.kdsa[0], self.kdsa[1] & other.kdsa[1]],
        }
    }

    /// Parse a capability mask in the [`OVERRIDE_VAR`] format.
    ///
    /// Families that are not named keep every bit set. Returns `None` if the
    /// string is malformed.
    pub fn parse_mask(mask: &str) -> Option<Self> {
        let mut caps = Self::all();

        for entry in mask.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split(':').map(str::trim);
            let words = match parts.next()? {
                "pcc" => &mut caps.pcc,
                "kdsa" => &mut caps.kdsa,
                _ => return None,
            };

            words[0] = parse_word(parts.next()?)?;
            words[1] = parse_word(parts.next()?)?;

            if parts.next().is_some() {
                return None;
            }
        }

        Some(caps)
    }
}

/// Parse one mask word: decimal or `0x`-prefixed hex, optionally `~`-prefixed.
fn parse_word(word: &str) -> Option<u64> {
    let (complement, word) = match word.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, word),
    };

    let value = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => word.parse().ok()?,
    };

    Some(if complement { !value } else { value })
}

#[cfg(feature = "std")]
fn env_mask() -> Option<Capabilities> {
    let value = std::env::var(OVERRIDE_VAR).ok()?;
    let mask = Capabilities::parse_mask(&value);

    if mask.is_none() {
        tracing::warn!(var = OVERRIDE_VAR, %value, "ignoring malformed capability mask");
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{P256, P384, P521};

    fn bit(function: u32) -> u64 {
        1 << (63 - function % 64)
    }

    #[test]
    fn bit_positions() {
        let caps = Capabilities {
            pcc: [0, bit(65)],
            kdsa: [bit(2) | bit(10), 0],
        };

        assert!(caps.supports(Family::Pcc, 65));
        assert!(!caps.supports(Family::Pcc, 64));
        assert!(!caps.supports(Family::Pcc, 1));
        assert!(caps.supports(Family::Kdsa, 2));
        assert!(caps.supports(Family::Kdsa, 10));
        assert!(!caps.supports(Family::Kdsa, 3));
        assert!(!caps.supports(Family::Kdsa, 128));
    }

    #[test]
    fn curve_needs_all_three_functions() {
        let caps = Capabilities {
            pcc: [0, bit(65)],
            kdsa: [bit(2) | bit(10), 0],
        };
        assert!(caps.supports_curve(&P384));
        assert!(!caps.supports_curve(&P256));

        let missing_verify = Capabilities {
            pcc: [0, bit(66)],
            kdsa: [bit(11), 0],
        };
        assert!(!missing_verify.supports_curve(&P521));

        for curve in [&P256, &P384, &P521] {
            assert!(Capabilities::all().supports_curve(curve));
            assert!(!Capabilities::none().supports_curve(curve));
        }
    }

    #[test]
    fn intersect_only_clears_bits() {
        let a = Capabilities {
            pcc: [0b1100, 0b1010],
            kdsa: [u64::MAX, 0],
        };
        let b = Capabilities {
            pcc: [0b0110, u64::MAX],
            kdsa: [0b1, 0b1],
        };
        let c = a.intersect(&b);
        assert_eq!(c.pcc, [0b0100, 0b1010]);
        assert_eq!(c.kdsa, [0b1, 0]);
        assert_eq!(a.intersect(&Capabilities::all()), a);
    }

    #[test]
    fn parse_masks() {
        assert_eq!(Capabilities::parse_mask(""), Some(Capabilities::all()));
        assert_eq!(
            Capabilities::parse_mask("pcc:0:0;kdsa:0:0"),
            Some(Capabilities::none())
        );

        let caps = Capabilities::parse_mask("kdsa:~0x4000000000000000:~0").unwrap();
        assert_eq!(caps.pcc, [u64::MAX; 2]);
        assert_eq!(caps.kdsa, [!bit(1), u64::MAX]);

        let caps = Capabilities::parse_mask(" pcc : 0 : 0x8000000000000000 ; ").unwrap();
        assert_eq!(caps.pcc, [0, bit(64)]);
    }

    #[test]
    fn reject_malformed_masks() {
        for mask in [
            "pcc",
            "pcc:1",
            "pcc:1:2:3",
            "kdsa:x:0",
            "kdsa:0x:0",
            "kimd:0:0",
            "pcc:~~1:0",
        ] {
            assert_eq!(Capabilities::parse_mask(mask), None, "{mask}");
        }
    }

    #[test]
    fn query_uses_instruction_family() {
        let emulator = crate::emulator::Emulator::with_capabilities(Capabilities {
            pcc: [1, 2],
            kdsa: [3, 4],
        });
        let caps = Capabilities::query(&emulator);
        assert_eq!(caps.pcc, [1, 2]);
        assert_eq!(caps.kdsa, [3, 4]);
    }
}
