//! # Bit-Level Float Access
//!
//! Field extraction and classification for the two managed IEEE 754 formats.
//!
//! ## IEEE 754 Layout
//!
//! ```text
//! binary32: [Sign: 1 bit][Exponent:  8 bits, bias  127][Mantissa: 23 bits]
//! binary64: [Sign: 1 bit][Exponent: 11 bits, bias 1023][Mantissa: 52 bits]
//! ```
//!
//! Both formats go through the same [`Binary`] trait, but every piece of bit
//! arithmetic is parameterized by the format constants, so the two layouts are
//! never mixed up. Raw bits are always carried in a `u64`; binary32 values only
//! use the low 32 bits.
//!
//! ## Examples
//!
//! ```rust
//! use vprec::binary::Binary;
//!
//! assert_eq!(1.5f64.exponent(), 0);
//! assert_eq!(1.5f64.mantissa(), 1 << 51);
//! assert_eq!(0.375f32.exponent(), -2);
//! assert_eq!(<f32 as Binary>::exp2i(-130), f32::from_bits(1 << 19));
//! ```

use std::fmt::Debug;
use std::num::FpCategory;
use std::ops::{Add, Div, Mul, Neg, Sub};

pub mod ieee;

/// The two floating-point formats managed by the instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Binary32,
    Binary64,
}

impl Format {
    pub const fn pman_size(self) -> u32 {
        match self {
            Format::Binary32 => 23,
            Format::Binary64 => 52,
        }
    }

    pub const fn exp_size(self) -> u32 {
        match self {
            Format::Binary32 => 8,
            Format::Binary64 => 11,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Format::Binary32 => "binary32",
            Format::Binary64 => "binary64",
        }
    }
}

/// An IEEE 754 binary interchange format backed by a native float type.
pub trait Binary:
    Copy
    + Debug
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Send
    + Sync
    + 'static
{
    const FORMAT: Format;
    /// Number of explicit mantissa bits.
    const PMAN_SIZE: u32 = Self::FORMAT.pman_size();
    /// Number of exponent bits.
    const EXP_SIZE: u32 = Self::FORMAT.exp_size();
    /// Exponent bias.
    const EXP_COMP: i32 = (1 << (Self::EXP_SIZE - 1)) - 1;

    const SIGN_MASK: u64 = 1 << (Self::PMAN_SIZE + Self::EXP_SIZE);
    const EXP_MASK: u64 = ((1 << Self::EXP_SIZE) - 1) << Self::PMAN_SIZE;
    const PMAN_MASK: u64 = (1 << Self::PMAN_SIZE) - 1;

    fn to_raw(self) -> u64;
    fn from_raw(bits: u64) -> Self;

    /// Converts an integer significand to a float. Exact as long as
    /// `significand <= 2^(PMAN_SIZE + 1)`.
    fn from_significand(significand: u64) -> Self;

    /// Fused `self * a + b` with a single rounding.
    fn mul_add(self, a: Self, b: Self) -> Self;

    fn classify(self) -> FpCategory {
        let raw = self.to_raw();
        match (raw & Self::EXP_MASK, raw & Self::PMAN_MASK) {
            (0, 0) => FpCategory::Zero,
            (0, _) => FpCategory::Subnormal,
            (e, 0) if e == Self::EXP_MASK => FpCategory::Infinite,
            (e, _) if e == Self::EXP_MASK => FpCategory::Nan,
            _ => FpCategory::Normal,
        }
    }

    fn is_finite(self) -> bool {
        self.to_raw() & Self::EXP_MASK != Self::EXP_MASK
    }

    fn is_zero(self) -> bool {
        self.to_raw() & !Self::SIGN_MASK == 0
    }

    fn is_sign_negative(self) -> bool {
        self.to_raw() & Self::SIGN_MASK != 0
    }

    /// Decoded exponent: the raw exponent field minus the bias.
    ///
    /// Zeros and subnormals decode to `-EXP_COMP`.
    fn exponent(self) -> i32 {
        ((self.to_raw() & Self::EXP_MASK) >> Self::PMAN_SIZE) as i32 - Self::EXP_COMP
    }

    /// Raw mantissa bits, without the implicit bit.
    fn mantissa(self) -> u64 {
        self.to_raw() & Self::PMAN_MASK
    }

    /// Position of the least significant set mantissa bit, `PMAN_SIZE` if the
    /// mantissa is empty (only the implicit bit is set).
    fn lsb(self) -> u32 {
        match self.mantissa() {
            0 => Self::PMAN_SIZE,
            m => m.trailing_zeros(),
        }
    }

    /// Integer significand and the exponent of its least significant bit, so
    /// that `|self| = significand * 2^exponent`.
    fn significand(self) -> (u64, i32) {
        let raw = self.to_raw();
        let biased = ((raw & Self::EXP_MASK) >> Self::PMAN_SIZE) as i32;
        let mantissa = raw & Self::PMAN_MASK;
        if biased == 0 {
            (mantissa, 1 - Self::EXP_COMP - Self::PMAN_SIZE as i32)
        } else {
            (
                mantissa | (1 << Self::PMAN_SIZE),
                biased - Self::EXP_COMP - Self::PMAN_SIZE as i32,
            )
        }
    }

    fn abs(self) -> Self {
        Self::from_raw(self.to_raw() & !Self::SIGN_MASK)
    }

    fn with_sign(self, negative: bool) -> Self {
        let magnitude = self.to_raw() & !Self::SIGN_MASK;
        Self::from_raw(if negative {
            magnitude | Self::SIGN_MASK
        } else {
            magnitude
        })
    }

    /// Magnitude of `self` with the sign of `sign`.
    fn copysign(self, sign: Self) -> Self {
        self.with_sign(sign.is_sign_negative())
    }

    fn zero(negative: bool) -> Self {
        Self::from_raw(0).with_sign(negative)
    }

    fn infinity(negative: bool) -> Self {
        Self::from_raw(Self::EXP_MASK).with_sign(negative)
    }

    /// Exact `2^e`, saturating to infinity above the format range and to zero
    /// below its smallest subnormal.
    fn exp2i(e: i32) -> Self {
        let biased = e + Self::EXP_COMP;
        let pman = Self::PMAN_SIZE as i32;
        let raw = if biased >= (1 << Self::EXP_SIZE) - 1 {
            Self::EXP_MASK
        } else if biased >= 1 {
            (biased as u64) << Self::PMAN_SIZE
        } else if biased > -pman {
            1 << (pman - 1 + biased)
        } else {
            0
        };
        Self::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rstest::rstest;

    use super::*;
    use crate::tests::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(<f32 as Binary>::SIGN_MASK, 0x8000_0000);
        assert_eq!(<f32 as Binary>::EXP_MASK, 0x7f80_0000);
        assert_eq!(<f32 as Binary>::PMAN_MASK, 0x007f_ffff);
        assert_eq!(<f64 as Binary>::SIGN_MASK, 0x8000_0000_0000_0000);
        assert_eq!(<f64 as Binary>::EXP_MASK, 0x7ff0_0000_0000_0000);
        assert_eq!(<f64 as Binary>::PMAN_MASK, 0x000f_ffff_ffff_ffff);
    }

    #[test]
    fn test_exponent_and_mantissa() {
        assert_eq!(1.0f64.exponent(), 0);
        assert_eq!(3.0f64.exponent(), 1);
        assert_eq!(3.0f64.mantissa(), 1 << 51);
        assert_eq!(0.0f64.exponent(), -1023);
        assert_eq!(f64::MIN_POSITIVE.exponent(), -1022);
        assert_eq!((f64::MIN_POSITIVE / 2.0).exponent(), -1023);

        assert_eq!(1.0f32.exponent(), 0);
        assert_eq!((-6.0f32).exponent(), 2);
        assert_eq!((-6.0f32).mantissa(), 1 << 22);
        assert_eq!(0.0f32.exponent(), -127);
        assert_eq!(f32::MIN_POSITIVE.exponent(), -126);
    }

    #[test]
    fn test_lsb() {
        assert_eq!(1.0f64.lsb(), 52);
        assert_eq!(1.5f64.lsb(), 51);
        assert_eq!(f64::from_bits(0x3ff0_0000_0000_0001).lsb(), 0);
        assert_eq!(1.0f32.lsb(), 23);
        assert_eq!(1.25f32.lsb(), 21);
    }

    #[test]
    fn test_classify_matches_std() {
        let values = [
            0.0,
            -0.0,
            1.0,
            f64::MIN_POSITIVE,
            f64::MIN_POSITIVE / 4.0,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
        ];
        for value in values {
            assert_eq!(Binary::classify(value), value.classify(), "{value:e}");
            assert_eq!(Binary::classify(value as f32), (value as f32).classify());
        }
    }

    #[test]
    fn test_exp2i() {
        for e in -1022..=1023 {
            assert_eq!(<f64 as Binary>::exp2i(e).to_bits(), ((e + 1023) as u64) << 52);
        }
        for e in -1074..-1022 {
            assert_eq!(<f64 as Binary>::exp2i(e).to_bits(), 1 << (e + 1074));
        }
        assert_eq!(<f64 as Binary>::exp2i(1024), f64::INFINITY);
        assert_eq!(<f64 as Binary>::exp2i(-1075), 0.0);

        for e in -126..=127 {
            assert_eq!(<f32 as Binary>::exp2i(e).to_bits(), ((e + 127) as u32) << 23);
        }
        for e in -149..-126 {
            assert_eq!(<f32 as Binary>::exp2i(e).to_bits(), 1 << (e + 149));
        }
        assert_eq!(<f32 as Binary>::exp2i(128), f32::INFINITY);
        assert_eq!(<f32 as Binary>::exp2i(-150), 0.0);
        assert_eq!(<f64 as Binary>::exp2i(-3), 0.125);
    }

    #[rstest]
    fn test_significand_reconstructs_value(mut rng: impl Rng, n_experiments: usize) {
        for _ in 0..n_experiments {
            let value = random_f64(&mut rng);
            let (significand, exponent) = value.significand();
            assert!(significand < 1 << 53);
            let rebuilt = <f64 as Binary>::from_significand(significand)
                * <f64 as Binary>::exp2i(exponent);
            assert_eq!(rebuilt, value.abs(), "{value:e}");
        }
    }

    #[test]
    fn test_sign_helpers() {
        assert_eq!(Binary::copysign(2.0f64, -0.0), -2.0);
        assert!(<f32 as Binary>::zero(true).is_sign_negative());
        assert_eq!(<f64 as Binary>::infinity(true), f64::NEG_INFINITY);
        assert_eq!(Binary::abs(-3.5f32), 3.5);
        assert!(Binary::is_zero(-0.0f64));
        assert!(!Binary::is_finite(f32::NAN));
    }
}
