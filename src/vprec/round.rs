//! Round-to-nearest-even at an arbitrary mantissa length.
//!
//! All roundings reduce to the same primitive: rounding the magnitude of a
//! value to an integer multiple of a power-of-two quantum. For a value of
//! exponent `e` kept on `p` mantissa bits the quantum is `2^(e - p)`; below the
//! normal range of the target format the quantum is frozen at
//! `2^(emin - p)`, which is exactly gradual underflow.

use std::num::FpCategory;

use crate::binary::Binary;
use crate::vprec::{ErrorMode, ErrorPolicy};

/// Rounds `|x|` to the nearest multiple of `2^quantum_exp`, ties to even.
/// The sign is preserved, also when the result is zero.
pub(crate) fn round_to_quantum<T: Binary>(x: T, quantum_exp: i32) -> T {
    let negative = x.is_sign_negative();
    let (significand, lsb_exp) = x.significand();
    let shift = quantum_exp - lsb_exp;
    if shift <= 0 || significand == 0 {
        return x;
    }
    // significand < 2^(PMAN_SIZE + 1) is below half a quantum
    if shift as u32 > T::PMAN_SIZE + 1 {
        return T::zero(negative);
    }

    let shift = shift as u32;
    let half = 1u64 << (shift - 1);
    let remainder = significand & ((1u64 << shift) - 1);
    let mut kept = significand >> shift;
    if remainder > half || (remainder == half && kept & 1 == 1) {
        kept += 1;
    }
    if kept == 0 {
        return T::zero(negative);
    }

    // 2^quantum_exp can exceed the largest finite power of two by one
    let scale = quantum_exp.min(T::EXP_COMP);
    let magnitude =
        T::from_significand(kept) * T::exp2i(scale) * T::exp2i(quantum_exp - scale);
    magnitude.with_sign(negative)
}

/// Rounds a value of the normal range to `precision` mantissa bits.
///
/// `precision` may be zero, in which case only the implicit bit is kept.
pub fn round_normal<T: Binary>(x: T, precision: u32) -> T {
    round_to_quantum(x, x.exponent() - precision as i32)
}

/// Rounds a value lying below `2^emin` as a subnormal of a format whose
/// smallest normal exponent is `emin` and with `precision` mantissa bits.
pub fn round_denormal<T: Binary>(x: T, emin: i32, precision: u32) -> T {
    round_to_quantum(x, emin - precision as i32)
}

/// Rounds `x` to `precision` mantissa bits in the normal range, honoring the
/// absolute error budget of `policy`.
///
/// Non-finite values are returned unchanged. Subnormals of the native format
/// are rounded as subnormals of the native format.
///
/// ```rust
/// use vprec::vprec::{ErrorPolicy, round::round};
///
/// assert_eq!(round(1.0f64 + 3.0 / 1024.0, 9, &ErrorPolicy::relative()), 1.0 + 4.0 / 1024.0);
///
/// // below 2^-20 everything is insignificant, just below rounds up to 2^-20
/// let policy = ErrorPolicy::absolute(-20);
/// assert_eq!(round(1.5 * 2f64.powi(-21), 52, &policy), 2f64.powi(-20));
/// assert_eq!(round(-1.5 * 2f64.powi(-22), 52, &policy), -0.0);
/// ```
pub fn round<T: Binary>(x: T, precision: u32, policy: &ErrorPolicy) -> T {
    match x.classify() {
        FpCategory::Nan | FpCategory::Infinite | FpCategory::Zero => x,
        FpCategory::Subnormal => round_subnormal(x, 1 - T::EXP_COMP, precision, policy),
        FpCategory::Normal if policy.has_absolute() => round_normal_abs_err(x, precision, policy),
        FpCategory::Normal => round_normal(x, precision),
    }
}

/// Rounds `x`, lying below `2^emin`, as a subnormal of the target format.
///
/// With an absolute error budget the precision becomes
/// `min(|abs_err_exp|, precision)`.
pub fn round_subnormal<T: Binary>(x: T, emin: i32, precision: u32, policy: &ErrorPolicy) -> T {
    if !x.is_finite() {
        return x;
    }
    let precision = if policy.has_absolute() {
        policy.abs_err_exp.unsigned_abs().min(precision)
    } else {
        precision
    };
    round_denormal(x, emin, precision)
}

fn round_normal_abs_err<T: Binary>(x: T, precision: u32, policy: &ErrorPolicy) -> T {
    let exp_diff = i64::from(x.exponent()) - i64::from(policy.abs_err_exp);
    match exp_diff {
        // underflow on the precision given by the absolute error
        ..=-2 => T::zero(x.is_sign_negative()),
        // the generic rounding cannot produce one ulp of the absolute error
        // format from just below it
        -1 => T::exp2i(policy.abs_err_exp).with_sign(x.is_sign_negative()),
        _ => {
            let cap = match policy.mode {
                ErrorMode::Combined => precision,
                _ => T::PMAN_SIZE,
            };
            round_normal(x, exp_diff.min(i64::from(cap)) as u32)
        }
    }
}
