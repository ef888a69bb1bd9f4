use crate::binary::Binary;
use crate::vprec::round::{round, round_subnormal};
use crate::vprec::{Context, FormatSpec};

/// Rounds `x` to the target format `spec`: precision and exponent range.
///
/// Values above the range overflow to a signed infinity, values below it are
/// either flushed to a signed zero (DAZ for operands, FTZ for results) or
/// rounded as subnormals of the target format. A rounding that carries past
/// `2^emax` also overflows, so the result is always representable in the
/// target format, or zero, or an infinity, or NaN.
pub fn clamp<T: Binary>(x: T, is_input: bool, spec: FormatSpec, ctx: &Context) -> T {
    if !x.is_finite() || x.is_zero() {
        return x;
    }

    let negative = x.is_sign_negative();
    let emax = spec.emax();
    let emin = spec.emin();
    let exponent = x.exponent();

    let rounded = if exponent > emax {
        return T::infinity(negative);
    } else if exponent < emin {
        if (is_input && ctx.daz) || (!is_input && ctx.ftz) {
            return T::zero(negative);
        }
        round_subnormal(x, emin, spec.precision, &ctx.policy)
    } else {
        round(x, spec.precision, &ctx.policy)
    };

    if rounded.is_finite() && rounded.exponent() > emax {
        T::infinity(negative)
    } else {
        rounded
    }
}
