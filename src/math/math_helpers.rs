use crate::U256_1;
use crate::error::MathError;
use alloy_primitives::U256;

/// Multiplies `a` and `b` into a 512-bit product held as two 256-bit halves.
///
/// `lo` is the low 256 bits of the product, `hi` the high 256 bits. The
/// split uses the identity `hi = (a*b mod 2^256-1) - (a*b mod 2^256)`,
/// adjusted for borrow, which avoids needing a wider integer type.
#[inline]
fn mul_512(a: U256, b: U256) -> (U256, U256) {
    let mm = a.mul_mod(b, U256::MAX);
    let lo = a.wrapping_mul(b);
    let (mut hi, borrow) = mm.overflowing_sub(lo);
    if borrow {
        hi = hi.wrapping_sub(U256_1);
    }
    (lo, hi)
}

/// Computes `floor(a * b / denominator)` with the intermediate product kept
/// at full 512-bit precision.
///
/// Fails with `DivisionByZero` when `denominator` is zero and with
/// `Overflow` when the quotient does not fit in 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    let (mut lo, mut hi) = mul_512(a, b);

    // Short path: the product already fits in 256 bits.
    if hi.is_zero() {
        return Ok(lo.wrapping_div(denominator));
    }

    if denominator <= hi {
        return Err(MathError::Overflow);
    }

    // Subtract the remainder so [hi lo] is an exact multiple of the
    // denominator.
    let remainder = a.mul_mod(b, denominator);
    let (new_lo, borrow) = lo.overflowing_sub(remainder);
    lo = new_lo;
    if borrow {
        hi = hi.wrapping_sub(U256_1);
    }

    // Factor powers of two out of the denominator and fold the matching
    // bits of `hi` into `lo`.
    let twos = denominator & denominator.wrapping_neg();
    let denominator = denominator.wrapping_div(twos);
    lo = lo.wrapping_div(twos);
    let carry_shift = twos
        .wrapping_neg()
        .wrapping_div(twos)
        .wrapping_add(U256_1);
    lo |= hi.wrapping_mul(carry_shift);

    // Invert the (now odd) denominator modulo 2^256 by Newton iteration;
    // each step doubles the number of correct bits, six steps suffice.
    let mut inverse = U256::from(3u64).wrapping_mul(denominator) ^ U256::from(2u64);
    for _ in 0..6 {
        inverse =
            inverse.wrapping_mul(U256::from(2u64).wrapping_sub(denominator.wrapping_mul(inverse)));
    }

    Ok(lo.wrapping_mul(inverse))
}

/// Computes `ceil(a * b / denominator)` with full 512-bit precision,
/// failing on overflow of the rounded result.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let result = mul_div(a, b, denominator)?;
    if a.mul_mod(b, denominator).is_zero() {
        return Ok(result);
    }
    result.checked_add(U256_1).ok_or(MathError::Overflow)
}

/// Divides `a` by `b`, rounding up.
///
/// Panics on `b == 0`, mirroring primitive integer division; callers are
/// expected to have excluded a zero denominator already.
#[inline]
pub fn div_rounding_up(a: U256, b: U256) -> U256 {
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256_1
    }
}
