use crate::Q128;
use crate::error::MathError;
use crate::math::math_helpers::mul_div;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A Q128.128 accumulator with intentional 256-bit modular arithmetic.
///
/// Fee growth and seconds-per-liquidity accumulators are allowed — expected,
/// over a long enough pool lifetime — to wrap around 2^256. Differences of
/// two snapshots of the same accumulator stay correct across a wrap as long
/// as every subtraction is modular, so the wrapping operations live behind
/// this newtype and the rest of the crate keeps its checked arithmetic.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct X128(pub U256);

impl X128 {
    pub const ZERO: Self = Self(U256::ZERO);

    #[inline]
    pub fn wrapping_add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }

    #[inline]
    pub fn wrapping_sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }

    /// Growth contributed by `amount` of fees spread over `liquidity`:
    /// `amount * 2^128 / liquidity`.
    pub fn from_fee(amount: U256, liquidity: u128) -> Result<Self, MathError> {
        Ok(Self(mul_div(amount, Q128, U256::from(liquidity))?))
    }

    /// Seconds-per-liquidity contribution of `elapsed` seconds at the given
    /// active liquidity: `(elapsed << 128) / max(liquidity, 1)`.
    pub fn per_liquidity(elapsed: u32, liquidity: u128) -> Self {
        let denom = U256::from(if liquidity > 0 { liquidity } else { 1 });
        Self((U256::from(elapsed) << 128) / denom)
    }

    /// Tokens owed for `liquidity` units over this growth delta:
    /// `floor(delta * liquidity / 2^128)`, truncated to u128.
    ///
    /// Truncation mirrors the accumulator contract: owners must collect
    /// before owed fees reach 2^128 of a token.
    pub fn owed(self, liquidity: u128) -> Result<u128, MathError> {
        let full = mul_div(self.0, U256::from(liquidity), Q128)?;
        let limbs = full.as_limbs();
        Ok((limbs[0] as u128) | ((limbs[1] as u128) << 64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_difference_survives_a_wrap() {
        let just_below_wrap = X128(U256::MAX - U256::from(4u8));
        let just_after_wrap = just_below_wrap.wrapping_add(X128(U256::from(10u8)));
        assert_eq!(
            just_after_wrap.wrapping_sub(just_below_wrap),
            X128(U256::from(10u8))
        );
    }

    #[test]
    fn fee_growth_round_trips_through_owed() {
        // power-of-two liquidity keeps the Q128.128 division exact
        let liquidity = 1u128 << 40;
        let growth = X128::from_fee(U256::from(3_000u64), liquidity).unwrap();
        assert_eq!(growth.owed(liquidity).unwrap(), 3_000);

        // otherwise the flooring loses at most one unit
        let uneven = 1_000_000_000_000u128;
        let growth = X128::from_fee(U256::from(3_000u64), uneven).unwrap();
        assert_eq!(growth.owed(uneven).unwrap(), 2_999);
    }

    #[test]
    fn per_liquidity_guards_against_empty_pool() {
        assert_eq!(
            X128::per_liquidity(7, 0),
            X128(U256::from(7u8) << 128)
        );
        assert_eq!(
            X128::per_liquidity(8, 2),
            X128(U256::from(4u8) << 128)
        );
    }

    #[test]
    fn owed_truncates_above_u128() {
        let huge = X128(U256::MAX);
        // delta * L / 2^128 exceeds u128::MAX here; the low 128 bits are kept.
        let owed = huge.owed(u128::MAX).unwrap();
        assert_eq!(owed, u128::MAX);
    }
}
