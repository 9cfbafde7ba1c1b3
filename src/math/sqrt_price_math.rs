use crate::error::{Error, MathError, StateError};
use crate::math::math_helpers::{div_rounding_up, mul_div, mul_div_rounding_up};
use crate::{Q96, RESOLUTION, U160_MAX};
use alloy_primitives::{I256, U256};

/// Next sqrt price after adding (`add = true`) or removing an `amount` of
/// token0 at liquidity `liquidity`, rounded up.
///
/// Rounding up keeps the price from passing the exact target, which is the
/// direction that favors the pool for token0 movements.
pub fn next_sqrt_price_from_amount0_rounding_up(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, Error> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }

    let numerator1: U256 = U256::from(liquidity) << RESOLUTION;
    let product = amount.wrapping_mul(sqrt_price_x96);

    if add {
        // Precise path only when amount * price did not overflow.
        if product.wrapping_div(amount) == sqrt_price_x96 {
            let denominator = numerator1.wrapping_add(product);
            if denominator >= numerator1 {
                return mul_div_rounding_up(numerator1, sqrt_price_x96, denominator)
                    .map_err(Error::from);
            }
        }
        Ok(div_rounding_up(
            numerator1,
            (numerator1 / sqrt_price_x96) + amount,
        ))
    } else {
        if product.wrapping_div(amount) != sqrt_price_x96 || numerator1 <= product {
            return Err(StateError::InsufficientReserves.into());
        }
        let denominator = numerator1 - product;
        mul_div_rounding_up(numerator1, sqrt_price_x96, denominator).map_err(Error::from)
    }
}

/// Next sqrt price after adding or removing an `amount` of token1 at
/// liquidity `liquidity`, rounded down.
pub fn next_sqrt_price_from_amount1_rounding_down(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, Error> {
    let liquidity = U256::from(liquidity);
    if add {
        let quotient = if amount <= U160_MAX {
            (amount << RESOLUTION) / liquidity
        } else {
            mul_div(amount, Q96, liquidity)?
        };

        let result = sqrt_price_x96 + quotient;
        if result <= U160_MAX {
            Ok(result)
        } else {
            Err(MathError::Overflow.into())
        }
    } else {
        let quotient = if amount <= U160_MAX {
            div_rounding_up(amount << RESOLUTION, liquidity)
        } else {
            mul_div_rounding_up(amount, Q96, liquidity)?
        };

        if sqrt_price_x96 <= quotient {
            return Err(StateError::InsufficientReserves.into());
        }
        Ok(sqrt_price_x96 - quotient)
    }
}

/// Next sqrt price after paying `amount_in` into the pool.
pub fn next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, Error> {
    if sqrt_price_x96.is_zero() {
        return Err(StateError::SqrtPriceIsZero.into());
    }
    if liquidity == 0 {
        return Err(StateError::LiquidityIsZero.into());
    }

    if zero_for_one {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_in, true)
    } else {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_in, true)
    }
}

/// Next sqrt price after paying `amount_out` out of the pool.
pub fn next_sqrt_price_from_output(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, Error> {
    if sqrt_price_x96.is_zero() {
        return Err(StateError::SqrtPriceIsZero.into());
    }
    if liquidity == 0 {
        return Err(StateError::LiquidityIsZero.into());
    }

    if zero_for_one {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_out, false)
    } else {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_out, false)
    }
}

/// Token0 owed between two sqrt prices at a given liquidity:
/// `L * (sqrt_b - sqrt_a) * 2^96 / (sqrt_a * sqrt_b)`, with the rounding
/// direction chosen by the caller.
pub fn amount0_delta(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, Error> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96);
    }
    if sqrt_ratio_a_x96.is_zero() {
        return Err(StateError::SqrtPriceIsZero.into());
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = sqrt_ratio_b_x96 - sqrt_ratio_a_x96;

    if round_up {
        Ok(div_rounding_up(
            mul_div_rounding_up(numerator1, numerator2, sqrt_ratio_b_x96)?,
            sqrt_ratio_a_x96,
        ))
    } else {
        Ok(mul_div(numerator1, numerator2, sqrt_ratio_b_x96)? / sqrt_ratio_a_x96)
    }
}

/// Token1 owed between two sqrt prices at a given liquidity:
/// `L * (sqrt_b - sqrt_a) / 2^96`.
pub fn amount1_delta(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96);
    }
    let liquidity = U256::from(liquidity);

    if round_up {
        mul_div_rounding_up(liquidity, sqrt_ratio_b_x96 - sqrt_ratio_a_x96, Q96)
    } else {
        mul_div(liquidity, sqrt_ratio_b_x96 - sqrt_ratio_a_x96, Q96)
    }
}

/// Signed token0 delta for a signed liquidity change: positive liquidity
/// rounds against the liquidity provider, negative rounds in their favor.
pub fn signed_amount0_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, Error> {
    if liquidity < 0 {
        Ok(-I256::from_raw(amount0_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(amount0_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity as u128,
            true,
        )?))
    }
}

/// Signed token1 delta for a signed liquidity change, with the same
/// rounding convention as [`signed_amount0_delta`].
pub fn signed_amount1_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, MathError> {
    if liquidity < 0 {
        Ok(-I256::from_raw(amount1_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(amount1_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity as u128,
            true,
        )?))
    }
}
