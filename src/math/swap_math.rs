use crate::FEE_DENOMINATOR;
use crate::error::Error;
use crate::math::math_helpers::{mul_div, mul_div_rounding_up};
use crate::math::sqrt_price_math::{
    amount0_delta, amount1_delta, next_sqrt_price_from_input, next_sqrt_price_from_output,
};
use alloy_primitives::{I256, U256};

/// Outcome of advancing a swap across one price segment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapStep {
    /// Price after the step; equals the target when the segment was fully
    /// consumed.
    pub sqrt_price_next_x96: U256,
    /// Input amount the step requires, excluding fees (rounded up).
    pub amount_in: U256,
    /// Output amount the step produces (rounded down).
    pub amount_out: U256,
    /// Fee charged on the input side of this step.
    pub fee_amount: U256,
}

/// Advances the swap from `sqrt_price_current_x96` toward
/// `sqrt_price_target_x96` at constant `liquidity`, consuming at most
/// `amount_remaining` (positive = exact input budget including fees,
/// negative = exact output request).
///
/// Rounding never favors the swapper: input rounds up, output rounds down,
/// and the price stops short of the target rather than overshooting it.
pub fn compute_swap_step(
    sqrt_price_current_x96: U256,
    sqrt_price_target_x96: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_pips: u32,
) -> Result<SwapStep, Error> {
    let zero_for_one = sqrt_price_current_x96 >= sqrt_price_target_x96;
    let exact_in = amount_remaining >= I256::ZERO;

    let mut step = SwapStep::default();
    let reached_target;

    if exact_in {
        let amount_remaining_less_fee = mul_div(
            amount_remaining.into_raw(),
            U256::from(FEE_DENOMINATOR - fee_pips),
            U256::from(FEE_DENOMINATOR),
        )?;
        step.amount_in = if zero_for_one {
            amount0_delta(
                sqrt_price_target_x96,
                sqrt_price_current_x96,
                liquidity,
                true,
            )?
        } else {
            amount1_delta(
                sqrt_price_current_x96,
                sqrt_price_target_x96,
                liquidity,
                true,
            )?
        };
        reached_target = amount_remaining_less_fee >= step.amount_in;
        step.sqrt_price_next_x96 = if reached_target {
            sqrt_price_target_x96
        } else {
            next_sqrt_price_from_input(
                sqrt_price_current_x96,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?
        };
    } else {
        step.amount_out = if zero_for_one {
            amount1_delta(
                sqrt_price_target_x96,
                sqrt_price_current_x96,
                liquidity,
                false,
            )?
        } else {
            amount0_delta(
                sqrt_price_current_x96,
                sqrt_price_target_x96,
                liquidity,
                false,
            )?
        };
        let requested = amount_remaining.unsigned_abs();
        reached_target = requested >= step.amount_out;
        step.sqrt_price_next_x96 = if reached_target {
            sqrt_price_target_x96
        } else {
            next_sqrt_price_from_output(
                sqrt_price_current_x96,
                liquidity,
                requested,
                zero_for_one,
            )?
        };
    }

    // Settle both legs against the price actually reached. Legs already
    // computed against the target are reused when the target was hit.
    if zero_for_one {
        if !(reached_target && exact_in) {
            step.amount_in = amount0_delta(
                step.sqrt_price_next_x96,
                sqrt_price_current_x96,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            step.amount_out = amount1_delta(
                step.sqrt_price_next_x96,
                sqrt_price_current_x96,
                liquidity,
                false,
            )?;
        }
    } else {
        if !(reached_target && exact_in) {
            step.amount_in = amount1_delta(
                sqrt_price_current_x96,
                step.sqrt_price_next_x96,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            step.amount_out = amount0_delta(
                sqrt_price_current_x96,
                step.sqrt_price_next_x96,
                liquidity,
                false,
            )?;
        }
    }

    // An exact-output request never receives more than it asked for.
    if !exact_in && step.amount_out > amount_remaining.unsigned_abs() {
        step.amount_out = amount_remaining.unsigned_abs();
    }

    step.fee_amount = if exact_in && step.sqrt_price_next_x96 != sqrt_price_target_x96 {
        // The whole fee-inclusive budget was consumed without reaching the
        // target; whatever the curve did not absorb is the fee.
        amount_remaining.into_raw() - step.amount_in
    } else {
        mul_div_rounding_up(
            step.amount_in,
            U256::from(fee_pips),
            U256::from(FEE_DENOMINATOR - fee_pips),
        )?
    };

    Ok(step)
}
