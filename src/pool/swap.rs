use crate::error::{MathError, PoolError};
use crate::events::Event;
use crate::math::fixed_point::X128;
use crate::math::liquidity_math::add_delta;
use crate::math::swap_math::compute_swap_step;
use crate::math::tick_bitmap::next_initialized_tick_within_one_word;
use crate::math::tick_math::{
    MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, sqrt_price_at_tick, tick_at_sqrt_price,
};
use crate::pool::interface::{PoolCallbacks, TokenLedger};
use crate::pool::state::Pool;
use crate::tick;
use alloy_primitives::{Address, I256, U256};
use tracing::{debug, trace};

// Values that stay fixed for the whole swap, read once up front.
struct SwapCache {
    liquidity_start: u128,
    block_timestamp: u32,
    // the protocol fee nibble for the input token
    fee_protocol: u8,
    // oracle values at the start of the swap, filled lazily on the first
    // tick crossing
    seconds_per_liquidity_cumulative_x128: X128,
    tick_cumulative: i64,
    computed_latest_observation: bool,
}

// the top level state of the swap, the results of which are recorded at the
// end
struct SwapState {
    // the amount remaining to be swapped in/out of the input/output asset
    amount_specified_remaining: I256,
    // the amount already swapped out/in of the output/input asset
    amount_calculated: I256,
    // current sqrt(price)
    sqrt_price_x96: U256,
    // the tick associated with the current price
    tick: i32,
    // the global fee growth of the input token
    fee_growth_global_x128: X128,
    // amount of input token paid as protocol fee
    protocol_fee: u128,
    // the current liquidity in range
    liquidity: u128,
}

#[derive(Default)]
struct StepComputations {
    // the price at the beginning of the step
    sqrt_price_start_x96: U256,
    // the next tick to swap to from the current tick in the swap direction
    tick_next: i32,
    // whether tick_next is initialized
    initialized: bool,
    // sqrt(price) for the next tick (1/0)
    sqrt_price_next_x96: U256,
    // how much is being swapped in in this step
    amount_in: U256,
    // how much is being swapped out
    amount_out: U256,
    // how much fee is being paid in
    fee_amount: U256,
}

impl Pool {
    /// Swaps token0 for token1 (`zero_for_one`) or the reverse, walking the
    /// tick structure until the specified amount or the price limit is
    /// exhausted.
    ///
    /// `amount_specified` is positive for an exact-input swap (fee
    /// inclusive) and negative for exact output. Output tokens are sent
    /// before the callback runs; the input side is verified afterwards
    /// (`IIA`). Returns the signed (amount0, amount1) balance deltas from
    /// the pool's point of view.
    #[allow(clippy::too_many_arguments)]
    pub fn swap<L: TokenLedger, C: PoolCallbacks<L>>(
        &mut self,
        ledger: &mut L,
        callbacks: &mut C,
        sender: Address,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        data: &[u8],
        time: u64,
    ) -> Result<(I256, I256), PoolError> {
        if amount_specified.is_zero() {
            return Err(PoolError::AmountSpecifiedIsZero);
        }

        self.locked_scope(|pool| {
            let slot0_start = pool.slot0;

            let limit_ok = if zero_for_one {
                sqrt_price_limit_x96 < slot0_start.sqrt_price_x96
                    && sqrt_price_limit_x96 > MIN_SQRT_RATIO
            } else {
                sqrt_price_limit_x96 > slot0_start.sqrt_price_x96
                    && sqrt_price_limit_x96 < MAX_SQRT_RATIO
            };
            if !limit_ok {
                return Err(PoolError::SqrtPriceLimit);
            }

            let exact_input = amount_specified.is_positive();

            let mut cache = SwapCache {
                liquidity_start: pool.liquidity,
                block_timestamp: Pool::block_timestamp(time),
                fee_protocol: if zero_for_one {
                    slot0_start.fee_protocol & 0x0f
                } else {
                    slot0_start.fee_protocol >> 4
                },
                seconds_per_liquidity_cumulative_x128: X128::ZERO,
                tick_cumulative: 0,
                computed_latest_observation: false,
            };

            let mut state = SwapState {
                amount_specified_remaining: amount_specified,
                amount_calculated: I256::ZERO,
                sqrt_price_x96: slot0_start.sqrt_price_x96,
                tick: slot0_start.tick,
                fee_growth_global_x128: if zero_for_one {
                    pool.fee_growth_global0
                } else {
                    pool.fee_growth_global1
                },
                protocol_fee: 0,
                liquidity: cache.liquidity_start,
            };

            while !state.amount_specified_remaining.is_zero()
                && state.sqrt_price_x96 != sqrt_price_limit_x96
            {
                let mut step = StepComputations {
                    sqrt_price_start_x96: state.sqrt_price_x96,
                    ..Default::default()
                };

                (step.tick_next, step.initialized) = next_initialized_tick_within_one_word(
                    &pool.bitmap,
                    state.tick,
                    pool.params.tick_spacing,
                    zero_for_one,
                )?;
                step.tick_next = step.tick_next.clamp(MIN_TICK, MAX_TICK);
                step.sqrt_price_next_x96 = sqrt_price_at_tick(step.tick_next)?;

                // never step past the overall price limit
                let step_target = if zero_for_one {
                    step.sqrt_price_next_x96.max(sqrt_price_limit_x96)
                } else {
                    step.sqrt_price_next_x96.min(sqrt_price_limit_x96)
                };

                let computed = compute_swap_step(
                    state.sqrt_price_x96,
                    step_target,
                    state.liquidity,
                    state.amount_specified_remaining,
                    pool.params.fee,
                )?;
                state.sqrt_price_x96 = computed.sqrt_price_next_x96;
                step.amount_in = computed.amount_in;
                step.amount_out = computed.amount_out;
                step.fee_amount = computed.fee_amount;

                if exact_input {
                    state.amount_specified_remaining -=
                        I256::from_raw(step.amount_in + step.fee_amount);
                    state.amount_calculated -= I256::from_raw(step.amount_out);
                } else {
                    state.amount_specified_remaining += I256::from_raw(step.amount_out);
                    state.amount_calculated += I256::from_raw(step.amount_in + step.fee_amount);
                }

                // the protocol takes its cut off the top of the step fee
                if cache.fee_protocol > 0 {
                    let delta = step.fee_amount / U256::from(cache.fee_protocol);
                    step.fee_amount -= delta;
                    state.protocol_fee = state
                        .protocol_fee
                        .checked_add(u128::try_from(delta).map_err(|_| MathError::Overflow)?)
                        .ok_or(MathError::Overflow)?;
                }

                if state.liquidity > 0 {
                    state.fee_growth_global_x128 = state
                        .fee_growth_global_x128
                        .wrapping_add(X128::from_fee(step.fee_amount, state.liquidity)?);
                }

                if state.sqrt_price_x96 == step.sqrt_price_next_x96 {
                    // reached the boundary: cross the tick if it carries
                    // liquidity
                    if step.initialized {
                        if !cache.computed_latest_observation {
                            (
                                cache.tick_cumulative,
                                cache.seconds_per_liquidity_cumulative_x128,
                            ) = pool.oracle.observe_single(
                                cache.block_timestamp,
                                0,
                                slot0_start.tick,
                                slot0_start.observation_index,
                                cache.liquidity_start,
                                slot0_start.observation_cardinality,
                            )?;
                            cache.computed_latest_observation = true;
                        }

                        let (global0, global1) = if zero_for_one {
                            (state.fee_growth_global_x128, pool.fee_growth_global1)
                        } else {
                            (pool.fee_growth_global0, state.fee_growth_global_x128)
                        };
                        let mut liquidity_net = tick::cross(
                            &mut pool.ticks,
                            step.tick_next,
                            global0,
                            global1,
                            cache.seconds_per_liquidity_cumulative_x128,
                            cache.tick_cumulative,
                            cache.block_timestamp,
                        );
                        if zero_for_one {
                            liquidity_net =
                                liquidity_net.checked_neg().ok_or(MathError::Overflow)?;
                        }
                        state.liquidity = add_delta(state.liquidity, liquidity_net)?;
                        trace!(tick = step.tick_next, liquidity = state.liquidity, "crossed tick");
                    }

                    state.tick = if zero_for_one {
                        step.tick_next - 1
                    } else {
                        step.tick_next
                    };
                } else if state.sqrt_price_x96 != step.sqrt_price_start_x96 {
                    // stopped mid-tick; recompute the tick from the price
                    state.tick = tick_at_sqrt_price(state.sqrt_price_x96)?;
                }
            }

            // a tick move is an oracle-worthy data point
            if state.tick != slot0_start.tick {
                let (observation_index, observation_cardinality) = pool.oracle.write(
                    slot0_start.observation_index,
                    cache.block_timestamp,
                    slot0_start.tick,
                    cache.liquidity_start,
                    slot0_start.observation_cardinality,
                    slot0_start.observation_cardinality_next,
                );
                pool.slot0.sqrt_price_x96 = state.sqrt_price_x96;
                pool.slot0.tick = state.tick;
                pool.slot0.observation_index = observation_index;
                pool.slot0.observation_cardinality = observation_cardinality;
            } else {
                pool.slot0.sqrt_price_x96 = state.sqrt_price_x96;
            }

            if cache.liquidity_start != state.liquidity {
                pool.liquidity = state.liquidity;
            }

            if zero_for_one {
                pool.fee_growth_global0 = state.fee_growth_global_x128;
                if state.protocol_fee > 0 {
                    pool.protocol_fees.token0 = pool
                        .protocol_fees
                        .token0
                        .checked_add(state.protocol_fee)
                        .ok_or(MathError::Overflow)?;
                }
            } else {
                pool.fee_growth_global1 = state.fee_growth_global_x128;
                if state.protocol_fee > 0 {
                    pool.protocol_fees.token1 = pool
                        .protocol_fees
                        .token1
                        .checked_add(state.protocol_fee)
                        .ok_or(MathError::Overflow)?;
                }
            }

            let (amount0, amount1) = if zero_for_one == exact_input {
                (
                    amount_specified - state.amount_specified_remaining,
                    state.amount_calculated,
                )
            } else {
                (
                    state.amount_calculated,
                    amount_specified - state.amount_specified_remaining,
                )
            };

            // flash accounting: pay the output out first, then let the
            // callback source the input, then verify it arrived
            let pool_account = pool.params.pool_address;
            if zero_for_one {
                if amount1.is_negative() {
                    ledger.transfer_out(pool.params.token1, recipient, (-amount1).into_raw())?;
                }
                let balance0_before = ledger.balance_of(pool.params.token0, pool_account);
                callbacks.on_swap(pool, ledger, amount0, amount1, data)?;
                let expected = balance0_before
                    .checked_add(amount0.into_raw())
                    .ok_or(MathError::Overflow)?;
                if ledger.balance_of(pool.params.token0, pool_account) < expected {
                    return Err(PoolError::InsufficientInput);
                }
            } else {
                if amount0.is_negative() {
                    ledger.transfer_out(pool.params.token0, recipient, (-amount0).into_raw())?;
                }
                let balance1_before = ledger.balance_of(pool.params.token1, pool_account);
                callbacks.on_swap(pool, ledger, amount0, amount1, data)?;
                let expected = balance1_before
                    .checked_add(amount1.into_raw())
                    .ok_or(MathError::Overflow)?;
                if ledger.balance_of(pool.params.token1, pool_account) < expected {
                    return Err(PoolError::InsufficientInput);
                }
            }

            debug!(
                %sender,
                zero_for_one,
                %amount0,
                %amount1,
                tick = pool.slot0.tick,
                "swap settled"
            );
            pool.record(Event::Swap {
                sender,
                recipient,
                amount0,
                amount1,
                sqrt_price_x96: pool.slot0.sqrt_price_x96,
                liquidity: pool.liquidity,
                tick: pool.slot0.tick,
            });
            Ok((amount0, amount1))
        })
    }
}
