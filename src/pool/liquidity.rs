use crate::error::{MathError, PoolError};
use crate::events::Event;
use crate::math::liquidity_math::add_delta;
use crate::math::sqrt_price_math::{signed_amount0_delta, signed_amount1_delta};
use crate::math::tick_bitmap;
use crate::math::tick_math::sqrt_price_at_tick;
use crate::pool::interface::{PoolCallbacks, TokenLedger};
use crate::pool::state::Pool;
use crate::position::PositionKey;
use crate::tick;
use alloy_primitives::{Address, I256, U256};
use tracing::debug;

impl Pool {
    /// Adds `amount` liquidity on `[tick_lower, tick_upper]` for
    /// `recipient`, pulling payment through the mint callback.
    ///
    /// The callback must pay at least the returned token amounts into the
    /// pool; the balances are verified afterwards (`M0`/`M1`).
    #[allow(clippy::too_many_arguments)]
    pub fn mint<L: TokenLedger, C: PoolCallbacks<L>>(
        &mut self,
        ledger: &mut L,
        callbacks: &mut C,
        sender: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        data: &[u8],
        time: u64,
    ) -> Result<(U256, U256), PoolError> {
        if amount == 0 {
            return Err(PoolError::AmountSpecifiedIsZero);
        }
        let liquidity_delta = i128::try_from(amount).map_err(|_| MathError::Overflow)?;

        self.locked_scope(|pool| {
            let now = Pool::block_timestamp(time);
            let (amount0_int, amount1_int) =
                pool.modify_position(recipient, tick_lower, tick_upper, liquidity_delta, now)?;

            // positive by construction: liquidity was added
            let amount0 = amount0_int.into_raw();
            let amount1 = amount1_int.into_raw();

            let pool_account = pool.params.pool_address;
            let balance0_before = (!amount0.is_zero())
                .then(|| ledger.balance_of(pool.params.token0, pool_account));
            let balance1_before = (!amount1.is_zero())
                .then(|| ledger.balance_of(pool.params.token1, pool_account));

            callbacks.on_mint(pool, ledger, amount0, amount1, data)?;

            if let Some(before) = balance0_before {
                let expected = before.checked_add(amount0).ok_or(MathError::Overflow)?;
                if ledger.balance_of(pool.params.token0, pool_account) < expected {
                    return Err(PoolError::MintBalance0);
                }
            }
            if let Some(before) = balance1_before {
                let expected = before.checked_add(amount1).ok_or(MathError::Overflow)?;
                if ledger.balance_of(pool.params.token1, pool_account) < expected {
                    return Err(PoolError::MintBalance1);
                }
            }

            debug!(%recipient, tick_lower, tick_upper, amount, "minted liquidity");
            pool.record(Event::Mint {
                sender,
                owner: recipient,
                tick_lower,
                tick_upper,
                liquidity: amount,
                amount0,
                amount1,
            });
            Ok((amount0, amount1))
        })
    }

    /// Removes `amount` liquidity from the sender's position and credits
    /// the freed tokens (plus nothing else) as withdrawable.
    ///
    /// Tokens are not transferred; they accumulate on the position until
    /// [`Pool::collect`]. A zero amount pokes the position, refreshing its
    /// fee entitlement.
    pub fn burn(
        &mut self,
        sender: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        time: u64,
    ) -> Result<(U256, U256), PoolError> {
        let liquidity_delta = i128::try_from(amount).map_err(|_| MathError::Overflow)?;

        self.locked_scope(|pool| {
            let now = Pool::block_timestamp(time);
            let (amount0_int, amount1_int) =
                pool.modify_position(sender, tick_lower, tick_upper, -liquidity_delta, now)?;

            let amount0 = (-amount0_int).into_raw();
            let amount1 = (-amount1_int).into_raw();

            if !amount0.is_zero() || !amount1.is_zero() {
                let owed0 = u128::try_from(amount0).map_err(|_| MathError::Overflow)?;
                let owed1 = u128::try_from(amount1).map_err(|_| MathError::Overflow)?;
                let key = PositionKey {
                    owner: sender,
                    tick_lower,
                    tick_upper,
                };
                // the position exists: modify_position just touched it
                if let Some(position) = pool.positions.get_mut(&key) {
                    position.tokens_owed0 = position.tokens_owed0.wrapping_add(owed0);
                    position.tokens_owed1 = position.tokens_owed1.wrapping_add(owed1);
                }
            }

            debug!(%sender, tick_lower, tick_upper, amount, "burned liquidity");
            pool.record(Event::Burn {
                owner: sender,
                tick_lower,
                tick_upper,
                liquidity: amount,
                amount0,
                amount1,
            });
            Ok((amount0, amount1))
        })
    }

    /// Pays out tokens owed to the sender's position, clamped to what has
    /// accrued through burns and fees.
    #[allow(clippy::too_many_arguments)]
    pub fn collect<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        sender: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), PoolError> {
        self.locked_scope(|pool| {
            let key = PositionKey {
                owner: sender,
                tick_lower,
                tick_upper,
            };
            let (amount0, amount1) = match pool.positions.get_mut(&key) {
                Some(position) => {
                    let amount0 = amount0_requested.min(position.tokens_owed0);
                    let amount1 = amount1_requested.min(position.tokens_owed1);
                    position.tokens_owed0 -= amount0;
                    position.tokens_owed1 -= amount1;
                    (amount0, amount1)
                }
                None => (0, 0),
            };

            if amount0 > 0 {
                ledger.transfer_out(pool.params.token0, recipient, U256::from(amount0))?;
            }
            if amount1 > 0 {
                ledger.transfer_out(pool.params.token1, recipient, U256::from(amount1))?;
            }

            pool.record(Event::Collect {
                owner: sender,
                recipient,
                tick_lower,
                tick_upper,
                amount0,
                amount1,
            });
            Ok((amount0, amount1))
        })
    }

    /// Applies a liquidity change to the position and tick state, returning
    /// the signed token amounts the change is worth at the current price.
    ///
    /// Positive amounts are owed to the pool, negative to the owner.
    pub(crate) fn modify_position(
        &mut self,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
        time: u32,
    ) -> Result<(I256, I256), PoolError> {
        self.check_ticks(tick_lower, tick_upper)?;
        self.update_position(owner, tick_lower, tick_upper, liquidity_delta, time)?;

        let mut amount0 = I256::ZERO;
        let mut amount1 = I256::ZERO;

        if liquidity_delta != 0 {
            let tick = self.slot0.tick;
            if tick < tick_lower {
                // range entirely above the price: all value is in token0
                amount0 = signed_amount0_delta(
                    sqrt_price_at_tick(tick_lower)?,
                    sqrt_price_at_tick(tick_upper)?,
                    liquidity_delta,
                )?;
            } else if tick < tick_upper {
                // in range: the active-liquidity change is an oracle-worthy
                // data point, recorded before liquidity moves
                let (index, cardinality) = self.oracle.write(
                    self.slot0.observation_index,
                    time,
                    tick,
                    self.liquidity,
                    self.slot0.observation_cardinality,
                    self.slot0.observation_cardinality_next,
                );
                self.slot0.observation_index = index;
                self.slot0.observation_cardinality = cardinality;

                amount0 = signed_amount0_delta(
                    self.slot0.sqrt_price_x96,
                    sqrt_price_at_tick(tick_upper)?,
                    liquidity_delta,
                )?;
                amount1 = signed_amount1_delta(
                    sqrt_price_at_tick(tick_lower)?,
                    self.slot0.sqrt_price_x96,
                    liquidity_delta,
                )?;

                self.liquidity = add_delta(self.liquidity, liquidity_delta)?;
            } else {
                // range entirely below the price: all value is in token1
                amount1 = signed_amount1_delta(
                    sqrt_price_at_tick(tick_lower)?,
                    sqrt_price_at_tick(tick_upper)?,
                    liquidity_delta,
                )?;
            }
        }

        Ok((amount0, amount1))
    }

    /// Updates the boundary ticks, the bitmap and the position's fee
    /// entitlement for a liquidity change.
    fn update_position(
        &mut self,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
        time: u32,
    ) -> Result<(), PoolError> {
        let tick_current = self.slot0.tick;

        let mut flipped_lower = false;
        let mut flipped_upper = false;

        if liquidity_delta != 0 {
            let (tick_cumulative, seconds_per_liquidity) = self.oracle.observe_single(
                time,
                0,
                tick_current,
                self.slot0.observation_index,
                self.liquidity,
                self.slot0.observation_cardinality,
            )?;

            flipped_lower = tick::update(
                &mut self.ticks,
                tick_lower,
                tick_current,
                liquidity_delta,
                self.fee_growth_global0,
                self.fee_growth_global1,
                seconds_per_liquidity,
                tick_cumulative,
                time,
                false,
                self.max_liquidity_per_tick,
            )?;
            flipped_upper = tick::update(
                &mut self.ticks,
                tick_upper,
                tick_current,
                liquidity_delta,
                self.fee_growth_global0,
                self.fee_growth_global1,
                seconds_per_liquidity,
                tick_cumulative,
                time,
                true,
                self.max_liquidity_per_tick,
            )?;

            if flipped_lower {
                tick_bitmap::flip_tick(&mut self.bitmap, tick_lower, self.params.tick_spacing)?;
            }
            if flipped_upper {
                tick_bitmap::flip_tick(&mut self.bitmap, tick_upper, self.params.tick_spacing)?;
            }
        }

        let (fee_growth_inside0, fee_growth_inside1) = tick::get_fee_growth_inside(
            &self.ticks,
            tick_lower,
            tick_upper,
            tick_current,
            self.fee_growth_global0,
            self.fee_growth_global1,
        );

        let key = PositionKey {
            owner,
            tick_lower,
            tick_upper,
        };
        self.positions
            .entry(key)
            .or_default()
            .update(liquidity_delta, fee_growth_inside0, fee_growth_inside1)?;

        // ticks emptied by a withdrawal are dropped entirely
        if liquidity_delta < 0 {
            if flipped_lower {
                tick::clear(&mut self.ticks, tick_lower);
            }
            if flipped_upper {
                tick::clear(&mut self.ticks, tick_upper);
            }
        }

        Ok(())
    }
}
