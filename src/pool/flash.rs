use crate::FEE_DENOMINATOR;
use crate::error::{MathError, PoolError};
use crate::events::Event;
use crate::math::fixed_point::X128;
use crate::math::math_helpers::mul_div_rounding_up;
use crate::pool::interface::{PoolCallbacks, TokenLedger};
use crate::pool::state::Pool;
use alloy_primitives::{Address, U256};
use tracing::debug;

impl Pool {
    /// Lends `amount0` / `amount1` for the duration of the callback.
    ///
    /// The callback must return the principal plus a pool-fee-rate premium
    /// on each borrowed side (`F0`/`F1` on shortfall). Whatever is paid
    /// beyond the snapshot — premium and any voluntary overpayment — is
    /// split between the protocol and the LPs' fee growth.
    #[allow(clippy::too_many_arguments)]
    pub fn flash<L: TokenLedger, C: PoolCallbacks<L>>(
        &mut self,
        ledger: &mut L,
        callbacks: &mut C,
        sender: Address,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        data: &[u8],
    ) -> Result<(), PoolError> {
        self.locked_scope(|pool| {
            let liquidity = pool.liquidity;
            if liquidity == 0 {
                return Err(PoolError::NoLiquidity);
            }

            let fee_pips = U256::from(pool.params.fee);
            let fee0 = mul_div_rounding_up(amount0, fee_pips, U256::from(FEE_DENOMINATOR))?;
            let fee1 = mul_div_rounding_up(amount1, fee_pips, U256::from(FEE_DENOMINATOR))?;

            let pool_account = pool.params.pool_address;
            let balance0_before = ledger.balance_of(pool.params.token0, pool_account);
            let balance1_before = ledger.balance_of(pool.params.token1, pool_account);

            if !amount0.is_zero() {
                ledger.transfer_out(pool.params.token0, recipient, amount0)?;
            }
            if !amount1.is_zero() {
                ledger.transfer_out(pool.params.token1, recipient, amount1)?;
            }

            callbacks.on_flash(pool, ledger, fee0, fee1, data)?;

            let balance0_after = ledger.balance_of(pool.params.token0, pool_account);
            let balance1_after = ledger.balance_of(pool.params.token1, pool_account);

            if balance0_before
                .checked_add(fee0)
                .ok_or(MathError::Overflow)?
                > balance0_after
            {
                return Err(PoolError::FlashBalance0);
            }
            if balance1_before
                .checked_add(fee1)
                .ok_or(MathError::Overflow)?
                > balance1_after
            {
                return Err(PoolError::FlashBalance1);
            }

            let paid0 = balance0_after - balance0_before;
            let paid1 = balance1_after - balance1_before;

            if !paid0.is_zero() {
                let fee_protocol0 = pool.slot0.fee_protocol & 0x0f;
                let protocol_share = if fee_protocol0 == 0 {
                    U256::ZERO
                } else {
                    paid0 / U256::from(fee_protocol0)
                };
                if !protocol_share.is_zero() {
                    pool.protocol_fees.token0 = pool
                        .protocol_fees
                        .token0
                        .checked_add(
                            u128::try_from(protocol_share).map_err(|_| MathError::Overflow)?,
                        )
                        .ok_or(MathError::Overflow)?;
                }
                pool.fee_growth_global0 = pool
                    .fee_growth_global0
                    .wrapping_add(X128::from_fee(paid0 - protocol_share, liquidity)?);
            }
            if !paid1.is_zero() {
                let fee_protocol1 = pool.slot0.fee_protocol >> 4;
                let protocol_share = if fee_protocol1 == 0 {
                    U256::ZERO
                } else {
                    paid1 / U256::from(fee_protocol1)
                };
                if !protocol_share.is_zero() {
                    pool.protocol_fees.token1 = pool
                        .protocol_fees
                        .token1
                        .checked_add(
                            u128::try_from(protocol_share).map_err(|_| MathError::Overflow)?,
                        )
                        .ok_or(MathError::Overflow)?;
                }
                pool.fee_growth_global1 = pool
                    .fee_growth_global1
                    .wrapping_add(X128::from_fee(paid1 - protocol_share, liquidity)?);
            }

            debug!(%recipient, %amount0, %amount1, %paid0, %paid1, "flash repaid");
            pool.record(Event::Flash {
                sender,
                recipient,
                amount0,
                amount1,
                paid0,
                paid1,
            });
            Ok(())
        })
    }
}
