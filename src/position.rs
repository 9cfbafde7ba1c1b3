use crate::FastMap;
use crate::error::PoolError;
use crate::math::fixed_point::X128;
use crate::math::liquidity_math::add_delta;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Identity of a liquidity position: owner plus its price range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub owner: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

/// An owner's liquidity on one range, with its fee entitlement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub liquidity: u128,
    /// Fee growth inside the range as of the last update; the baseline the
    /// next fee accrual is measured from.
    pub fee_growth_inside0_last: X128,
    pub fee_growth_inside1_last: X128,
    /// Fees already credited and withdrawable through `collect`.
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

/// The position table, keyed by (owner, range).
pub type PositionTable = FastMap<PositionKey, PositionInfo>;

impl PositionInfo {
    /// Credits accrued fees against the new inside-growth snapshots and
    /// applies the liquidity change.
    ///
    /// A zero delta is a poke: it refreshes the fee entitlement of an
    /// existing position and is rejected for empty ones.
    pub fn update(
        &mut self,
        liquidity_delta: i128,
        fee_growth_inside0: X128,
        fee_growth_inside1: X128,
    ) -> Result<(), PoolError> {
        let liquidity_next = if liquidity_delta == 0 {
            if self.liquidity == 0 {
                return Err(PoolError::EmptyPositionPoke);
            }
            self.liquidity
        } else {
            add_delta(self.liquidity, liquidity_delta)?
        };

        let owed0 = fee_growth_inside0
            .wrapping_sub(self.fee_growth_inside0_last)
            .owed(self.liquidity)?;
        let owed1 = fee_growth_inside1
            .wrapping_sub(self.fee_growth_inside1_last)
            .owed(self.liquidity)?;

        if liquidity_delta != 0 {
            self.liquidity = liquidity_next;
        }
        self.fee_growth_inside0_last = fee_growth_inside0;
        self.fee_growth_inside1_last = fee_growth_inside1;

        // Wrapping: owners must collect before owed fees hit 2^128.
        self.tokens_owed0 = self.tokens_owed0.wrapping_add(owed0);
        self.tokens_owed1 = self.tokens_owed1.wrapping_add(owed1);

        Ok(())
    }
}
