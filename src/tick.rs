use crate::FastMap;
use crate::error::PoolError;
use crate::math::fixed_point::X128;
use crate::math::liquidity_math::add_delta;
use crate::math::tick_math::{MAX_TICK, MIN_TICK};
use serde::{Deserialize, Serialize};

/// Per-tick bookkeeping for every initialized tick.
///
/// The `*_outside` accumulators track growth on the side of this tick away
/// from the current tick. They only have relative meaning: their absolute
/// value depends on when the tick was initialized, and they flip on every
/// crossing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    /// Total position liquidity referencing this tick from either side.
    pub liquidity_gross: u128,
    /// Net liquidity added when the tick is crossed left to right.
    pub liquidity_net: i128,
    pub fee_growth_outside0: X128,
    pub fee_growth_outside1: X128,
    pub tick_cumulative_outside: i64,
    pub seconds_per_liquidity_outside_x128: X128,
    pub seconds_outside: u32,
    pub initialized: bool,
}

/// Sparse tick table; a tick is present iff it is initialized or mid-update.
pub type TickTable = FastMap<i32, TickInfo>;

/// Most liquidity a single tick may reference, chosen so the sum over every
/// usable tick cannot overflow a u128.
pub fn max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let min_tick = (MIN_TICK / tick_spacing) * tick_spacing;
    let max_tick = (MAX_TICK / tick_spacing) * tick_spacing;
    let num_ticks = ((max_tick - min_tick) / tick_spacing) as u128 + 1;
    u128::MAX / num_ticks
}

/// Applies a liquidity change at a position boundary tick, returning whether
/// the tick flipped between initialized and uninitialized.
///
/// A tick flipping to initialized at or below the current tick seeds its
/// outside accumulators from the running globals, so that "outside" reads as
/// zero growth since initialization on the far side.
#[allow(clippy::too_many_arguments)]
pub fn update(
    ticks: &mut TickTable,
    tick: i32,
    tick_current: i32,
    liquidity_delta: i128,
    fee_growth_global0: X128,
    fee_growth_global1: X128,
    seconds_per_liquidity_cumulative_x128: X128,
    tick_cumulative: i64,
    time: u32,
    upper: bool,
    max_liquidity: u128,
) -> Result<bool, PoolError> {
    let info = ticks.entry(tick).or_default();

    let liquidity_gross_before = info.liquidity_gross;
    let liquidity_gross_after = add_delta(liquidity_gross_before, liquidity_delta)?;

    if liquidity_gross_after > max_liquidity {
        return Err(PoolError::LiquidityGrossOverflow);
    }

    let flipped = (liquidity_gross_after == 0) != (liquidity_gross_before == 0);

    if liquidity_gross_before == 0 {
        // All growth before a tick is initialized is taken to have happened
        // below it.
        if tick <= tick_current {
            info.fee_growth_outside0 = fee_growth_global0;
            info.fee_growth_outside1 = fee_growth_global1;
            info.seconds_per_liquidity_outside_x128 = seconds_per_liquidity_cumulative_x128;
            info.tick_cumulative_outside = tick_cumulative;
            info.seconds_outside = time;
        }
        info.initialized = true;
    }

    info.liquidity_gross = liquidity_gross_after;

    // Crossing the lower (upper) boundary left to right adds (removes) the
    // position's liquidity.
    info.liquidity_net = if upper {
        info.liquidity_net
            .checked_sub(liquidity_delta)
            .ok_or(crate::error::MathError::Overflow)?
    } else {
        info.liquidity_net
            .checked_add(liquidity_delta)
            .ok_or(crate::error::MathError::Overflow)?
    };

    Ok(flipped)
}

/// Transitions over `tick` during a swap: flips every outside accumulator to
/// the other side and returns the net liquidity to apply.
pub fn cross(
    ticks: &mut TickTable,
    tick: i32,
    fee_growth_global0: X128,
    fee_growth_global1: X128,
    seconds_per_liquidity_cumulative_x128: X128,
    tick_cumulative: i64,
    time: u32,
) -> i128 {
    let info = ticks.entry(tick).or_default();
    info.fee_growth_outside0 = fee_growth_global0.wrapping_sub(info.fee_growth_outside0);
    info.fee_growth_outside1 = fee_growth_global1.wrapping_sub(info.fee_growth_outside1);
    info.seconds_per_liquidity_outside_x128 = seconds_per_liquidity_cumulative_x128
        .wrapping_sub(info.seconds_per_liquidity_outside_x128);
    info.tick_cumulative_outside = tick_cumulative.wrapping_sub(info.tick_cumulative_outside);
    info.seconds_outside = time.wrapping_sub(info.seconds_outside);
    info.liquidity_net
}

/// Drops a tick that flipped to uninitialized.
pub fn clear(ticks: &mut TickTable, tick: i32) {
    ticks.remove(&tick);
}

/// Fee growth per unit of liquidity accumulated while the price was inside
/// `[tick_lower, tick_upper]`: global minus the growth below the range and
/// above it, in modular Q128.128 arithmetic.
pub fn get_fee_growth_inside(
    ticks: &TickTable,
    tick_lower: i32,
    tick_upper: i32,
    tick_current: i32,
    fee_growth_global0: X128,
    fee_growth_global1: X128,
) -> (X128, X128) {
    let default = TickInfo::default();
    let lower = ticks.get(&tick_lower).unwrap_or(&default);
    let upper = ticks.get(&tick_upper).unwrap_or(&default);

    let (below0, below1) = if tick_current >= tick_lower {
        (lower.fee_growth_outside0, lower.fee_growth_outside1)
    } else {
        (
            fee_growth_global0.wrapping_sub(lower.fee_growth_outside0),
            fee_growth_global1.wrapping_sub(lower.fee_growth_outside1),
        )
    };

    let (above0, above1) = if tick_current < tick_upper {
        (upper.fee_growth_outside0, upper.fee_growth_outside1)
    } else {
        (
            fee_growth_global0.wrapping_sub(upper.fee_growth_outside0),
            fee_growth_global1.wrapping_sub(upper.fee_growth_outside1),
        )
    };

    (
        fee_growth_global0.wrapping_sub(below0).wrapping_sub(above0),
        fee_growth_global1.wrapping_sub(below1).wrapping_sub(above1),
    )
}
