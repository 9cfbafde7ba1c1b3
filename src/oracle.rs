use crate::error::PoolError;
use crate::math::fixed_point::X128;
use serde::{Deserialize, Serialize};

/// Hard cap on the observation ring.
pub const MAX_CARDINALITY: u16 = 65535;

/// One point on the pool's time-weighted accumulator curves.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Truncated to 32 bits; all ordering is wrap-aware.
    pub block_timestamp: u32,
    /// Integral of the tick over time.
    pub tick_cumulative: i64,
    /// Integral of 1 / max(liquidity, 1) over time, Q128.128.
    pub seconds_per_liquidity_cumulative_x128: X128,
    pub initialized: bool,
}

impl Observation {
    /// Advances this observation to `block_timestamp` given the tick and
    /// liquidity that were active since it was recorded.
    fn transform(&self, block_timestamp: u32, tick: i32, liquidity: u128) -> Observation {
        let elapsed = block_timestamp.wrapping_sub(self.block_timestamp);
        Observation {
            block_timestamp,
            tick_cumulative: self
                .tick_cumulative
                .wrapping_add(tick as i64 * elapsed as i64),
            seconds_per_liquidity_cumulative_x128: self
                .seconds_per_liquidity_cumulative_x128
                .wrapping_add(X128::per_liquidity(elapsed, liquidity)),
            initialized: true,
        }
    }
}

/// Ring buffer of observations. The pool owns the cursor and cardinalities
/// in `Slot0`; the ring itself only stores slots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Oracle {
    slots: Vec<Observation>,
}

/// Wrap-aware `a <= b` for u32 timestamps, evaluated relative to `time`
/// (the most recent moment observed). Timestamps logically "ahead" of
/// `time` are treated as belonging to the previous u32 epoch.
fn lte(time: u32, a: u32, b: u32) -> bool {
    if a <= time && b <= time {
        return a <= b;
    }
    let a_adjusted = if a > time { a as u64 } else { a as u64 + (1 << 32) };
    let b_adjusted = if b > time { b as u64 } else { b as u64 + (1 << 32) };
    a_adjusted <= b_adjusted
}

impl Oracle {
    /// Writes the first slot and returns the initial
    /// (cardinality, cardinality_next) pair.
    pub fn initialize(&mut self, time: u32) -> (u16, u16) {
        self.slots.clear();
        self.slots.push(Observation {
            block_timestamp: time,
            tick_cumulative: 0,
            seconds_per_liquidity_cumulative_x128: X128::ZERO,
            initialized: true,
        });
        (1, 1)
    }

    /// Allocates ring slots up to `next`, returning the cardinality target
    /// actually in effect afterwards.
    ///
    /// New slots carry a nonzero timestamp sentinel but stay uninitialized;
    /// they become live only when the write cursor reaches them.
    pub fn grow(&mut self, current: u16, next: u16) -> u16 {
        if next <= current || current == 0 {
            return current;
        }
        for _ in current..next {
            self.slots.push(Observation {
                block_timestamp: 1,
                ..Default::default()
            });
        }
        next
    }

    /// Appends an observation at `time`, rotating the cursor and expanding
    /// into grown slots when the cursor wraps. Writing twice per timestamp
    /// is a no-op. Returns the updated (index, cardinality).
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &mut self,
        index: u16,
        time: u32,
        tick: i32,
        liquidity: u128,
        cardinality: u16,
        cardinality_next: u16,
    ) -> (u16, u16) {
        let last = self.slots[index as usize];
        if last.block_timestamp == time {
            return (index, cardinality);
        }

        // The ring only expands when the cursor is about to wrap, so grown
        // slots join in timestamp order.
        let cardinality_updated = if cardinality_next > cardinality && index == cardinality - 1 {
            cardinality_next
        } else {
            cardinality
        };

        let index_updated = (index + 1) % cardinality_updated;
        self.slots[index_updated as usize] = last.transform(time, tick, liquidity);
        (index_updated, cardinality_updated)
    }

    /// Finds the observations bracketing `target`, extrapolating past the
    /// newest one with the live tick and liquidity when necessary.
    fn surrounding(
        &self,
        time: u32,
        target: u32,
        tick: i32,
        index: u16,
        liquidity: u128,
        cardinality: u16,
    ) -> Result<(Observation, Observation), PoolError> {
        let mut before_or_at = self.slots[index as usize];

        if lte(time, before_or_at.block_timestamp, target) {
            if before_or_at.block_timestamp == target {
                // exact hit; the right bound is never inspected
                return Ok((before_or_at, Observation::default()));
            }
            return Ok((before_or_at, before_or_at.transform(target, tick, liquidity)));
        }

        // Oldest slot still stored: one past the cursor, or slot 0 while the
        // ring has not wrapped yet.
        before_or_at = self.slots[((index + 1) % cardinality) as usize];
        if !before_or_at.initialized {
            before_or_at = self.slots[0];
        }

        if !lte(time, before_or_at.block_timestamp, target) {
            return Err(PoolError::StaleObservation);
        }

        Ok(self.binary_search(time, target, index, cardinality))
    }

    /// Ring binary search for the pair (before-or-at, at-or-after) around
    /// `target`. Callers guarantee the target lies within stored history.
    fn binary_search(
        &self,
        time: u32,
        target: u32,
        index: u16,
        cardinality: u16,
    ) -> (Observation, Observation) {
        let cardinality = cardinality as u32;
        let mut l = (index as u32 + 1) % cardinality;
        let mut r = l + cardinality - 1;

        loop {
            let i = (l + r) / 2;

            let before_or_at = self.slots[(i % cardinality) as usize];
            if !before_or_at.initialized {
                // hit an unpopulated grown slot; everything stored is above
                l = i + 1;
                continue;
            }

            let at_or_after = self.slots[((i + 1) % cardinality) as usize];
            let target_at_or_after = lte(time, before_or_at.block_timestamp, target);

            if target_at_or_after && lte(time, target, at_or_after.block_timestamp) {
                return (before_or_at, at_or_after);
            }

            if !target_at_or_after {
                r = i - 1;
            } else {
                l = i + 1;
            }
        }
    }

    /// Accumulator values as of `seconds_ago` before `time`.
    ///
    /// `seconds_ago == 0` reads the live accumulators; older targets are
    /// answered by interpolating between stored observations. Fails with
    /// `OLD` when the target predates the oldest stored slot.
    pub fn observe_single(
        &self,
        time: u32,
        seconds_ago: u32,
        tick: i32,
        index: u16,
        liquidity: u128,
        cardinality: u16,
    ) -> Result<(i64, X128), PoolError> {
        if seconds_ago == 0 {
            let mut last = self.slots[index as usize];
            if last.block_timestamp != time {
                last = last.transform(time, tick, liquidity);
            }
            return Ok((
                last.tick_cumulative,
                last.seconds_per_liquidity_cumulative_x128,
            ));
        }

        let target = time.wrapping_sub(seconds_ago);
        let (before_or_at, at_or_after) =
            self.surrounding(time, target, tick, index, liquidity, cardinality)?;

        if target == before_or_at.block_timestamp {
            return Ok((
                before_or_at.tick_cumulative,
                before_or_at.seconds_per_liquidity_cumulative_x128,
            ));
        }
        if target == at_or_after.block_timestamp {
            return Ok((
                at_or_after.tick_cumulative,
                at_or_after.seconds_per_liquidity_cumulative_x128,
            ));
        }

        // strictly between: interpolate both accumulators linearly
        let observation_delta = at_or_after
            .block_timestamp
            .wrapping_sub(before_or_at.block_timestamp);
        let target_delta = target.wrapping_sub(before_or_at.block_timestamp);

        let tick_cumulative = before_or_at.tick_cumulative.wrapping_add(
            at_or_after
                .tick_cumulative
                .wrapping_sub(before_or_at.tick_cumulative)
                / observation_delta as i64
                * target_delta as i64,
        );
        let seconds_per_liquidity = before_or_at
            .seconds_per_liquidity_cumulative_x128
            .wrapping_add(X128(
                at_or_after
                    .seconds_per_liquidity_cumulative_x128
                    .wrapping_sub(before_or_at.seconds_per_liquidity_cumulative_x128)
                    .0
                    .wrapping_mul(alloy_primitives::U256::from(target_delta))
                    / alloy_primitives::U256::from(observation_delta),
            ));

        Ok((tick_cumulative, seconds_per_liquidity))
    }

    /// Batch form of [`Self::observe_single`].
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &self,
        time: u32,
        seconds_agos: &[u32],
        tick: i32,
        index: u16,
        liquidity: u128,
        cardinality: u16,
    ) -> Result<Vec<(i64, X128)>, PoolError> {
        seconds_agos
            .iter()
            .map(|&ago| self.observe_single(time, ago, tick, index, liquidity, cardinality))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn fresh(time: u32) -> (Oracle, u16, u16, u16) {
        let mut oracle = Oracle::default();
        let (cardinality, cardinality_next) = oracle.initialize(time);
        (oracle, 0, cardinality, cardinality_next)
    }

    #[test]
    fn initialize_seeds_slot_zero() {
        let (oracle, _, cardinality, next) = fresh(5);
        assert_eq!((cardinality, next), (1, 1));
        let (tick_cum, spl) = oracle.observe_single(5, 0, 0, 0, 0, 1).unwrap();
        assert_eq!(tick_cum, 0);
        assert_eq!(spl, X128::ZERO);
    }

    #[test]
    fn grow_is_monotonic_and_idempotent() {
        let (mut oracle, _, _, next) = fresh(0);
        let next = oracle.grow(next, 5);
        assert_eq!(next, 5);
        assert_eq!(oracle.grow(next, 3), 5);
        assert_eq!(oracle.grow(next, 5), 5);
    }

    #[test]
    fn write_skips_same_timestamp() {
        let (mut oracle, index, cardinality, next) = fresh(10);
        let (index, cardinality) = oracle.write(index, 10, 3, 4, cardinality, next);
        assert_eq!((index, cardinality), (0, 1));
    }

    #[test]
    fn single_slot_ring_overwrites_in_place() {
        let (mut oracle, index, cardinality, next) = fresh(0);
        let (index, cardinality) = oracle.write(index, 7, 2, 5, cardinality, next);
        assert_eq!((index, cardinality), (0, 1));
        let (tick_cum, _) = oracle.observe_single(7, 0, 2, index, 5, cardinality).unwrap();
        assert_eq!(tick_cum, 14);
    }

    #[test]
    fn write_expands_into_grown_slots_at_the_wrap() {
        let (mut oracle, index, cardinality, _) = fresh(0);
        let next = oracle.grow(1, 3);

        let (index, cardinality) = oracle.write(index, 10, 1, 1, cardinality, next);
        assert_eq!((index, cardinality), (1, 3));
        let (index, cardinality) = oracle.write(index, 20, 1, 1, cardinality, next);
        assert_eq!((index, cardinality), (2, 3));
        // wraps back over slot 0
        let (index, cardinality) = oracle.write(index, 30, 1, 1, cardinality, next);
        assert_eq!((index, cardinality), (0, 3));
    }

    #[test]
    fn observe_interpolates_between_writes() {
        let (mut oracle, index, cardinality, _) = fresh(0);
        let next = oracle.grow(1, 4);
        // tick 6 active over [0, 10), tick -2 over [10, 30)
        let (index, cardinality) = oracle.write(index, 10, 6, 1, cardinality, next);
        let (index, cardinality) = oracle.write(index, 30, -2, 1, cardinality, next);

        // at t=20, halfway between the stored points
        let (tick_cum, _) = oracle
            .observe_single(30, 10, -2, index, 1, cardinality)
            .unwrap();
        assert_eq!(tick_cum, 60 + (-2) * 10);

        // exact hits on both stored points
        let (tick_cum, _) = oracle
            .observe_single(30, 20, -2, index, 1, cardinality)
            .unwrap();
        assert_eq!(tick_cum, 60);
        let (tick_cum, _) = oracle
            .observe_single(30, 0, -2, index, 1, cardinality)
            .unwrap();
        assert_eq!(tick_cum, 60 - 2 * 20);
    }

    #[test]
    fn observe_extrapolates_past_the_newest_write() {
        let (mut oracle, index, cardinality, next) = fresh(0);
        let (index, cardinality) = oracle.write(index, 10, 4, 1, cardinality, next);
        // ring holds only t=10; ask at t=15 with live tick 9
        let (tick_cum, _) = oracle
            .observe_single(15, 0, 9, index, 1, cardinality)
            .unwrap();
        assert_eq!(tick_cum, 40 + 9 * 5);
        // and a target between the newest write and now
        let (tick_cum, _) = oracle
            .observe_single(15, 3, 9, index, 1, cardinality)
            .unwrap();
        assert_eq!(tick_cum, 40 + 9 * 2);
    }

    #[test]
    fn observe_rejects_targets_older_than_history() {
        let (mut oracle, index, cardinality, next) = fresh(100);
        let (index, cardinality) = oracle.write(index, 110, 4, 1, cardinality, next);
        // cardinality 1: only t=110 is retained, t=105 is gone
        let err = oracle
            .observe_single(110, 5, 4, index, 1, cardinality)
            .unwrap_err();
        assert_eq!(err, PoolError::StaleObservation);
    }

    #[test]
    fn seconds_per_liquidity_integrates_reciprocal_liquidity() {
        let (mut oracle, index, cardinality, _) = fresh(0);
        let next = oracle.grow(1, 4);
        let (index, cardinality) = oracle.write(index, 8, 0, 2, cardinality, next);
        let (index, cardinality) = oracle.write(index, 12, 0, 8, cardinality, next);

        let (_, spl) = oracle.observe_single(12, 0, 0, index, 8, cardinality).unwrap();
        // 8 seconds at L=2 plus 4 seconds at L=8
        let expected = (U256::from(8u8) << 128) / U256::from(2u8)
            + (U256::from(4u8) << 128) / U256::from(8u8);
        assert_eq!(spl, X128(expected));
    }

    #[test]
    fn ordering_is_wrap_aware_across_the_epoch_boundary() {
        let before_wrap = u32::MAX - 5;
        let (mut oracle, index, cardinality, _) = fresh(before_wrap);
        let next = oracle.grow(1, 4);
        // 10 seconds later the u32 clock has wrapped to 4
        let (index, cardinality) = oracle.write(index, 4, 7, 1, cardinality, next);

        let (tick_cum, _) = oracle.observe_single(4, 0, 7, index, 1, cardinality).unwrap();
        assert_eq!(tick_cum, 70);

        // target halfway across the wrap
        let (tick_cum, _) = oracle.observe_single(4, 5, 7, index, 1, cardinality).unwrap();
        assert_eq!(tick_cum, 35);
    }
}
