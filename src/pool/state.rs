use crate::error::{PoolError, StateError};
use crate::events::Event;
use crate::math::fixed_point::X128;
use crate::math::tick_bitmap::TickBitmap;
use crate::math::tick_math::{self, MAX_TICK, MIN_TICK};
use crate::oracle::Oracle;
use crate::position::{PositionKey, PositionTable};
use crate::tick::{self, TickTable};
use crate::pool::interface::TokenLedger;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Construction-time parameters; immutable for the life of the pool.
///
/// `factory` is the deployer identity and doubles as the owner principal
/// for the protocol-fee operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParameters {
    /// The pool's own token account, the source of outbound transfers.
    pub pool_address: Address,
    pub factory: Address,
    pub token0: Address,
    pub token1: Address,
    /// Swap fee in parts per million (3000 = 0.30%).
    pub fee: u32,
    pub tick_spacing: i32,
}

/// The hot state, snapshotted once at the top of every operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    /// Cursor of the most recent oracle observation.
    pub observation_index: u16,
    pub observation_cardinality: u16,
    pub observation_cardinality_next: u16,
    /// Token0 share in the low nibble, token1 in the high nibble; a nonzero
    /// nibble n skims 1/n of swap fees for the protocol.
    pub fee_protocol: u8,
    /// False while a mutating call is in progress (and before
    /// initialization).
    pub unlocked: bool,
}

/// Fees skimmed for the protocol, withdrawable by the owner.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFees {
    pub token0: u128,
    pub token1: u128,
}

/// A concentrated-liquidity pool over one token pair.
///
/// The pool is a deterministic, serially-driven state machine: the host
/// orders calls, supplies the clock, and moves tokens through the
/// [`TokenLedger`] collaborator. Every mutating operation is atomic — on
/// any error the pool state is exactly what it was before the call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pool {
    pub(crate) params: PoolParameters,
    pub(crate) max_liquidity_per_tick: u128,
    pub(crate) slot0: Slot0,
    pub(crate) fee_growth_global0: X128,
    pub(crate) fee_growth_global1: X128,
    pub(crate) protocol_fees: ProtocolFees,
    /// Liquidity active at the current tick.
    pub(crate) liquidity: u128,
    pub(crate) ticks: TickTable,
    pub(crate) bitmap: TickBitmap,
    pub(crate) positions: PositionTable,
    pub(crate) oracle: Oracle,
    pub(crate) events: Vec<Event>,
}

impl Pool {
    /// Constructs an uninitialized pool. Until [`Pool::initialize`] runs,
    /// every mutating operation fails with `LOK`.
    pub fn new(params: PoolParameters) -> Result<Self, PoolError> {
        if params.token0 >= params.token1 {
            return Err(PoolError::InvalidParameters(
                "token0 must sort below token1",
            ));
        }
        if params.tick_spacing <= 0 || params.tick_spacing >= 16384 {
            return Err(PoolError::InvalidParameters(
                "tick spacing must be in (0, 16384)",
            ));
        }
        if params.fee >= crate::FEE_DENOMINATOR {
            return Err(PoolError::InvalidParameters("fee must be below 100%"));
        }

        Ok(Self {
            max_liquidity_per_tick: tick::max_liquidity_per_tick(params.tick_spacing),
            params,
            slot0: Slot0::default(),
            fee_growth_global0: X128::ZERO,
            fee_growth_global1: X128::ZERO,
            protocol_fees: ProtocolFees::default(),
            liquidity: 0,
            ticks: TickTable::default(),
            bitmap: TickBitmap::default(),
            positions: PositionTable::default(),
            oracle: Oracle::default(),
            events: Vec::new(),
        })
    }

    /// Sets the starting price and seeds the oracle. May run exactly once.
    pub fn initialize(&mut self, time: u64, sqrt_price_x96: U256) -> Result<(), PoolError> {
        if !self.slot0.sqrt_price_x96.is_zero() {
            return Err(PoolError::AlreadyInitialized);
        }

        let tick = tick_math::tick_at_sqrt_price(sqrt_price_x96)?;
        let (cardinality, cardinality_next) = self.oracle.initialize(Self::block_timestamp(time));

        self.slot0 = Slot0 {
            sqrt_price_x96,
            tick,
            observation_index: 0,
            observation_cardinality: cardinality,
            observation_cardinality_next: cardinality_next,
            fee_protocol: 0,
            unlocked: true,
        };

        debug!(%sqrt_price_x96, tick, "pool initialized");
        self.record(Event::Initialize {
            sqrt_price_x96,
            tick,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    pub fn params(&self) -> &PoolParameters {
        &self.params
    }

    pub fn slot0(&self) -> Slot0 {
        self.slot0
    }

    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    pub fn fee_growth_global0(&self) -> X128 {
        self.fee_growth_global0
    }

    pub fn fee_growth_global1(&self) -> X128 {
        self.fee_growth_global1
    }

    pub fn protocol_fees(&self) -> ProtocolFees {
        self.protocol_fees
    }

    pub fn max_liquidity_per_tick(&self) -> u128 {
        self.max_liquidity_per_tick
    }

    pub fn tick_info(&self, tick: i32) -> Option<&crate::tick::TickInfo> {
        self.ticks.get(&tick)
    }

    pub fn bitmap_word(&self, word: i16) -> U256 {
        self.bitmap.get(&word).copied().unwrap_or(U256::ZERO)
    }

    pub fn position(&self, key: &PositionKey) -> Option<&crate::position::PositionInfo> {
        self.positions.get(key)
    }

    /// Events recorded so far and not yet drained.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drains the event journal, handing the records to the host's logging
    /// facility.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // internals shared by the operation modules
    // ------------------------------------------------------------------

    pub(crate) fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Host time enters the engine here; everything downstream sees a u32
    /// and compares it wrap-aware.
    pub(crate) fn block_timestamp(time: u64) -> u32 {
        time as u32
    }

    /// Runs `op` on a scratch copy of the pool with the re-entry flag
    /// cleared, committing the scratch state only on success.
    ///
    /// Callbacks receive the scratch pool, so a mutating re-entrant call
    /// sees `unlocked == false` and fails with `LOK` — and a failing
    /// operation leaves `self` untouched, which is the revert-on-failure
    /// guarantee.
    pub(crate) fn locked_scope<T>(
        &mut self,
        op: impl FnOnce(&mut Pool) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        if !self.slot0.unlocked {
            return Err(PoolError::Locked);
        }
        let mut scratch = self.clone();
        scratch.slot0.unlocked = false;
        let result = op(&mut scratch)?;
        scratch.slot0.unlocked = true;
        *self = scratch;
        Ok(result)
    }

    /// Validates a position range against the tick domain and spacing.
    pub(crate) fn check_ticks(&self, tick_lower: i32, tick_upper: i32) -> Result<(), PoolError> {
        if tick_lower >= tick_upper {
            return Err(PoolError::TickOrder);
        }
        if tick_lower < MIN_TICK {
            return Err(PoolError::TickLowerBound);
        }
        if tick_upper > MAX_TICK {
            return Err(PoolError::TickUpperBound);
        }
        if tick_lower % self.params.tick_spacing != 0
            || tick_upper % self.params.tick_spacing != 0
        {
            return Err(StateError::TickMisaligned.into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // owner operations
    // ------------------------------------------------------------------

    /// Sets the protocol fee nibbles. Each share is either zero or an
    /// integer n in [4, 10], skimming 1/n of swap fees on that side.
    pub fn set_fee_protocol(
        &mut self,
        caller: Address,
        fee_protocol0: u8,
        fee_protocol1: u8,
    ) -> Result<(), PoolError> {
        self.locked_scope(|pool| {
            if caller != pool.params.factory {
                return Err(PoolError::NotOwner);
            }
            let valid = |p: u8| p == 0 || (4..=10).contains(&p);
            if !valid(fee_protocol0) || !valid(fee_protocol1) {
                return Err(PoolError::InvalidProtocolFee);
            }

            let old = pool.slot0.fee_protocol;
            pool.slot0.fee_protocol = fee_protocol0 | (fee_protocol1 << 4);
            pool.record(Event::SetFeeProtocol {
                fee_protocol0_old: old & 0x0f,
                fee_protocol1_old: old >> 4,
                fee_protocol0_new: fee_protocol0,
                fee_protocol1_new: fee_protocol1,
            });
            Ok(())
        })
    }

    /// Withdraws accrued protocol fees, clamped to what is owed.
    pub fn collect_protocol<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        caller: Address,
        recipient: Address,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), PoolError> {
        self.locked_scope(|pool| {
            if caller != pool.params.factory {
                return Err(PoolError::NotOwner);
            }

            let amount0 = amount0_requested.min(pool.protocol_fees.token0);
            let amount1 = amount1_requested.min(pool.protocol_fees.token1);

            if amount0 > 0 {
                pool.protocol_fees.token0 -= amount0;
                ledger.transfer_out(pool.params.token0, recipient, U256::from(amount0))?;
            }
            if amount1 > 0 {
                pool.protocol_fees.token1 -= amount1;
                ledger.transfer_out(pool.params.token1, recipient, U256::from(amount1))?;
            }

            pool.record(Event::CollectProtocol {
                sender: caller,
                recipient,
                amount0,
                amount1,
            });
            Ok((amount0, amount1))
        })
    }

    /// Raises the oracle ring's target cardinality, allocating slots so
    /// later writes can retain a longer history.
    pub fn increase_observation_cardinality_next(
        &mut self,
        observation_cardinality_next: u16,
    ) -> Result<(), PoolError> {
        self.locked_scope(|pool| {
            let old = pool.slot0.observation_cardinality_next;
            let new = pool.oracle.grow(old, observation_cardinality_next);
            pool.slot0.observation_cardinality_next = new;
            if old != new {
                pool.record(Event::IncreaseObservationCardinalityNext {
                    observation_cardinality_next_old: old,
                    observation_cardinality_next_new: new,
                });
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // views
    // ------------------------------------------------------------------

    /// Cumulative tick and seconds-per-liquidity at each requested number
    /// of seconds ago. Read-only; safe to call from inside callbacks.
    pub fn observe(
        &self,
        time: u64,
        seconds_agos: &[u32],
    ) -> Result<Vec<(i64, X128)>, PoolError> {
        self.oracle.observe(
            Self::block_timestamp(time),
            seconds_agos,
            self.slot0.tick,
            self.slot0.observation_index,
            self.liquidity,
            self.slot0.observation_cardinality,
        )
    }

    /// Accumulator snapshots restricted to a tick range: cumulative tick,
    /// seconds-per-liquidity and seconds spent inside the range.
    ///
    /// Both boundary ticks must be initialized. The snapshots only have
    /// relative meaning, taken against other snapshots of the same range.
    pub fn snapshot_cumulatives_inside(
        &self,
        time: u64,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Result<(i64, X128, u32), PoolError> {
        self.check_ticks(tick_lower, tick_upper)?;

        let lower = self
            .ticks
            .get(&tick_lower)
            .filter(|t| t.initialized)
            .ok_or(PoolError::UninitializedTick)?;
        let upper = self
            .ticks
            .get(&tick_upper)
            .filter(|t| t.initialized)
            .ok_or(PoolError::UninitializedTick)?;

        if self.slot0.tick < tick_lower {
            Ok((
                lower
                    .tick_cumulative_outside
                    .wrapping_sub(upper.tick_cumulative_outside),
                lower
                    .seconds_per_liquidity_outside_x128
                    .wrapping_sub(upper.seconds_per_liquidity_outside_x128),
                lower.seconds_outside.wrapping_sub(upper.seconds_outside),
            ))
        } else if self.slot0.tick < tick_upper {
            let now = Self::block_timestamp(time);
            let (tick_cumulative, seconds_per_liquidity) = self.oracle.observe_single(
                now,
                0,
                self.slot0.tick,
                self.slot0.observation_index,
                self.liquidity,
                self.slot0.observation_cardinality,
            )?;
            Ok((
                tick_cumulative
                    .wrapping_sub(lower.tick_cumulative_outside)
                    .wrapping_sub(upper.tick_cumulative_outside),
                seconds_per_liquidity
                    .wrapping_sub(lower.seconds_per_liquidity_outside_x128)
                    .wrapping_sub(upper.seconds_per_liquidity_outside_x128),
                now.wrapping_sub(lower.seconds_outside)
                    .wrapping_sub(upper.seconds_outside),
            ))
        } else {
            Ok((
                upper
                    .tick_cumulative_outside
                    .wrapping_sub(lower.tick_cumulative_outside),
                upper
                    .seconds_per_liquidity_outside_x128
                    .wrapping_sub(lower.seconds_per_liquidity_outside_x128),
                upper.seconds_outside.wrapping_sub(lower.seconds_outside),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn params() -> PoolParameters {
        PoolParameters {
            pool_address: address!("0x1000000000000000000000000000000000000000"),
            factory: address!("0x2000000000000000000000000000000000000000"),
            token0: address!("0x0000000000000000000000000000000000000001"),
            token1: address!("0x0000000000000000000000000000000000000002"),
            fee: 3000,
            tick_spacing: 60,
        }
    }

    #[test]
    fn construction_validates_parameters() {
        let mut bad = params();
        bad.token1 = bad.token0;
        assert!(matches!(
            Pool::new(bad),
            Err(PoolError::InvalidParameters(_))
        ));

        let mut bad = params();
        bad.tick_spacing = 0;
        assert!(matches!(
            Pool::new(bad),
            Err(PoolError::InvalidParameters(_))
        ));

        let mut bad = params();
        bad.tick_spacing = 16384;
        assert!(matches!(
            Pool::new(bad),
            Err(PoolError::InvalidParameters(_))
        ));

        let mut bad = params();
        bad.fee = crate::FEE_DENOMINATOR;
        assert!(matches!(
            Pool::new(bad),
            Err(PoolError::InvalidParameters(_))
        ));
    }

    #[test]
    fn uninitialized_pool_is_locked() {
        let mut pool = Pool::new(params()).unwrap();
        assert!(!pool.slot0().unlocked);
        let err = pool.set_fee_protocol(params().factory, 4, 4).unwrap_err();
        assert_eq!(err, PoolError::Locked);
    }

    #[test]
    fn initialize_runs_once() {
        let mut pool = Pool::new(params()).unwrap();
        let price = crate::math::tick_math::sqrt_price_at_tick(0).unwrap();
        pool.initialize(1_000, price).unwrap();
        assert_eq!(pool.slot0().tick, 0);
        assert!(pool.slot0().unlocked);
        assert_eq!(pool.slot0().observation_cardinality, 1);

        let err = pool.initialize(1_000, price).unwrap_err();
        assert_eq!(err, PoolError::AlreadyInitialized);
    }

    #[test]
    fn fee_protocol_is_owner_gated_and_validated() {
        let mut pool = Pool::new(params()).unwrap();
        let price = crate::math::tick_math::sqrt_price_at_tick(0).unwrap();
        pool.initialize(0, price).unwrap();

        let stranger = address!("0x00000000000000000000000000000000000000aa");
        assert_eq!(
            pool.set_fee_protocol(stranger, 4, 4).unwrap_err(),
            PoolError::NotOwner
        );
        assert_eq!(
            pool.set_fee_protocol(params().factory, 3, 0).unwrap_err(),
            PoolError::InvalidProtocolFee
        );
        assert_eq!(
            pool.set_fee_protocol(params().factory, 0, 11).unwrap_err(),
            PoolError::InvalidProtocolFee
        );

        pool.set_fee_protocol(params().factory, 4, 10).unwrap();
        assert_eq!(pool.slot0().fee_protocol, 4 | (10 << 4));
    }

    #[test]
    fn failed_operations_leave_no_trace() {
        let mut pool = Pool::new(params()).unwrap();
        let price = crate::math::tick_math::sqrt_price_at_tick(0).unwrap();
        pool.initialize(0, price).unwrap();
        let before_events = pool.events().len();

        let _ = pool.set_fee_protocol(params().factory, 3, 3);
        assert!(pool.slot0().unlocked);
        assert_eq!(pool.slot0().fee_protocol, 0);
        assert_eq!(pool.events().len(), before_events);
    }

    #[test]
    fn check_ticks_reports_each_violation() {
        let pool = Pool::new(params()).unwrap();
        assert_eq!(
            pool.check_ticks(60, 60).unwrap_err(),
            PoolError::TickOrder
        );
        assert_eq!(
            pool.check_ticks(MIN_TICK - 60, 0).unwrap_err(),
            PoolError::TickLowerBound
        );
        assert_eq!(
            pool.check_ticks(0, MAX_TICK + 60).unwrap_err(),
            PoolError::TickUpperBound
        );
        assert_eq!(
            pool.check_ticks(-30, 60).unwrap_err(),
            PoolError::from(StateError::TickMisaligned)
        );
        assert!(pool.check_ticks(-60, 60).is_ok());
    }

    #[test]
    fn grow_cardinality_records_one_event_per_change() {
        let mut pool = Pool::new(params()).unwrap();
        let price = crate::math::tick_math::sqrt_price_at_tick(0).unwrap();
        pool.initialize(0, price).unwrap();
        pool.take_events();

        pool.increase_observation_cardinality_next(5).unwrap();
        pool.increase_observation_cardinality_next(5).unwrap();
        pool.increase_observation_cardinality_next(3).unwrap();

        let events = pool.take_events();
        assert_eq!(
            events,
            vec![Event::IncreaseObservationCardinalityNext {
                observation_cardinality_next_old: 1,
                observation_cardinality_next_new: 5,
            }]
        );
        assert_eq!(pool.slot0().observation_cardinality_next, 5);
    }
}
