use alloy_primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};

/// Stable log record appended by every successful state mutation.
///
/// The pool keeps events in an internal journal; hosts drain it with
/// [`crate::Pool::take_events`] and forward records to whatever logging or
/// indexing facility surrounds the engine. Field sets are part of the
/// public contract and mirror the operation results exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Initialize {
        sqrt_price_x96: U256,
        tick: i32,
    },
    Mint {
        sender: Address,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        amount0: U256,
        amount1: U256,
    },
    Burn {
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        amount0: U256,
        amount1: U256,
    },
    Collect {
        owner: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0: u128,
        amount1: u128,
    },
    Swap {
        sender: Address,
        recipient: Address,
        amount0: I256,
        amount1: I256,
        sqrt_price_x96: U256,
        liquidity: u128,
        tick: i32,
    },
    Flash {
        sender: Address,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        paid0: U256,
        paid1: U256,
    },
    IncreaseObservationCardinalityNext {
        observation_cardinality_next_old: u16,
        observation_cardinality_next_new: u16,
    },
    SetFeeProtocol {
        fee_protocol0_old: u8,
        fee_protocol1_old: u8,
        fee_protocol0_new: u8,
        fee_protocol1_new: u8,
    },
    CollectProtocol {
        sender: Address,
        recipient: Address,
        amount0: u128,
        amount1: u128,
    },
}
