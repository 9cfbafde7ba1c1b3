use alloy_primitives::U256;

pub mod error;
mod hash;
pub mod math;

pub mod events;
pub mod oracle;
pub mod pool;
pub mod position;
pub mod tick;

pub use hash::FastMap;

pub use pool::interface::{PoolCallbacks, TokenLedger, TransferError};
pub use pool::state::{Pool, PoolParameters, ProtocolFees, Slot0};

pub(crate) const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Number of fractional bits in a sqrt price.
pub const RESOLUTION: u8 = 96;
/// 2^96, the unit of the Q64.96 sqrt-price format.
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);
/// 2^128, the unit of the Q128.128 fees-per-liquidity format.
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

/// Largest value a sqrt price may take: 2^160 - 1.
pub const U160_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, u32::MAX as u64, 0]);

/// Swap fees are expressed in parts per million of the input amount.
pub const FEE_DENOMINATOR: u32 = 1_000_000;
