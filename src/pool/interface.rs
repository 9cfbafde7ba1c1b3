use crate::error::PoolError;
use crate::pool::state::Pool;
use alloy_primitives::{Address, I256, U256};
use thiserror::Error;

/// Failure surfaced by the token collaborator. Always fatal to the
/// containing pool operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("token transfer failed: {0}")]
pub struct TransferError(pub String);

/// The token collaborator: moves balances between accounts on command.
///
/// The pool itself never holds token state; it reads balances and orders
/// transfers out of its own account through this trait. Payments *into*
/// the pool are made by the caller inside a [`PoolCallbacks`] callback and
/// verified by the pool through `balance_of` afterwards.
pub trait TokenLedger {
    /// Balance of `holder` in `token`.
    fn balance_of(&self, token: Address, holder: Address) -> U256;

    /// Moves `amount` of `token` from the pool's account to `to`.
    fn transfer_out(
        &mut self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferError>;
}

/// Caller-supplied callbacks, injected per call.
///
/// Each callback receives the pool mid-operation. The pool is locked for
/// the duration, so any re-entrant mutating call made from a callback fails
/// with `LOK`; view methods remain available. Callback errors propagate
/// verbatim and abort the operation.
pub trait PoolCallbacks<L: TokenLedger> {
    /// Invoked by `mint` after the owed amounts are known; the
    /// implementation must pay them into the pool before returning.
    fn on_mint(
        &mut self,
        pool: &mut Pool,
        ledger: &mut L,
        amount0_owed: U256,
        amount1_owed: U256,
        data: &[u8],
    ) -> Result<(), PoolError>;

    /// Invoked by `swap` after output tokens have been sent; the
    /// implementation must pay the input side (the positive delta) into the
    /// pool before returning.
    fn on_swap(
        &mut self,
        pool: &mut Pool,
        ledger: &mut L,
        amount0_delta: I256,
        amount1_delta: I256,
        data: &[u8],
    ) -> Result<(), PoolError>;

    /// Invoked by `flash` after the loan has been sent; the implementation
    /// must return the principal plus the quoted fees before returning.
    fn on_flash(
        &mut self,
        pool: &mut Pool,
        ledger: &mut L,
        fee0: U256,
        fee1: U256,
        data: &[u8],
    ) -> Result<(), PoolError>;
}
