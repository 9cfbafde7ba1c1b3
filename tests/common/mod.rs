//! Shared fixtures: an in-memory token ledger and configurable callbacks.
#![allow(dead_code)]

use alloy_primitives::{Address, I256, U256, address};
use clmm_pool::error::PoolError;
use clmm_pool::math::tick_math::sqrt_price_at_tick;
use clmm_pool::{Pool, PoolCallbacks, PoolParameters, TokenLedger, TransferError};
use std::collections::HashMap;

pub const POOL_ADDR: Address = address!("0x00000000000000000000000000000000000f0001");
pub const FACTORY: Address = address!("0x00000000000000000000000000000000000fac70");
pub const TOKEN0: Address = address!("0x0000000000000000000000000000000000000a00");
pub const TOKEN1: Address = address!("0x0000000000000000000000000000000000000b00");
pub const ALICE: Address = address!("0x000000000000000000000000000000000000a11c");
pub const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

/// Plain balance book. Outbound pool transfers go through the
/// `TokenLedger` impl; tests and callbacks deposit with `pay_pool`.
#[derive(Default)]
pub struct MockLedger {
    balances: HashMap<(Address, Address), U256>,
}

impl MockLedger {
    /// Ledger with ample balances for the usual actors.
    pub fn funded() -> Self {
        let mut ledger = Self::default();
        let a_lot = U256::from(1u128 << 120);
        for holder in [ALICE, BOB] {
            ledger.credit(TOKEN0, holder, a_lot);
            ledger.credit(TOKEN1, holder, a_lot);
        }
        ledger
    }

    pub fn credit(&mut self, token: Address, holder: Address, amount: U256) {
        *self.balances.entry((token, holder)).or_default() += amount;
    }

    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Moves tokens from `from` into the pool account.
    pub fn pay_pool(&mut self, token: Address, from: Address, amount: U256) {
        let entry = self.balances.entry((token, from)).or_default();
        *entry = entry
            .checked_sub(amount)
            .expect("test actor ran out of funds");
        self.credit(token, POOL_ADDR, amount);
    }
}

impl TokenLedger for MockLedger {
    fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balance(token, holder)
    }

    fn transfer_out(
        &mut self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferError> {
        let entry = self.balances.entry((token, POOL_ADDR)).or_default();
        *entry = entry
            .checked_sub(amount)
            .ok_or_else(|| TransferError("pool balance exhausted".into()))?;
        self.credit(token, to, amount);
        Ok(())
    }
}

/// Callbacks that pay what the pool asks for, with optional distortions for
/// the failure-path tests.
pub struct TestCallbacks {
    pub payer: Address,
    /// Withheld from the owed amounts (to trip M0/M1/IIA/F0/F1).
    pub short0: U256,
    pub short1: U256,
    /// Paid on top of the owed amounts (flash overpayment tests).
    pub extra0: U256,
    pub extra1: U256,
    /// Principal to return on flash; the callback itself only learns fees.
    pub flash_principal0: U256,
    pub flash_principal1: U256,
}

impl TestCallbacks {
    pub fn paying(payer: Address) -> Self {
        Self {
            payer,
            short0: U256::ZERO,
            short1: U256::ZERO,
            extra0: U256::ZERO,
            extra1: U256::ZERO,
            flash_principal0: U256::ZERO,
            flash_principal1: U256::ZERO,
        }
    }
}

impl PoolCallbacks<MockLedger> for TestCallbacks {
    fn on_mint(
        &mut self,
        _pool: &mut Pool,
        ledger: &mut MockLedger,
        amount0_owed: U256,
        amount1_owed: U256,
        _data: &[u8],
    ) -> Result<(), PoolError> {
        let pay0 = amount0_owed.saturating_sub(self.short0) + self.extra0;
        let pay1 = amount1_owed.saturating_sub(self.short1) + self.extra1;
        if !pay0.is_zero() {
            ledger.pay_pool(TOKEN0, self.payer, pay0);
        }
        if !pay1.is_zero() {
            ledger.pay_pool(TOKEN1, self.payer, pay1);
        }
        Ok(())
    }

    fn on_swap(
        &mut self,
        _pool: &mut Pool,
        ledger: &mut MockLedger,
        amount0_delta: I256,
        amount1_delta: I256,
        _data: &[u8],
    ) -> Result<(), PoolError> {
        if amount0_delta.is_positive() {
            let pay = amount0_delta.into_raw().saturating_sub(self.short0);
            ledger.pay_pool(TOKEN0, self.payer, pay);
        }
        if amount1_delta.is_positive() {
            let pay = amount1_delta.into_raw().saturating_sub(self.short1);
            ledger.pay_pool(TOKEN1, self.payer, pay);
        }
        Ok(())
    }

    fn on_flash(
        &mut self,
        _pool: &mut Pool,
        ledger: &mut MockLedger,
        fee0: U256,
        fee1: U256,
        _data: &[u8],
    ) -> Result<(), PoolError> {
        let repay0 = (self.flash_principal0 + fee0 + self.extra0).saturating_sub(self.short0);
        let repay1 = (self.flash_principal1 + fee1 + self.extra1).saturating_sub(self.short1);
        if !repay0.is_zero() {
            ledger.pay_pool(TOKEN0, self.payer, repay0);
        }
        if !repay1.is_zero() {
            ledger.pay_pool(TOKEN1, self.payer, repay1);
        }
        Ok(())
    }
}

pub fn default_params() -> PoolParameters {
    PoolParameters {
        pool_address: POOL_ADDR,
        factory: FACTORY,
        token0: TOKEN0,
        token1: TOKEN1,
        fee: 3000,
        tick_spacing: 60,
    }
}

/// Fresh pool initialized at the given tick's price.
pub fn pool_at_tick(tick: i32, time: u64) -> Pool {
    let mut pool = Pool::new(default_params()).unwrap();
    pool.initialize(time, sqrt_price_at_tick(tick).unwrap())
        .unwrap();
    pool
}
