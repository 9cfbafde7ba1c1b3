use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MathError {
    #[error("math error - overflow")]
    Overflow,
    #[error("math error - underflow")]
    Underflow,
    #[error("math error - division by zero")]
    DivisionByZero,
    #[error("bit math error - zero input value")]
    ZeroValue,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state error - sqrt price out of bounds")]
    SqrtPriceOutOfBounds,
    #[error("state error - sqrt price is zero")]
    SqrtPriceIsZero,
    #[error("state error - tick out of bounds")]
    TickOutOfBounds,
    #[error("state error - tick not aligned to spacing")]
    TickMisaligned,
    #[error("state error - liquidity is zero")]
    LiquidityIsZero,
    #[error("state error - requested amount exceeds pool reserves")]
    InsufficientReserves,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Failures of the pool state machine. The short codes in the messages are
/// the stable identifiers callers should match on when mapping errors onto
/// another surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("LOK: pool is locked")]
    Locked,
    #[error("AI: pool already initialized")]
    AlreadyInitialized,
    #[error("AS: amount specified is zero")]
    AmountSpecifiedIsZero,
    #[error("SPL: sqrt price limit out of range")]
    SqrtPriceLimit,
    #[error("TLU: tick lower must be below tick upper")]
    TickOrder,
    #[error("TLM: tick lower below minimum")]
    TickLowerBound,
    #[error("TUM: tick upper above maximum")]
    TickUpperBound,
    #[error("M0: insufficient token0 paid in for mint")]
    MintBalance0,
    #[error("M1: insufficient token1 paid in for mint")]
    MintBalance1,
    #[error("IIA: insufficient input amount")]
    InsufficientInput,
    #[error("L: no active liquidity")]
    NoLiquidity,
    #[error("LO: liquidity gross exceeds per-tick maximum")]
    LiquidityGrossOverflow,
    #[error("F0: flash repayment short of fee in token0")]
    FlashBalance0,
    #[error("F1: flash repayment short of fee in token1")]
    FlashBalance1,
    #[error("NP: cannot poke an empty position")]
    EmptyPositionPoke,
    #[error("OLD: requested time predates the oldest observation")]
    StaleObservation,
    #[error("caller is not the pool owner")]
    NotOwner,
    #[error("protocol fee fraction out of range")]
    InvalidProtocolFee,
    #[error("invalid pool parameters: {0}")]
    InvalidParameters(&'static str),
    #[error("tick is not initialized")]
    UninitializedTick,
    #[error(transparent)]
    Transfer(#[from] crate::pool::interface::TransferError),
    #[error(transparent)]
    Arithmetic(#[from] Error),
}

impl From<MathError> for PoolError {
    fn from(err: MathError) -> Self {
        PoolError::Arithmetic(Error::Math(err))
    }
}

impl From<StateError> for PoolError {
    fn from(err: StateError) -> Self {
        PoolError::Arithmetic(Error::State(err))
    }
}
