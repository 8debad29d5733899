use alloy_primitives::U256;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the fixed-point primitives. These carry the exact failure
/// condition so the engine can map them onto its own validation taxonomy.
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Denominator is zero")]
    DivisionByZero,
    #[error("Result does not fit in 256 bits")]
    Overflow,
    #[error("Liquidity subtraction underflow")]
    LiquiditySub,
    #[error("Liquidity addition overflow")]
    LiquidityAdd,
    #[error("Tick is outside of [MIN_TICK, MAX_TICK]")]
    TickOutOfBounds,
    #[error("Sqrt price is outside of [MIN_SQRT_RATIO, MAX_SQRT_RATIO)")]
    SqrtPriceOutOfBounds,
    #[error("Sqrt price is 0")]
    SqrtPriceIsZero,
    #[error("Liquidity is 0")]
    LiquidityIsZero,
    #[error("Product overflows during sqrt price computation")]
    ProductOverflow,
    #[error("Overflow when casting to U160")]
    SafeCastToU160Overflow,
    #[error("Sqrt price is less than or equal to quotient")]
    SqrtPriceIsLteQuotient,
    #[error("Can not get most significant bit or least significant bit on zero value")]
    ZeroValue,
}

/// Errors surfaced by the pool engine. Validation failures abort the current
/// operation and leave the pool state untouched.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Math error")]
    Math(#[from] MathError),
    #[error("Pool is already initialized")]
    AlreadyInitialized,
    #[error("Pool is not initialized")]
    NotInitialized,
    #[error("Tick {0} is out of range")]
    TickOutOfRange(i32),
    #[error("Tick {0} is not a multiple of the tick spacing")]
    TickMisaligned(i32),
    #[error("Tick lower {0} must be less than tick upper {1}")]
    TickOrder(i32, i32),
    #[error("Liquidity amount must be greater than zero")]
    ZeroLiquidity,
    #[error("Sqrt price limit {0} is on the wrong side of the current price")]
    BadPriceLimit(U256),
    #[error("Liquidity gross exceeds the per-tick maximum at tick {0}")]
    MaxLiquidityPerTick(i32),
}

/// Errors of the persistence layer. The in-memory pool state is never
/// affected by these.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite failure")]
    IOFailure(#[from] rusqlite::Error),
    #[error("Encoding failure")]
    Encoding(#[from] serde_json::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Errors of the state machine wrapped around the pool engine.
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("No transition to step back from")]
    NoTransition,
    #[error("Snapshot {0} not found")]
    SnapshotNotFound(Uuid),
    #[error("Post processor failed: {0}")]
    PostProcessorFailure(String),
}

/// Errors of the CSV/JSON event loader.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO failure")]
    Io(#[from] std::io::Error),
    #[error("CSV parse failure")]
    Csv(#[from] csv::Error),
    #[error("JSON parse failure")]
    Json(#[from] serde_json::Error),
}

/// Errors of the replay driver.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Simulator(#[from] SimulatorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Event {0}: engine amounts do not match the recorded amounts")]
    AmountMismatch(i64),
    #[error("Event {0}: sqrt price after swap does not match the recorded price")]
    PriceMismatch(i64),
    #[error("Replay requires an initialized pool or a swap event to derive the price from")]
    NoStartingPrice,
}
