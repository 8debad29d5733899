//! A deterministic, off-chain simulator for a single concentrated-liquidity
//! pool of the Uniswap-v3 family. The engine reproduces the on-chain effects
//! of `mint`, `burn` and `swap` bit-exactly, and the state machine around it
//! records every transition so that histories can be replayed, branched and
//! compared.

pub mod errors;
pub mod events;
pub mod loader;
pub mod math;
pub mod pool;
pub mod replay;
pub mod sim;
pub mod storage;

pub use pool::{snapshot::Snapshot, CorePool, PoolConfig, PoolState};
pub use replay::Replayer;
pub use sim::ConfigurableCorePool;
