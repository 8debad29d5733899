//! Replays a recorded event stream against the simulator. Liquidity events
//! apply directly; swap events carry both amounts but not which side was
//! specified, so the driver dry-runs with `amount0` first and falls back to
//! `amount1` before committing.

use alloy_primitives::I256;
use tracing::instrument;

use crate::{
    errors::ReplayError,
    events::{LiquidityEvent, LiquidityEventKind, PoolEvent, SwapEvent},
    sim::ConfigurableCorePool,
};

/// Owner recorded for replayed positions. On-chain liquidity events carry no
/// owner, and replay only needs per-range accounting.
pub const REPLAY_OWNER: &str = "replayer";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub mints: usize,
    pub burns: usize,
    pub swaps: usize,
}

/// Drives a [`ConfigurableCorePool`] through an event stream, checking every
/// engine output against the recorded one.
pub struct Replayer {
    pool: ConfigurableCorePool,
}

impl Replayer {
    pub fn new(pool: ConfigurableCorePool) -> Self {
        Replayer { pool }
    }

    pub fn pool(&self) -> &ConfigurableCorePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ConfigurableCorePool {
        &mut self.pool
    }

    pub fn into_pool(self) -> ConfigurableCorePool {
        self.pool
    }

    /// Applies every event in order. Determinism: the same initial state and
    /// the same stream produce bit-identical pool states.
    #[instrument(skip_all, fields(events = events.len()))]
    pub fn run(&mut self, events: &[PoolEvent]) -> Result<ReplaySummary, ReplayError> {
        if !self.pool.pool().is_initialized() && !events.is_empty() {
            return Err(ReplayError::NoStartingPrice);
        }

        let mut summary = ReplaySummary::default();

        for event in events {
            match event {
                PoolEvent::Liquidity(event) => {
                    self.apply_liquidity(event)?;
                    match event.kind {
                        LiquidityEventKind::Mint => summary.mints += 1,
                        LiquidityEventKind::Burn => summary.burns += 1,
                    }
                }
                PoolEvent::Swap(event) => {
                    self.apply_swap(event)?;
                    summary.swaps += 1;
                }
            }
        }

        tracing::debug!(?summary, "replay finished");

        Ok(summary)
    }

    fn apply_liquidity(&mut self, event: &LiquidityEvent) -> Result<(), ReplayError> {
        let (amount_0, amount_1) = match event.kind {
            LiquidityEventKind::Mint => self.pool.mint(
                REPLAY_OWNER,
                event.tick_lower,
                event.tick_upper,
                event.liquidity,
            )?,
            LiquidityEventKind::Burn => self.pool.burn(
                REPLAY_OWNER,
                event.tick_lower,
                event.tick_upper,
                event.liquidity,
            )?,
        };

        if amount_0 != event.amount_0 || amount_1 != event.amount_1 {
            tracing::warn!(
                event = event.id,
                ?amount_0,
                ?amount_1,
                expected_0 = ?event.amount_0,
                expected_1 = ?event.amount_1,
                "liquidity amounts diverge from the recorded event"
            );
            return Err(ReplayError::AmountMismatch(event.id));
        }

        Ok(())
    }

    /// The event does not say which side was the specified one. Dry-run with
    /// `amount0`; if both resulting amounts match the record, commit that.
    /// Otherwise retry with `amount1`. Failure of both attempts is reported
    /// with the event id.
    fn apply_swap(&mut self, event: &SwapEvent) -> Result<(), ReplayError> {
        let zero_for_one = event.amount_0 > I256::ZERO;

        let specified = self
            .choose_specified_side(event, zero_for_one)
            .ok_or(ReplayError::AmountMismatch(event.id))?;

        let (amount_0, amount_1) =
            self.pool
                .swap(zero_for_one, specified, Some(event.sqrt_price_x96))?;

        if amount_0 != event.amount_0 || amount_1 != event.amount_1 {
            return Err(ReplayError::AmountMismatch(event.id));
        }

        if self.pool.pool().state.sqrt_price_x96 != event.sqrt_price_x96 {
            return Err(ReplayError::PriceMismatch(event.id));
        }

        Ok(())
    }

    fn choose_specified_side(&self, event: &SwapEvent, zero_for_one: bool) -> Option<I256> {
        for specified in [event.amount_0, event.amount_1] {
            match self.pool.query_swap(zero_for_one, specified, None) {
                Ok((amount_0, amount_1))
                    if amount_0 == event.amount_0 && amount_1 == event.amount_1 =>
                {
                    return Some(specified)
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::trace!(event = event.id, ?specified, error = %e, "dry run failed");
                }
            }
        }

        None
    }
}
