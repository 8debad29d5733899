pub mod position;
pub mod snapshot;
pub mod tick;
pub mod tick_bitmap;

use std::collections::BTreeMap;

use alloy_primitives::{I256, U256};
use num_bigfloat::BigFloat;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    errors::{MathError, PoolError},
    math::{
        full_math::mul_div,
        liquidity_math, sqrt_price_math, swap_math,
        tick_math::{self, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK},
        Q128, U256_1,
    },
    pool::{
        position::{PositionInfo, PositionKey},
        snapshot::Snapshot,
        tick::TickInfo,
    },
};

/// Immutable parameters of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub token_0: String,
    pub token_1: String,
    pub fee_pips: u32,
    pub tick_spacing: i32,
    pub max_liquidity_per_tick: u128,
    /// Denominator of the protocol's share of swap fees; zero disables the
    /// protocol cut entirely.
    pub fee_protocol: u32,
}

impl PoolConfig {
    pub fn new(token_0: &str, token_1: &str, fee_pips: u32, tick_spacing: i32) -> Self {
        assert!(tick_spacing > 0, "tick spacing must be positive");

        PoolConfig {
            token_0: token_0.to_string(),
            token_1: token_1.to_string(),
            fee_pips,
            tick_spacing,
            max_liquidity_per_tick: tick::max_liquidity_per_tick(tick_spacing),
            fee_protocol: 0,
        }
    }
}

/// The whole mutable state of one pool at one instant. Cloning produces a
/// deep copy: no mutable structure is shared between clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub id: Uuid,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub fee_growth_global_0_x128: U256,
    pub fee_growth_global_1_x128: U256,
    pub protocol_fees_0: u128,
    pub protocol_fees_1: u128,
    pub ticks: BTreeMap<i32, TickInfo>,
    pub tick_bitmap: BTreeMap<i16, U256>,
    #[serde(with = "position::as_pairs")]
    pub positions: BTreeMap<PositionKey, PositionInfo>,
    pub snapshot: Option<Snapshot>,
}

impl PoolState {
    fn new() -> Self {
        PoolState {
            id: Uuid::new_v4(),
            sqrt_price_x96: U256::ZERO,
            tick: 0,
            liquidity: 0,
            fee_growth_global_0_x128: U256::ZERO,
            fee_growth_global_1_x128: U256::ZERO,
            protocol_fees_0: 0,
            protocol_fees_1: 0,
            ticks: BTreeMap::new(),
            tick_bitmap: BTreeMap::new(),
            positions: BTreeMap::new(),
            snapshot: None,
        }
    }
}

/// The pool engine: pure state plus the five mutating operations. Every
/// operation either succeeds completely or leaves the state untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorePool {
    pub config: PoolConfig,
    pub state: PoolState,
}

// swap loop scratch state, committed only when the whole swap succeeds
struct CurrentState {
    amount_specified_remaining: I256,
    amount_calculated: I256,
    sqrt_price_x96: U256,
    tick: i32,
    liquidity: u128,
    fee_growth_global_x128: U256,
    protocol_fee: u128,
}

#[derive(Default)]
struct StepComputations {
    sqrt_price_start_x96: U256,
    tick_next: i32,
    initialized: bool,
    sqrt_price_next_x96: U256,
    amount_in: U256,
    amount_out: U256,
    fee_amount: U256,
}

impl CorePool {
    pub fn new(config: PoolConfig) -> Self {
        CorePool {
            config,
            state: PoolState::new(),
        }
    }

    /// Whether `initialize` has run.
    pub fn is_initialized(&self) -> bool {
        !self.state.sqrt_price_x96.is_zero()
    }

    /// Sets the starting price and derives the current tick from it. The
    /// pool starts with zero liquidity.
    pub fn initialize(&mut self, sqrt_price_x96: U256) -> Result<i32, PoolError> {
        if self.is_initialized() {
            return Err(PoolError::AlreadyInitialized);
        }

        let tick = tick_math::get_tick_at_sqrt_ratio(sqrt_price_x96)?;

        self.state.sqrt_price_x96 = sqrt_price_x96;
        self.state.tick = tick;

        tracing::debug!(?sqrt_price_x96, tick, "pool initialized");

        Ok(tick)
    }

    /// Adds liquidity to a position and returns the token amounts the caller
    /// must provide.
    pub fn mint(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroLiquidity);
        }

        let liquidity_delta =
            i128::try_from(amount).map_err(|_| PoolError::Math(MathError::LiquidityAdd))?;

        let (amount_0, amount_1) =
            self.modify_position(owner, tick_lower, tick_upper, liquidity_delta)?;

        tracing::debug!(
            owner,
            tick_lower,
            tick_upper,
            amount,
            liquidity = self.state.liquidity,
            "mint"
        );

        Ok((amount_0.into_raw(), amount_1.into_raw()))
    }

    /// Removes liquidity from a position. The freed token amounts are
    /// credited to `tokens_owed_*` for a later `collect`, and also returned.
    /// A zero amount is a poke that only settles fees.
    pub fn burn(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), PoolError> {
        let liquidity_delta =
            i128::try_from(amount).map_err(|_| PoolError::Math(MathError::LiquiditySub))?;

        let (amount_0, amount_1) =
            self.modify_position(owner, tick_lower, tick_upper, -liquidity_delta)?;

        let amount_0 = (-amount_0).into_raw();
        let amount_1 = (-amount_1).into_raw();

        if !amount_0.is_zero() || !amount_1.is_zero() {
            let key = PositionKey::new(owner, tick_lower, tick_upper);
            if let Some(position) = self.state.positions.get_mut(&key) {
                position.tokens_owed_0 = position.tokens_owed_0.wrapping_add(low_128(amount_0));
                position.tokens_owed_1 = position.tokens_owed_1.wrapping_add(low_128(amount_1));
            }
        }

        tracing::debug!(
            owner,
            tick_lower,
            tick_upper,
            amount,
            liquidity = self.state.liquidity,
            "burn"
        );

        Ok((amount_0, amount_1))
    }

    /// Withdraws owed tokens from a position, capping each request by what
    /// the position actually holds.
    pub fn collect(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount_0_requested: u128,
        amount_1_requested: u128,
    ) -> Result<(u128, u128), PoolError> {
        let key = PositionKey::new(owner, tick_lower, tick_upper);

        let Some(position) = self.state.positions.get_mut(&key) else {
            return Ok((0, 0));
        };

        let amount_0 = amount_0_requested.min(position.tokens_owed_0);
        let amount_1 = amount_1_requested.min(position.tokens_owed_1);

        position.tokens_owed_0 -= amount_0;
        position.tokens_owed_1 -= amount_1;

        if position.is_empty() {
            self.state.positions.remove(&key);
        }

        tracing::debug!(owner, tick_lower, tick_upper, amount_0, amount_1, "collect");

        Ok((amount_0, amount_1))
    }

    /// Swaps against the pool. `amount_specified` is exact-in when positive
    /// and exact-out when negative; the returned amounts are signed so that
    /// positive means the pool receives. A swap for zero is a no-op, and a
    /// limit equal to the current price returns `(0, 0)` without touching
    /// state.
    #[instrument(skip(self), level = "debug")]
    pub fn swap(
        &mut self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<(I256, I256), PoolError> {
        if !self.is_initialized() {
            return Err(PoolError::NotInitialized);
        }

        if amount_specified.is_zero() {
            return Ok((I256::ZERO, I256::ZERO));
        }

        let sqrt_price_limit_x96 = sqrt_price_limit_x96.unwrap_or(if zero_for_one {
            MIN_SQRT_RATIO + U256_1
        } else {
            MAX_SQRT_RATIO - U256_1
        });

        if zero_for_one {
            if sqrt_price_limit_x96 > self.state.sqrt_price_x96
                || sqrt_price_limit_x96 <= MIN_SQRT_RATIO
            {
                return Err(PoolError::BadPriceLimit(sqrt_price_limit_x96));
            }
        } else if sqrt_price_limit_x96 < self.state.sqrt_price_x96
            || sqrt_price_limit_x96 >= MAX_SQRT_RATIO
        {
            return Err(PoolError::BadPriceLimit(sqrt_price_limit_x96));
        }

        let exact_input = amount_specified > I256::ZERO;

        let mut current_state = CurrentState {
            sqrt_price_x96: self.state.sqrt_price_x96,
            amount_calculated: I256::ZERO,
            amount_specified_remaining: amount_specified,
            tick: self.state.tick,
            liquidity: self.state.liquidity,
            fee_growth_global_x128: if zero_for_one {
                self.state.fee_growth_global_0_x128
            } else {
                self.state.fee_growth_global_1_x128
            },
            protocol_fee: 0,
        };

        // ticks crossed during this swap, committed together at the end
        let mut crossed_ticks: Vec<(i32, TickInfo)> = Vec::new();

        while !current_state.amount_specified_remaining.is_zero()
            && current_state.sqrt_price_x96 != sqrt_price_limit_x96
        {
            let mut step = StepComputations {
                sqrt_price_start_x96: current_state.sqrt_price_x96,
                ..Default::default()
            };

            (step.tick_next, step.initialized) = tick_bitmap::next_initialized_tick_within_one_word(
                &self.state.tick_bitmap,
                current_state.tick,
                self.config.tick_spacing,
                zero_for_one,
            );

            // the bitmap is not aware of the tick bounds
            step.tick_next = step.tick_next.clamp(MIN_TICK, MAX_TICK);

            step.sqrt_price_next_x96 = tick_math::get_sqrt_ratio_at_tick(step.tick_next)?;

            let swap_target_sqrt_ratio = if zero_for_one {
                if step.sqrt_price_next_x96 < sqrt_price_limit_x96 {
                    sqrt_price_limit_x96
                } else {
                    step.sqrt_price_next_x96
                }
            } else if step.sqrt_price_next_x96 > sqrt_price_limit_x96 {
                sqrt_price_limit_x96
            } else {
                step.sqrt_price_next_x96
            };

            (
                current_state.sqrt_price_x96,
                step.amount_in,
                step.amount_out,
                step.fee_amount,
            ) = swap_math::compute_swap_step(
                current_state.sqrt_price_x96,
                swap_target_sqrt_ratio,
                current_state.liquidity,
                current_state.amount_specified_remaining,
                self.config.fee_pips,
            )?;

            if exact_input {
                current_state.amount_specified_remaining = current_state
                    .amount_specified_remaining
                    .overflowing_sub(I256::from_raw(
                        step.amount_in.overflowing_add(step.fee_amount).0,
                    ))
                    .0;
                current_state.amount_calculated -= I256::from_raw(step.amount_out);
            } else {
                current_state.amount_specified_remaining = current_state
                    .amount_specified_remaining
                    .overflowing_add(I256::from_raw(step.amount_out))
                    .0;
                current_state.amount_calculated += I256::from_raw(
                    step.amount_in.overflowing_add(step.fee_amount).0,
                );
            }

            if self.config.fee_protocol > 0 {
                let delta = step.fee_amount / U256::from(self.config.fee_protocol);
                step.fee_amount -= delta;
                current_state.protocol_fee = current_state.protocol_fee.wrapping_add(low_128(delta));
            }

            if current_state.liquidity > 0 {
                current_state.fee_growth_global_x128 =
                    current_state.fee_growth_global_x128.wrapping_add(mul_div(
                        step.fee_amount,
                        Q128,
                        U256::from(current_state.liquidity),
                    )?);
            }

            if current_state.sqrt_price_x96 == step.sqrt_price_next_x96 {
                // reached the next tick; cross it if it carries liquidity
                if step.initialized {
                    let mut info = crossed_ticks
                        .iter()
                        .rev()
                        .find(|(tick, _)| *tick == step.tick_next)
                        .map(|(_, info)| info.clone())
                        .unwrap_or_else(|| {
                            self.state
                                .ticks
                                .get(&step.tick_next)
                                .cloned()
                                .unwrap_or_default()
                        });

                    let (fee_growth_global_0, fee_growth_global_1) = if zero_for_one {
                        (
                            current_state.fee_growth_global_x128,
                            self.state.fee_growth_global_1_x128,
                        )
                    } else {
                        (
                            self.state.fee_growth_global_0_x128,
                            current_state.fee_growth_global_x128,
                        )
                    };

                    let mut liquidity_net = info.cross(fee_growth_global_0, fee_growth_global_1);
                    crossed_ticks.push((step.tick_next, info));

                    // moving leftward crosses the tick in the opposite sense
                    if zero_for_one {
                        liquidity_net = -liquidity_net;
                    }

                    current_state.liquidity =
                        liquidity_math::add_delta(current_state.liquidity, liquidity_net)?;
                }

                current_state.tick = if zero_for_one {
                    step.tick_next.wrapping_sub(1)
                } else {
                    step.tick_next
                };
            } else if current_state.sqrt_price_x96 != step.sqrt_price_start_x96 {
                current_state.tick =
                    tick_math::get_tick_at_sqrt_ratio(current_state.sqrt_price_x96)?;
            }
        }

        // commit
        let state = &mut self.state;
        state.sqrt_price_x96 = current_state.sqrt_price_x96;
        state.tick = current_state.tick;
        state.liquidity = current_state.liquidity;

        if zero_for_one {
            state.fee_growth_global_0_x128 = current_state.fee_growth_global_x128;
            state.protocol_fees_0 = state.protocol_fees_0.wrapping_add(current_state.protocol_fee);
        } else {
            state.fee_growth_global_1_x128 = current_state.fee_growth_global_x128;
            state.protocol_fees_1 = state.protocol_fees_1.wrapping_add(current_state.protocol_fee);
        }

        for (tick, info) in crossed_ticks {
            state.ticks.insert(tick, info);
        }

        let (amount_0, amount_1) = if zero_for_one == exact_input {
            (
                amount_specified - current_state.amount_specified_remaining,
                current_state.amount_calculated,
            )
        } else {
            (
                current_state.amount_calculated,
                amount_specified - current_state.amount_specified_remaining,
            )
        };

        tracing::debug!(
            ?amount_0,
            ?amount_1,
            sqrt_price = ?state.sqrt_price_x96,
            tick = state.tick,
            liquidity = state.liquidity,
            "swap"
        );

        Ok((amount_0, amount_1))
    }

    /// Reads a position; `None` when the owner holds nothing in the range.
    pub fn position(
        &self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Option<&PositionInfo> {
        self.state
            .positions
            .get(&PositionKey::new(owner, tick_lower, tick_upper))
    }

    /// Spot price of token0 in units of token1. Display only; the engine
    /// itself never touches floating point.
    pub fn token_0_price(&self) -> f64 {
        1.0001_f64.powi(self.state.tick)
    }

    /// Approximate virtual reserves `(x, y)` such that `x * y = L^2` at the
    /// current price. Display only.
    pub fn virtual_reserves(&self) -> Result<(u128, u128), PoolError> {
        let sqrt_price = BigFloat::from_f64(self.token_0_price().sqrt());
        let liquidity = BigFloat::from_u128(self.state.liquidity);

        let (reserve_0, reserve_1) = if !sqrt_price.is_zero() {
            (liquidity.div(&sqrt_price), liquidity.mul(&sqrt_price))
        } else {
            (BigFloat::from(0), BigFloat::from(0))
        };

        Ok((
            reserve_0
                .to_u128()
                .ok_or(PoolError::Math(MathError::Overflow))?,
            reserve_1
                .to_u128()
                .ok_or(PoolError::Math(MathError::Overflow))?,
        ))
    }

    fn check_ticks(&self, tick_lower: i32, tick_upper: i32) -> Result<(), PoolError> {
        if tick_lower >= tick_upper {
            return Err(PoolError::TickOrder(tick_lower, tick_upper));
        }
        if tick_lower < MIN_TICK {
            return Err(PoolError::TickOutOfRange(tick_lower));
        }
        if tick_upper > MAX_TICK {
            return Err(PoolError::TickOutOfRange(tick_upper));
        }
        if tick_lower % self.config.tick_spacing != 0 {
            return Err(PoolError::TickMisaligned(tick_lower));
        }
        if tick_upper % self.config.tick_spacing != 0 {
            return Err(PoolError::TickMisaligned(tick_upper));
        }

        Ok(())
    }

    /// Shared implementation of mint and burn. Stages every write, then
    /// commits once nothing can fail anymore, so a failed operation leaves
    /// the state untouched.
    fn modify_position(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
    ) -> Result<(I256, I256), PoolError> {
        self.check_ticks(tick_lower, tick_upper)?;

        if !self.is_initialized() {
            return Err(PoolError::NotInitialized);
        }

        let state = &self.state;
        let fee_growth_global_0 = state.fee_growth_global_0_x128;
        let fee_growth_global_1 = state.fee_growth_global_1_x128;

        let mut lower = state.ticks.get(&tick_lower).cloned().unwrap_or_default();
        let mut upper = state.ticks.get(&tick_upper).cloned().unwrap_or_default();
        let mut flipped_lower = false;
        let mut flipped_upper = false;

        if liquidity_delta != 0 {
            let (fl, gross_lower) = lower.update(
                tick_lower,
                state.tick,
                liquidity_delta,
                fee_growth_global_0,
                fee_growth_global_1,
                false,
            )?;
            let (fu, gross_upper) = upper.update(
                tick_upper,
                state.tick,
                liquidity_delta,
                fee_growth_global_0,
                fee_growth_global_1,
                true,
            )?;
            flipped_lower = fl;
            flipped_upper = fu;

            if liquidity_delta > 0 {
                if gross_lower > self.config.max_liquidity_per_tick {
                    return Err(PoolError::MaxLiquidityPerTick(tick_lower));
                }
                if gross_upper > self.config.max_liquidity_per_tick {
                    return Err(PoolError::MaxLiquidityPerTick(tick_upper));
                }
            }
        }

        let (fee_growth_inside_0, fee_growth_inside_1) = tick::fee_growth_inside(
            &lower,
            &upper,
            tick_lower,
            tick_upper,
            state.tick,
            fee_growth_global_0,
            fee_growth_global_1,
        );

        let key = PositionKey::new(owner, tick_lower, tick_upper);
        let mut position = state.positions.get(&key).cloned().unwrap_or_default();
        position.update(liquidity_delta, fee_growth_inside_0, fee_growth_inside_1)?;

        let mut amount_0 = I256::ZERO;
        let mut amount_1 = I256::ZERO;
        let mut liquidity_next = state.liquidity;

        if liquidity_delta != 0 {
            if state.tick < tick_lower {
                // the range is entirely above the current price: token0 only
                amount_0 = sqrt_price_math::get_amount_0_delta_signed(
                    tick_math::get_sqrt_ratio_at_tick(tick_lower)?,
                    tick_math::get_sqrt_ratio_at_tick(tick_upper)?,
                    liquidity_delta,
                )?;
            } else if state.tick < tick_upper {
                // the range straddles the current price
                amount_0 = sqrt_price_math::get_amount_0_delta_signed(
                    state.sqrt_price_x96,
                    tick_math::get_sqrt_ratio_at_tick(tick_upper)?,
                    liquidity_delta,
                )?;
                amount_1 = sqrt_price_math::get_amount_1_delta_signed(
                    tick_math::get_sqrt_ratio_at_tick(tick_lower)?,
                    state.sqrt_price_x96,
                    liquidity_delta,
                )?;
                liquidity_next = liquidity_math::add_delta(state.liquidity, liquidity_delta)?;
            } else {
                // entirely below the current price: token1 only
                amount_1 = sqrt_price_math::get_amount_1_delta_signed(
                    tick_math::get_sqrt_ratio_at_tick(tick_lower)?,
                    tick_math::get_sqrt_ratio_at_tick(tick_upper)?,
                    liquidity_delta,
                )?;
            }
        }

        // commit
        let state = &mut self.state;

        if liquidity_delta != 0 {
            if flipped_lower && liquidity_delta < 0 {
                state.ticks.remove(&tick_lower);
            } else {
                state.ticks.insert(tick_lower, lower);
            }
            if flipped_upper && liquidity_delta < 0 {
                state.ticks.remove(&tick_upper);
            } else {
                state.ticks.insert(tick_upper, upper);
            }

            if flipped_lower {
                tick_bitmap::flip_tick(&mut state.tick_bitmap, tick_lower, self.config.tick_spacing);
            }
            if flipped_upper {
                tick_bitmap::flip_tick(&mut state.tick_bitmap, tick_upper, self.config.tick_spacing);
            }

            state.liquidity = liquidity_next;
        }

        state.positions.insert(key, position);

        Ok((amount_0, amount_1))
    }
}

fn low_128(value: U256) -> u128 {
    let limbs = value.as_limbs();
    (limbs[0] as u128) | ((limbs[1] as u128) << 64)
}
