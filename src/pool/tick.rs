use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    errors::MathError,
    math::{liquidity_math, tick_math::{MAX_TICK, MIN_TICK}},
};

/// Per-tick bookkeeping. A tick is initialized iff `liquidity_gross > 0`,
/// and the tick bitmap mirrors exactly that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
    pub fee_growth_outside_0_x128: U256,
    pub fee_growth_outside_1_x128: U256,
    pub initialized: bool,
}

impl TickInfo {
    /// Applies a liquidity delta to this tick, returning whether the tick
    /// flipped between initialized and uninitialized together with the gross
    /// liquidity after the update. The caller commits the updated value only
    /// once the whole operation has succeeded.
    pub fn update(
        &mut self,
        tick: i32,
        tick_current: i32,
        liquidity_delta: i128,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
        upper: bool,
    ) -> Result<(bool, u128), MathError> {
        let liquidity_gross_before = self.liquidity_gross;
        let liquidity_gross_after =
            liquidity_math::add_delta(liquidity_gross_before, liquidity_delta)?;

        let flipped = (liquidity_gross_after == 0) != (liquidity_gross_before == 0);

        if liquidity_gross_before == 0 {
            // by convention, all growth before a tick was initialized is
            // assumed to have happened below the tick
            if tick <= tick_current {
                self.fee_growth_outside_0_x128 = fee_growth_global_0_x128;
                self.fee_growth_outside_1_x128 = fee_growth_global_1_x128;
            }
            self.initialized = true;
        }

        self.liquidity_gross = liquidity_gross_after;

        // lower ticks add liquidity when crossed left to right, upper ticks
        // remove it
        self.liquidity_net = if upper {
            self.liquidity_net
                .checked_sub(liquidity_delta)
                .ok_or(MathError::LiquidityAdd)?
        } else {
            self.liquidity_net
                .checked_add(liquidity_delta)
                .ok_or(MathError::LiquidityAdd)?
        };

        Ok((flipped, liquidity_gross_after))
    }

    /// Crosses the tick during a swap, flipping its outside fee growth
    /// relative to the current globals. Returns the liquidity to add when
    /// moving left to right (negate when moving right to left).
    pub fn cross(
        &mut self,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
    ) -> i128 {
        self.fee_growth_outside_0_x128 =
            fee_growth_global_0_x128.wrapping_sub(self.fee_growth_outside_0_x128);
        self.fee_growth_outside_1_x128 =
            fee_growth_global_1_x128.wrapping_sub(self.fee_growth_outside_1_x128);

        self.liquidity_net
    }
}

/// Reconstructs the fee growth accumulated inside a tick range from the
/// globals and the two boundary ticks' outside growth. All arithmetic wraps
/// at 2^256, which is legal and expected for these accumulators.
pub fn fee_growth_inside(
    lower: &TickInfo,
    upper: &TickInfo,
    tick_lower: i32,
    tick_upper: i32,
    tick_current: i32,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
) -> (U256, U256) {
    let (fee_growth_below_0_x128, fee_growth_below_1_x128) = if tick_current >= tick_lower {
        (
            lower.fee_growth_outside_0_x128,
            lower.fee_growth_outside_1_x128,
        )
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(lower.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(lower.fee_growth_outside_1_x128),
        )
    };

    let (fee_growth_above_0_x128, fee_growth_above_1_x128) = if tick_current < tick_upper {
        (
            upper.fee_growth_outside_0_x128,
            upper.fee_growth_outside_1_x128,
        )
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(upper.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(upper.fee_growth_outside_1_x128),
        )
    };

    (
        fee_growth_global_0_x128
            .wrapping_sub(fee_growth_below_0_x128)
            .wrapping_sub(fee_growth_above_0_x128),
        fee_growth_global_1_x128
            .wrapping_sub(fee_growth_below_1_x128)
            .wrapping_sub(fee_growth_above_1_x128),
    )
}

/// Maximum `liquidity_gross` a single tick may carry for the given spacing,
/// so that the full usable range can be saturated without overflowing u128.
pub fn max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let min_tick = (MIN_TICK / tick_spacing) * tick_spacing;
    let max_tick = (MAX_TICK / tick_spacing) * tick_spacing;
    let num_ticks = ((max_tick - min_tick) / tick_spacing) as u128 + 1;

    u128::MAX / num_ticks
}
