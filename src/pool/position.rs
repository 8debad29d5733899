use std::collections::BTreeMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    errors::PoolError,
    math::{full_math::mul_div, liquidity_math, Q128},
};

/// Identity of a position: one owner may hold at most one position per tick
/// range.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl PositionKey {
    pub fn new(owner: &str, tick_lower: i32, tick_upper: i32) -> Self {
        PositionKey {
            owner: owner.to_string(),
            tick_lower,
            tick_upper,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub liquidity: u128,
    pub fee_growth_inside_0_last_x128: U256,
    pub fee_growth_inside_1_last_x128: U256,
    pub tokens_owed_0: u128,
    pub tokens_owed_1: u128,
}

impl PositionInfo {
    /// Applies a liquidity delta and settles the fees accumulated since the
    /// last touch into `tokens_owed_*`. A zero delta is a poke and requires
    /// existing liquidity.
    pub fn update(
        &mut self,
        liquidity_delta: i128,
        fee_growth_inside_0_x128: U256,
        fee_growth_inside_1_x128: U256,
    ) -> Result<(), PoolError> {
        let liquidity_next = if liquidity_delta == 0 {
            if self.liquidity == 0 {
                return Err(PoolError::ZeroLiquidity);
            }
            self.liquidity
        } else {
            liquidity_math::add_delta(self.liquidity, liquidity_delta)?
        };

        // owed = liquidity * growth delta / 2^128, truncated to u128 exactly
        // like the reference accounting (owners are expected to collect
        // before the accumulator wraps)
        let tokens_owed_0 = low_128(mul_div(
            fee_growth_inside_0_x128.wrapping_sub(self.fee_growth_inside_0_last_x128),
            U256::from(self.liquidity),
            Q128,
        )?);
        let tokens_owed_1 = low_128(mul_div(
            fee_growth_inside_1_x128.wrapping_sub(self.fee_growth_inside_1_last_x128),
            U256::from(self.liquidity),
            Q128,
        )?);

        self.liquidity = liquidity_next;
        self.fee_growth_inside_0_last_x128 = fee_growth_inside_0_x128;
        self.fee_growth_inside_1_last_x128 = fee_growth_inside_1_x128;

        if tokens_owed_0 > 0 || tokens_owed_1 > 0 {
            self.tokens_owed_0 = self.tokens_owed_0.wrapping_add(tokens_owed_0);
            self.tokens_owed_1 = self.tokens_owed_1.wrapping_add(tokens_owed_1);
        }

        Ok(())
    }

    /// A position with no liquidity and nothing left to collect can be
    /// removed from the table.
    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.tokens_owed_0 == 0 && self.tokens_owed_1 == 0
    }
}

fn low_128(value: U256) -> u128 {
    let limbs = value.as_limbs();
    (limbs[0] as u128) | ((limbs[1] as u128) << 64)
}

/// Serializes the position table as sorted key/value pairs. JSON objects
/// cannot carry structured keys, and the sorted run keeps the encoding
/// canonical.
pub mod as_pairs {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(
        map: &BTreeMap<PositionKey, PositionInfo>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<PositionKey, PositionInfo>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<(PositionKey, PositionInfo)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
