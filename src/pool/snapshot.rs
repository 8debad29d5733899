use std::collections::BTreeMap;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::StorageError,
    pool::{
        position::{self, PositionInfo, PositionKey},
        tick::TickInfo,
        PoolConfig, PoolState,
    },
};

/// A durable, by-value copy of a pool state. Snapshots share no mutable
/// structure with the live pool, and their encoding is canonical: every map
/// is key-sorted, so equal states produce byte-identical encodings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub description: String,
    pub config: PoolConfig,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub fee_growth_global_0_x128: U256,
    pub fee_growth_global_1_x128: U256,
    pub ticks: BTreeMap<i32, TickInfo>,
    pub tick_bitmap: BTreeMap<i16, U256>,
    #[serde(with = "position::as_pairs")]
    pub positions: BTreeMap<PositionKey, PositionInfo>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Deep-copies the given state under a fresh snapshot id.
    pub fn capture(description: &str, config: &PoolConfig, state: &PoolState) -> Self {
        Snapshot {
            id: Uuid::new_v4(),
            description: description.to_string(),
            config: config.clone(),
            sqrt_price_x96: state.sqrt_price_x96,
            tick: state.tick,
            liquidity: state.liquidity,
            fee_growth_global_0_x128: state.fee_growth_global_0_x128,
            fee_growth_global_1_x128: state.fee_growth_global_1_x128,
            ticks: state.ticks.clone(),
            tick_bitmap: state.tick_bitmap.clone(),
            positions: state.positions.clone(),
            created_at: Utc::now(),
        }
    }

    /// Materializes a pool state from this snapshot. The restored state
    /// carries the snapshot's id, making recovery externally observable.
    pub fn restore(&self) -> PoolState {
        PoolState {
            id: self.id,
            sqrt_price_x96: self.sqrt_price_x96,
            tick: self.tick,
            liquidity: self.liquidity,
            fee_growth_global_0_x128: self.fee_growth_global_0_x128,
            fee_growth_global_1_x128: self.fee_growth_global_1_x128,
            protocol_fees_0: 0,
            protocol_fees_1: 0,
            ticks: self.ticks.clone(),
            tick_bitmap: self.tick_bitmap.clone(),
            positions: self.positions.clone(),
            snapshot: Some(self.clone()),
        }
    }

    /// Canonical byte encoding used both for persistence and for
    /// byte-for-byte state comparisons.
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
