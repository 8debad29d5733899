use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pool::PoolState;

/// The kind of a recorded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpKind {
    Initialize,
    Mint,
    Burn,
    Swap,
    Collect,
    Fork,
    Snapshot,
    Recover,
}

/// Inputs and outputs of one recorded operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpRecord {
    Initialize {
        sqrt_price_x96: U256,
        tick: i32,
    },
    Mint {
        owner: String,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount_0: U256,
        amount_1: U256,
    },
    Burn {
        owner: String,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount_0: U256,
        amount_1: U256,
    },
    Swap {
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
        amount_0: I256,
        amount_1: I256,
    },
    Collect {
        owner: String,
        tick_lower: i32,
        tick_upper: i32,
        amount_0_requested: u128,
        amount_1_requested: u128,
        amount_0: u128,
        amount_1: u128,
    },
    Fork {
        source_pool_id: Uuid,
    },
    Snapshot {
        snapshot_id: Uuid,
    },
    Recover {
        snapshot_id: Uuid,
    },
}

impl OpRecord {
    pub fn kind(&self) -> OpKind {
        match self {
            OpRecord::Initialize { .. } => OpKind::Initialize,
            OpRecord::Mint { .. } => OpKind::Mint,
            OpRecord::Burn { .. } => OpKind::Burn,
            OpRecord::Swap { .. } => OpKind::Swap,
            OpRecord::Collect { .. } => OpKind::Collect,
            OpRecord::Fork { .. } => OpKind::Fork,
            OpRecord::Snapshot { .. } => OpKind::Snapshot,
            OpRecord::Recover { .. } => OpKind::Recover,
        }
    }

    /// Fork and recover transitions root a new transition history and can
    /// not be stepped back over.
    pub fn is_root(&self) -> bool {
        matches!(self, OpRecord::Fork { .. } | OpRecord::Recover { .. })
    }
}

/// One recorded state transition. Transitions form a chain per pool; forks
/// root a fresh chain, so the histories of all pools together form a DAG.
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub record: OpRecord,
    pub post_state_id: Uuid,
    /// Pre-image of the state this transition replaced; consumed by
    /// `step_back` to restore it byte-identically.
    pub(crate) pre_state: PoolState,
}

impl Transition {
    pub fn kind(&self) -> OpKind {
        self.record.kind()
    }
}
