use alloy_primitives::{I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a liquidity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidityEventKind {
    Mint,
    Burn,
}

/// An on-chain mint or burn, as recorded by the event backfill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityEvent {
    pub id: i64,
    pub block_number: u64,
    pub log_index: u32,
    #[serde(rename = "type")]
    pub kind: LiquidityEventKind,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    #[serde(rename = "amount0")]
    pub amount_0: U256,
    #[serde(rename = "amount1")]
    pub amount_1: U256,
    pub date: DateTime<Utc>,
}

/// An on-chain swap. The record carries both amounts but not which side was
/// specified; the replay driver reconstructs that by dry-running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub id: i64,
    pub block_number: u64,
    pub log_index: u32,
    #[serde(rename = "amount0")]
    pub amount_0: I256,
    #[serde(rename = "amount1")]
    pub amount_1: I256,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
    pub date: DateTime<Utc>,
}

/// A replayable event of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoolEvent {
    Liquidity(LiquidityEvent),
    Swap(SwapEvent),
}

impl PoolEvent {
    pub fn id(&self) -> i64 {
        match self {
            PoolEvent::Liquidity(e) => e.id,
            PoolEvent::Swap(e) => e.id,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        match self {
            PoolEvent::Liquidity(e) => e.date,
            PoolEvent::Swap(e) => e.date,
        }
    }

    /// Replay order is ascending `(block_number, log_index)`.
    pub fn ordering_key(&self) -> (u64, u32) {
        match self {
            PoolEvent::Liquidity(e) => (e.block_number, e.log_index),
            PoolEvent::Swap(e) => (e.block_number, e.log_index),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ruint::uint;

    #[test]
    fn liquidity_event_round_trips_through_json() {
        let event = LiquidityEvent {
            id: 7,
            block_number: 12370624,
            log_index: 31,
            kind: LiquidityEventKind::Mint,
            tick_lower: 192180,
            tick_upper: 193380,
            liquidity: 10_860_507_277_202,
            amount_0: U256::ZERO,
            amount_1: uint!(34399999543676_U256),
            date: "2021-05-05T21:42:11Z".parse().unwrap(),
        };

        let encoded = serde_json::to_string(&event).unwrap();
        assert!(encoded.contains("\"type\":\"MINT\""));
        assert!(encoded.contains("\"amount0\""));

        let decoded: LiquidityEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn swap_event_preserves_signed_amounts() {
        let event = SwapEvent {
            id: 9,
            block_number: 12370660,
            log_index: 2,
            amount_0: I256::from_raw(U256::from(1_000_000u64)),
            amount_1: -I256::from_raw(U256::from(3_349_734_533u64)),
            sqrt_price_x96: uint!(0x43efef20f018fdc58e7a5cf0416a_U256),
            liquidity: 10_860_507_277_202,
            tick: 195285,
            date: "2021-05-05T22:10:45Z".parse().unwrap(),
        };

        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: SwapEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
        assert!(decoded.amount_1 < I256::ZERO);
    }
}
