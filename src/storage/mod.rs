//! SQLite-backed persistence: one store for snapshots, one for the raw
//! event backfill. Writes are single-row and therefore atomic; the
//! in-memory pool state never depends on these succeeding.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_primitives::{I256, U256};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::{
    errors::StorageError,
    events::{LiquidityEvent, LiquidityEventKind, PoolEvent, SwapEvent},
    pool::{
        position::{PositionInfo, PositionKey},
        snapshot::Snapshot,
        tick::TickInfo,
        PoolConfig,
    },
};

/// Key-value snapshot store: one row per snapshot, scalar columns for the
/// cheap fields and canonical JSON blobs for the three tables.
pub struct SnapshotStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::create_tables(&conn)?;

        Ok(SnapshotStore {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// An in-memory store, for tests and dry runs. It has no path, so
    /// snapshots written to it are not recoverable through the roadmap.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::create_tables(&conn)?;

        Ok(SnapshotStore { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn create_tables(conn: &Connection) -> Result<(), StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                config TEXT NOT NULL,
                sqrt_price_x96 TEXT NOT NULL,
                tick INTEGER NOT NULL,
                liquidity TEXT NOT NULL,
                fee_growth_global_0_x128 TEXT NOT NULL,
                fee_growth_global_1_x128 TEXT NOT NULL,
                ticks BLOB NOT NULL,
                tick_bitmap BLOB NOT NULL,
                positions BLOB NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Inserts or replaces the snapshot as a single row.
    pub fn put(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshots (
                id, description, config, sqrt_price_x96, tick, liquidity,
                fee_growth_global_0_x128, fee_growth_global_1_x128,
                ticks, tick_bitmap, positions, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                snapshot.id.to_string(),
                snapshot.description,
                serde_json::to_string(&snapshot.config)?,
                snapshot.sqrt_price_x96.to_string(),
                snapshot.tick,
                snapshot.liquidity.to_string(),
                snapshot.fee_growth_global_0_x128.to_string(),
                snapshot.fee_growth_global_1_x128.to_string(),
                serde_json::to_vec(&snapshot.ticks)?,
                serde_json::to_vec(&snapshot.tick_bitmap)?,
                encode_positions(&snapshot.positions)?,
                snapshot.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Snapshot>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT description, config, sqrt_price_x96, tick, liquidity,
                        fee_growth_global_0_x128, fee_growth_global_1_x128,
                        ticks, tick_bitmap, positions, created_at
                 FROM snapshots WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Vec<u8>>(7)?,
                        row.get::<_, Vec<u8>>(8)?,
                        row.get::<_, Vec<u8>>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            description,
            config,
            sqrt_price_x96,
            tick,
            liquidity,
            fee_growth_global_0_x128,
            fee_growth_global_1_x128,
            ticks,
            tick_bitmap,
            positions,
            created_at,
        )) = row
        else {
            return Ok(None);
        };

        let config: PoolConfig = serde_json::from_str(&config)?;
        let ticks: BTreeMap<i32, TickInfo> = serde_json::from_slice(&ticks)?;
        let tick_bitmap: BTreeMap<i16, U256> = serde_json::from_slice(&tick_bitmap)?;
        let positions = decode_positions(&positions)?;

        Ok(Some(Snapshot {
            id,
            description,
            config,
            sqrt_price_x96: parse_u256(&sqrt_price_x96)?,
            tick,
            liquidity: parse_u128(&liquidity)?,
            fee_growth_global_0_x128: parse_u256(&fee_growth_global_0_x128)?,
            fee_growth_global_1_x128: parse_u256(&fee_growth_global_1_x128)?,
            ticks,
            tick_bitmap,
            positions,
            created_at: parse_date(&created_at)?,
        }))
    }

    /// Snapshot ids with descriptions and creation times, newest first.
    pub fn list(&self) -> Result<Vec<(Uuid, String, DateTime<Utc>)>, StorageError> {
        let mut statement = self.conn.prepare(
            "SELECT id, description, created_at FROM snapshots ORDER BY created_at DESC",
        )?;

        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, description, created_at) = row?;
            result.push((parse_uuid(&id)?, description, parse_date(&created_at)?));
        }

        Ok(result)
    }
}

/// Row store for the raw event backfill, queried in replay order.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::create_tables(&conn)?;
        Ok(EventStore { conn })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::create_tables(&conn)?;
        Ok(EventStore { conn })
    }

    fn create_tables(conn: &Connection) -> Result<(), StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS liquidity_events (
                id INTEGER PRIMARY KEY,
                block_number INTEGER NOT NULL,
                log_index INTEGER NOT NULL,
                type TEXT NOT NULL,
                tick_lower INTEGER NOT NULL,
                tick_upper INTEGER NOT NULL,
                liquidity TEXT NOT NULL,
                amount0 TEXT NOT NULL,
                amount1 TEXT NOT NULL,
                date TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS swap_events (
                id INTEGER PRIMARY KEY,
                block_number INTEGER NOT NULL,
                log_index INTEGER NOT NULL,
                amount0 TEXT NOT NULL,
                amount1 TEXT NOT NULL,
                sqrt_price_x96 TEXT NOT NULL,
                liquidity TEXT NOT NULL,
                tick INTEGER NOT NULL,
                date TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn insert_liquidity_event(&self, event: &LiquidityEvent) -> Result<(), StorageError> {
        let kind = match event.kind {
            LiquidityEventKind::Mint => "MINT",
            LiquidityEventKind::Burn => "BURN",
        };

        self.conn.execute(
            "INSERT OR REPLACE INTO liquidity_events
             (id, block_number, log_index, type, tick_lower, tick_upper, liquidity, amount0, amount1, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id,
                event.block_number,
                event.log_index,
                kind,
                event.tick_lower,
                event.tick_upper,
                event.liquidity.to_string(),
                event.amount_0.to_string(),
                event.amount_1.to_string(),
                event.date.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    pub fn insert_swap_event(&self, event: &SwapEvent) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO swap_events
             (id, block_number, log_index, amount0, amount1, sqrt_price_x96, liquidity, tick, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id,
                event.block_number,
                event.log_index,
                event.amount_0.to_string(),
                event.amount_1.to_string(),
                event.sqrt_price_x96.to_string(),
                event.liquidity.to_string(),
                event.tick,
                event.date.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    pub fn liquidity_events(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<LiquidityEvent>, StorageError> {
        let mut statement = self.conn.prepare(
            "SELECT id, block_number, log_index, type, tick_lower, tick_upper, liquidity, amount0, amount1, date
             FROM liquidity_events
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date < ?2)
             ORDER BY block_number ASC, log_index ASC",
        )?;

        let (start, end) = window_bounds(window);
        let rows = statement.query_map(params![start, end], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, i32>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, block_number, log_index, kind, tick_lower, tick_upper, liquidity, amount_0, amount_1, date) =
                row?;

            events.push(LiquidityEvent {
                id,
                block_number,
                log_index,
                kind: match kind.as_str() {
                    "MINT" => LiquidityEventKind::Mint,
                    "BURN" => LiquidityEventKind::Burn,
                    other => {
                        return Err(StorageError::Corrupt(format!(
                            "unknown liquidity event type {other}"
                        )))
                    }
                },
                tick_lower,
                tick_upper,
                liquidity: parse_u128(&liquidity)?,
                amount_0: parse_u256(&amount_0)?,
                amount_1: parse_u256(&amount_1)?,
                date: parse_date(&date)?,
            });
        }

        Ok(events)
    }

    pub fn swap_events(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<SwapEvent>, StorageError> {
        let mut statement = self.conn.prepare(
            "SELECT id, block_number, log_index, amount0, amount1, sqrt_price_x96, liquidity, tick, date
             FROM swap_events
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date < ?2)
             ORDER BY block_number ASC, log_index ASC",
        )?;

        let (start, end) = window_bounds(window);
        let rows = statement.query_map(params![start, end], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i32>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, block_number, log_index, amount_0, amount_1, sqrt_price_x96, liquidity, tick, date) =
                row?;

            events.push(SwapEvent {
                id,
                block_number,
                log_index,
                amount_0: parse_i256(&amount_0)?,
                amount_1: parse_i256(&amount_1)?,
                sqrt_price_x96: parse_u256(&sqrt_price_x96)?,
                liquidity: parse_u128(&liquidity)?,
                tick,
                date: parse_date(&date)?,
            });
        }

        Ok(events)
    }

    /// Both event kinds merged into replay order.
    pub fn events(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<PoolEvent>, StorageError> {
        let mut events: Vec<PoolEvent> = self
            .liquidity_events(window)?
            .into_iter()
            .map(PoolEvent::Liquidity)
            .chain(self.swap_events(window)?.into_iter().map(PoolEvent::Swap))
            .collect();

        events.sort_by_key(|event| event.ordering_key());

        Ok(events)
    }
}

fn window_bounds(
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> (Option<String>, Option<String>) {
    match window {
        Some((start, end)) => (Some(start.to_rfc3339()), Some(end.to_rfc3339())),
        None => (None, None),
    }
}

// Position tables are stored as sorted key/value runs; JSON objects can not
// carry structured keys.
fn encode_positions(
    positions: &BTreeMap<PositionKey, PositionInfo>,
) -> Result<Vec<u8>, StorageError> {
    let pairs: Vec<(&PositionKey, &PositionInfo)> = positions.iter().collect();
    Ok(serde_json::to_vec(&pairs)?)
}

fn decode_positions(bytes: &[u8]) -> Result<BTreeMap<PositionKey, PositionInfo>, StorageError> {
    let pairs: Vec<(PositionKey, PositionInfo)> = serde_json::from_slice(bytes)?;
    Ok(pairs.into_iter().collect())
}

fn parse_uuid(value: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(value).map_err(|_| StorageError::Corrupt(format!("bad uuid {value}")))
}

fn parse_u256(value: &str) -> Result<U256, StorageError> {
    U256::from_str(value).map_err(|_| StorageError::Corrupt(format!("bad u256 {value}")))
}

fn parse_i256(value: &str) -> Result<I256, StorageError> {
    I256::from_str(value).map_err(|_| StorageError::Corrupt(format!("bad i256 {value}")))
}

fn parse_u128(value: &str) -> Result<u128, StorageError> {
    value
        .parse()
        .map_err(|_| StorageError::Corrupt(format!("bad u128 {value}")))
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| StorageError::Corrupt(format!("bad timestamp {value}")))
}
