use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use uuid::Uuid;

use crate::pool::{snapshot::Snapshot, PoolConfig};

lazy_static! {
    static ref ROADMAP: Mutex<Roadmap> = Mutex::new(Roadmap::default());
}

/// Registration record of one live pool.
#[derive(Debug, Clone)]
pub struct PoolRecord {
    pub pool_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub config: PoolConfig,
    pub created_at: DateTime<Utc>,
}

/// Process-wide directory of live pools and known snapshots. Snapshots are
/// indexed both in memory and, once persisted, by the store they were
/// written to, so recovery works across pool instances.
#[derive(Debug, Default)]
struct Roadmap {
    pools: HashMap<Uuid, PoolRecord>,
    snapshots: HashMap<Uuid, Snapshot>,
    persisted: HashMap<Uuid, PathBuf>,
}

pub fn register_pool(pool_id: Uuid, parent_id: Option<Uuid>, config: &PoolConfig) {
    let mut roadmap = ROADMAP.lock().expect("roadmap lock poisoned");
    roadmap.pools.insert(
        pool_id,
        PoolRecord {
            pool_id,
            parent_id,
            config: config.clone(),
            created_at: Utc::now(),
        },
    );
}

pub fn pool(pool_id: Uuid) -> Option<PoolRecord> {
    ROADMAP
        .lock()
        .expect("roadmap lock poisoned")
        .pools
        .get(&pool_id)
        .cloned()
}

/// Pools forked, directly or transitively, from the given pool.
pub fn descendants(pool_id: Uuid) -> Vec<PoolRecord> {
    let roadmap = ROADMAP.lock().expect("roadmap lock poisoned");

    let mut result = Vec::new();
    let mut frontier = vec![pool_id];

    while let Some(parent) = frontier.pop() {
        for record in roadmap.pools.values() {
            if record.parent_id == Some(parent) {
                frontier.push(record.pool_id);
                result.push(record.clone());
            }
        }
    }

    result
}

pub fn register_snapshot(snapshot: &Snapshot) {
    let mut roadmap = ROADMAP.lock().expect("roadmap lock poisoned");
    roadmap.snapshots.insert(snapshot.id, snapshot.clone());
}

pub fn register_persisted(snapshot_id: Uuid, path: &Path) {
    let mut roadmap = ROADMAP.lock().expect("roadmap lock poisoned");
    roadmap.persisted.insert(snapshot_id, path.to_path_buf());
}

/// Drops the in-memory copy of a snapshot. Used once a persistence handle
/// exists, so the directory's memory use stays bounded by live snapshots.
pub fn evict_snapshot(snapshot_id: Uuid) {
    let mut roadmap = ROADMAP.lock().expect("roadmap lock poisoned");
    roadmap.snapshots.remove(&snapshot_id);
}

/// In-memory snapshot lookup; does not touch persistence.
pub fn snapshot(snapshot_id: Uuid) -> Option<Snapshot> {
    ROADMAP
        .lock()
        .expect("roadmap lock poisoned")
        .snapshots
        .get(&snapshot_id)
        .cloned()
}

/// Store the snapshot was persisted to, if any.
pub fn persisted_path(snapshot_id: Uuid) -> Option<PathBuf> {
    ROADMAP
        .lock()
        .expect("roadmap lock poisoned")
        .persisted
        .get(&snapshot_id)
        .cloned()
}
