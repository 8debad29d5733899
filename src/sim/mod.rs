pub mod roadmap;
pub mod transition;

use std::fmt;

use alloy_primitives::{I256, U256};
use uuid::Uuid;

use crate::{
    errors::SimulatorError,
    pool::{snapshot::Snapshot, CorePool, PoolConfig},
    sim::transition::{OpRecord, Transition},
    storage::SnapshotStore,
};

/// Observer invoked after every successful transition with the post-state
/// pool and the transition record. An error from the observer undoes the
/// transition.
pub type PostProcessor =
    Box<dyn Fn(&CorePool, &Transition) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send>;

/// Transactional shell around [`CorePool`]: every mutation is recorded as a
/// [`Transition`] carrying the pre-image of the state it replaced, which
/// makes dry runs, forks, snapshots, step-back and recovery possible.
///
/// A single pool is not thread-safe; callers serialize access to it.
/// Distinct pools are fully independent.
pub struct ConfigurableCorePool {
    pool: CorePool,
    transitions: Vec<Transition>,
    post_processor: Option<PostProcessor>,
}

impl fmt::Debug for ConfigurableCorePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurableCorePool")
            .field("pool", &self.pool)
            .field("transitions", &self.transitions.len())
            .field("post_processor", &self.post_processor.is_some())
            .finish()
    }
}

impl ConfigurableCorePool {
    pub fn new(config: PoolConfig) -> Self {
        let pool = CorePool::new(config);
        roadmap::register_pool(pool.state.id, None, &pool.config);

        ConfigurableCorePool {
            pool,
            transitions: Vec::new(),
            post_processor: None,
        }
    }

    /// Wraps an existing engine, e.g. one rebuilt from external state.
    pub fn from_pool(pool: CorePool) -> Self {
        roadmap::register_pool(pool.state.id, None, &pool.config);

        ConfigurableCorePool {
            pool,
            transitions: Vec::new(),
            post_processor: None,
        }
    }

    pub fn pool(&self) -> &CorePool {
        &self.pool
    }

    pub fn pool_id(&self) -> Uuid {
        self.pool.state.id
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Installs (or replaces) the post-processor.
    pub fn update_post_processor(&mut self, post_processor: PostProcessor) {
        self.post_processor = Some(post_processor);
    }

    pub fn initialize(&mut self, sqrt_price_x96: U256) -> Result<i32, SimulatorError> {
        self.apply(|pool| {
            let tick = pool.initialize(sqrt_price_x96)?;
            Ok((
                tick,
                OpRecord::Initialize {
                    sqrt_price_x96,
                    tick,
                },
            ))
        })
    }

    pub fn mint(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), SimulatorError> {
        self.apply(|pool| {
            let (amount_0, amount_1) = pool.mint(owner, tick_lower, tick_upper, amount)?;
            Ok((
                (amount_0, amount_1),
                OpRecord::Mint {
                    owner: owner.to_string(),
                    tick_lower,
                    tick_upper,
                    amount,
                    amount_0,
                    amount_1,
                },
            ))
        })
    }

    pub fn burn(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), SimulatorError> {
        self.apply(|pool| {
            let (amount_0, amount_1) = pool.burn(owner, tick_lower, tick_upper, amount)?;
            Ok((
                (amount_0, amount_1),
                OpRecord::Burn {
                    owner: owner.to_string(),
                    tick_lower,
                    tick_upper,
                    amount,
                    amount_0,
                    amount_1,
                },
            ))
        })
    }

    pub fn swap(
        &mut self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<(I256, I256), SimulatorError> {
        self.apply(|pool| {
            let (amount_0, amount_1) =
                pool.swap(zero_for_one, amount_specified, sqrt_price_limit_x96)?;
            Ok((
                (amount_0, amount_1),
                OpRecord::Swap {
                    zero_for_one,
                    amount_specified,
                    sqrt_price_limit_x96,
                    amount_0,
                    amount_1,
                },
            ))
        })
    }

    pub fn collect(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount_0_requested: u128,
        amount_1_requested: u128,
    ) -> Result<(u128, u128), SimulatorError> {
        self.apply(|pool| {
            let (amount_0, amount_1) = pool.collect(
                owner,
                tick_lower,
                tick_upper,
                amount_0_requested,
                amount_1_requested,
            )?;
            Ok((
                (amount_0, amount_1),
                OpRecord::Collect {
                    owner: owner.to_string(),
                    tick_lower,
                    tick_upper,
                    amount_0_requested,
                    amount_1_requested,
                    amount_0,
                    amount_1,
                },
            ))
        })
    }

    /// Dry-runs a swap against a deep copy of the pool. The live pool is
    /// untouched and no transition is recorded.
    pub fn query_swap(
        &self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<(I256, I256), SimulatorError> {
        let mut scratch = self.pool.clone();
        Ok(scratch.swap(zero_for_one, amount_specified, sqrt_price_limit_x96)?)
    }

    /// Deep-copies the pool into an independent instance with a fresh id.
    /// The fork shares no mutable storage with the original and roots its
    /// own transition history; its lineage is recorded in the roadmap.
    pub fn fork(&self) -> ConfigurableCorePool {
        let mut pool = self.pool.clone();
        pool.state.id = Uuid::new_v4();

        roadmap::register_pool(pool.state.id, Some(self.pool.state.id), &pool.config);

        let root = Transition {
            id: Uuid::new_v4(),
            parent_id: self.transitions.last().map(|t| t.id),
            record: OpRecord::Fork {
                source_pool_id: self.pool.state.id,
            },
            post_state_id: pool.state.id,
            pre_state: pool.state.clone(),
        };

        tracing::debug!(source = %self.pool.state.id, fork = %pool.state.id, "fork");

        ConfigurableCorePool {
            pool,
            transitions: vec![root],
            post_processor: None,
        }
    }

    /// Deep-copies the current state into `state.snapshot` under a fresh
    /// snapshot id and registers it with the roadmap. Persistence is not
    /// touched.
    pub fn take_snapshot(&mut self, description: &str) -> Result<Uuid, SimulatorError> {
        self.apply(|pool| {
            let snapshot = Snapshot::capture(description, &pool.config, &pool.state);
            let snapshot_id = snapshot.id;

            roadmap::register_snapshot(&snapshot);
            pool.state.snapshot = Some(snapshot);

            Ok((snapshot_id, OpRecord::Snapshot { snapshot_id }))
        })
    }

    /// Writes the current snapshot (taking one first if absent) to the
    /// store and registers the persisted copy with the roadmap.
    pub fn persist_snapshot(&mut self, store: &SnapshotStore) -> Result<Uuid, SimulatorError> {
        let snapshot = match &self.pool.state.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => {
                self.take_snapshot("")?;
                self.pool
                    .state
                    .snapshot
                    .clone()
                    .expect("snapshot was just taken")
            }
        };

        store.put(&snapshot)?;
        if let Some(path) = store.path() {
            roadmap::register_persisted(snapshot.id, path);
            roadmap::evict_snapshot(snapshot.id);
        }

        tracing::debug!(snapshot = %snapshot.id, "snapshot persisted");

        Ok(snapshot.id)
    }

    /// Restores the most recent transition's pre-state. Fork and recover
    /// roots can not be stepped over.
    pub fn step_back(&mut self) -> Result<(), SimulatorError> {
        let poppable = self
            .transitions
            .last()
            .is_some_and(|transition| !transition.record.is_root());

        if !poppable {
            return Err(SimulatorError::NoTransition);
        }

        let transition = self.transitions.pop().expect("checked non-empty");
        self.pool.state = transition.pre_state;

        tracing::debug!(restored = %self.pool.state.id, "stepped back");

        Ok(())
    }

    /// Replaces the pool state with a deep copy of the identified snapshot,
    /// looked up in memory first and then in the persistent store recorded
    /// by the roadmap. The transition log is reset to a single recover root.
    pub fn recover(&mut self, snapshot_id: Uuid) -> Result<(), SimulatorError> {
        let snapshot = self.find_snapshot(snapshot_id)?;

        let pre_state = std::mem::replace(&mut self.pool.state, snapshot.restore());
        self.pool.config = snapshot.config.clone();

        let root = Transition {
            id: Uuid::new_v4(),
            parent_id: None,
            record: OpRecord::Recover { snapshot_id },
            post_state_id: self.pool.state.id,
            pre_state,
        };
        self.transitions = vec![root];

        tracing::debug!(snapshot = %snapshot_id, pool = %self.pool.state.id, "recovered");

        Ok(())
    }

    fn find_snapshot(&self, snapshot_id: Uuid) -> Result<Snapshot, SimulatorError> {
        if let Some(snapshot) = &self.pool.state.snapshot {
            if snapshot.id == snapshot_id {
                return Ok(snapshot.clone());
            }
        }

        if let Some(snapshot) = roadmap::snapshot(snapshot_id) {
            return Ok(snapshot);
        }

        if let Some(path) = roadmap::persisted_path(snapshot_id) {
            let store = SnapshotStore::open(&path)?;
            if let Some(snapshot) = store.get(snapshot_id)? {
                return Ok(snapshot);
            }
        }

        Err(SimulatorError::SnapshotNotFound(snapshot_id))
    }

    /// Runs one operation transactionally: on success the state gets a
    /// fresh id and the transition is recorded; on failure (including a
    /// post-processor failure) the pool is left exactly as it was.
    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut CorePool) -> Result<(T, OpRecord), SimulatorError>,
    ) -> Result<T, SimulatorError> {
        let pre_state = self.pool.state.clone();

        let (output, record) = match op(&mut self.pool) {
            Ok(result) => result,
            Err(e) => {
                // the engine leaves state untouched on failure; restore
                // anyway so a partially applied composite can not leak
                self.pool.state = pre_state;
                return Err(e);
            }
        };

        self.pool.state.id = Uuid::new_v4();

        let transition = Transition {
            id: Uuid::new_v4(),
            parent_id: self.transitions.last().map(|t| t.id),
            record,
            post_state_id: self.pool.state.id,
            pre_state,
        };

        if let Some(post_processor) = &self.post_processor {
            if let Err(e) = post_processor(&self.pool, &transition) {
                self.pool.state = transition.pre_state;
                return Err(SimulatorError::PostProcessorFailure(e.to_string()));
            }
        }

        self.transitions.push(transition);

        Ok(output)
    }
}
