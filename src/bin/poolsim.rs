use std::path::PathBuf;

use alloy_primitives::U256;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};
use poolsim::{
    loader,
    replay::Replayer,
    sim::roadmap,
    storage::{EventStore, SnapshotStore},
    ConfigurableCorePool, PoolConfig,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "poolsim", about = "Deterministic concentrated-liquidity pool simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay every recorded event in a date window against a fresh pool.
    Replay {
        /// SQLite database holding the event backfill
        events_db: PathBuf,
        /// First day of the window (inclusive), e.g. 2021-05-05
        start_date: NaiveDate,
        /// Last day of the window (exclusive)
        end_date: NaiveDate,
        /// Starting sqrt price, decimal or 0x-hex Q64.96
        #[arg(long)]
        sqrt_price: String,
        #[arg(long, default_value = "token0")]
        token_0: String,
        #[arg(long, default_value = "token1")]
        token_1: String,
        /// Fee in pips, e.g. 3000 for 0.3%
        #[arg(long, default_value_t = 3000)]
        fee: u32,
        #[arg(long, default_value_t = 60)]
        tick_spacing: i32,
        /// Persist a snapshot of the final state to this store
        #[arg(long)]
        snapshot_to: Option<PathBuf>,
        /// Description for the persisted snapshot
        #[arg(long, default_value = "replay result")]
        description: String,
    },
    /// Load CSV or JSON event files into an event database.
    Import {
        /// SQLite database to load into (created if missing)
        events_db: PathBuf,
        #[arg(long)]
        liquidity_csv: Option<PathBuf>,
        #[arg(long)]
        swap_csv: Option<PathBuf>,
        #[arg(long)]
        liquidity_json: Option<PathBuf>,
        #[arg(long)]
        swap_json: Option<PathBuf>,
    },
    /// Print a persisted snapshot.
    Inspect {
        /// SQLite database holding snapshots
        snapshot_db: PathBuf,
        /// Snapshot id; omit to list all snapshots in the store
        snapshot_id: Option<Uuid>,
    },
    /// Recover a pool from a snapshot and fork it.
    Fork {
        snapshot_db: PathBuf,
        snapshot_id: Uuid,
    },
    /// Recover a pool from a snapshot and persist a fresh snapshot of it.
    Snapshot {
        snapshot_db: PathBuf,
        snapshot_id: Uuid,
        description: String,
    },
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Replay {
            events_db,
            start_date,
            end_date,
            sqrt_price,
            token_0,
            token_1,
            fee,
            tick_spacing,
            snapshot_to,
            description,
        } => {
            let sqrt_price: U256 = sqrt_price
                .parse()
                .map_err(|_| eyre!("invalid sqrt price {sqrt_price}"))?;

            let store = EventStore::open(&events_db)
                .wrap_err_with(|| format!("opening event store {}", events_db.display()))?;
            let events = store.events(Some(loader::date_window(start_date, end_date)))?;

            let mut pool =
                ConfigurableCorePool::new(PoolConfig::new(&token_0, &token_1, fee, tick_spacing));
            pool.initialize(sqrt_price)?;

            let mut replayer = Replayer::new(pool);
            let summary = replayer.run(&events)?;
            let mut pool = replayer.into_pool();

            println!(
                "replayed {} events ({} mints, {} burns, {} swaps)",
                summary.mints + summary.burns + summary.swaps,
                summary.mints,
                summary.burns,
                summary.swaps
            );
            print_pool(pool.pool());

            if let Some(path) = snapshot_to {
                let store = SnapshotStore::open(&path)?;
                pool.take_snapshot(&description)?;
                let snapshot_id = pool.persist_snapshot(&store)?;
                println!("snapshot {snapshot_id} written to {}", path.display());
            }
        }
        Command::Import {
            events_db,
            liquidity_csv,
            swap_csv,
            liquidity_json,
            swap_json,
        } => {
            let store = EventStore::open(&events_db)?;
            let mut loaded = 0usize;

            let mut liquidity_events = Vec::new();
            if let Some(path) = liquidity_csv {
                liquidity_events.extend(loader::liquidity_events_from_csv(&path)?);
            }
            if let Some(path) = liquidity_json {
                liquidity_events.extend(loader::liquidity_events_from_json(&path)?);
            }

            let mut swap_events = Vec::new();
            if let Some(path) = swap_csv {
                swap_events.extend(loader::swap_events_from_csv(&path)?);
            }
            if let Some(path) = swap_json {
                swap_events.extend(loader::swap_events_from_json(&path)?);
            }

            for event in &liquidity_events {
                store.insert_liquidity_event(event)?;
                loaded += 1;
            }
            for event in &swap_events {
                store.insert_swap_event(event)?;
                loaded += 1;
            }

            println!("imported {loaded} events into {}", events_db.display());
        }
        Command::Inspect {
            snapshot_db,
            snapshot_id,
        } => {
            let store = SnapshotStore::open(&snapshot_db)?;

            match snapshot_id {
                None => {
                    for (id, description, created_at) in store.list()? {
                        println!("{id}  {created_at}  {description}");
                    }
                }
                Some(id) => {
                    let snapshot = store
                        .get(id)?
                        .ok_or_else(|| eyre!("snapshot {id} not found"))?;

                    println!("snapshot      {}", snapshot.id);
                    println!("description   {}", snapshot.description);
                    println!(
                        "pair          {}/{} fee {} spacing {}",
                        snapshot.config.token_0,
                        snapshot.config.token_1,
                        snapshot.config.fee_pips,
                        snapshot.config.tick_spacing
                    );
                    println!("sqrt price    {}", snapshot.sqrt_price_x96);
                    println!("tick          {}", snapshot.tick);
                    println!("liquidity     {}", snapshot.liquidity);
                    println!("fee growth 0  {}", snapshot.fee_growth_global_0_x128);
                    println!("fee growth 1  {}", snapshot.fee_growth_global_1_x128);
                    println!("ticks         {}", snapshot.ticks.len());
                    println!("positions     {}", snapshot.positions.len());
                    println!("created       {}", snapshot.created_at);
                }
            }
        }
        Command::Fork {
            snapshot_db,
            snapshot_id,
        } => {
            let pool = recover_pool(&snapshot_db, snapshot_id)?;
            let fork = pool.fork();

            println!("pool {}", pool.pool_id());
            println!("fork {}", fork.pool_id());
            for record in roadmap::descendants(pool.pool_id()) {
                println!("descendant {}", record.pool_id);
            }
        }
        Command::Snapshot {
            snapshot_db,
            snapshot_id,
            description,
        } => {
            let mut pool = recover_pool(&snapshot_db, snapshot_id)?;
            let store = SnapshotStore::open(&snapshot_db)?;

            pool.take_snapshot(&description)?;
            let new_id = pool.persist_snapshot(&store)?;
            println!("snapshot {new_id}");
        }
    }

    Ok(())
}

fn recover_pool(snapshot_db: &PathBuf, snapshot_id: Uuid) -> eyre::Result<ConfigurableCorePool> {
    let store = SnapshotStore::open(snapshot_db)?;
    let snapshot = store
        .get(snapshot_id)?
        .ok_or_else(|| eyre!("snapshot {snapshot_id} not found"))?;

    let mut pool = ConfigurableCorePool::new(snapshot.config.clone());
    roadmap::register_snapshot(&snapshot);
    pool.recover(snapshot_id)?;

    Ok(pool)
}

fn print_pool(pool: &poolsim::CorePool) {
    println!("pool          {}", pool.state.id);
    println!("sqrt price    {}", pool.state.sqrt_price_x96);
    println!("tick          {}", pool.state.tick);
    println!("liquidity     {}", pool.state.liquidity);
    println!("price         {:.6}", pool.token_0_price());

    if let Ok((reserve_0, reserve_1)) = pool.virtual_reserves() {
        println!("reserves      {reserve_0} / {reserve_1}");
    }
}
