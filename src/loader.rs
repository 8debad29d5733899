//! File-based event ingestion: CSV and JSON loaders for the two event kinds,
//! plus the date utilities used to bucket replay windows.

use std::{fs::File, path::Path};

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    errors::LoaderError,
    events::{LiquidityEvent, PoolEvent, SwapEvent},
};

pub fn liquidity_events_from_csv(path: &Path) -> Result<Vec<LiquidityEvent>, LoaderError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut events = Vec::new();

    for record in reader.deserialize() {
        events.push(record?);
    }

    Ok(events)
}

pub fn swap_events_from_csv(path: &Path) -> Result<Vec<SwapEvent>, LoaderError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut events = Vec::new();

    for record in reader.deserialize() {
        events.push(record?);
    }

    Ok(events)
}

pub fn liquidity_events_from_json(path: &Path) -> Result<Vec<LiquidityEvent>, LoaderError> {
    Ok(serde_json::from_reader(File::open(path)?)?)
}

pub fn swap_events_from_json(path: &Path) -> Result<Vec<SwapEvent>, LoaderError> {
    Ok(serde_json::from_reader(File::open(path)?)?)
}

/// Merges both event kinds into one stream sorted by the replay ordering
/// key `(block_number, log_index)`.
pub fn merge_events(
    liquidity_events: Vec<LiquidityEvent>,
    swap_events: Vec<SwapEvent>,
) -> Vec<PoolEvent> {
    let mut events: Vec<PoolEvent> = liquidity_events
        .into_iter()
        .map(PoolEvent::Liquidity)
        .chain(swap_events.into_iter().map(PoolEvent::Swap))
        .collect();

    events.sort_by_key(|event| event.ordering_key());

    events
}

/// Half-open UTC window `[start, end)` covering whole days.
pub fn date_window(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (start_of_day(start), start_of_day(end))
}

/// Splits `[start, end)` into one half-open window per day, for bucketed
/// replay and progress reporting.
pub fn day_buckets(start: NaiveDate, end: NaiveDate) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut buckets = Vec::new();
    let mut day = start;

    while day < end {
        let next = day.succ_opt().expect("date range end is far from overflow");
        buckets.push((start_of_day(day), start_of_day(next)));
        day = next;
    }

    buckets
}

/// Whether the event falls inside the half-open window.
pub fn in_window(event: &PoolEvent, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let date = event.date();
    date >= start && date < end
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .expect("midnight exists for every day")
        .and_utc()
}
