//! Latest projection: the K most recent rumors as one fast-load JSON file.
//!
//! # Ordering
//!
//! Records are ranked by `(archive_date, shard index, position in shard)`,
//! all descending. Within a day a higher shard is newer, and within a shard a
//! later position is newer, which holds because each run appends its batch
//! oldest-first.
//!
//! The projection is a total rebuild every time; the shard/position keys live
//! only in [`Ranked`] and never reach the output file.

use std::cmp::Reverse;
use std::path::Path;

use itertools::Itertools;
use tracing::{info, instrument};

use crate::error::StoreError;
use crate::models::Record;
use crate::store::LoadedShards;
use crate::utils::write_atomic;

/// Default number of records kept in the projection.
pub const DEFAULT_LATEST_COUNT: usize = 100;

/// File name of the projection inside the data directory.
pub const LATEST_FILE: &str = "hoopshype_rumors_latest.json";

/// A record with its position in the corpus.
struct Ranked<'a> {
    shard: u32,
    position: usize,
    record: &'a Record,
}

/// The `k` most recent records across `shards`, newest first.
pub fn select_latest(shards: &LoadedShards, k: usize) -> Vec<Record> {
    shards
        .shards
        .iter()
        .flat_map(|shard| {
            shard
                .records
                .iter()
                .enumerate()
                .map(move |(position, record)| Ranked {
                    shard: shard.index,
                    position,
                    record,
                })
        })
        .sorted_by_key(|r| Reverse((r.record.archive_date, r.shard, r.position)))
        .take(k)
        .map(|r| r.record.clone())
        .collect()
}

/// Replace the projection file at `path` with the top `k` of `shards`.
///
/// `shards` should be a fresh scan taken after any append of the current run.
/// Returns the number of records written.
#[instrument(level = "info", skip(shards), fields(path = %path.display()))]
pub async fn rebuild(shards: &LoadedShards, path: &Path, k: usize) -> Result<usize, StoreError> {
    let latest = select_latest(shards, k);

    let json = serde_json::to_vec(&latest).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &json).await?;

    match (latest.first(), latest.last()) {
        (Some(newest), Some(oldest)) => info!(
            count = latest.len(),
            from = %oldest.archive_date,
            to = %newest.archive_date,
            "Wrote latest projection"
        ),
        _ => info!(count = 0, "Wrote empty latest projection"),
    }
    Ok(latest.len())
}
