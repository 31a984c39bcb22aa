//! Sync starting point.
//!
//! Shards are not sorted by date on disk, so every shard is scanned for its
//! latest `archive_date`.

use chrono::{Days, NaiveDate};
use tracing::{debug, info};

use crate::store::LoadedShards;

/// Latest `archive_date` present in any shard, or the day before `today`
/// when the dataset holds no records.
pub fn resolve(shards: &LoadedShards, today: NaiveDate) -> NaiveDate {
    let latest = shards
        .shards
        .iter()
        .filter_map(|shard| {
            let max = shard.records.iter().map(|r| r.archive_date).max();
            debug!(index = shard.index, ?max, "Shard watermark");
            max
        })
        .max();

    match latest {
        Some(date) => {
            info!(watermark = %date, "Resolved watermark from shards");
            date
        }
        None => {
            let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
            info!(watermark = %yesterday, "No stored records; starting from yesterday");
            yesterday
        }
    }
}
