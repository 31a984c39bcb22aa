//! Run configuration passed explicitly into the store, driver and source.

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;

use crate::error::SyncError;

/// Storage layout, projection size, pacing and clock for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub data_dir: PathBuf,
    /// Shards `1..=shard_count` are scanned.
    pub shard_count: u32,
    /// The only shard that receives new records.
    pub active_shard: u32,
    /// Number of records in the latest projection.
    pub latest_count: usize,
    /// Minimum idle time between two bucket fetches.
    pub fetch_delay: Duration,
    /// Fixed offset the sync clock is anchored on.
    pub utc_offset: FixedOffset,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.shard_count == 0 {
            return Err(SyncError::Config("shard count must be at least 1".into()));
        }
        if !(1..=self.shard_count).contains(&self.active_shard) {
            return Err(SyncError::Config(format!(
                "active shard {} is outside 1..={}",
                self.active_shard, self.shard_count
            )));
        }
        Ok(())
    }
}

/// Connection settings for the HoopsHype preview site.
#[derive(Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    /// Retries after the first failed attempt for one bucket.
    pub max_retries: usize,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
