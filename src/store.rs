//! Sharded on-disk rumor dataset.
//!
//! The corpus is split over `hoopshype_rumors_part{i}.json` files, `i` in
//! `1..=shard_count`. Each file is a bare JSON array of [`Record`]s in
//! insertion order. Exactly one shard, the active one, is ever appended to;
//! every other shard is immutable history.
//!
//! # Failure modes
//!
//! - A missing shard file is an empty shard, not an error.
//! - A shard that does not parse is reported as [`StoreError::MalformedShard`];
//!   [`ShardStore::load_all`] records it as degraded and moves on.
//! - Writes go through [`write_atomic`], so a failed append leaves the previous
//!   shard content in place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::models::Record;
use crate::utils::write_atomic;

/// One loaded shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub index: u32,
    pub records: Vec<Record>,
}

/// A shard that could not be read this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedShard {
    pub index: u32,
    pub reason: String,
}

/// Result of scanning every shard.
#[derive(Debug, Clone, Default)]
pub struct LoadedShards {
    /// Readable shards in ascending index order.
    pub shards: Vec<Shard>,
    pub degraded: Vec<DegradedShard>,
}

impl LoadedShards {
    pub fn total_records(&self) -> usize {
        self.shards.iter().map(|s| s.records.len()).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.shards.iter().flat_map(|s| s.records.iter())
    }
}

/// File-backed shard storage rooted at a data directory.
#[derive(Debug, Clone)]
pub struct ShardStore {
    dir: PathBuf,
    shard_count: u32,
    active_shard: u32,
}

impl ShardStore {
    /// `active_shard` must lie in `1..=shard_count`; the caller validates it.
    pub fn new(dir: impl Into<PathBuf>, shard_count: u32, active_shard: u32) -> Self {
        Self {
            dir: dir.into(),
            shard_count,
            active_shard,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn active_shard(&self) -> u32 {
        self.active_shard
    }

    pub fn shard_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("hoopshype_rumors_part{index}.json"))
    }

    /// Load one shard. A missing file yields an empty sequence.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_shard(&self, index: u32) -> Result<Vec<Record>, StoreError> {
        let path = self.shard_path(index);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(index, path = %path.display(), "Shard file not found; treating as empty");
                return Ok(Vec::new());
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        serde_json::from_slice::<Vec<Record>>(&raw).map_err(|e| StoreError::MalformedShard {
            index,
            path,
            reason: e.to_string(),
        })
    }

    /// Load every shard `1..=shard_count`. Unreadable shards are logged and
    /// listed in [`LoadedShards::degraded`] instead of failing the scan.
    #[instrument(level = "info", skip(self), fields(dir = %self.dir.display(), shard_count = self.shard_count))]
    pub async fn load_all(&self) -> LoadedShards {
        let mut loaded = LoadedShards::default();
        for index in 1..=self.shard_count {
            match self.load_shard(index).await {
                Ok(records) => {
                    debug!(index, count = records.len(), "Loaded shard");
                    loaded.shards.push(Shard { index, records });
                }
                Err(e) => {
                    warn!(index, error = %e, "Skipping unreadable shard");
                    loaded.degraded.push(DegradedShard {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(
            shards = loaded.shards.len(),
            degraded = loaded.degraded.len(),
            records = loaded.total_records(),
            "Scanned shards"
        );
        loaded
    }

    /// Append `new_records` after the active shard's existing content.
    ///
    /// The caller supplies the records already in on-disk order (oldest first).
    /// Returns the active shard's new length. A malformed active shard is never
    /// overwritten.
    #[instrument(level = "info", skip_all, fields(active = self.active_shard, new = new_records.len()))]
    pub async fn append_to_active(&self, new_records: &[Record]) -> Result<usize, StoreError> {
        let mut records = self.load_shard(self.active_shard).await?;
        records.extend_from_slice(new_records);
        self.save_shard(self.active_shard, &records).await?;
        info!(total = records.len(), "Appended to active shard");
        Ok(records.len())
    }

    async fn save_shard(&self, index: u32, records: &[Record]) -> Result<(), StoreError> {
        let path = self.shard_path(index);
        let json = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json).await
    }
}
