//! Command-line interface definitions for the rumor harvester.
//!
//! All arguments can be provided via command-line flags; the data directory
//! and the site credentials can also come from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use clap::Parser;

use crate::config::{SourceConfig, SyncConfig};
use crate::error::SyncError;
use crate::outputs::latest::DEFAULT_LATEST_COUNT;

/// Command-line arguments for one sync run.
///
/// # Examples
///
/// ```sh
/// # Sync the dataset in the current directory
/// rumor_sync
///
/// # Five shards in ./data, appending to shard 1
/// rumor_sync -d ./data -s 5 -a 1
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the shard, latest and index files
    #[arg(short, long, env = "RUMORS_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Number of shard files (hoopshype_rumors_part1.json ..= partN.json)
    #[arg(short, long, default_value_t = 5)]
    pub shard_count: u32,

    /// Shard that receives new rumors; defaults to the highest-numbered shard
    #[arg(short, long)]
    pub active_shard: Option<u32>,

    /// Number of rumors kept in hoopshype_rumors_latest.json
    #[arg(short = 'k', long, default_value_t = DEFAULT_LATEST_COUNT)]
    pub latest_count: usize,

    /// Minimum delay between two page fetches, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Base URL of the rumor site
    #[arg(long, env = "HOOPSHYPE_BASE_URL", default_value = "http://preview.hoopshype.com")]
    pub base_url: String,

    /// Basic-auth user for the preview site
    #[arg(long, env = "HOOPSHYPE_USERNAME", default_value = "preview")]
    pub username: String,

    /// Basic-auth password for the preview site
    #[arg(long, env = "HOOPSHYPE_PASSWORD", default_value = "hhpreview", hide_env_values = true)]
    pub password: String,

    /// Fixed UTC offset, in hours, that defines "today"
    #[arg(long, default_value_t = -5, allow_negative_numbers = true)]
    pub utc_offset_hours: i32,

    /// Per-request HTTP timeout, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Retries for a failed page fetch before the day is skipped
    #[arg(long, default_value_t = 2)]
    pub max_retries: usize,
}

impl Cli {
    /// Split the arguments into the storage/run config and the source config.
    pub fn into_configs(self) -> Result<(SyncConfig, SourceConfig), SyncError> {
        let utc_offset = FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            SyncError::Config(format!("UTC offset {}h out of range", self.utc_offset_hours))
        })?;

        let sync = SyncConfig {
            data_dir: self.data_dir,
            shard_count: self.shard_count,
            active_shard: self.active_shard.unwrap_or(self.shard_count),
            latest_count: self.latest_count,
            fetch_delay: Duration::from_millis(self.delay_ms),
            utc_offset,
        };
        sync.validate()?;

        let source = SourceConfig {
            base_url: self.base_url,
            username: self.username,
            password: self.password,
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
        };
        Ok((sync, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["rumor_sync"]);
        assert_eq!(cli.shard_count, 5);
        assert_eq!(cli.active_shard, None);
        assert_eq!(cli.latest_count, 100);
        assert_eq!(cli.delay_ms, 1000);
        assert_eq!(cli.utc_offset_hours, -5);

        let (sync, source) = cli.into_configs().unwrap();
        assert_eq!(sync.active_shard, 5);
        assert_eq!(sync.utc_offset, FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(source.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "rumor_sync",
            "-d",
            "/tmp/rumors",
            "-s",
            "7",
            "-a",
            "1",
            "-k",
            "25",
        ]);
        let (sync, _) = cli.into_configs().unwrap();
        assert_eq!(sync.data_dir, PathBuf::from("/tmp/rumors"));
        assert_eq!(sync.shard_count, 7);
        assert_eq!(sync.active_shard, 1);
        assert_eq!(sync.latest_count, 25);
    }

    #[test]
    fn test_cli_negative_offset_and_bad_active_shard() {
        let cli = Cli::parse_from(["rumor_sync", "--utc-offset-hours", "-4"]);
        assert_eq!(cli.utc_offset_hours, -4);

        let cli = Cli::parse_from(["rumor_sync", "-s", "3", "-a", "4"]);
        assert!(matches!(cli.into_configs(), Err(SyncError::Config(_))));
    }
}
