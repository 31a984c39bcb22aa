//! # Rumor Sync
//!
//! Incrementally harvests HoopsHype rumors into a local JSON dataset split
//! over fixed shard files, plus a small "latest 100" file for fast reads.
//!
//! ## Usage
//!
//! ```sh
//! rumor_sync -d ./data
//! ```
//!
//! ## Architecture
//!
//! Each run follows a fixed pipeline:
//! 1. **Watermark**: find the most recent `archive_date` across every shard
//! 2. **Index**: fingerprint every stored rumor for duplicate detection
//! 3. **Fetch**: walk each day from the watermark through today, one page at a time
//! 4. **Append**: add the run's new rumors to the active shard, oldest first
//! 5. **Output**: rebuild the latest projection and the summary index file

use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedupe;
mod error;
mod models;
mod outputs;
mod scrapers;
mod store;
mod sync;
mod utils;
mod watermark;

use cli::Cli;
use scrapers::hoopshype::HoopsHypeSource;
use scrapers::retry::RetrySource;
use sync::{SyncClock, SyncDriver};
use utils::truncate_for_log;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "rumor sync failed");
            ExitCode::FAILURE
        }
    }
}

#[instrument]
async fn run() -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!("rumor_sync starting up");

    let args = Cli::parse();
    debug!(?args.data_dir, args.shard_count, ?args.active_shard, "Parsed CLI arguments");

    let (sync_config, source_config) = args.into_configs()?;
    let clock = SyncClock::capture(sync_config.utc_offset);
    info!(now = %clock.now(), today = %clock.today(), "Captured sync clock");

    let max_retries = source_config.max_retries;
    let source = RetrySource::new(
        HoopsHypeSource::new(source_config, clock.today())?,
        max_retries,
        Duration::from_secs(1),
    );

    let summary = SyncDriver::new(&sync_config, source, clock).run().await?;

    for bucket in &summary.failed_buckets {
        info!(date = %bucket.date, reason = %truncate_for_log(&bucket.reason, 200), "Skipped bucket");
    }
    for shard in &summary.degraded_shards {
        info!(index = shard.index, reason = %truncate_for_log(&shard.reason, 200), "Degraded shard");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        buckets_checked = summary.buckets_checked,
        new_records = summary.new_records,
        total_records = summary.total_records,
        "Execution complete"
    );
    Ok(())
}
