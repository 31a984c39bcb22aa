//! Incremental synchronization run.
//!
//! One run:
//! 1. scans every shard and resolves the watermark
//! 2. builds the fingerprint index
//! 3. fetches each day from the watermark through today, inclusive
//! 4. keeps candidates whose fingerprint is new
//! 5. appends the run's batch to the active shard, oldest first
//! 6. rebuilds the latest projection and refreshes the index file
//!
//! The watermark day itself is fetched again on purpose: the page may have
//! gained rumors since the last run, and deduplication absorbs the repeats.
//!
//! Only a failed shard append aborts the run. A failed day counts as zero
//! candidates; projection and index write failures are reported in the
//! [`RunSummary`].

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::SyncConfig;
use crate::dedupe::FingerprintIndex;
use crate::error::SyncError;
use crate::models::Record;
use crate::outputs::{latest, metadata};
use crate::scrapers::BucketSource;
use crate::store::{DegradedShard, ShardStore};
use crate::utils::ensure_writable_dir;
use crate::watermark;

/// The run's notion of "now", captured once on a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SyncClock {
    now: DateTime<FixedOffset>,
}

impl SyncClock {
    pub fn capture(offset: FixedOffset) -> Self {
        Self::fixed(Utc::now().with_timezone(&offset))
    }

    pub fn fixed(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// A day whose fetch failed and was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBucket {
    pub date: NaiveDate,
    pub reason: String,
}

/// What one run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub watermark: NaiveDate,
    pub buckets_checked: usize,
    pub failed_buckets: Vec<FailedBucket>,
    /// Candidates dropped for having empty text.
    pub discarded_empty: usize,
    /// Candidates dropped as duplicates.
    pub duplicates: usize,
    pub new_records: usize,
    pub degraded_shards: Vec<DegradedShard>,
    pub total_records: usize,
    pub projection_written: bool,
    pub metadata_written: bool,
}

impl RunSummary {
    fn new(watermark: NaiveDate) -> Self {
        Self {
            watermark,
            buckets_checked: 0,
            failed_buckets: Vec::new(),
            discarded_empty: 0,
            duplicates: 0,
            new_records: 0,
            degraded_shards: Vec::new(),
            total_records: 0,
            projection_written: false,
            metadata_written: false,
        }
    }
}

/// Drives one synchronization run against a [`BucketSource`].
#[derive(Debug)]
pub struct SyncDriver<S> {
    store: ShardStore,
    source: S,
    clock: SyncClock,
    latest_count: usize,
    fetch_delay: Duration,
    latest_path: PathBuf,
    index_path: PathBuf,
}

impl<S> SyncDriver<S>
where
    S: BucketSource,
{
    pub fn new(config: &SyncConfig, source: S, clock: SyncClock) -> Self {
        Self {
            store: ShardStore::new(&config.data_dir, config.shard_count, config.active_shard),
            source,
            clock,
            latest_count: config.latest_count,
            fetch_delay: config.fetch_delay,
            latest_path: config.data_dir.join(latest::LATEST_FILE),
            index_path: config.data_dir.join(metadata::INDEX_FILE),
        }
    }

    #[instrument(level = "info", skip(self), fields(dir = %self.store.dir().display(), active = self.store.active_shard()))]
    pub async fn run(&self) -> Result<RunSummary, SyncError> {
        ensure_writable_dir(self.store.dir())
            .await
            .map_err(SyncError::DataDir)?;

        let today = self.clock.today();
        let loaded = self.store.load_all().await;
        let watermark = watermark::resolve(&loaded, today);
        let mut index = FingerprintIndex::build(&loaded);

        let mut summary = RunSummary::new(watermark);
        summary.degraded_shards = loaded.degraded.clone();
        drop(loaded);

        if watermark > today {
            warn!(%watermark, %today, "Watermark is ahead of the sync clock; nothing to fetch");
        } else {
            info!(from = %watermark, to = %today, known = index.len(), "Scanning buckets");
        }

        let mut accepted: Vec<Record> = Vec::new();
        for (i, date) in watermark.iter_days().take_while(|d| *d <= today).enumerate() {
            if i > 0 && !self.fetch_delay.is_zero() {
                sleep(self.fetch_delay).await;
            }
            summary.buckets_checked += 1;

            let raw = match self.source.fetch_bucket(date).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(%date, error = %e, "Bucket fetch failed; treating as empty");
                    summary.failed_buckets.push(FailedBucket {
                        date,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let offered = raw.len();
            let records: Vec<Record> = raw
                .into_iter()
                .filter_map(|c| Record::from_candidate(c, date))
                .collect();
            summary.discarded_empty += offered - records.len();

            let valid = records.len();
            let fresh = index.filter_new(records);
            summary.duplicates += valid - fresh.len();
            info!(%date, offered, new = fresh.len(), "Checked bucket");
            accepted.extend(fresh);
        }

        summary.new_records = accepted.len();
        if accepted.is_empty() {
            info!("No new rumors found");
        } else {
            // Buckets arrive newest-first; the shard must grow oldest-to-newest.
            accepted.reverse();
            self.store
                .append_to_active(&accepted)
                .await
                .map_err(SyncError::ActiveShard)?;
            info!(count = accepted.len(), "Appended new rumors");
        }

        let shards = self.store.load_all().await;
        summary.total_records = shards.total_records();

        match latest::rebuild(&shards, &self.latest_path, self.latest_count).await {
            Ok(_) => summary.projection_written = true,
            Err(e) => error!(error = %e, "Failed to rebuild latest projection"),
        }
        match metadata::refresh(
            &self.index_path,
            summary.total_records,
            self.clock.now(),
            summary.new_records > 0,
        )
        .await
        {
            Ok(()) => summary.metadata_written = true,
            Err(e) => error!(error = %e, "Could not update index file"),
        }

        info!(
            watermark = %summary.watermark,
            buckets_checked = summary.buckets_checked,
            failed_buckets = summary.failed_buckets.len(),
            new_records = summary.new_records,
            duplicates = summary.duplicates,
            discarded_empty = summary.discarded_empty,
            degraded_shards = summary.degraded_shards.len(),
            total_records = summary.total_records,
            projection_written = summary.projection_written,
            metadata_written = summary.metadata_written,
            "Sync run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::RawCandidate;
    use crate::store::tests::{rec, write_shard};
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::tempdir;

    /// In-memory source: a fixed page per day, everything else is empty.
    #[derive(Default)]
    struct StubSource {
        pages: HashMap<NaiveDate, Vec<RawCandidate>>,
        failing: Vec<NaiveDate>,
        calls: RefCell<Vec<NaiveDate>>,
        fetched_at: RefCell<Vec<tokio::time::Instant>>,
    }

    impl StubSource {
        fn with_page(mut self, date: NaiveDate, texts: &[&str]) -> Self {
            let page = texts
                .iter()
                .map(|t| RawCandidate {
                    text: t.to_string(),
                    ..Default::default()
                })
                .collect();
            self.pages.insert(date, page);
            self
        }
    }

    impl BucketSource for StubSource {
        async fn fetch_bucket(&self, date: NaiveDate) -> Result<Vec<RawCandidate>, FetchError> {
            self.calls.borrow_mut().push(date);
            self.fetched_at.borrow_mut().push(tokio::time::Instant::now());
            if self.failing.contains(&date) {
                return Err(FetchError::Selector("stub failure".into()));
            }
            Ok(self.pages.get(&date).cloned().unwrap_or_default())
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn clock(date: &str) -> SyncClock {
        let d = day(date);
        SyncClock::fixed(
            FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .from_local_datetime(&d.and_hms_opt(12, 0, 0).unwrap())
                .unwrap(),
        )
    }

    fn config(dir: &Path, shard_count: u32) -> SyncConfig {
        SyncConfig {
            data_dir: dir.to_path_buf(),
            shard_count,
            active_shard: shard_count,
            latest_count: 100,
            fetch_delay: Duration::ZERO,
            utc_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
        }
    }

    fn shard_texts(dir: &Path, index: u32) -> Vec<String> {
        let raw = std::fs::read(dir.join(format!("hoopshype_rumors_part{index}.json"))).unwrap();
        serde_json::from_slice::<Vec<Record>>(&raw)
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect()
    }

    fn latest_texts(dir: &Path) -> Vec<String> {
        let raw = std::fs::read(dir.join(latest::LATEST_FILE)).unwrap();
        serde_json::from_slice::<Vec<Record>>(&raw)
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_on_empty_dataset() {
        let tmp = tempdir().unwrap();
        let source = StubSource::default().with_page(
            day("2024-03-01"),
            &["Team X signs Player Y", "Team Z trades for Player W"],
        );
        let driver = SyncDriver::new(&config(tmp.path(), 1), source, clock("2024-03-02"));

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.watermark, day("2024-03-01"));
        assert_eq!(summary.buckets_checked, 2);
        assert_eq!(summary.new_records, 2);
        assert!(summary.projection_written && summary.metadata_written);
        assert_eq!(
            *driver.source.calls.borrow(),
            vec![day("2024-03-01"), day("2024-03-02")]
        );

        assert_eq!(
            shard_texts(tmp.path(), 1),
            vec!["Team Z trades for Player W", "Team X signs Player Y"]
        );
        assert_eq!(latest_texts(tmp.path())[0], "Team X signs Player Y");
    }

    #[tokio::test]
    async fn test_rerun_is_noop_but_rewrites_outputs() {
        let tmp = tempdir().unwrap();
        let make_source = || {
            StubSource::default().with_page(
                day("2024-03-01"),
                &["Team X signs Player Y", "Team Z trades for Player W"],
            )
        };
        let cfg = config(tmp.path(), 1);

        SyncDriver::new(&cfg, make_source(), clock("2024-03-02"))
            .run()
            .await
            .unwrap();
        let shard_before = std::fs::read(tmp.path().join("hoopshype_rumors_part1.json")).unwrap();
        let latest_before = std::fs::read(tmp.path().join(latest::LATEST_FILE)).unwrap();
        let index_before = std::fs::read(tmp.path().join(metadata::INDEX_FILE)).unwrap();
        std::fs::remove_file(tmp.path().join(latest::LATEST_FILE)).unwrap();

        let summary = SyncDriver::new(&cfg, make_source(), clock("2024-03-02"))
            .run()
            .await
            .unwrap();
        assert_eq!(summary.new_records, 0);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(
            std::fs::read(tmp.path().join("hoopshype_rumors_part1.json")).unwrap(),
            shard_before
        );
        assert_eq!(
            std::fs::read(tmp.path().join(latest::LATEST_FILE)).unwrap(),
            latest_before
        );
        assert_eq!(
            std::fs::read(tmp.path().join(metadata::INDEX_FILE)).unwrap(),
            index_before
        );
    }

    #[tokio::test]
    async fn test_run_batch_reversed_across_buckets() {
        let tmp = tempdir().unwrap();
        let cfg = config(tmp.path(), 2);
        let store = ShardStore::new(tmp.path(), 2, 2);
        write_shard(&store, 1, &[rec("history", "2024-01-05")]);
        write_shard(&store, 2, &[rec("seen on the 6th", "2024-01-06")]);

        let source = StubSource::default()
            .with_page(day("2024-01-06"), &["late on the 6th", "seen on the 6th"])
            .with_page(day("2024-01-07"), &["A newest", "B", "C oldest"]);
        let summary = SyncDriver::new(&cfg, source, clock("2024-01-07"))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.watermark, day("2024-01-06"));
        assert_eq!(summary.new_records, 4);
        assert_eq!(summary.total_records, 6);
        assert_eq!(
            shard_texts(tmp.path(), 2),
            vec!["seen on the 6th", "C oldest", "B", "A newest", "late on the 6th"]
        );
        assert_eq!(shard_texts(tmp.path(), 1), vec!["history"]);
        assert_eq!(
            latest_texts(tmp.path()),
            vec!["A newest", "B", "C oldest", "late on the 6th", "seen on the 6th", "history"]
        );
    }

    #[tokio::test]
    async fn test_failed_bucket_does_not_abort() {
        let tmp = tempdir().unwrap();
        let store = ShardStore::new(tmp.path(), 1, 1);
        write_shard(&store, 1, &[rec("old", "2024-02-01")]);

        let mut source = StubSource::default()
            .with_page(day("2024-02-03"), &["fresh", "", "fresh"]);
        source.failing.push(day("2024-02-02"));

        let summary = SyncDriver::new(&config(tmp.path(), 1), source, clock("2024-02-03"))
            .run()
            .await
            .unwrap();
        assert_eq!(summary.buckets_checked, 3);
        assert_eq!(summary.failed_buckets.len(), 1);
        assert_eq!(summary.failed_buckets[0].date, day("2024-02-02"));
        assert_eq!(summary.discarded_empty, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.new_records, 1);
        assert_eq!(shard_texts(tmp.path(), 1), vec!["old", "fresh"]);
    }

    #[tokio::test]
    async fn test_malformed_history_shard_is_skipped() {
        let tmp = tempdir().unwrap();
        let store = ShardStore::new(tmp.path(), 2, 2);
        std::fs::write(store.shard_path(1), "not json").unwrap();
        write_shard(&store, 2, &[rec("kept", "2024-04-01")]);

        let source = StubSource::default().with_page(day("2024-04-01"), &["kept", "new"]);
        let summary = SyncDriver::new(&config(tmp.path(), 2), source, clock("2024-04-01"))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.degraded_shards.len(), 1);
        assert_eq!(summary.new_records, 1);
        assert_eq!(summary.total_records, 2);
        assert_eq!(std::fs::read_to_string(store.shard_path(1)).unwrap(), "not json");
    }

    #[tokio::test]
    async fn test_malformed_active_shard_aborts() {
        let tmp = tempdir().unwrap();
        let store = ShardStore::new(tmp.path(), 1, 1);
        std::fs::write(store.shard_path(1), "[oops").unwrap();

        let source = StubSource::default().with_page(day("2024-04-01"), &["new"]);
        let err = SyncDriver::new(&config(tmp.path(), 1), source, clock("2024-04-01"))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ActiveShard(_)));
        assert_eq!(std::fs::read_to_string(store.shard_path(1)).unwrap(), "[oops");
    }

    #[tokio::test]
    async fn test_duplicate_prefix_within_run() {
        let tmp = tempdir().unwrap();
        let prefix = "p".repeat(100);
        let first = format!("{prefix} first");
        let second = format!("{prefix} second");
        let source = StubSource::default()
            .with_page(day("2024-05-01"), &[first.as_str()])
            .with_page(day("2024-05-02"), &[second.as_str()]);

        let summary = SyncDriver::new(&config(tmp.path(), 1), source, clock("2024-05-02"))
            .run()
            .await
            .unwrap();
        assert_eq!(summary.new_records, 1);
        assert_eq!(shard_texts(tmp.path(), 1), vec![first]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_delay_between_buckets_only() {
        let tmp = tempdir().unwrap();
        let mut cfg = config(tmp.path(), 1);
        cfg.fetch_delay = Duration::from_millis(1500);
        let store = ShardStore::new(tmp.path(), 1, 1);
        write_shard(&store, 1, &[rec("old", "2024-06-01")]);

        let driver = SyncDriver::new(&cfg, StubSource::default(), clock("2024-06-04"));
        let started = tokio::time::Instant::now();
        let summary = driver.run().await.unwrap();
        assert_eq!(summary.buckets_checked, 4);

        let fetched_at = driver.source.fetched_at.borrow();
        assert_eq!(fetched_at.len(), 4);
        assert!(fetched_at[0] - started < cfg.fetch_delay);
        for pair in fetched_at.windows(2) {
            assert_eq!(pair[1] - pair[0], cfg.fetch_delay);
        }
    }

    #[tokio::test]
    async fn test_unwritable_latest_file_is_reported() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join(latest::LATEST_FILE);
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let source = StubSource::default().with_page(day("2024-07-01"), &["new"]);
        let summary = SyncDriver::new(&config(tmp.path(), 1), source, clock("2024-07-01"))
            .run()
            .await
            .unwrap();

        assert!(!summary.projection_written);
        assert!(summary.metadata_written);
        assert_eq!(summary.new_records, 1);
        assert_eq!(shard_texts(tmp.path(), 1), vec!["new"]);
        assert!(blocker.join("keep").exists());
    }

    #[tokio::test]
    async fn test_unwritable_index_file_is_reported() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join(metadata::INDEX_FILE);
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let source = StubSource::default().with_page(day("2024-07-01"), &["new"]);
        let summary = SyncDriver::new(&config(tmp.path(), 1), source, clock("2024-07-01"))
            .run()
            .await
            .unwrap();

        assert!(summary.projection_written);
        assert!(!summary.metadata_written);
        assert_eq!(summary.new_records, 1);
        assert_eq!(shard_texts(tmp.path(), 1), vec!["new"]);
        assert_eq!(latest_texts(tmp.path()), vec!["new"]);
    }
}
