//! In-memory fingerprint index for duplicate detection.
//!
//! [`FingerprintIndex`] is built from every readable shard at the start of a
//! run and owned by the sync driver for the rest of it. Accepting a candidate
//! inserts its fingerprint, so a second candidate with the same leading text
//! in the same run is rejected.
//!
//! # Key Design
//!
//! - Keys: first 100 characters of the rumor text
//! - Empty keys never match and are never inserted
//! - Rebuilt from the shards on every run; nothing is persisted

use std::collections::HashSet;

use tracing::{debug, info};

use crate::models::{Fingerprint, Record};
use crate::store::LoadedShards;

#[derive(Debug, Default, Clone)]
pub struct FingerprintIndex {
    seen: HashSet<Fingerprint>,
}

impl FingerprintIndex {
    /// Index every stored record in `shards`.
    pub fn build(shards: &LoadedShards) -> Self {
        let seen: HashSet<Fingerprint> = shards
            .records()
            .map(Record::fingerprint)
            .filter(|fp| !fp.is_empty())
            .collect();
        info!(fingerprints = seen.len(), "Built fingerprint index");
        Self { seen }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True iff `candidate` has a non-empty fingerprint not yet in the index.
    /// Accepted fingerprints are inserted immediately.
    pub fn is_new(&mut self, candidate: &Record) -> bool {
        let fp = candidate.fingerprint();
        if fp.is_empty() {
            return false;
        }
        self.seen.insert(fp)
    }

    /// Keep the records of `batch` that are new, in their original order.
    pub fn filter_new(&mut self, batch: Vec<Record>) -> Vec<Record> {
        let offered = batch.len();
        let accepted: Vec<Record> = batch.into_iter().filter(|r| self.is_new(r)).collect();
        debug!(offered, accepted = accepted.len(), "Filtered batch");
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::rec;
    use crate::store::Shard;

    fn shards(groups: Vec<Vec<Record>>) -> LoadedShards {
        LoadedShards {
            shards: groups
                .into_iter()
                .enumerate()
                .map(|(i, records)| Shard {
                    index: i as u32 + 1,
                    records,
                })
                .collect(),
            degraded: Vec::new(),
        }
    }

    #[test]
    fn test_stored_records_are_not_new() {
        let stored = vec![
            vec![rec("Team A waives Player B", "2024-01-01")],
            vec![rec("Team C eyes Player D", "2024-01-02"), rec("Coach E out", "2024-01-03")],
        ];
        let mut index = FingerprintIndex::build(&shards(stored.clone()));
        assert_eq!(index.len(), 3);

        for record in stored.iter().flatten() {
            assert!(!index.is_new(record));
        }
    }

    #[test]
    fn test_first_occurrence_wins_within_run() {
        let mut index = FingerprintIndex::default();
        let prefix = "x".repeat(100);
        let first = rec(&format!("{prefix} first tail"), "2024-01-01");
        let second = rec(&format!("{prefix} another tail"), "2024-01-02");

        let accepted = index.filter_new(vec![first.clone(), second]);
        assert_eq!(accepted, vec![first]);
    }

    #[test]
    fn test_texts_differing_within_prefix_are_distinct() {
        let mut index = FingerprintIndex::default();
        assert!(index.is_new(&rec("Team X signs Player Y", "2024-03-01")));
        assert!(index.is_new(&rec("Team Z trades for Player W", "2024-03-01")));
        assert!(!index.is_new(&rec("Team X signs Player Y", "2024-03-02")));
    }

    #[test]
    fn test_empty_text_never_new() {
        let mut index = FingerprintIndex::default();
        assert!(!index.is_new(&rec("", "2024-01-01")));
        assert_eq!(index.len(), 0);
    }
}
