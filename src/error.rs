//! Error types for storage, fetching and the sync run.
//!
//! Only [`SyncError`] is fatal. Everything else is downgraded by the caller:
//! a [`FetchError`] turns a bucket into zero candidates, a malformed shard is
//! skipped for the run, and output write failures are reported in the summary.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or writing the on-disk dataset.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shard {index} at {} is malformed: {reason}", .path.display())]
    MalformedShard {
        index: u32,
        path: PathBuf,
        reason: String,
    },
    #[error("failed reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed writing {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed encoding {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while fetching one date bucket from the remote source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid selector `{0}`")]
    Selector(String),
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not update active shard: {0}")]
    ActiveShard(#[source] StoreError),
    #[error("data directory unusable: {0}")]
    DataDir(#[source] StoreError),
    #[error("configuration error: {0}")]
    Config(String),
}
