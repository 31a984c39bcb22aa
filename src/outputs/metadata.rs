//! `rumors_index.json`: process-wide summary of the dataset.
//!
//! The file is a JSON object. This module owns `last_updated` and
//! `total_rumors`; any other keys found in an existing file are kept as-is.
//! `last_updated` only moves when a run actually appended records, so a no-op
//! run rewrites identical content.

use std::path::Path;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::error::StoreError;
use crate::utils::write_atomic;

/// File name of the summary inside the data directory.
pub const INDEX_FILE: &str = "rumors_index.json";

/// Rewrite the summary at `path`.
///
/// `appended` says whether this run added records; when it did not, an
/// existing `last_updated` is left untouched.
#[instrument(level = "info", skip(now), fields(path = %path.display()))]
pub async fn refresh(
    path: &Path,
    total_rumors: usize,
    now: DateTime<FixedOffset>,
    appended: bool,
) -> Result<(), StoreError> {
    let mut index = load_existing(path).await;

    if appended || !index.contains_key("last_updated") {
        index.insert(
            "last_updated".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, false)),
        );
    }
    index.insert("total_rumors".to_string(), Value::from(total_rumors));

    let json = serde_json::to_vec_pretty(&Value::Object(index)).map_err(|source| {
        StoreError::Encode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    write_atomic(path, &json).await?;
    info!(total_rumors, "Updated index file");
    Ok(())
}

/// Existing summary object, or an empty one when the file is missing or unusable.
async fn load_existing(path: &Path) -> Map<String, Value> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(_) => return Map::new(),
    };
    match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("Index file is not a JSON object; starting fresh");
            Map::new()
        }
        Err(e) => {
            warn!(error = %e, "Index file unparseable; starting fresh");
            Map::new()
        }
    }
}
