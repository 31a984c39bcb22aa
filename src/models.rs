//! Data models for harvested rumors.
//!
//! - [`RawCandidate`]: one entry as extracted from a source page, before validation
//! - [`Record`]: a stored rumor, the unit persisted inside every shard file
//! - [`Fingerprint`]: the truncated-text key used for duplicate detection
//!
//! On-disk field names match the existing dataset (`date`, `archive_date`,
//! `source_url`, ...), so shards written by earlier harvesters load unchanged.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of leading characters of `text` that identify a rumor.
pub const FINGERPRINT_CHARS: usize = 100;

/// Display-date layouts accepted by the source, tried in order.
const DISPLAY_DATE_FORMATS: [&str; 4] = [
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
];

/// Trailing timezone marker such as `ET`, `EDT`, `UTC` or `+05:00`.
static TZ_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+([A-Z]{2,5}|[+-]\d{2}:?\d{2})$").expect("valid timezone regex")
});

/// One rumor as yielded by a fetch collaborator.
///
/// Every field is raw page text; nothing here has been validated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCandidate {
    pub display_date: String,
    pub text: String,
    pub quote: String,
    pub outlet: String,
    pub source_url: String,
    pub tags: Vec<String>,
}

/// A stored rumor.
///
/// `text` is never empty for a stored record and `archive_date` is the
/// authoritative partition key; `display_date` is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Source-provided display string, e.g. `"March 1, 2024 10:15 am ET"`.
    #[serde(rename = "date", default)]
    pub display_date: String,
    /// Calendar day the rumor belongs to, serialized as `YYYY-MM-DD`.
    pub archive_date: NaiveDate,
    /// Full rumor body.
    pub text: String,
    /// Quoted excerpt, may be empty.
    #[serde(default)]
    pub quote: String,
    /// Attributed media outlet, may be empty.
    #[serde(default)]
    pub outlet: String,
    /// External citation link, may be empty.
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Keys this harvester does not know about, kept so shard rewrites
    /// never drop them.
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Identity key for duplicate detection. Never used for ordering.
pub type Fingerprint = String;

impl Record {
    /// Build a record from a raw candidate fetched for `bucket`.
    ///
    /// Returns `None` when the trimmed text is empty. `archive_date` comes from
    /// the display date when it parses, otherwise from the bucket.
    pub fn from_candidate(raw: RawCandidate, bucket: NaiveDate) -> Option<Self> {
        let text = raw.text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let display_date = raw.display_date.trim().to_string();
        let archive_date = parse_display_date(&display_date).unwrap_or(bucket);

        Some(Self {
            display_date,
            archive_date,
            text,
            quote: raw.quote.trim().to_string(),
            outlet: raw.outlet.trim().to_string(),
            source_url: raw.source_url.trim().to_string(),
            tags: raw
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            extra: Map::new(),
        })
    }

    /// First [`FINGERPRINT_CHARS`] characters of `text`. Empty text yields an
    /// empty fingerprint, which never matches anything.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.text)
    }
}

/// Fingerprint of an arbitrary body of text.
pub fn fingerprint_of(text: &str) -> Fingerprint {
    text.chars().take(FINGERPRINT_CHARS).collect()
}

/// Drop a trailing timezone marker. `AM`/`PM` look alike and are kept.
fn strip_timezone(display: &str) -> &str {
    match TZ_SUFFIX.captures(display) {
        Some(caps) if !matches!(&caps[1], "AM" | "PM") => {
            let start = caps.get(0).map_or(display.len(), |m| m.start());
            display[..start].trim_end()
        }
        _ => display,
    }
}

/// Parse a display string like `"Mar 1, 2024 10:15 am ET"` into its calendar day.
///
/// The first accepted layout wins. Unparseable input yields `None`.
pub fn parse_display_date(display: &str) -> Option<NaiveDate> {
    let cleaned = strip_timezone(display.trim());
    if cleaned.is_empty() {
        return None;
    }
    DISPLAY_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cleaned, fmt).ok())
        .map(|dt| dt.date())
}
