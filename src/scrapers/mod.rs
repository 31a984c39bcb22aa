//! Fetch collaborators that turn one calendar day into raw rumor candidates.
//!
//! The sync driver only knows the [`BucketSource`] trait. Sources report a
//! failed day as a [`FetchError`]; the driver downgrades it to zero
//! candidates and moves on.
//!
//! # Implementations
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | HoopsHype rumors | [`hoopshype`] | Basic-auth HTML pages, one per day |
//! | Retry decorator | [`retry`] | Exponential backoff around any source |

use chrono::NaiveDate;

use crate::error::FetchError;
use crate::models::RawCandidate;

pub mod hoopshype;
pub mod retry;

/// A source of per-day rumor candidates.
pub trait BucketSource {
    /// Candidates for `date`, newest first as the page lists them.
    async fn fetch_bucket(&self, date: NaiveDate) -> Result<Vec<RawCandidate>, FetchError>;
}
