//! Exponential backoff around any [`BucketSource`].
//!
//! # Retry Strategy
//!
//! - `max_retries` attempts after the first failure
//! - Backoff doubles from `base_delay`, capped at `max_delay`
//! - Random jitter (0-250ms) added to every wait
//!
//! When every attempt fails the last [`FetchError`] is returned and the sync
//! driver treats the bucket as empty.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

use crate::error::FetchError;
use crate::models::RawCandidate;
use crate::scrapers::BucketSource;

pub struct RetrySource<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetrySource<T>
where
    T: BucketSource,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetrySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySource")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> BucketSource for RetrySource<T>
where
    T: BucketSource,
{
    #[instrument(level = "debug", skip(self), fields(%date))]
    async fn fetch_bucket(&self, date: NaiveDate) -> Result<Vec<RawCandidate>, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_bucket(date).await {
                Ok(candidates) => return Ok(candidates),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch_bucket() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + Duration::from_millis(jitter_ms);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch_bucket() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
