//! HoopsHype rumors scraper.
//!
//! The preview site publishes one HTML page per day behind HTTP basic auth:
//!
//! - the current day (on the sync clock) lives at `{base}/rumors`
//! - earlier days live at `{base}/archive/rumors/{YYYY}/rumors-{YYYYMMDD}.htm`
//!
//! Each `div.rumor` on a page becomes one [`RawCandidate`]. Rumors are listed
//! newest first and that order is preserved.

use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::models::RawCandidate;
use crate::scrapers::BucketSource;

/// Authenticated client for the HoopsHype rumor pages.
#[derive(Debug)]
pub struct HoopsHypeSource {
    client: Client,
    config: SourceConfig,
    today: NaiveDate,
}

impl HoopsHypeSource {
    /// `today` is the sync clock's current day; it selects the live page.
    pub fn new(config: SourceConfig, today: NaiveDate) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            config,
            today,
        })
    }

    /// Page URL for `date`.
    pub fn page_url(&self, date: NaiveDate) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if date == self.today {
            format!("{base}/rumors")
        } else {
            format!(
                "{base}/archive/rumors/{}/rumors-{}.htm",
                date.format("%Y"),
                date.format("%Y%m%d")
            )
        }
    }
}

impl BucketSource for HoopsHypeSource {
    #[instrument(level = "info", skip(self), fields(%date))]
    async fn fetch_bucket(&self, date: NaiveDate) -> Result<Vec<RawCandidate>, FetchError> {
        let url = self.page_url(date);
        debug!(%url, "Fetching rumor page");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Non-success response; check credentials");
            return Err(FetchError::Status { url, status });
        }

        let body = response.text().await?;
        let page_url = Url::parse(&url)?;
        let candidates = parse_rumors(&body, &page_url)?;
        info!(
            bytes = body.len(),
            count = candidates.len(),
            "Parsed rumor page"
        );
        Ok(candidates)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|_| FetchError::Selector(css.to_string()))
}

/// Trim every text node and concatenate them with no separator.
///
/// Stored rumors were extracted this way, so fingerprints of re-fetched pages
/// must be computed from the same shape.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

fn resolve_href(el: ElementRef<'_>, page_url: &Url) -> Option<String> {
    let href = el.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    Some(
        page_url
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
    )
}

/// Extract every rumor on a page, in page order.
///
/// Blocks without a `p.rumor-content` paragraph produce a candidate with empty
/// text; the record model drops those.
pub fn parse_rumors(html: &str, page_url: &Url) -> Result<Vec<RawCandidate>, FetchError> {
    let document = Html::parse_document(html);
    let rumor_sel = selector("div.rumor")?;
    let date_sel = selector("span.rumorDate")?;
    let content_sel = selector("p.rumor-content")?;
    let quote_sel = selector("a.quote")?;
    let media_sel = selector("a.rumormedia")?;
    let link_sel = selector("a[href]")?;
    let tag_sel = selector("div.tags a")?;

    let mut candidates = Vec::new();
    for rumor in document.select(&rumor_sel) {
        let mut candidate = RawCandidate::default();

        if let Some(span) = rumor.select(&date_sel).next() {
            candidate.display_date = element_text(span);
        }

        if let Some(p) = rumor.select(&content_sel).next() {
            candidate.text = element_text(p);

            let links: Vec<ElementRef<'_>> = p.select(&link_sel).collect();
            match p.select(&quote_sel).next() {
                Some(quote) => {
                    candidate.quote = element_text(quote);
                    candidate.source_url = resolve_href(quote, page_url).unwrap_or_default();
                }
                None => {
                    candidate.source_url = links
                        .first()
                        .and_then(|a| resolve_href(*a, page_url))
                        .unwrap_or_default();
                }
            }
            candidate.outlet = match p.select(&media_sel).next() {
                Some(media) => element_text(media),
                None if links.len() > 1 => links.last().map(|a| element_text(*a)).unwrap_or_default(),
                None => String::new(),
            };
        }

        candidate.tags = rumor
            .select(&tag_sel)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();

        candidates.push(candidate);
    }

    debug!(count = candidates.len(), "Extracted rumor blocks");
    Ok(candidates)
}
