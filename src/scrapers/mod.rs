//! News fetching: search, redirect resolution and classification.
//!
//! A batch is produced in three steps:
//!
//! 1. **Search**: ask the news search for recent hits on the topic
//!    ([`google_news`])
//! 2. **Resolve**: follow each hit's link to its final destination
//!    ([`redirect`]); that URL becomes the ledger key
//! 3. **Classify**: derive the publisher label, apply the blacklist and the
//!    keyword rule ([`crate::filters::Classifier`])
//!
//! Per-item problems never abort the batch. Every dropped hit is recorded as a
//! [`FetchFailure`] in the [`FetchReport`], logged, and simply picked up again
//! by the next scheduled run.

pub mod google_news;
pub mod redirect;

use crate::filters::Classifier;
use crate::models::{NewsItem, SearchResult};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::{Either, Itertools};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed while resolving a link.
pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode news feed: {0}")]
    Feed(#[from] quick_xml::DeError),
}

/// Something that can search for recent news.
pub trait NewsSearch {
    /// Return hits for `query` published within `period` (e.g. `"4h"`).
    async fn search(&self, query: &str, period: &str) -> Result<Vec<SearchResult>, FetchError>;
}

/// Something that maps a possibly redirecting link to its destination.
pub trait ResolveUrl {
    async fn resolve(&self, url: &str) -> Result<String, FetchError>;
}

/// Why a hit did not make it into the batch.
#[derive(Debug)]
pub enum FetchFailure {
    /// The search itself failed; the batch is empty.
    Search { query: String, error: FetchError },
    /// The link could not be resolved.
    Resolve { link: String, error: FetchError },
    /// The resolved URL has no publisher domain to classify.
    Unclassifiable { url: String },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Search { query, error } => write!(f, "search for {query:?} failed: {error}"),
            FetchFailure::Resolve { link, error } => write!(f, "could not resolve {link}: {error}"),
            FetchFailure::Unclassifiable { url } => write!(f, "no publisher domain in {url}"),
        }
    }
}

/// Outcome of one fetch: the items that made it and the hits that did not.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub items: Vec<NewsItem>,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items.len()
    }

    /// Log a one-line summary plus one warning per failure.
    pub fn log_summary(&self) {
        for failure in &self.failures {
            warn!(%failure, "Dropped news hit; will retry next run");
        }
        info!(
            fetched = self.succeeded(),
            failed = self.failed(),
            "Fetch completed"
        );
    }
}

/// Shared HTTP client for the feed and the redirect resolver.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Search, resolve and classify one batch.
///
/// Hits are resolved one after another; duplicates by link are resolved once.
#[instrument(level = "info", skip_all, fields(%query, %period))]
pub async fn collect_batch<S, R>(
    search: &S,
    resolver: &R,
    classifier: &Classifier,
    query: &str,
    period: &str,
    now: DateTime<Utc>,
) -> FetchReport
where
    S: NewsSearch,
    R: ResolveUrl,
{
    let results = match search.search(query, period).await {
        Ok(results) => results,
        Err(error) => {
            error!(%error, "News search failed");
            return FetchReport {
                items: Vec::new(),
                failures: vec![FetchFailure::Search {
                    query: query.to_string(),
                    error,
                }],
            };
        }
    };

    let total = results.len();
    let results: Vec<SearchResult> = results
        .into_iter()
        .unique_by(|r| r.link.clone())
        .collect();
    debug!(total, unique = results.len(), "Search returned hits");

    let outcomes: Vec<Result<NewsItem, FetchFailure>> = stream::iter(results)
        .then(|result| async move {
            let link = with_scheme(&result.link);
            match resolver.resolve(&link).await {
                Ok(url) => {
                    debug!(%link, %url, publisher = ?result.source, "Resolved link");
                    classifier
                        .classify(result, url.clone(), now)
                        .ok_or(FetchFailure::Unclassifiable { url })
                }
                Err(error) => Err(FetchFailure::Resolve { link, error }),
            }
        })
        .collect()
        .await;

    let (items, failures): (Vec<NewsItem>, Vec<FetchFailure>) =
        outcomes.into_iter().partition_map(|outcome| match outcome {
            Ok(item) => Either::Left(item),
            Err(failure) => Either::Right(failure),
        });

    FetchReport { items, failures }
}

/// Some feeds publish links without a scheme; assume HTTPS.
fn with_scheme(link: &str) -> String {
    let link = link.trim();
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else {
        format!("https://{}", link.trim_start_matches("//"))
    }
}
