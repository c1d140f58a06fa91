//! Source blacklist and content rules.
//!
//! The blacklist is a YAML file with two lists:
//!
//! ```yaml
//! blocked_sources:
//!   - tasnim
//!   - presstv
//! blocked_extensions:
//!   - ir
//! ```
//!
//! A story is blocked when any `blocked_sources` entry is a substring of its
//! domain label, or when its extension is listed in `blocked_extensions`.
//! The older key names `shit_news_sources` and `shit_news_extension` are
//! accepted too; any other key is rejected.
//!
//! Links that never leave the aggregator are classified by the publisher
//! home page the feed names instead.

use crate::config::{ConfigError, read_yaml};
use crate::models::{NewsItem, SearchResult, TweetStatus};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Labels that sit between a country-code TLD and the registrable domain,
/// as in `bbc.co.uk` or `abc.net.au`.
static SECOND_LEVEL_LABELS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["co", "com", "net", "org", "gov", "ac", "edu", "or", "ne", "go"]
        .into_iter()
        .collect()
});

/// Hosts serving aggregator pages rather than articles.
const AGGREGATOR_HOSTS: [&str; 1] = ["news.google.com"];

/// Domain label and public suffix of a URL, e.g. `("bbc", "co.uk")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub domain: String,
    pub extension: String,
}

/// Split the host of `url` into its domain label and extension.
///
/// Returns `None` for URLs without a dotted host name.
pub fn url_parts(url: &str) -> Option<UrlParts> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }

    let last = labels.len() - 1;
    let two_level = labels.len() >= 3
        && labels[last].len() == 2
        && SECOND_LEVEL_LABELS.contains(labels[last - 1]);
    let (domain, extension) = if two_level {
        (labels[last - 2], format!("{}.{}", labels[last - 1], labels[last]))
    } else {
        (labels[last - 1], labels[last].to_string())
    };

    Some(UrlParts {
        domain: domain.to_string(),
        extension,
    })
}

fn is_aggregator(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .is_some_and(|host| AGGREGATOR_HOSTS.contains(&host.as_str()))
}

/// Publishers that should never be tweeted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blacklist {
    #[serde(default, alias = "shit_news_sources")]
    pub blocked_sources: Vec<String>,
    #[serde(default, alias = "shit_news_extension")]
    pub blocked_extensions: Vec<String>,
}

impl Blacklist {
    /// Load a blacklist from a YAML file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let blacklist: Self = read_yaml(path).await?;
        if blacklist.blocked_sources.is_empty() && blacklist.blocked_extensions.is_empty() {
            warn!("Blacklist is empty; no source will be blocked");
        }
        info!(
            sources = blacklist.blocked_sources.len(),
            extensions = blacklist.blocked_extensions.len(),
            "Loaded blacklist"
        );
        Ok(blacklist)
    }

    /// Whether a publisher with this domain label and extension is blocked.
    pub fn is_blocked(&self, domain: &str, extension: &str) -> bool {
        let domain = domain.to_lowercase();
        let extension = extension.trim_start_matches('.').to_lowercase();

        let bad_source = self
            .blocked_sources
            .iter()
            .map(|s| s.trim().to_lowercase())
            .any(|s| !s.is_empty() && domain.contains(&s));
        let bad_extension = self
            .blocked_extensions
            .iter()
            .any(|e| e.trim().trim_start_matches('.').eq_ignore_ascii_case(&extension));

        bad_source || bad_extension
    }
}

/// Content rule: the headline must mention the keyword, ignoring case.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pattern: Regex,
}

impl KeywordRule {
    pub fn new(keyword: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("(?i){}", regex::escape(keyword.trim())))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, title: &str) -> bool {
        self.pattern.is_match(title)
    }
}

/// Turns a resolved search hit into a ledger row.
#[derive(Debug, Clone)]
pub struct Classifier {
    blacklist: Blacklist,
    keyword: KeywordRule,
}

impl Classifier {
    pub fn new(blacklist: Blacklist, keyword: KeywordRule) -> Self {
        Self { blacklist, keyword }
    }

    /// Build the row for `result`, now known to live at `url`.
    ///
    /// Headlines failing the keyword rule are kept but marked
    /// [`TweetStatus::Excluded`], so they still deduplicate later deliveries.
    /// Returns `None` when `url` has no publisher domain.
    pub fn classify(
        &self,
        result: SearchResult,
        url: String,
        retrieved_at: DateTime<Utc>,
    ) -> Option<NewsItem> {
        let parts = if is_aggregator(&url) {
            let publisher = result.source_url.as_deref().and_then(url_parts);
            debug!(%url, source_url = ?result.source_url, "Link still on the aggregator");
            publisher.or_else(|| url_parts(&url))?
        } else {
            url_parts(&url)?
        };
        let is_blocked = self.blacklist.is_blocked(&parts.domain, &parts.extension);
        let tweet_status = if self.keyword.matches(&result.title) {
            TweetStatus::Eligible
        } else {
            TweetStatus::Excluded
        };

        Some(NewsItem {
            title: result.title,
            url,
            published_at: result.published_at,
            retrieved_at,
            source: parts.domain,
            is_blocked,
            tweet_status,
        })
    }
}
