//! Google News search via its RSS endpoint.
//!
//! The search URL carries the recency window inside the query itself
//! (`"Iran Revolution when:4h"`) plus language/region parameters:
//!
//! ```text
//! https://news.google.com/rss/search?q=Iran%20Revolution%20when%3A4h&hl=en-US&gl=US&ceid=US:en
//! ```
//!
//! Each `<item>` carries a title of the form `"Headline - Publisher"`, an
//! aggregator link that redirects to the article, an RFC 2822 `<pubDate>`
//! and a `<source>` element naming the publisher.

use super::{FetchError, NewsSearch};
use crate::models::SearchResult;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

pub const GOOGLE_NEWS_BASE_URL: &str = "https://news.google.com";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<RssSource>,
}

#[derive(Debug, Deserialize)]
struct RssSource {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "$text")]
    name: Option<String>,
}

/// Client for the Google News RSS search.
#[derive(Debug, Clone)]
pub struct GoogleNews {
    client: reqwest::Client,
    base_url: String,
    language: String,
    region: String,
}

impl GoogleNews {
    pub fn new(client: reqwest::Client, language: &str, region: &str) -> Self {
        Self {
            client,
            base_url: GOOGLE_NEWS_BASE_URL.to_string(),
            language: language.to_string(),
            region: region.to_uppercase(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Build the RSS search URL for `query` restricted to `period`.
    pub fn search_url(&self, query: &str, period: &str) -> String {
        let q = format!("{} when:{}", query.trim(), period.trim());
        format!(
            "{}/rss/search?q={}&hl={}-{}&gl={}&ceid={}:{}",
            self.base_url,
            urlencoding::encode(&q),
            self.language,
            self.region,
            self.region,
            self.region,
            self.language
        )
    }

    /// Decode an RSS document into search results.
    ///
    /// Items missing a title, link or parsable date are skipped.
    pub fn parse_feed(xml: &str) -> Result<Vec<SearchResult>, FetchError> {
        let rss: Rss = quick_xml::de::from_str(xml)?;
        let total = rss.channel.items.len();

        let results: Vec<SearchResult> = rss
            .channel
            .items
            .into_iter()
            .filter_map(|item| {
                let (Some(title), Some(link)) = (item.title, item.link) else {
                    debug!("Skipping feed item without title or link");
                    return None;
                };
                let Some(published_at) = item.pub_date.as_deref().and_then(parse_pub_date) else {
                    warn!(%link, pub_date = ?item.pub_date, "Skipping feed item with unparsable date");
                    return None;
                };
                let (source, source_url) = match item.source {
                    Some(RssSource { url, name }) => (non_blank(name), non_blank(url)),
                    None => (None, None),
                };
                let title = strip_publisher(title.trim(), source.as_deref());

                Some(SearchResult {
                    title,
                    link: link.trim().to_string(),
                    published_at,
                    source,
                    source_url,
                })
            })
            .collect();

        debug!(total, kept = results.len(), "Parsed news feed");
        Ok(results)
    }
}

impl NewsSearch for GoogleNews {
    #[instrument(level = "info", skip(self))]
    async fn search(&self, query: &str, period: &str) -> Result<Vec<SearchResult>, FetchError> {
        let url = self.search_url(query, period);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let results = Self::parse_feed(&body)?;
        info!(count = results.len(), "Fetched news search results");
        Ok(results)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Remove a trailing `" - Publisher"` from a headline.
fn strip_publisher(title: &str, source: Option<&str>) -> String {
    source
        .and_then(|s| title.strip_suffix(s))
        .and_then(|t| t.trim_end().strip_suffix('-'))
        .map(|t| t.trim_end().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title.to_string())
}
