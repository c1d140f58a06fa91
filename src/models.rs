//! Data models for fetched news and the persisted ledger.
//!
//! - [`SearchResult`]: one raw hit returned by the news search, before its
//!   link is resolved
//! - [`NewsItem`]: a ledger row, keyed by its resolved `url`
//! - [`TweetStatus`]: the tri-state posting status stored with every row
//!
//! Ledger rows are written to CSV, so every field of [`NewsItem`] has a flat
//! textual representation: timestamps as RFC 3339, the status as an integer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Posting status of a ledger row.
///
/// Persisted as `-1`, `0` or `1`. Variants are declared in numeric order so
/// the derived [`Ord`] agrees with the integer value; merging keeps the
/// maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum TweetStatus {
    /// Filtered out by a content rule (`-1`).
    Excluded,
    /// Not posted yet (`0`).
    Eligible,
    /// Already posted (`1`).
    Tweeted,
}

impl From<TweetStatus> for i8 {
    fn from(status: TweetStatus) -> i8 {
        match status {
            TweetStatus::Excluded => -1,
            TweetStatus::Eligible => 0,
            TweetStatus::Tweeted => 1,
        }
    }
}

/// Error returned when a persisted status is not `-1`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTweetStatus(pub i8);

impl fmt::Display for InvalidTweetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tweet status {} (expected -1, 0 or 1)", self.0)
    }
}

impl TryFrom<i8> for TweetStatus {
    type Error = InvalidTweetStatus;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(TweetStatus::Excluded),
            0 => Ok(TweetStatus::Eligible),
            1 => Ok(TweetStatus::Tweeted),
            other => Err(InvalidTweetStatus(other)),
        }
    }
}

impl fmt::Display for TweetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i8::from(*self))
    }
}

/// A single hit from the news search, as returned by the feed.
///
/// `link` usually points at an aggregator redirect and still has to be
/// resolved before it can serve as a ledger key.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The headline with any trailing publisher suffix removed.
    pub title: String,
    /// The link exactly as the feed published it.
    pub link: String,
    /// When the feed says the story was published.
    pub published_at: DateTime<Utc>,
    /// Publisher name from the feed, when present (e.g. `"Reuters"`).
    pub source: Option<String>,
    /// Publisher home page from the feed (e.g. `"https://www.reuters.com"`).
    pub source_url: Option<String>,
}

/// One row of the news ledger.
///
/// `url` is the unique key. Everything else may be replaced by a fresher copy
/// of the same story during a merge, except `tweet_status`, which only ever
/// moves up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// The headline.
    pub title: String,
    /// Canonical link, after redirects were followed.
    pub url: String,
    /// Publication time reported by the news source.
    pub published_at: DateTime<Utc>,
    /// When this bot fetched the story.
    pub retrieved_at: DateTime<Utc>,
    /// Domain label of the publisher, e.g. `"reuters"`.
    pub source: String,
    /// True when the publisher matched the blacklist.
    pub is_blocked: bool,
    /// Posting status.
    pub tweet_status: TweetStatus,
}

impl NewsItem {
    /// An item that can be picked for posting.
    pub fn is_eligible(&self) -> bool {
        self.tweet_status == TweetStatus::Eligible && !self.is_blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(status: TweetStatus, blocked: bool) -> NewsItem {
        let ts = Utc.with_ymd_and_hms(2022, 12, 1, 10, 0, 0).unwrap();
        NewsItem {
            title: "Protests continue in Iran".to_string(),
            url: "https://www.reuters.com/world/iran-protests".to_string(),
            published_at: ts,
            retrieved_at: ts,
            source: "reuters".to_string(),
            is_blocked: blocked,
            tweet_status: status,
        }
    }

    #[test]
    fn test_status_order_matches_integer_value() {
        assert!(TweetStatus::Excluded < TweetStatus::Eligible);
        assert!(TweetStatus::Eligible < TweetStatus::Tweeted);
        assert_eq!(
            TweetStatus::Excluded.max(TweetStatus::Tweeted),
            TweetStatus::Tweeted
        );
    }

    #[test]
    fn test_status_integer_conversion() {
        assert_eq!(i8::from(TweetStatus::Excluded), -1);
        assert_eq!(i8::from(TweetStatus::Eligible), 0);
        assert_eq!(i8::from(TweetStatus::Tweeted), 1);
        assert_eq!(TweetStatus::try_from(1), Ok(TweetStatus::Tweeted));
        assert_eq!(TweetStatus::try_from(2), Err(InvalidTweetStatus(2)));
    }

    #[test]
    fn test_status_serializes_as_integer() {
        let json = serde_json::to_string(&TweetStatus::Excluded).unwrap();
        assert_eq!(json, "-1");
        let parsed: TweetStatus = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, TweetStatus::Tweeted);
        assert!(serde_json::from_str::<TweetStatus>("5").is_err());
    }

    #[test]
    fn test_eligibility() {
        assert!(item(TweetStatus::Eligible, false).is_eligible());
        assert!(!item(TweetStatus::Eligible, true).is_eligible());
        assert!(!item(TweetStatus::Tweeted, false).is_eligible());
        assert!(!item(TweetStatus::Excluded, false).is_eligible());
    }
}
