//! The news ledger: every story the bot has seen, keyed by resolved URL.
//!
//! Each run merges the freshly fetched batch into the ledger file:
//!
//! 1. concatenate the batch and the stored rows
//! 2. collapse rows sharing a `url` into one, keeping the highest
//!    [`TweetStatus`] and the fields of the most recently retrieved copy
//! 3. drop rows published before `now - retention`
//! 4. sort by `published_at`, newest first
//!
//! The result overwrites the file. Because duplicates collapse and status
//! only moves up, merging the same batch twice changes nothing.
//!
//! The file is CSV with a header row. A missing file is the first-run case and
//! reads as an empty ledger; any other read or decode failure is an error, so
//! a damaged ledger can never silently forget what was already tweeted.

use crate::models::{NewsItem, TweetStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Default retention window, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 3;

const HEADER: [&str; 7] = [
    "title",
    "url",
    "published_at",
    "retrieved_at",
    "source",
    "is_blocked",
    "tweet_status",
];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ledger {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to encode ledger {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write ledger {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle on the ledger file plus the retention window applied on merge.
#[derive(Debug, Clone)]
pub struct NewsLedger {
    path: PathBuf,
    retention: Duration,
}

impl NewsLedger {
    pub fn new(path: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            path: path.into(),
            retention,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row of the ledger.
    ///
    /// Returns an empty ledger only when the file does not exist.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Vec<NewsItem>, LedgerError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No ledger yet; starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(LedgerError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let items = reader
            .deserialize()
            .collect::<Result<Vec<NewsItem>, _>>()
            .map_err(|source| LedgerError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        info!(rows = items.len(), "Loaded ledger");
        Ok(items)
    }

    /// Merge `new_items` into `existing` and commit the result to disk.
    ///
    /// Returns the merged ledger, newest first.
    pub async fn merge(
        &self,
        new_items: Vec<NewsItem>,
        existing: Vec<NewsItem>,
    ) -> Result<Vec<NewsItem>, LedgerError> {
        self.merge_at(new_items, existing, Utc::now()).await
    }

    /// [`merge`](Self::merge) with an explicit clock.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn merge_at(
        &self,
        new_items: Vec<NewsItem>,
        existing: Vec<NewsItem>,
        now: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>, LedgerError> {
        let incoming = new_items.len();
        let stored = existing.len();
        let merged = reconcile(new_items, existing, now, self.retention);
        self.save(&merged).await?;

        info!(incoming, stored, rows = merged.len(), "Merged ledger");
        Ok(merged)
    }

    /// Overwrite the ledger file with `items`.
    ///
    /// Rows are written to a sibling `.tmp` file which is then renamed over the
    /// ledger, so readers never see a half-written file.
    async fn save(&self, items: &[NewsItem]) -> Result<(), LedgerError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .write_record(HEADER)
            .map_err(|source| self.encode_error(source))?;
        for item in items {
            writer
                .serialize(item)
                .map_err(|source| self.encode_error(source))?;
        }
        let data = writer.into_inner().map_err(|e| LedgerError::Write {
            path: self.path.clone(),
            source: e.into_error(),
        })?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, &data)
            .await
            .map_err(|source| LedgerError::Write {
                path: tmp_path.clone(),
                source,
            })?;
        if let Err(source) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LedgerError::Write {
                path: self.path.clone(),
                source,
            });
        }

        debug!(rows = items.len(), bytes = data.len(), "Wrote ledger");
        Ok(())
    }

    fn encode_error(&self, source: csv::Error) -> LedgerError {
        LedgerError::Encode {
            path: self.path.clone(),
            source,
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Merge, deduplicate, recycle and sort, without touching the disk.
///
/// `new_items` come first, so on a retrieval-time tie the fresh copy wins.
pub fn reconcile(
    new_items: Vec<NewsItem>,
    existing: Vec<NewsItem>,
    now: DateTime<Utc>,
    retention: Duration,
) -> Vec<NewsItem> {
    let cutoff = now - retention;
    let mut by_url: HashMap<String, NewsItem> =
        HashMap::with_capacity(new_items.len() + existing.len());

    for item in new_items.into_iter().chain(existing) {
        let merged = match by_url.remove(&item.url) {
            Some(current) => collapse(current, item),
            None => item,
        };
        by_url.insert(merged.url.clone(), merged);
    }

    let mut ledger: Vec<NewsItem> = by_url
        .into_values()
        .filter(|item| item.published_at >= cutoff)
        .collect();
    ledger.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.url.cmp(&b.url))
    });
    ledger
}

/// Reduce two rows for the same URL into one.
fn collapse(current: NewsItem, other: NewsItem) -> NewsItem {
    let status = current.tweet_status.max(other.tweet_status);
    let mut kept = if other.retrieved_at > current.retrieved_at {
        other
    } else {
        current
    };
    kept.tweet_status = status;
    kept
}

/// Pick the newest eligible row and mark it tweeted in `ledger`.
///
/// The mark is in memory only; persist it with a later
/// [`NewsLedger::merge`].
pub fn select_next(ledger: &mut [NewsItem]) -> Option<NewsItem> {
    let item = ledger.iter_mut().find(|item| item.is_eligible())?;
    item.tweet_status = TweetStatus::Tweeted;
    Some(item.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 12, 5, 12, 0, 0).unwrap()
    }

    fn retention() -> Duration {
        Duration::days(DEFAULT_RETENTION_DAYS)
    }

    fn item(url: &str, hours_ago: i64, status: TweetStatus) -> NewsItem {
        let published_at = now() - Duration::hours(hours_ago);
        NewsItem {
            title: format!("Story at {url}"),
            url: url.to_string(),
            published_at,
            retrieved_at: published_at + Duration::minutes(30),
            source: "reuters".to_string(),
            is_blocked: false,
            tweet_status: status,
        }
    }

    #[test]
    fn test_empty_ledger_single_item_is_selected() {
        let batch = vec![item("https://a.example/1", 1, TweetStatus::Eligible)];
        let mut ledger = reconcile(batch, Vec::new(), now(), retention());
        assert_eq!(ledger.len(), 1);

        let picked = select_next(&mut ledger).expect("one eligible item");
        assert_eq!(picked.url, "https://a.example/1");
        assert_eq!(picked.tweet_status, TweetStatus::Tweeted);
        assert_eq!(ledger[0].tweet_status, TweetStatus::Tweeted);
        assert!(select_next(&mut ledger).is_none());
    }

    #[test]
    fn test_redelivered_item_keeps_tweeted_status() {
        let existing = vec![item("https://a.example/x", 5, TweetStatus::Tweeted)];
        let mut redelivered = item("https://a.example/x", 5, TweetStatus::Eligible);
        redelivered.retrieved_at = now();

        let mut ledger = reconcile(vec![redelivered], existing, now(), retention());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].tweet_status, TweetStatus::Tweeted);
        assert_eq!(ledger[0].retrieved_at, now());
        assert!(select_next(&mut ledger).is_none());
    }

    #[test]
    fn test_status_is_maximum_of_group() {
        let cases = [
            (TweetStatus::Excluded, TweetStatus::Eligible),
            (TweetStatus::Eligible, TweetStatus::Tweeted),
            (TweetStatus::Tweeted, TweetStatus::Excluded),
            (TweetStatus::Eligible, TweetStatus::Eligible),
        ];
        for (old, new) in cases {
            let ledger = reconcile(
                vec![item("https://a.example/u", 2, new)],
                vec![item("https://a.example/u", 2, old)],
                now(),
                retention(),
            );
            assert_eq!(ledger.len(), 1);
            assert_eq!(ledger[0].tweet_status, old.max(new), "{old:?} vs {new:?}");
        }
    }

    #[test]
    fn test_most_recently_retrieved_fields_win() {
        let mut old = item("https://a.example/u", 10, TweetStatus::Tweeted);
        old.title = "Old headline".to_string();
        let mut fresh = item("https://a.example/u", 10, TweetStatus::Eligible);
        fresh.title = "Updated headline".to_string();
        fresh.is_blocked = true;
        fresh.retrieved_at = old.retrieved_at + Duration::hours(3);

        let ledger = reconcile(vec![old], vec![fresh], now(), retention());
        assert_eq!(ledger[0].title, "Updated headline");
        assert!(ledger[0].is_blocked);
        assert_eq!(ledger[0].tweet_status, TweetStatus::Tweeted);
    }

    #[test]
    fn test_old_items_are_recycled() {
        let existing = vec![
            item("https://a.example/old", 4 * 24, TweetStatus::Tweeted),
            item("https://a.example/new", 3, TweetStatus::Eligible),
        ];
        let ledger = reconcile(Vec::new(), existing, now(), retention());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].url, "https://a.example/new");
        let cutoff = now() - retention();
        assert!(ledger.iter().all(|i| i.published_at >= cutoff));
    }

    #[test]
    fn test_item_exactly_at_cutoff_is_kept() {
        let edge = item("https://a.example/edge", 3 * 24, TweetStatus::Eligible);
        let ledger = reconcile(vec![edge], Vec::new(), now(), retention());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_sorted_newest_first_and_unique() {
        let batch = vec![
            item("https://a.example/2", 20, TweetStatus::Eligible),
            item("https://a.example/1", 1, TweetStatus::Eligible),
            item("https://a.example/2", 20, TweetStatus::Eligible),
        ];
        let existing = vec![
            item("https://a.example/3", 40, TweetStatus::Tweeted),
            item("https://a.example/1", 1, TweetStatus::Excluded),
        ];
        let ledger = reconcile(batch, existing, now(), retention());

        let urls: Vec<&str> = ledger.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://a.example/1", "https://a.example/2", "https://a.example/3"]
        );
        let unique: HashSet<&str> = urls.iter().copied().collect();
        assert_eq!(unique.len(), ledger.len());
        assert!(ledger.windows(2).all(|w| w[0].published_at >= w[1].published_at));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![
            item("https://a.example/1", 2, TweetStatus::Tweeted),
            item("https://a.example/2", 30, TweetStatus::Eligible),
            item("https://a.example/old", 100, TweetStatus::Eligible),
        ];
        let batch = vec![
            item("https://a.example/1", 2, TweetStatus::Eligible),
            item("https://a.example/4", 6, TweetStatus::Excluded),
            item("https://a.example/4", 6, TweetStatus::Eligible),
        ];

        let once = reconcile(batch.clone(), existing, now(), retention());
        let twice = reconcile(batch, once.clone(), now(), retention());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_select_skips_tweeted_blocked_and_excluded() {
        let mut blocked = item("https://a.example/blocked", 1, TweetStatus::Eligible);
        blocked.is_blocked = true;
        let mut ledger = vec![
            blocked,
            item("https://a.example/tweeted", 2, TweetStatus::Tweeted),
            item("https://a.example/excluded", 3, TweetStatus::Excluded),
            item("https://a.example/ok", 4, TweetStatus::Eligible),
        ];

        let picked = select_next(&mut ledger).expect("eligible item");
        assert_eq!(picked.url, "https://a.example/ok");
        assert!(!ledger[0].is_eligible());
        assert_eq!(ledger[0].tweet_status, TweetStatus::Eligible);
    }

    #[test]
    fn test_select_none_when_everything_used_up() {
        let mut blocked = item("https://a.example/blocked", 1, TweetStatus::Eligible);
        blocked.is_blocked = true;
        let mut ledger = vec![
            blocked,
            item("https://a.example/tweeted", 2, TweetStatus::Tweeted),
        ];
        let before = ledger.clone();
        assert!(select_next(&mut ledger).is_none());
        assert_eq!(ledger, before);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = NewsLedger::new(dir.path().join("news_data.csv"), retention());
        assert!(ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists at the path, so this is not a first-run condition.
        let ledger = NewsLedger::new(dir.path(), retention());
        assert!(matches!(
            ledger.load().await,
            Err(LedgerError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news_data.csv");
        std::fs::write(
            &path,
            "title,url,published_at,retrieved_at,source,is_blocked,tweet_status\n\
             A,https://a.example/1,not-a-date,2022-12-05T12:00:00Z,reuters,false,0\n",
        )
        .unwrap();

        let ledger = NewsLedger::new(&path, retention());
        assert!(matches!(
            ledger.load().await,
            Err(LedgerError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news_data.csv");
        std::fs::write(
            &path,
            "title,url,published_at,retrieved_at,source,is_blocked,tweet_status\n\
             A,https://a.example/1,2022-12-05T10:00:00Z,2022-12-05T12:00:00Z,reuters,false,7\n",
        )
        .unwrap();

        let ledger = NewsLedger::new(&path, retention());
        assert!(ledger.load().await.is_err());
    }

    #[tokio::test]
    async fn test_load_ignores_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news_data.csv");
        std::fs::write(
            &path,
            "tweet_status,url,title,source,is_blocked,retrieved_at,published_at\n\
             1,https://a.example/1,\"Headline, with comma\",reuters,false,2022-12-05T12:00:00Z,2022-12-05T10:00:00Z\n",
        )
        .unwrap();

        let items = NewsLedger::new(&path, retention()).load().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Headline, with comma");
        assert_eq!(items[0].tweet_status, TweetStatus::Tweeted);
    }

    #[tokio::test]
    async fn test_merge_commits_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news_data.csv");
        let ledger = NewsLedger::new(&path, retention());

        let batch = vec![
            item("https://a.example/2", 8, TweetStatus::Eligible),
            item("https://a.example/1", 1, TweetStatus::Eligible),
        ];
        let merged = ledger.merge_at(batch, Vec::new(), now()).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(
            "title,url,published_at,retrieved_at,source,is_blocked,tweet_status\n"
        ));
        assert!(!dir.path().join("news_data.csv.tmp").exists());

        let reloaded = ledger.load().await.unwrap();
        assert_eq!(reloaded, merged);
        assert_eq!(reloaded[0].url, "https://a.example/1");
    }

    #[tokio::test]
    async fn test_failed_rename_removes_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the ledger path cannot be replaced by a file.
        let path = dir.path().join("news_data.csv");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let ledger = NewsLedger::new(&path, retention());

        let batch = vec![item("https://a.example/1", 1, TweetStatus::Eligible)];
        let err = ledger.merge_at(batch, Vec::new(), now()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Write { .. }));
        assert!(!dir.path().join("news_data.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_empty_merge_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news_data.csv");
        let ledger = NewsLedger::new(&path, retention());

        let merged = ledger.merge_at(Vec::new(), Vec::new(), now()).await.unwrap();
        assert!(merged.is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap().trim_end(),
            HEADER.join(",")
        );
        assert!(ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_selection_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = NewsLedger::new(dir.path().join("news_data.csv"), retention());
        let batch = vec![
            item("https://a.example/1", 1, TweetStatus::Eligible),
            item("https://a.example/2", 2, TweetStatus::Eligible),
        ];

        let mut current = ledger.merge_at(batch.clone(), Vec::new(), now()).await.unwrap();
        let first = select_next(&mut current).unwrap();
        ledger.merge_at(Vec::new(), current, now()).await.unwrap();

        // Next run: same batch fetched again, ledger read back from disk.
        let stored = ledger.load().await.unwrap();
        let mut current = ledger.merge_at(batch, stored, now()).await.unwrap();
        let second = select_next(&mut current).unwrap();
        assert_eq!(first.url, "https://a.example/1");
        assert_eq!(second.url, "https://a.example/2");
    }
}
