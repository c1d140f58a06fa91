//! One scheduled run, start to finish.
//!
//! 1. check the ledger directory is writable
//! 2. load credentials (skipped on a dry run) and the blacklist
//! 3. fetch, resolve and classify the batch
//! 4. merge the batch into the ledger and commit it
//! 5. pick the newest eligible story and post it
//! 6. commit the `Tweeted` mark, only once the post went through
//!
//! A failed post leaves the story eligible on disk, so the next run tries it
//! again.

use crate::api::{PostError, PostTweet, RetryPost};
use crate::config::{BotConfig, ConfigError, Credentials};
use crate::filters::{Blacklist, Classifier, KeywordRule};
use crate::ledger::{LedgerError, NewsLedger, select_next};
use crate::models::NewsItem;
use crate::scrapers::google_news::GoogleNews;
use crate::scrapers::redirect::RedirectResolver;
use crate::scrapers::{FetchError, collect_batch, http_client};
use crate::twitter::TwitterClient;
use crate::utils::{compose_tweet_text, ensure_writable_dir, hashtag_for, parent_dir};
use chrono::Utc;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

const POST_RETRIES: usize = 3;
const POST_BASE_DELAY: Duration = Duration::from_secs(2);

/// What a run ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Posted {
        url: String,
        tweet_id: String,
        text: String,
    },
    /// The service already had this text; the story is marked and skipped.
    AlreadyPosted { url: String },
    DryRun { url: String, text: String },
    NothingToPost,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("ledger directory {} is not writable: {source}", path.display())]
    LedgerDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid keyword: {0}")]
    Keyword(#[from] regex::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("failed to post {url}: {source}")]
    Post {
        url: String,
        #[source]
        source: PostError,
    },
}

/// Execute one run with the live search, resolver and poster.
#[instrument(level = "info", skip_all, fields(query = %config.query, dry_run = config.dry_run))]
pub async fn run(config: &BotConfig) -> Result<RunOutcome, RunError> {
    let ledger_dir = parent_dir(&config.ledger_path);
    ensure_writable_dir(&ledger_dir)
        .await
        .map_err(|source| RunError::LedgerDir {
            path: ledger_dir.clone(),
            source,
        })?;

    // Bad credentials should stop the run before any network traffic.
    let credentials = if config.dry_run {
        None
    } else {
        Some(Credentials::load(&config.keys_path).await?)
    };

    let blacklist = Blacklist::load(&config.filters_path).await?;
    let classifier = Classifier::new(blacklist, KeywordRule::new(&config.keyword)?);

    let client = http_client(config.http_timeout)?;
    let search = GoogleNews::new(client.clone(), &config.language, &config.region);
    let resolver = RedirectResolver::new(client.clone());
    let report = collect_batch(
        &search,
        &resolver,
        &classifier,
        &config.query,
        &config.period,
        Utc::now(),
    )
    .await;
    report.log_summary();

    let ledger = NewsLedger::new(&config.ledger_path, config.retention);
    let poster = credentials.map(|credentials| {
        RetryPost::new(
            TwitterClient::new(client, &credentials),
            POST_RETRIES,
            POST_BASE_DELAY,
        )
    });
    publish_next(&ledger, report.items, poster.as_ref()).await
}

/// Merge `batch` into the ledger, then post the newest eligible story.
///
/// With no `poster` the tweet is only composed and the ledger keeps the story
/// eligible.
#[instrument(level = "info", skip_all, fields(ledger = %ledger.path().display(), batch = batch.len()))]
pub async fn publish_next<P>(
    ledger: &NewsLedger,
    batch: Vec<NewsItem>,
    poster: Option<&P>,
) -> Result<RunOutcome, RunError>
where
    P: PostTweet,
{
    let stored = ledger.load().await?;
    let mut working = ledger.merge(batch, stored).await?;

    let Some(item) = select_next(&mut working) else {
        info!("No eligible story; nothing to tweet");
        return Ok(RunOutcome::NothingToPost);
    };
    let text = compose_tweet_text(&item.title, &hashtag_for(&item.source), &item.url);

    let Some(poster) = poster else {
        info!(url = %item.url, %text, "Dry run; tweet not posted");
        return Ok(RunOutcome::DryRun {
            url: item.url,
            text,
        });
    };

    let outcome = match poster.post(&text).await {
        Ok(posted) => {
            info!(url = %item.url, id = %posted.id, text = %posted.text, "Tweeted");
            RunOutcome::Posted {
                url: item.url,
                tweet_id: posted.id,
                text,
            }
        }
        Err(PostError::Duplicate { message }) => {
            warn!(url = %item.url, %message, "Already tweeted; marking it");
            RunOutcome::AlreadyPosted { url: item.url }
        }
        Err(source) => {
            error!(url = %item.url, error = %source, "Post failed; story stays eligible");
            return Err(RunError::Post {
                url: item.url,
                source,
            });
        }
    };

    ledger.merge(Vec::new(), working).await?;
    Ok(outcome)
}
