//! Posting interface with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`PostTweet`]: core trait for publishing one piece of text
//! - [`RetryPost`]: decorator adding retries to any [`PostTweet`]
//! - [`crate::twitter::TwitterClient`]: the real implementation
//!
//! # Retry Strategy
//!
//! Only transient failures are retried: transport errors and 5xx responses.
//! Rejected credentials, rate limiting and duplicate content fail immediately,
//! since trying again within the same run cannot fix them.
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("credentials rejected (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("rate limited: {message}")]
    RateLimited { message: String },

    #[error("duplicate content: {message}")]
    Duplicate { message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl PostError {
    /// Whether another attempt within the same run might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PostError::Network(_) => true,
            PostError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A post acknowledged by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedTweet {
    pub id: String,
    pub text: String,
}

/// Something that can publish text.
///
/// Implemented by [`crate::twitter::TwitterClient`] and by [`RetryPost`],
/// which wraps another implementation.
pub trait PostTweet {
    /// Publish `text` as a single post.
    ///
    /// # Arguments
    ///
    /// * `text` - The complete tweet, already within the length limit
    ///
    /// # Returns
    ///
    /// The id and text the service acknowledged, or a [`PostError`] telling
    /// whether another attempt could help (see [`PostError::is_transient`]).
    async fn post(&self, text: &str) -> Result<PostedTweet, PostError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`PostTweet`].
///
/// Permanent failures (credentials, rate limit, duplicate content) are
/// returned on the first attempt; only transient ones are retried.
///
/// # Backoff Strategy
///
/// - Attempt 1 fails: wait `base_delay`
/// - Attempt 2 fails: wait `base_delay * 2`
/// - Attempt 3 fails: wait `base_delay * 4`
/// - Every wait is capped at 30 seconds and gets up to 250ms of jitter
pub struct RetryPost<T> {
    inner: T,
    /// Retries after the first attempt.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryPost<T>
where
    T: PostTweet,
{
    /// Wrap `inner`, retrying up to `max_retries` times.
    ///
    /// # Arguments
    ///
    /// * `inner` - The poster that does the actual request
    /// * `max_retries` - Retries after the first attempt (3 used by a run)
    /// * `base_delay` - Wait before the first retry (2 seconds used by a run)
    ///
    /// # Example
    ///
    /// ```ignore
    /// let poster = RetryPost::new(TwitterClient::new(client, &creds), 3, Duration::from_secs(2));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryPost<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPost")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> PostTweet for RetryPost<T>
where
    T: PostTweet,
{
    #[instrument(level = "info", skip_all)]
    async fn post(&self, text: &str) -> Result<PostedTweet, PostError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.post(text).await {
                Ok(posted) => {
                    info!(
                        attempts = attempt + 1,
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        id = %posted.id,
                        "post() succeeded"
                    );
                    return Ok(posted);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        error!(attempt, error = %e, "post() failed permanently");
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "post() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "post() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
