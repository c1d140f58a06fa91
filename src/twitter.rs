//! Twitter/X API v2 client.
//!
//! Tweets are created with `POST /2/tweets` using an OAuth 2.0 user-context
//! bearer token. Error responses are mapped onto [`PostError`] so the caller
//! can tell rejected credentials and rate limits from transient failures.

use crate::api::{PostError, PostTweet, PostedTweet};
use crate::config::Credentials;
use crate::utils::truncate_for_log;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::{debug, instrument};

pub const TWITTER_API_BASE_URL: &str = "https://api.twitter.com";

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
    text: String,
}

/// Posts tweets on behalf of the account owning the token.
pub struct TwitterClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl TwitterClient {
    pub fn new(client: reqwest::Client, credentials: &Credentials) -> Self {
        let base_url = credentials
            .api_base
            .as_deref()
            .unwrap_or(TWITTER_API_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            base_url,
            bearer_token: credentials.bearer_token.clone(),
        }
    }
}

impl fmt::Debug for TwitterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PostTweet for TwitterClient {
    #[instrument(level = "info", skip_all, fields(chars = text.chars().count()))]
    async fn post(&self, text: &str) -> Result<PostedTweet, PostError> {
        let url = format!("{}/2/tweets", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Tweet API responded");

        if status.is_success() {
            let created: CreateTweetResponse = serde_json::from_str(&body)?;
            return Ok(PostedTweet {
                id: created.data.id,
                text: created.data.text,
            });
        }

        let message = truncate_for_log(&body, 300);
        Err(match status.as_u16() {
            401 => PostError::Auth {
                status: 401,
                message,
            },
            403 if body.to_lowercase().contains("duplicate") => PostError::Duplicate { message },
            403 => PostError::Auth {
                status: 403,
                message,
            },
            429 => PostError::RateLimited { message },
            other => PostError::Api {
                status: other,
                message,
            },
        })
    }
}
