//! Run configuration and the YAML files it points at.
//!
//! Everything a run needs is collected once into [`BotConfig`] and handed to
//! the components that need it; nothing reads settings from globals.

use crate::cli::Cli;
use crate::ledger::DEFAULT_RETENTION_DAYS;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Read and decode a YAML file. An empty file decodes as an empty mapping.
pub async fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Posting credentials, read from the keys file.
///
/// ```yaml
/// bearer_token: "AAAA..."
/// api_base: "https://api.twitter.com"   # optional
/// ```
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// OAuth 2.0 user-context access token with `tweet.write` scope.
    pub bearer_token: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Credentials {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        read_yaml(path).await
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub keys_path: PathBuf,
    pub filters_path: PathBuf,
    pub ledger_path: PathBuf,
    pub query: String,
    pub period: String,
    pub retention: chrono::Duration,
    pub keyword: String,
    pub language: String,
    pub region: String,
    pub http_timeout: Duration,
    pub dry_run: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            keys_path: PathBuf::from("keys/twitterkeys.yaml"),
            filters_path: PathBuf::from("news_filter.yaml"),
            ledger_path: PathBuf::from("news_data.csv"),
            query: "Iran Revolution".to_string(),
            period: "4h".to_string(),
            retention: chrono::Duration::days(DEFAULT_RETENTION_DAYS),
            keyword: "iran".to_string(),
            language: "en".to_string(),
            region: "US".to_string(),
            http_timeout: Duration::from_secs(30),
            dry_run: false,
        }
    }
}

impl From<Cli> for BotConfig {
    fn from(cli: Cli) -> Self {
        Self {
            keys_path: cli.keys,
            filters_path: cli.filters,
            ledger_path: cli.ledger,
            query: cli.query,
            period: cli.period,
            retention: chrono::Duration::days(i64::from(cli.days_to_keep)),
            keyword: cli.keyword,
            language: cli.language,
            region: cli.region,
            http_timeout: Duration::from_secs(cli.timeout_secs),
            dry_run: cli.dry_run,
        }
    }
}
