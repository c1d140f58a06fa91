//! Command-line interface definitions for newsbot.
//!
//! A run takes no positional arguments. Flags only point at configuration
//! files and tune the search; the three paths can also come from the
//! environment.

use clap::Parser;
use std::path::PathBuf;

/// Fetch recent news on a topic, update the ledger, and tweet the newest
/// story that has not been tweeted yet.
///
/// # Examples
///
/// ```sh
/// # Defaults: keys/twitterkeys.yaml, news_filter.yaml, news_data.csv
/// newsbot
///
/// # Explicit paths, compose the tweet without posting it
/// newsbot --keys ~/keys/twitterkeys.yaml --ledger /tmp/news_log.csv --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML file holding the posting credentials
    #[arg(short, long, env = "NEWSBOT_KEYS", default_value = "keys/twitterkeys.yaml")]
    pub keys: PathBuf,

    /// YAML file listing blocked sources and extensions
    #[arg(short, long, env = "NEWSBOT_FILTERS", default_value = "news_filter.yaml")]
    pub filters: PathBuf,

    /// CSV ledger of every story seen so far
    #[arg(short, long, env = "NEWSBOT_LEDGER", default_value = "news_data.csv")]
    pub ledger: PathBuf,

    /// Search phrase
    #[arg(short, long, default_value = "Iran Revolution")]
    pub query: String,

    /// Recency window for the search, e.g. 4h, 1d, 7d
    #[arg(long, default_value = "4h", value_parser = parse_period)]
    pub period: String,

    /// Days a story stays in the ledger
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub days_to_keep: u32,

    /// Headlines must mention this word to be tweeted
    #[arg(long, default_value = "iran")]
    pub keyword: String,

    /// Search language
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Search region
    #[arg(long, default_value = "US")]
    pub region: String,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Compose and log the tweet without posting it
    #[arg(long)]
    pub dry_run: bool,
}

/// Accept `<n><unit>` with unit `h`, `d`, `w`, `m` or `y`.
fn parse_period(s: &str) -> Result<String, String> {
    let s = s.trim();
    let invalid = || format!("invalid period {s:?}: expected a number followed by h, d, w, m or y");
    let (split, _) = s.char_indices().last().ok_or_else(invalid)?;
    let (amount, unit) = s.split_at(split);

    let valid_unit = matches!(unit, "h" | "d" | "w" | "m" | "y");
    let valid_amount = amount.chars().all(|c| c.is_ascii_digit())
        && amount.parse::<u32>().is_ok_and(|n| n > 0);
    if valid_unit && valid_amount {
        Ok(s.to_string())
    } else {
        Err(invalid())
    }
}
