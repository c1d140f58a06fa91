//! # newsbot
//!
//! A scheduled news bot: each run searches Google News for recent stories on
//! a topic, records them in a CSV ledger, and tweets the newest story that
//! has not been tweeted yet.
//!
//! ## Features
//!
//! - Resolves aggregator links to the publisher's own URL
//! - Blocks sources and domain extensions listed in a YAML blacklist
//! - Skips headlines that do not mention the topic keyword
//! - Keeps a rolling window of stories so nothing is tweeted twice
//!
//! ## Usage
//!
//! ```sh
//! newsbot --keys keys/twitterkeys.yaml --filters news_filter.yaml --ledger news_data.csv
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetch**: search, resolve and classify a batch ([`scrapers`], [`filters`])
//! 2. **Merge**: fold the batch into the ledger and commit it ([`ledger`])
//! 3. **Select**: pick the newest eligible story ([`ledger::select_next`])
//! 4. **Post**: tweet it, then commit the mark ([`pipeline`], [`twitter`])

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod filters;
mod ledger;
mod models;
mod pipeline;
mod scrapers;
mod twitter;
mod utils;

#[cfg(test)]
mod test_support;

use cli::Cli;
use config::BotConfig;
use pipeline::RunOutcome;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "newsbot starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");
    let config = BotConfig::from(args);

    let outcome = match pipeline::run(&config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Run failed");
            return Err(e.into());
        }
    };

    match &outcome {
        RunOutcome::Posted { url, tweet_id, .. } => info!(%url, %tweet_id, "Posted story"),
        RunOutcome::AlreadyPosted { url } => info!(%url, "Story was already posted"),
        RunOutcome::DryRun { url, text } => info!(%url, %text, "Dry run complete"),
        RunOutcome::NothingToPost => info!("Nothing new to post"),
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
