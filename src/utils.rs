//! Utility functions for tweet composition, log formatting and file system
//! checks.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Maximum weighted length of a tweet.
pub const TWEET_MAX_CHARS: usize = 280;

/// Every link counts as this many characters once wrapped by t.co.
pub const TCO_URL_LENGTH: usize = 23;

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` characters are cut and get `"…(+N bytes)"`
/// appended, `N` being the number of bytes dropped.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Hashtag naming the publisher, e.g. `"reuters"` becomes `"#REUTERS"`.
///
/// Characters that would end a hashtag early are dropped. Returns an empty
/// string when nothing usable is left.
pub fn hashtag_for(source: &str) -> String {
    let tag: String = source
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_uppercase)
        .collect();
    if tag.is_empty() {
        tag
    } else {
        format!("#{tag}")
    }
}

/// Assemble `title`, `hashtag` and `url` into one tweet.
///
/// The title is shortened (ending in `…`) so the tweet fits
/// [`TWEET_MAX_CHARS`]; the hashtag and URL are always kept whole.
pub fn compose_tweet_text(title: &str, hashtag: &str, url: &str) -> String {
    let mut suffix = String::new();
    let mut suffix_len = 0;
    if !hashtag.is_empty() {
        suffix.push('\n');
        suffix.push_str(hashtag);
        suffix_len += 1 + hashtag.chars().count();
    }
    suffix.push('\n');
    suffix.push_str(url);
    suffix_len += 1 + TCO_URL_LENGTH;

    let budget = TWEET_MAX_CHARS.saturating_sub(suffix_len);
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = if title.chars().count() <= budget {
        title
    } else if budget == 0 {
        String::new()
    } else {
        let kept: String = title.chars().take(budget - 1).collect();
        format!("{}…", kept.trim_end())
    };

    format!("{title}{suffix}")
}

/// Directory holding `file`; a bare file name lives in `.`.
pub fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join(".__newsbot_probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Ledger directory is writable");
    Ok(())
}
