//! Helper functions for context truncation, timestamps, logging, and file
//! system checks.

use chrono::Local;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Maximum number of characters of article content sent to the model.
pub const MAX_CONTEXT_CHARS: usize = 6500;

/// Truncate article content to [`MAX_CONTEXT_CHARS`] characters.
///
/// Counts characters, not bytes, so Hangul text is never cut mid-character.
/// Content at or under the limit is returned unchanged.
pub fn truncate_context(content: &str) -> &str {
    match content.char_indices().nth(MAX_CONTEXT_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte count
/// indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

/// Timestamp for error and log records: `%Y%m%d %H:%M:%S`.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d %H:%M:%S").to_string()
}

/// Timestamp suffix for output filenames: `%Y%m%d_%H%M%S`.
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if missing, then probes it with a throwaway file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
