//! Utility functions for filename sanitization and display formatting

use regex::Regex;
use std::sync::LazyLock;

/// Fallback filename used when sanitization leaves nothing usable
const FALLBACK_FILENAME: &str = "download";

/// Maximum filename length in bytes (Linux NAME_MAX)
const NAME_MAX: usize = 255;

/// Characters unsafe in filenames across platforms, plus control characters
#[allow(clippy::expect_used)]
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\x00-\x1f\x7f/\\:*?"<>|]+"#).expect("unsafe-chars pattern is valid")
});

/// Sanitize a user-supplied label into a safe filename stem
///
/// Replaces characters unsafe for filenames with `_`, collapses runs of
/// replacements, trims leading/trailing dots, spaces, and underscores, and
/// caps the result at 255 bytes on a char boundary. CJK text passes through
/// unchanged. An input that sanitizes to nothing falls back to `"download"`.
///
/// # Examples
///
/// ```
/// use mediaproc::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a/b:c*d"), "a_b_c_d");
/// assert_eq!(sanitize_filename("视频标题"), "视频标题");
/// assert_eq!(sanitize_filename("///"), "download");
/// ```
pub fn sanitize_filename(label: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(label, "_");
    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.' || c == '_');

    if trimmed.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        let capped = trimmed[..take].trim_end_matches(|c| c == ' ' || c == '.' || c == '_');
        if capped.is_empty() {
            return FALLBACK_FILENAME.to_string();
        }
        return capped.to_string();
    }

    trimmed.to_string()
}

/// Format a byte count for display (e.g. "9.54 MB")
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.2} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes / KB)
    } else {
        format!("{bytes:.0} B")
    }
}

/// Format a duration in seconds as "m:ss" or "h:mm:ss"
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
