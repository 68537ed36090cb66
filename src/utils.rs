//! Small formatting helpers shared by the relay components.

use chrono::{DateTime, Utc};

/// Timestamp layout used in notices.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS` in UTC.
///
/// # Examples
///
/// ```
/// use chat_audit_relay::utils::format_timestamp;
/// use chrono::DateTime;
///
/// let ts = DateTime::from_timestamp(1_600_000_000, 0).expect("valid timestamp");
/// assert_eq!(format_timestamp(ts), "2020-09-13 12:26:40");
/// ```
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use chat_audit_relay::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}
