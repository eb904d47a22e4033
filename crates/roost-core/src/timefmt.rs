//! Timestamp parsing and formatting helpers.
//!
//! Records carry creation timestamps in the source's own string format
//! (`Wed Oct 10 20:19:24 +0000 2018`). Everything downstream works in epoch
//! milliseconds or RFC 3339; bucket keys are UTC calendar dates.

use chrono::{DateTime, Utc};

/// The timestamp format captured records arrive with.
pub const SOURCE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a source-format timestamp. Unparseable input degrades to the Unix
/// epoch; this is defined behavior, not a failure.
pub fn parse_source(raw: &str) -> DateTime<Utc> {
  DateTime::parse_from_str(raw, SOURCE_FORMAT)
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or(DateTime::UNIX_EPOCH)
}

/// The UTC calendar date (`YYYY-MM-DD`) used to partition exported
/// documents into bucket files.
pub fn bucket_key(dt: DateTime<Utc>) -> String {
  dt.format("%Y-%m-%d").to_string()
}

/// Current wall clock in epoch milliseconds.
pub fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}
