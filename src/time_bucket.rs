//! Time bucketing helpers
//!
//! Daily tasks refresh whenever the UTC hour bucket ("YYYY-MM-DD-HH") changes.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Compute the hour bucket string from a Unix timestamp in milliseconds.
///
/// Returns a string in format "YYYY-MM-DD-HH" (UTC).
///
/// # Example
/// ```
/// use idlecraft::time_bucket::hour_bucket;
/// assert_eq!(hour_bucket(1703766896000), "2023-12-28-12");
/// ```
pub fn hour_bucket(timestamp_ms: i64) -> String {
    let dt = DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
    format!(
        "{:04}-{:02}-{:02}-{:02}",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour()
    )
}

/// True when both timestamps fall into the same UTC hour.
pub fn same_hour_bucket(a_ms: i64, b_ms: i64) -> bool {
    hour_bucket(a_ms) == hour_bucket(b_ms)
}
