//! Timestamp normalization.
//!
//! All stored instants are UTC. Platform APIs return RFC 3339 strings
//! (`Z` suffixed, GitLab with milliseconds); git commits carry their own
//! offset, which is kept alongside a naive-UTC copy used for comparisons.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};

/// Parse a platform API timestamp into an aware UTC instant.
///
/// Accepts `2021-08-31T09:00:00.000Z`, `2021-08-31T09:00:00Z` and
/// explicit offsets. Returns `None` for missing or unparseable input.
pub fn parse_api_timestamp(ts: Option<&str>) -> Option<DateTime<Utc>> {
    let ts = ts?.trim();
    if ts.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Drop the offset after converting to UTC.
pub fn to_naive_utc(dt: &DateTime<FixedOffset>) -> NaiveDateTime {
    dt.with_timezone(&Utc).naive_utc()
}

/// Build an aware timestamp from git's `(seconds, offset minutes)` pair.
pub fn git_time_to_datetime(seconds: i64, offset_minutes: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .or_else(|| FixedOffset::east_opt(0))?;
    offset.timestamp_opt(seconds, 0).single()
}

/// Current wall-clock time as naive UTC, second precision.
pub fn now_naive_utc() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
