use std::time::{Duration, SystemTime};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub mod config;
pub mod persistence;
pub mod version;

/// Current UTC time as an ISO-8601 string.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

pub fn parse_rfc3339(raw: &str) -> Option<SystemTime> {
    let dt = OffsetDateTime::parse(raw, &Rfc3339).ok()?;
    if dt.unix_timestamp() < 0 {
        return None;
    }
    SystemTime::UNIX_EPOCH
        .checked_add(Duration::from_secs(dt.unix_timestamp() as u64))
        .and_then(|time| time.checked_add(Duration::from_nanos(dt.nanosecond() as u64)))
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Human-readable age string.
pub fn age_string(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
