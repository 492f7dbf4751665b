//! Provider date/time strings. Absent or unparseable input is `None`, never "now".

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%MZ",       // ESPN: 2024-01-15T19:00Z
    "%Y-%m-%dT%H:%M:%S%.f",  // sportsdata: 2024-01-15T19:00:00
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc()))
}

/// Calendar date from either a bare date or a timestamp
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
