//! Datetime curation for memento timestamps
//!
//! Archives frequently truncate a Link `datetime` attribute to midnight while
//! the real capture time survives in the memento's storage path
//! (`.../web/20120124153045/http://example.com/`). [`curate`] restores the
//! time of day from the path when both agree on the calendar date.

use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use regex::Regex;

use crate::utc;

fn uri_datetime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/([12][90][0-9]{2}[01][0-9][0-3][0-9][0-2][0-9][0-5][0-9][0-5][0-9])/")
            .expect("URI datetime pattern is valid")
    })
}

/// The `YYYYMMDDHHMMSS` instant embedded in an archival URI path, if any.
pub fn uri_datetime(uri: &str) -> Option<DateTime<Utc>> {
    let caps = uri_datetime_re().captures(uri)?;
    utc::parse_yyyymmddhhmmss(caps.get(1)?.as_str())
}

/// Normalize `instant` to UTC and repair a midnight time from `uri`.
///
/// The instant is returned unchanged (in UTC) when there is no URI, when its
/// time of day is not exactly 00:00:00, when the URI carries no timestamp, or
/// when the URI timestamp falls on a different day.
pub fn curate<Tz: TimeZone>(instant: DateTime<Tz>, uri: Option<&str>) -> DateTime<Utc> {
    let dt = instant.with_timezone(&Utc);
    let Some(uri) = uri else {
        return dt;
    };
    if dt.hour() != 0 || dt.minute() != 0 || dt.second() != 0 {
        return dt;
    }
    let Some(from_uri) = uri_datetime(uri) else {
        return dt;
    };
    if from_uri.date_naive() != dt.date_naive() {
        return dt;
    }

    let curated = dt
        .with_hour(from_uri.hour())
        .and_then(|d| d.with_minute(from_uri.minute()))
        .and_then(|d| d.with_second(from_uri.second()))
        .unwrap_or(dt);
    tracing::debug!(
        original = %dt,
        curated = %curated,
        uri,
        "restored memento time of day from URI"
    );
    curated
}
