//! UTC date/time helpers
//!
//! Timemap attributes carry instants in whatever format the archive felt like
//! emitting: RFC 1123 is the norm, but RFC 850, asctime, ISO 8601 and compact
//! archive timestamps all show up. [`parse_instant`] accepts all of them and
//! always answers in UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const R_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const RFC822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
pub const YYYYMMDDHHMMSS_FORMAT: &str = "%Y%m%d%H%M%S";
pub const FILESYS_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Formats carrying a numeric offset, tried after the weekday is stripped.
const OFFSET_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d-%b-%Y %H:%M:%S %z",
    "%d %b %y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
];

/// Zone-less formats; two-digit years come first so `%Y` cannot claim them.
const NAIVE_FORMATS: &[&str] = &[
    "%d-%b-%y %H:%M:%S",
    "%d %b %y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y%m%d%H%M%S",
    "%Y%m%d%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%b %d %Y", "%Y%m%d"];

/// Named zones seen in HTTP-era dates, as offsets east of UTC in hours.
const ZONE_NAMES: &[(&str, i32)] = &[
    ("GMT", 0),
    ("UTC", 0),
    ("UT", 0),
    ("Z", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
];

/// Current instant in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// UTC instant from calendar parts; `None` for an impossible date or time.
pub fn from_parts(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

/// UTC instant from seconds since the Unix epoch.
pub fn from_timestamp(timestamp: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
}

/// Seconds since the Unix epoch.
pub fn to_timestamp(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Parse a date/time literal in any supported format, converting to UTC.
///
/// Literals without zone information are taken to be UTC. A leading weekday
/// is ignored rather than checked against the date.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let text = strip_weekday(text);
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let (body, offset) = split_zone_name(text);
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(body, fmt) {
            return localize(naive, offset);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(body, fmt) {
            return localize(date.and_hms_opt(0, 0, 0)?, offset);
        }
    }
    None
}

/// Parse a compact `YYYYMMDDHHMMSS` archive timestamp.
pub fn parse_yyyymmddhhmmss(text: &str) -> Option<DateTime<Utc>> {
    if text.len() != 14 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(text, YYYYMMDDHHMMSS_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `YYYY-MM-DD HH:MM:SS`, or `N/A` when absent.
pub fn r(dt: Option<&DateTime<Utc>>) -> String {
    dt.map_or_else(|| "N/A".to_string(), |dt| dt.format(R_FORMAT).to_string())
}

/// `Tue, 24 Jan 2012 15:30:45 GMT`
pub fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format(RFC822_FORMAT).to_string()
}

/// `20120124153045`, zero-padding years before 1000.
pub fn yyyymmddhhmmss(dt: &DateTime<Utc>) -> String {
    dt.format(YYYYMMDDHHMMSS_FORMAT).to_string()
}

/// `20120124-153045`, a filesystem-friendly stamp.
pub fn filesys(dt: &DateTime<Utc>) -> String {
    dt.format(FILESYS_FORMAT).to_string()
}

// ── Helpers ────────────────────────────────────────────────

fn strip_weekday(text: &str) -> &str {
    match text.split_once(',') {
        Some((head, rest)) if !head.is_empty() && head.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => text,
    }
}

fn split_zone_name(text: &str) -> (&str, Option<FixedOffset>) {
    if let Some((body, zone)) = text.rsplit_once(' ') {
        let zone = zone.to_ascii_uppercase();
        if let Some((_, hours)) = ZONE_NAMES.iter().find(|(name, _)| *name == zone) {
            return (body.trim_end(), FixedOffset::east_opt(hours * 3600));
        }
    }
    if let Some(body) = text.strip_suffix('Z') {
        return (body, FixedOffset::east_opt(0));
    }
    (text, None)
}

fn localize(naive: NaiveDateTime, offset: Option<FixedOffset>) -> Option<DateTime<Utc>> {
    match offset {
        Some(offset) => offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        None => Some(Utc.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        from_parts(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_rfc1123_gmt() {
        assert_eq!(
            parse_instant("Tue, 24 Jan 2012 12:12:12 GMT"),
            Some(utc(2012, 1, 24, 12, 12, 12))
        );
    }

    #[test]
    fn test_parse_ignores_wrong_weekday() {
        // 1 Jan 2010 was a Friday
        assert_eq!(
            parse_instant("Mon, 01 Jan 2010 00:00:00 GMT"),
            Some(utc(2010, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_parse_utc_zone_name() {
        assert_eq!(
            parse_instant("Tue, 24 Jan 2012 12:12:12 UTC"),
            Some(utc(2012, 1, 24, 12, 12, 12))
        );
    }

    #[test]
    fn test_parse_rfc850() {
        assert_eq!(
            parse_instant("Tuesday, 24-Jan-2012 12:12:12 GMT"),
            Some(utc(2012, 1, 24, 12, 12, 12))
        );
        assert_eq!(
            parse_instant("Tuesday, 24-Jan-12 12:12:12 GMT"),
            Some(utc(2012, 1, 24, 12, 12, 12))
        );
    }

    #[test]
    fn test_parse_numeric_offset_converts_to_utc() {
        assert_eq!(
            parse_instant("Tue, 24 Jan 2012 12:12:12 -0400"),
            Some(utc(2012, 1, 24, 16, 12, 12))
        );
    }

    #[test]
    fn test_parse_named_us_zone() {
        assert_eq!(
            parse_instant("Tue, 24 Jan 2012 12:12:12 EST"),
            Some(utc(2012, 1, 24, 17, 12, 12))
        );
    }

    #[test]
    fn test_parse_zone_less_is_utc() {
        assert_eq!(
            parse_instant("Tue, 24 Jan 2012 12:12:12"),
            Some(utc(2012, 1, 24, 12, 12, 12))
        );
    }

    #[test]
    fn test_parse_iso_and_compact() {
        assert_eq!(
            parse_instant("2012-01-24T15:30:45+02:00"),
            Some(utc(2012, 1, 24, 13, 30, 45))
        );
        assert_eq!(
            parse_instant("2012-01-24 15:30:45"),
            Some(utc(2012, 1, 24, 15, 30, 45))
        );
        assert_eq!(parse_instant("20120124153045"), Some(utc(2012, 1, 24, 15, 30, 45)));
        assert_eq!(parse_instant("2012-01-24"), Some(utc(2012, 1, 24, 0, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_instant(""), None);
        assert_eq!(parse_instant("not a date"), None);
        assert_eq!(parse_instant("Jan 2012 12:12:12"), None);
    }

    #[test]
    fn test_parse_yyyymmddhhmmss() {
        assert_eq!(
            parse_yyyymmddhhmmss("20120124153045"),
            Some(utc(2012, 1, 24, 15, 30, 45))
        );
        assert_eq!(parse_yyyymmddhhmmss("20121324153045"), None);
        assert_eq!(parse_yyyymmddhhmmss("2012012415304"), None);
    }

    #[test]
    fn test_formatters() {
        let dt = utc(2012, 1, 24, 15, 30, 45);
        assert_eq!(rfc822(&dt), "Tue, 24 Jan 2012 15:30:45 GMT");
        assert_eq!(yyyymmddhhmmss(&dt), "20120124153045");
        assert_eq!(filesys(&dt), "20120124-153045");
        assert_eq!(r(Some(&dt)), "2012-01-24 15:30:45");
        assert_eq!(r(None), "N/A");
    }

    #[test]
    fn test_timestamp_round_trip() {
        let dt = utc(2012, 1, 24, 15, 30, 45);
        assert_eq!(from_timestamp(to_timestamp(&dt)), Some(dt));
    }
}
