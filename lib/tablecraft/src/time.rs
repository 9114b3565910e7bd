use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, SubsecRound, Utc};

// Canonical text forms for temporal values.
//
// Timestamps are kept at microsecond precision, the finest resolution all
// supported engines store natively.

/// Truncate a timestamp to microsecond precision.
pub fn truncate_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

/// RFC 3339 with exactly six fractional digits and a `Z` suffix.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written as RFC 3339, or as the `YYYY-MM-DD HH:MM:SS[.f]`
/// form embedded engines produce for `CURRENT_TIMESTAMP` (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// `HH:MM:SS`, followed by the fractional part only when it is non-zero.
pub fn format_time(t: &NaiveTime) -> String {
    t.format("%H:%M:%S%.f").to_string()
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_text_round_trip() {
        let dt = parse_timestamp("2024-03-01T12:30:45.123456Z").unwrap();
        assert_eq!(format_timestamp(&dt), "2024-03-01T12:30:45.123456Z");
    }

    #[test]
    fn test_parse_embedded_engine_timestamp() {
        let dt = parse_timestamp("2024-03-01 12:30:45").unwrap();
        assert_eq!(format_timestamp(&dt), "2024-03-01T12:30:45.000000Z");
    }

    #[test]
    fn test_offset_is_normalized_to_utc() {
        let dt = parse_timestamp("2024-03-01T14:30:45+02:00").unwrap();
        assert_eq!(format_timestamp(&dt), "2024-03-01T12:30:45.000000Z");
    }

    #[test]
    fn test_truncate_micros() {
        let dt = parse_timestamp("2024-03-01T12:30:45.123456789Z").unwrap();
        assert_eq!(
            format_timestamp(&truncate_micros(dt)),
            "2024-03-01T12:30:45.123456Z"
        );
    }

    #[test]
    fn test_time_formats() {
        let t = parse_time("12:00").unwrap();
        assert_eq!(format_time(&t), "12:00:00");
        let t = parse_time("08:15:30.25").unwrap();
        assert_eq!(format_time(&t), "08:15:30.250");
        assert!(parse_time("25:00").is_none());
    }

    #[test]
    fn test_date_round_trip() {
        let d = parse_date("2021-01-01").unwrap();
        assert_eq!(format_date(&d), "2021-01-01");
        assert!(parse_date("2021-13-01").is_none());
    }
}
