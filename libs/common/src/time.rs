//! Wire timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC instant as an ISO-8601 / RFC 3339 string with millisecond
/// precision, e.g. `2025-07-03T22:30:00.000Z`.
pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time as an ISO-8601 string.
pub fn iso_now() -> String {
    iso8601(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_millis_and_zulu() {
        let at = Utc.with_ymd_and_hms(2025, 7, 3, 22, 30, 0).unwrap();
        assert_eq!(iso8601(at), "2025-07-03T22:30:00.000Z");
    }

    #[test]
    fn iso_now_parses_back() {
        let s = iso_now();
        assert!(DateTime::parse_from_rfc3339(&s).is_ok());
    }
}
