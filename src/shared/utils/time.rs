use chrono::{DateTime, SecondsFormat, Utc};

/// RFC 3339 UTC timestamp with millisecond precision, as stored in the
/// database.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_sortable_utc() {
        let at = Utc.with_ymd_and_hms(2026, 1, 14, 9, 5, 3).unwrap();
        assert_eq!(format_timestamp(at), "2026-01-14T09:05:03.000Z");
    }

    #[test]
    fn test_parse_round_trip() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
