use chrono::{SecondsFormat, TimeZone, Utc};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Renders a Unix-ms timestamp as RFC3339 with millisecond precision.
pub fn format_unix_ms_rfc3339(unix_ms: u64) -> String {
    let timestamp = i64::try_from(unix_ms).unwrap_or(i64::MAX);
    match Utc.timestamp_millis_opt(timestamp).single() {
        Some(value) => value.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => Utc
            .timestamp_millis_opt(0)
            .single()
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

#[cfg(test)]
mod tests {
    use super::format_unix_ms_rfc3339;

    #[test]
    fn unit_format_unix_ms_rfc3339_renders_known_instant() {
        assert_eq!(
            format_unix_ms_rfc3339(1_700_000_000_123),
            "2023-11-14T22:13:20.123Z"
        );
    }

    #[test]
    fn regression_format_unix_ms_rfc3339_is_always_utc() {
        assert!(format_unix_ms_rfc3339(0).ends_with('Z'));
        assert_eq!(format_unix_ms_rfc3339(0), "1970-01-01T00:00:00.000Z");
    }
}
