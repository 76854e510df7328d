//! Leading-timestamp extraction for Copilot CLI log lines.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Log lines start with a strict ISO-8601 timestamp with millisecond
/// precision and a Z suffix, e.g. `2026-02-01T12:00:00.123Z`.
static RE_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z)").unwrap());

/// Extract the timestamp at the start of a log line.
///
/// Lines that do not open with the timestamp pattern, or whose match fails to
/// parse, yield `None` — an unparseable timestamp never aborts a file scan.
pub fn leading_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let caps = RE_TIMESTAMP.captures(line)?;
    DateTime::parse_from_rfc3339(&caps[1])
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether a line opens with the log timestamp pattern, parseable or not.
/// Used for the JSON block boundary rule, which keys off the pattern alone.
pub fn has_timestamp_prefix(line: &str) -> bool {
    RE_TIMESTAMP.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_leading_timestamp() {
        let ts = leading_timestamp("2026-02-01T12:34:56.789Z [info] Using model: gpt-5.2");
        let ts = ts.expect("should parse");
        assert_eq!(ts.hour(), 12);
        assert_eq!(ts.minute(), 34);
    }

    #[test]
    fn test_not_at_line_start() {
        assert!(leading_timestamp("  2026-02-01T12:34:56.789Z indented").is_none());
    }

    #[test]
    fn test_no_millis_rejected() {
        assert!(leading_timestamp("2026-02-01T12:34:56Z no millis").is_none());
    }

    #[test]
    fn test_plain_text() {
        assert!(leading_timestamp("just a continuation line").is_none());
        assert!(!has_timestamp_prefix("just a continuation line"));
    }
}
