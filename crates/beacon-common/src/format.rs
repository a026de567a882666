//! Human-readable formatting shared by notification text.

use chrono::{DateTime, NaiveDate, Utc};

/// Formats an integer with `,` thousands separators (`1234567` -> `1,234,567`).
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a timestamp as `2024-03-01 08:15:00Z`.
pub fn format_utc(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%SZ").to_string()
}

/// Date stamp used in dedup keys (`2024-03-01`).
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Hour stamp used in dedup keys (`2024-03-01-08`).
pub fn hour_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d-%H").to_string()
}

/// Maximum length of a remote response body kept in error messages.
pub const MAX_BODY_LENGTH: usize = 1000;

/// Truncate a string to at most `max_len` bytes, respecting char boundaries.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_count_groups_thousands() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_count(-45000), "-45,000");
    }

    #[test]
    fn stamps_use_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 5, 9).unwrap();
        assert_eq!(format_utc(ts), "2024-03-01 08:05:09Z");
        assert_eq!(date_stamp(ts.date_naive()), "2024-03-01");
        assert_eq!(hour_stamp(ts), "2024-03-01-08");
    }

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(truncate_string("ok", 10), "ok");
    }

    #[test]
    fn long_strings_are_cut_on_char_boundary() {
        assert_eq!(truncate_string("abcdef", 3), "abc... [truncated]");
        assert_eq!(truncate_string("σσσ", 3), "σ... [truncated]");
    }
}
