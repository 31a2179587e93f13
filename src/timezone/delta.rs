//! Conversion between the `±H[H][:M[M]]` text form of a GMT delta and a signed
//! number of seconds.

use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    #[error("'{0}' is not a GMT delta, expected [+|-]H[H][:M[M]]")]
    Pattern(String),
    #[error("minutes must be below 60, got {0}")]
    MinutesOutOfRange(u32),
}

/// Parses a delta such as `+5`, `-1:30` or `11:00` into seconds.
///
/// The empty string is the zero offset. Hours are not bounded beyond their two
/// digits; minutes must be below 60.
pub fn parse_delta(input: &str) -> Result<i64, DeltaError> {
    let text = input.trim();
    if text.is_empty() {
        return Ok(0);
    }

    let (sign, rest) = match text.as_bytes()[0] {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => (1, text),
    };
    let (hours_text, minutes_text) = match rest.split_once(':') {
        Some((hours, minutes)) => (hours, Some(minutes)),
        None => (rest, None),
    };

    let hours = parse_two_digits(hours_text).ok_or_else(|| DeltaError::Pattern(text.to_string()))?;
    let minutes = match minutes_text {
        Some(raw) => parse_two_digits(raw).ok_or_else(|| DeltaError::Pattern(text.to_string()))?,
        None => 0,
    };
    if minutes >= 60 {
        return Err(DeltaError::MinutesOutOfRange(minutes));
    }

    Ok(sign * (i64::from(hours) * 60 + i64::from(minutes)) * 60)
}

fn parse_two_digits(raw: &str) -> Option<u32> {
    if raw.is_empty() || raw.len() > 2 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Inverse of [`parse_delta`]: `0` is `""`, whole hours print as `+2`, anything
/// else as `-1:30`.
pub fn format_delta(seconds: i64) -> String {
    if seconds == 0 {
        return String::new();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let total_minutes = seconds.unsigned_abs() / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if minutes == 0 {
        format!("{sign}{hours}")
    } else {
        format!("{sign}{hours}:{minutes:02}")
    }
}

pub fn display_delta(seconds: i64) -> String {
    format!("GMT {}", format_delta(seconds))
}

pub fn adjust_time(epoch_ms: i64, delta_seconds: i64) -> i64 {
    epoch_ms.saturating_add(delta_seconds.saturating_mul(1000))
}

/// Wall-clock time at `UTC + delta`. Any parseable delta has one, including
/// those of a day or more; `None` only past chrono's representable range.
pub fn wall_clock_at(epoch_ms: i64, delta_seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(adjust_time(epoch_ms, delta_seconds))
        .map(|shifted| shifted.naive_utc())
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn parses_signed_hours_and_minutes() {
        assert_eq!(parse_delta(""), Ok(0));
        assert_eq!(parse_delta("2"), Ok(7_200));
        assert_eq!(parse_delta("+2"), Ok(7_200));
        assert_eq!(parse_delta("-1:30"), Ok(-5_400));
        assert_eq!(parse_delta("5:5"), Ok(18_300));
        assert_eq!(parse_delta("99:59"), Ok(359_940));
        assert_eq!(parse_delta(" -3 "), Ok(-10_800));
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in ["+", "-", "abc", "123", "1:", ":30", "1:234", "+-1", "1.5", "1:3:0"] {
            assert!(
                matches!(parse_delta(bad), Err(DeltaError::Pattern(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn rejects_minutes_at_or_above_sixty() {
        assert_eq!(parse_delta("3:75"), Err(DeltaError::MinutesOutOfRange(75)));
        assert_eq!(parse_delta("-0:60"), Err(DeltaError::MinutesOutOfRange(60)));
    }

    #[test]
    fn formats_canonical_text() {
        assert_eq!(format_delta(0), "");
        assert_eq!(format_delta(7_200), "+2");
        assert_eq!(format_delta(-5_400), "-1:30");
        assert_eq!(format_delta(18_300), "+5:05");
        assert_eq!(display_delta(-5_400), "GMT -1:30");
        assert_eq!(display_delta(0), "GMT ");
    }

    #[test]
    fn formatted_deltas_parse_back() {
        for hours in [0_i64, 1, 9, 14, 99] {
            for minutes in [0_i64, 1, 30, 59] {
                for sign in [1_i64, -1] {
                    let seconds = sign * (hours * 60 + minutes) * 60;
                    assert_eq!(parse_delta(&format_delta(seconds)), Ok(seconds));
                }
            }
        }
    }

    #[test]
    fn wall_clock_applies_fixed_offset() {
        // 2024-01-01T00:00:00Z
        let epoch_ms = 1_704_067_200_000;
        let tokyo = wall_clock_at(epoch_ms, 9 * 3_600).expect("in range");
        assert_eq!(tokyo.hour(), 9);
        let caracas = wall_clock_at(epoch_ms, -(4 * 3_600 + 30 * 60)).expect("in range");
        assert_eq!((caracas.hour(), caracas.minute()), (19, 30));
        assert_eq!(adjust_time(1_000, -2), -1_000);
    }

    #[test]
    fn wall_clock_covers_deltas_of_a_day_or_more() {
        // 2024-01-01T00:00:00Z
        let epoch_ms = 1_704_067_200_000;
        let ahead = parse_delta("+30").expect("parses");
        let ahead = wall_clock_at(epoch_ms, ahead).expect("shifted");
        assert_eq!(ahead.to_string(), "2024-01-02 06:00:00");
        let behind = parse_delta("-99:59").expect("parses");
        let behind = wall_clock_at(epoch_ms, behind).expect("shifted");
        assert_eq!((behind.hour(), behind.minute()), (20, 1));
        assert_eq!(behind.date().to_string(), "2023-12-27");
    }
}
