//! Conversions from raw element text to typed field values.
//!
//! Every conversion reports failure as a [`Violation`] naming the field, so
//! the assembler can surface the first one verbatim.

use crate::error::{Violation, ViolationReason};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// `true` when `value` is absent or whitespace only.
#[must_use]
pub fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Trimmed, non-blank text or `None`.
#[must_use]
pub fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| match v.trim() {
            trimmed if trimmed.len() == v.len() => v,
            trimmed => trimmed.to_string(),
        })
        .filter(|v| !v.is_empty())
}

/// Text exactly as written, or `None` when the element carried none.
///
/// Whitespace-only text is kept.
#[must_use]
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Required non-blank text.
///
/// # Errors
///
/// [`ViolationReason::Blank`] when absent or whitespace only.
pub fn required(value: Option<String>, subject: &str) -> Result<String, Violation> {
    present(value).ok_or_else(|| Violation::blank(subject))
}

/// An integer `>= 0`, surrounding whitespace ignored.
///
/// # Errors
///
/// [`ViolationReason::NotANumber`], [`ViolationReason::NotAnInteger`] or
/// [`ViolationReason::Negative`].
pub fn non_negative_integer(value: &str, subject: &str) -> Result<i64, Violation> {
    let trimmed = value.trim();
    let parsed = match trimmed.parse::<i64>() {
        Ok(parsed) => parsed,
        Err(_) if trimmed.parse::<f64>().is_ok() => {
            return Err(Violation::new(subject, ViolationReason::NotAnInteger));
        }
        Err(_) => return Err(Violation::new(subject, ViolationReason::NotANumber)),
    };
    if parsed < 0 {
        return Err(Violation::new(subject, ViolationReason::Negative));
    }
    Ok(parsed)
}

/// Any finite floating point number.
///
/// # Errors
///
/// [`ViolationReason::NotANumber`].
pub fn float(value: &str, subject: &str) -> Result<f64, Violation> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| Violation::new(subject, ViolationReason::NotANumber))
}

/// A finite floating point number `>= 0`.
///
/// # Errors
///
/// [`ViolationReason::NotANumber`] or [`ViolationReason::Negative`].
pub fn non_negative_float(value: &str, subject: &str) -> Result<f64, Violation> {
    let parsed = float(value, subject)?;
    if parsed < 0.0 {
        return Err(Violation::new(subject, ViolationReason::Negative));
    }
    Ok(parsed)
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// An RFC 3339 timestamp, or a naive date-time read as UTC.
///
/// Naive forms are `YYYY-MM-DDTHH:MM:SS[.f]`, the same with a space in place
/// of the `T`, and a bare `YYYY-MM-DD` taken as midnight. Anything else is
/// rejected rather than stored as absent.
///
/// # Errors
///
/// [`ViolationReason::InvalidTimestamp`].
pub fn timestamp(value: &str, subject: &str) -> Result<DateTime<Utc>, Violation> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Violation::new(subject, ViolationReason::InvalidTimestamp))
}

/// A flag, case-insensitive.
///
/// Accepts `true`/`false`, `t`/`f`, `1`/`0`, `yes`/`no`, `y`/`n` and
/// `on`/`off`. Other text fails instead of reading as `false`.
///
/// # Errors
///
/// [`ViolationReason::InvalidBoolean`].
pub fn boolean(value: &str, subject: &str) -> Result<bool, Violation> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(Violation::new(subject, ViolationReason::InvalidBoolean)),
    }
}

/// First character upper-case, the rest lower-case.
#[must_use]
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_means_absent_or_whitespace() {
        assert!(is_blank(None));
        assert!(is_blank(Some("  \n")));
        assert!(!is_blank(Some(" x ")));
        assert_eq!(present(Some(" x \n".to_string())), Some("x".to_string()));
        assert_eq!(present(Some("\t".to_string())), None);
    }

    #[test]
    fn non_empty_keeps_whitespace() {
        assert_eq!(non_empty(Some(" ".to_string())), Some(" ".to_string()));
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn integers_must_be_whole_and_non_negative() {
        assert_eq!(non_negative_integer(" 1024\n", "Network value"), Ok(1024));
        assert_eq!(
            non_negative_integer("-1", "Network value").map_err(|v| v.reason),
            Err(ViolationReason::Negative)
        );
        assert_eq!(
            non_negative_integer("1.5", "Network value").map_err(|v| v.reason),
            Err(ViolationReason::NotAnInteger)
        );
        assert_eq!(
            non_negative_integer("lots", "Network value").map_err(|v| v.reason),
            Err(ViolationReason::NotANumber)
        );
    }

    #[test]
    fn floats_reject_non_finite_values() {
        assert_eq!(float("1.023", "Charge"), Ok(1.023));
        assert!(float("NaN", "Charge").is_err());
        assert!(float("abc", "Charge").is_err());
    }

    #[test]
    fn consumption_rate_has_no_upper_bound() {
        assert_eq!(non_negative_float("2.5", "Processors consumption rate"), Ok(2.5));
        assert!(non_negative_float("-0.1", "Processors consumption rate").is_err());
    }

    #[test]
    fn timestamps_accept_rfc3339_and_naive_forms() {
        let zoned = timestamp("2008-01-01T10:01:01Z", "Start time");
        let naive = timestamp("2008-01-01T10:01:01", "Start time");
        assert!(zoned.is_ok());
        assert_eq!(zoned, naive);
        assert!(timestamp("yesterday", "Start time").is_err());
    }

    #[test]
    fn timestamps_accept_space_separated_and_date_only_forms() {
        let expected = timestamp("2008-01-01T00:00:00Z", "Create time");
        assert!(expected.is_ok());
        assert_eq!(timestamp("2008-01-01 00:00:00", "Create time"), expected);
        assert_eq!(timestamp("2008-01-01", "Create time"), expected);
        assert_eq!(
            timestamp("01/01/2008", "Create time").map_err(|v| v.reason),
            Err(ViolationReason::InvalidTimestamp)
        );
    }

    #[test]
    fn booleans() {
        assert_eq!(boolean("true", "Primary host"), Ok(true));
        assert_eq!(boolean(" FALSE ", "Primary host"), Ok(false));
        assert_eq!(boolean("Yes", "Primary host"), Ok(true));
        assert_eq!(boolean("off", "Primary host"), Ok(false));
        assert_eq!(boolean("n", "Primary host"), Ok(false));
        assert!(boolean("maybe", "Primary host").is_err());
        assert!(boolean("", "Primary host").is_err());
    }

    #[test]
    fn capitalizes_status_text() {
        assert_eq!(capitalize("completed"), "Completed");
        assert_eq!(capitalize("ABORTED"), "Aborted");
        assert_eq!(capitalize(""), "");
    }
}
