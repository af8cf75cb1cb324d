//! Parsing of the timestamp tokens found in raw records.
//!
//! Three shapes are accepted:
//!
//! - ISO strings: RFC 3339, or an offset-less `YYYY-MM-DD[THH:MM[:SS[.fff]]]`
//!   (also with a space separator) which is read as UTC
//! - the legacy `Date(y,m,d,h,mi,s)` token, whose month is zero-based
//! - native instants, i.e. JSON numbers holding Unix epoch milliseconds
//!
//! Anything else yields `None`; callers treat that as "no timestamp".

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::error::{ParseError, ParseResult};

/// Parse a JSON timestamp token.
///
/// ```
/// use aquamon_types::parse_timestamp;
/// use serde_json::json;
///
/// assert!(parse_timestamp(&json!("2024-01-01T00:00:00Z")).is_some());
/// assert!(parse_timestamp(&json!("Date(2024,0,1,8,30,0)")).is_some());
/// assert!(parse_timestamp(&json!(1704067200000_i64)).is_some());
/// assert!(parse_timestamp(&json!("yesterday")).is_none());
/// ```
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i128))
            .and_then(from_unix_millis),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Parse a timestamp string, returning `None` when no format matches.
#[must_use]
pub fn parse_timestamp_str(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if s.starts_with("Date(") {
        return parse_legacy_date(s);
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }

    let iso_t = format_description!(
        "[year]-[month]-[day]T[hour]:[minute][optional [:[second]]][optional [.[subsecond]]]"
    );
    let iso_space = format_description!(
        "[year]-[month]-[day] [hour]:[minute][optional [:[second]]][optional [.[subsecond]]]"
    );
    for format in [iso_t, iso_space] {
        if let Ok(dt) = PrimitiveDateTime::parse(s, format) {
            return Some(dt.assume_utc());
        }
    }

    if let Ok(date) = parse_date(s) {
        return Some(date.midnight().assume_utc());
    }

    // Millisecond epochs occasionally arrive as strings.
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i128>().ok().and_then(from_unix_millis);
    }

    None
}

/// Strict variant of [`parse_timestamp_str`] for user input.
pub fn parse_timestamp_strict(s: &str) -> ParseResult<OffsetDateTime> {
    parse_timestamp_str(s).ok_or_else(|| ParseError::InvalidTimestamp(s.to_string()))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> ParseResult<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(s.trim(), format).map_err(|_| ParseError::InvalidDate(s.to_string()))
}

fn from_unix_millis(ms: i128) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(ms.checked_mul(1_000_000)?).ok()
}

/// `Date(2024,0,15,8,30,0)` -> 2024-01-15 08:30:00 UTC.
fn parse_legacy_date(s: &str) -> Option<OffsetDateTime> {
    let inner = s.strip_prefix("Date(")?.strip_suffix(')')?;
    let parts: Vec<i64> = inner
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .ok()?;

    if parts.len() < 3 || parts.len() > 7 {
        return None;
    }

    let year = i32::try_from(parts[0]).ok()?;
    let month = Month::try_from(u8::try_from(parts[1] + 1).ok()?).ok()?;
    let day = u8::try_from(parts[2]).ok()?;
    let field = |i: usize| -> Option<u8> { u8::try_from(parts.get(i).copied().unwrap_or(0)).ok() };
    let millis = u16::try_from(parts.get(6).copied().unwrap_or(0)).ok()?;

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms_milli(field(3)?, field(4)?, field(5)?, millis).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}
