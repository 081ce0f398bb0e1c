//! Date header parsing (RFC 5322 section 3.3, plus the obsolete forms
//! real mail still carries).

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Parses a Date-style header value into a UTC instant.
///
/// Comments are removed first. Strict RFC 2822 is tried, then RFC 3339,
/// then a lenient parser accepting a missing weekday or seconds,
/// two-digit years and named zones.
///
/// # Errors
///
/// Returns `Error::InvalidDate` if no form matches.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    let cleaned = strip_comments(value);
    let cleaned = cleaned.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(cleaned) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return Ok(dt.with_timezone(&Utc));
    }

    parse_lenient(cleaned)
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidDate(value.to_string()))
}

fn parse_lenient(s: &str) -> Option<DateTime<FixedOffset>> {
    let mut tokens: Vec<&str> = s
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    // Weekday
    if tokens
        .first()
        .is_some_and(|t| t.chars().all(char::is_alphabetic) && month_number(t).is_none())
    {
        tokens.remove(0);
    }

    // "05-Oct-2010" style
    if let Some(first) = tokens.first().copied()
        && first.matches('-').count() == 2
    {
        let mut expanded: Vec<&str> = first.split('-').collect();
        expanded.extend_from_slice(&tokens[1..]);
        tokens = expanded;
    }

    let mut iter = tokens.into_iter();
    let (first, second) = (iter.next()?, iter.next()?);
    let (day, month) = match (first.parse::<u32>(), month_number(second)) {
        (Ok(day), Some(month)) => (day, month),
        // "Oct 5 2010"
        _ => (second.parse::<u32>().ok()?, month_number(first)?),
    };

    let year = expand_year(iter.next()?)?;
    let time = iter.next().and_then(parse_time)?;
    let offset = iter.next().map_or(Some(0), parse_zone)?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let offset = FixedOffset::east_opt(offset)?;
    offset.from_local_datetime(&date.and_time(time)).single()
}

fn expand_year(token: &str) -> Option<i32> {
    let year: i32 = token.parse().ok()?;
    Some(match token.len() {
        1 | 2 if year < 50 => 2000 + year,
        1..=3 => 1900 + year,
        _ => year,
    })
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    let mut parts = token.split(':').map(str::parse::<u32>);
    let hour = parts.next()?.ok()?;
    let minute = parts.next()?.ok()?;
    let second = match parts.next() {
        Some(second) => second.ok()?,
        None => 0,
    };
    // Leap second
    NaiveTime::from_hms_opt(hour, minute, second.min(59))
}

/// Returns the offset east of UTC in seconds.
fn parse_zone(token: &str) -> Option<i32> {
    if let Some(sign) = match token.as_bytes().first() {
        Some(b'+') => Some(1),
        Some(b'-') => Some(-1),
        _ => None,
    } {
        let digits = &token[1..];
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        return Some(sign * (hours * 3600 + minutes * 60));
    }

    let hours = match token.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        // UT, GMT, Z and unknown military or named zones
        _ => 0,
    };
    Some(hours * 3600)
}

fn month_number(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?.to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Removes parenthesized comments, honouring nesting and escapes.
pub(crate) fn strip_comments(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut depth = 0usize;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            escaped = false;
            if depth == 0 {
                result.push(c);
            }
            continue;
        }
        match c {
            '\\' if depth > 0 => escaped = true,
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => result.push(c),
            _ => {}
        }
    }

    result
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_rfc2822_with_offsets() {
        assert_eq!(
            parse_date("Tue, 05 Oct 2010 04:02:06 +0200").unwrap(),
            utc("2010-10-05T02:02:06Z")
        );
        assert_eq!(
            parse_date("Mon, 18 Oct 2010 17:09:41 -0400").unwrap(),
            utc("2010-10-18T21:09:41Z")
        );
        assert_eq!(
            parse_date("Sun, 17 Oct 2010 12:14:31 +0200").unwrap(),
            utc("2010-10-17T10:14:31Z")
        );
    }

    #[test]
    fn test_trailing_comment() {
        assert_eq!(
            parse_date("Tue, 05 Oct 2010 04:02:06 +0200 (CEST)").unwrap(),
            utc("2010-10-05T02:02:06Z")
        );
    }

    #[test]
    fn test_missing_weekday_and_seconds() {
        assert_eq!(
            parse_date("5 Oct 2010 04:02 +0000").unwrap(),
            utc("2010-10-05T04:02:00Z")
        );
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(
            parse_date("Tue, 5 Oct 10 04:02:06 GMT").unwrap(),
            utc("2010-10-05T04:02:06Z")
        );
        assert_eq!(
            parse_date("Tue, 5 Oct 99 04:02:06 GMT").unwrap(),
            utc("1999-10-05T04:02:06Z")
        );
    }

    #[test]
    fn test_named_zones() {
        assert_eq!(
            parse_date("Tue, 5 Oct 2010 04:02:06 EST").unwrap(),
            utc("2010-10-05T09:02:06Z")
        );
        assert_eq!(
            parse_date("Tue, 5 Oct 2010 04:02:06 PDT").unwrap(),
            utc("2010-10-05T11:02:06Z")
        );
        assert_eq!(
            parse_date("Tue, 5 Oct 2010 04:02:06 XYZ").unwrap(),
            utc("2010-10-05T04:02:06Z")
        );
    }

    #[test]
    fn test_dashed_and_us_order() {
        assert_eq!(
            parse_date("05-Oct-2010 04:02:06 +0000").unwrap(),
            utc("2010-10-05T04:02:06Z")
        );
        assert_eq!(
            parse_date("Tuesday, October 5 2010 04:02:06 +0000").unwrap(),
            utc("2010-10-05T04:02:06Z")
        );
    }

    #[test]
    fn test_missing_zone_is_utc() {
        assert_eq!(
            parse_date("5 Oct 2010 04:02:06").unwrap(),
            utc("2010-10-05T04:02:06Z")
        );
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(
            parse_date("2010-10-05T04:02:06+02:00").unwrap(),
            utc("2010-10-05T02:02:06Z")
        );
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(
            parse_date("not a date"),
            Err(Error::InvalidDate("not a date".to_string()))
        );
        assert!(parse_date("").is_err());
        assert!(parse_date("31 Feb 2010 04:02:06 +0000").is_err());
        assert!(parse_date("5 Oct 2010 25:02:06 +0000").is_err());
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("a (b (c) d) e"), "a  e");
        assert_eq!(strip_comments(r"a (b \) c) d"), "a  d");
        assert_eq!(strip_comments("plain"), "plain");
    }
}
