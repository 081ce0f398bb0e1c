//! POP3 response parser.

use crate::error::{Error, Result};
use crate::types::{ListEntry, Reply, Status, UidEntry};

/// Parses a status line (CRLF already removed).
///
/// # Errors
///
/// Returns `Error::Protocol` if the line starts with neither `+OK` nor `-ERR`.
pub fn parse_reply(line: &[u8]) -> Result<Reply> {
    let line = String::from_utf8_lossy(line);

    let (status, rest) = if let Some(rest) = strip_prefix_ignore_case(&line, "+OK") {
        (Status::Ok, rest)
    } else if let Some(rest) = strip_prefix_ignore_case(&line, "-ERR") {
        (Status::Err, rest)
    } else {
        return Err(Error::Protocol(format!("Invalid status line: {line}")));
    };

    // The indicator must stand alone
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return Err(Error::Protocol(format!("Invalid status line: {line}")));
    }

    Ok(Reply::new(status, rest.trim()))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &s[prefix.len()..])
}

/// Extracts the APOP timestamp (`<...>`, brackets kept) from a greeting.
#[must_use]
pub fn parse_timestamp(greeting: &str) -> Option<String> {
    let open = greeting.find('<')?;
    let close = open + greeting[open..].find('>')?;
    let token = &greeting[open..=close];

    // "<>" or a bracket pair spanning words is not a msg-id
    if token.len() <= 2 || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token.to_string())
}

/// Parses the text of a positive `STAT` reply: `count octets`.
///
/// # Errors
///
/// Returns `Error::Parse` if either number is missing or not numeric.
pub fn parse_stat(text: &str) -> Result<(u32, u64)> {
    let mut fields = text.split_whitespace();
    let count = parse_number(fields.next(), "STAT", text)?;
    let octets = parse_number(fields.next(), "STAT", text)?;
    Ok((count, octets))
}

/// Parses one scan listing: `id octets`.
///
/// # Errors
///
/// Returns `Error::Parse` if the fields are missing or not numeric.
pub fn parse_list_entry(text: &str) -> Result<ListEntry> {
    let mut fields = text.split_whitespace();
    let id = parse_number(fields.next(), "LIST", text)?;
    let octets = parse_number(fields.next(), "LIST", text)?;
    Ok(ListEntry { id, octets })
}

/// Parses one unique-id listing: `id uid`.
///
/// # Errors
///
/// Returns `Error::Parse` if the id is not numeric or the uid is missing.
pub fn parse_uid_entry(text: &str) -> Result<UidEntry> {
    let mut fields = text.split_whitespace();
    let id = parse_number(fields.next(), "UIDL", text)?;
    let uid = fields
        .next()
        .ok_or_else(|| Error::Parse(format!("UIDL: missing unique id in {text:?}")))?;
    Ok(UidEntry {
        id,
        uid: uid.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(field: Option<&str>, command: &str, text: &str) -> Result<T> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::Parse(format!("{command}: expected number in {text:?}")))
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
    use proptest::prelude::*;

    #[test]
    fn test_parse_positive_reply() {
        let reply = parse_reply(b"+OK 5 10").unwrap();
        assert_eq!(reply.status, Status::Ok);
        assert_eq!(reply.text, "5 10");
        assert!(reply.is_ok());
    }

    #[test]
    fn test_parse_bare_indicators() {
        assert_eq!(parse_reply(b"+OK").unwrap(), Reply::new(Status::Ok, ""));
        assert_eq!(parse_reply(b"-ERR").unwrap(), Reply::new(Status::Err, ""));
        assert_eq!(parse_reply(b"+ok fine").unwrap().text, "fine");
    }

    #[test]
    fn test_parse_negative_reply() {
        let reply = parse_reply(b"-ERR no such message").unwrap();
        assert_eq!(reply.status, Status::Err);
        assert_eq!(reply.text, "no such message");
    }

    #[test]
    fn test_parse_invalid_status() {
        assert!(matches!(parse_reply(b"* OK imap"), Err(Error::Protocol(_))));
        assert!(matches!(parse_reply(b""), Err(Error::Protocol(_))));
        assert!(matches!(parse_reply(b"+OKAY"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("POP3 server ready <1896.697170952@dbc.mtview.ca.us>").as_deref(),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );
        assert_eq!(parse_timestamp("POP3 server ready"), None);
        assert_eq!(parse_timestamp("ready <>"), None);
        assert_eq!(parse_timestamp("a < b > c"), None);
        assert_eq!(parse_timestamp("unterminated <abc"), None);
    }

    #[test]
    fn test_parse_stat() {
        assert_eq!(parse_stat("5 10").unwrap(), (5, 10));
        assert_eq!(parse_stat("2 320 extra words").unwrap(), (2, 320));
        assert!(matches!(parse_stat("5"), Err(Error::Parse(_))));
        assert!(matches!(parse_stat("five 10"), Err(Error::Parse(_))));
        assert!(matches!(parse_stat(""), Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_list_entry() {
        assert_eq!(
            parse_list_entry("9 200").unwrap(),
            ListEntry { id: 9, octets: 200 }
        );
        assert!(parse_list_entry("9").is_err());
        assert!(parse_list_entry("-1 200").is_err());
    }

    #[test]
    fn test_parse_uid_entry() {
        assert_eq!(
            parse_uid_entry("2 psycho").unwrap(),
            UidEntry {
                id: 2,
                uid: "psycho".to_string()
            }
        );
        assert!(parse_uid_entry("2").is_err());
        assert!(parse_uid_entry("x psycho").is_err());
    }

    proptest! {
        #[test]
        fn test_parse_reply_never_panics(line in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = parse_reply(&line);
        }

        #[test]
        fn test_parse_stat_accepts_any_numbers(count in any::<u32>(), octets in any::<u64>()) {
            prop_assert_eq!(parse_stat(&format!("{count} {octets}")).unwrap(), (count, octets));
        }
    }
}
