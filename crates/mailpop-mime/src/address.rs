//! Email address parsing for From/To/Cc-style header fields.

use crate::content_type::unquote;
use crate::encoding::decode_encoded_words;
use std::fmt;

/// A mailbox with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmailAddress {
    /// Mailbox specification, e.g. `user@example.com`.
    pub address: String,
    /// Decoded display name; empty when none was given.
    pub display_name: String,
}

impl EmailAddress {
    /// Creates an address with a display name.
    #[must_use]
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }

    /// Parses a single address entry.
    ///
    /// Accepts `display name <addr>`, `<addr>`, `addr` and the obsolete
    /// `addr (display name)`. Returns `None` when no mailbox can be found.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }

        if let Some(open) = find_unquoted(entry, '<') {
            let close = entry[open..].find('>').map(|i| open + i)?;
            let address = entry[open + 1..close].trim();
            if address.is_empty() {
                return None;
            }

            let name = entry[..open].trim();
            return Some(Self::new(address, decode_display_name(name)));
        }

        // Bare address, possibly followed by a comment holding the name.
        let (address, comment) = match (entry.find('('), entry.rfind(')')) {
            (Some(open), Some(close)) if open < close => (
                format!("{}{}", &entry[..open], &entry[close + 1..]),
                &entry[open + 1..close],
            ),
            _ => (entry.to_string(), ""),
        };
        let address = address.trim();
        if address.is_empty() || address.contains(char::is_whitespace) {
            return None;
        }

        Some(Self::new(unquote(address), decode_display_name(comment)))
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            return write!(f, "<{}>", self.address);
        }

        let name = &self.display_name;
        if name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "\"{escaped}\" <{}>", self.address)
        } else {
            write!(f, "{name} <{}>", self.address)
        }
    }
}

/// Parses an address-list header value.
///
/// Entries that contain no recognizable mailbox are skipped, so a field
/// with nothing usable yields an empty list. Group syntax
/// (`name: a@x, b@y;`) contributes its members.
#[must_use]
pub fn parse_address_list(value: &str) -> Vec<EmailAddress> {
    split_entries(value)
        .iter()
        .filter_map(|entry| EmailAddress::parse(entry))
        .collect()
}

/// Splits at top-level commas, dropping group names and terminators.
fn split_entries(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle_depth = 0usize;
    let mut paren_depth = 0usize;

    for c in value.chars() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }

        match c {
            '\\' if in_quotes || paren_depth > 0 => escaped = true,
            '"' if paren_depth == 0 => in_quotes = !in_quotes,
            '<' if !in_quotes && paren_depth == 0 => angle_depth += 1,
            '>' if !in_quotes && paren_depth == 0 => {
                angle_depth = angle_depth.saturating_sub(1);
            }
            '(' if !in_quotes => paren_depth += 1,
            ')' if !in_quotes => paren_depth = paren_depth.saturating_sub(1),
            _ => {}
        }

        let top_level = !in_quotes && angle_depth == 0 && paren_depth == 0;
        match c {
            ',' | ';' if top_level => entries.push(std::mem::take(&mut current)),
            // Group display name
            ':' if top_level => current.clear(),
            _ => current.push(c),
        }
    }
    entries.push(current);

    entries
}

fn decode_display_name(name: &str) -> String {
    decode_encoded_words(&unquote(name.trim())).trim().to_string()
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_quotes {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == needle && !in_quotes {
            return Some(i);
        }
    }

    None
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

    #[test]
    fn test_name_and_address() {
        let addr = EmailAddress::parse("John McDaniel <nhojmc@spam.gmail.com>").unwrap();
        assert_eq!(addr.address, "nhojmc@spam.gmail.com");
        assert_eq!(addr.display_name, "John McDaniel");
    }

    #[test]
    fn test_angle_only() {
        let addr = EmailAddress::parse("<test@test.com>").unwrap();
        assert_eq!(addr.address, "test@test.com");
        assert!(addr.display_name.is_empty());
    }

    #[test]
    fn test_bare_address() {
        let addr = EmailAddress::parse("test2@test.com").unwrap();
        assert_eq!(addr.address, "test2@test.com");
        assert!(addr.display_name.is_empty());
    }

    #[test]
    fn test_comment_display_name() {
        let addr = EmailAddress::parse("jdoe@example.org (John Doe)").unwrap();
        assert_eq!(addr.address, "jdoe@example.org");
        assert_eq!(addr.display_name, "John Doe");
    }

    #[test]
    fn test_quoted_display_name_with_escapes() {
        let addr = EmailAddress::parse(r#""Doe, John \"JD\"" <jd@example.org>"#).unwrap();
        assert_eq!(addr.display_name, r#"Doe, John "JD""#);
        assert_eq!(addr.address, "jd@example.org");
    }

    #[test]
    fn test_encoded_display_name() {
        let addr =
            EmailAddress::parse("=?ISO-8859-1?Q?Kasper_F=F8ns?= <thefeds@spam.mail.dk>").unwrap();
        assert_eq!(addr.display_name, "Kasper Føns");
        assert_eq!(addr.address, "thefeds@spam.mail.dk");
    }

    #[test]
    fn test_address_list_order_and_duplicates() {
        let list = parse_address_list(r#"a@x.org, "Last, First" <b@x.org>, <a@x.org>"#);
        let addresses: Vec<&str> = list.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(addresses, vec!["a@x.org", "b@x.org", "a@x.org"]);
        assert_eq!(list[1].display_name, "Last, First");
    }

    #[test]
    fn test_group_syntax() {
        let list = parse_address_list("A Group: ed@a.test, <joe@b.test>;, solo@c.test");
        let addresses: Vec<&str> = list.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(addresses, vec!["ed@a.test", "joe@b.test", "solo@c.test"]);
    }

    #[test]
    fn test_unrecognizable_field_is_empty() {
        assert!(parse_address_list("undisclosed-recipients:;").is_empty());
        assert!(parse_address_list("").is_empty());
        assert!(parse_address_list("not an address").is_empty());
        assert!(parse_address_list("<>").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(EmailAddress::new("a@x.org", "").to_string(), "<a@x.org>");
        assert_eq!(
            EmailAddress::new("a@x.org", "Ann Smith").to_string(),
            "Ann Smith <a@x.org>"
        );
        assert_eq!(
            EmailAddress::new("a@x.org", "Smith, Ann").to_string(),
            "\"Smith, Ann\" <a@x.org>"
        );
    }

    #[test]
    fn test_display_parses_back() {
        let original = EmailAddress::new("jd@example.org", r#"Doe, John "JD""#);
        assert_eq!(EmailAddress::parse(&original.to_string()), Some(original));
    }
}
