//! Raw header block handling.

use std::collections::HashMap;
use std::fmt;

use crate::encoding::decode_raw_text;

/// Ordered collection of email header fields.
///
/// Field names are stored verbatim and looked up case-insensitively.
/// Repeated fields are kept, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
    index: HashMap<String, Vec<usize>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.index
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(self.fields.len());
        self.fields.push((name, value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(&name.to_ascii_lowercase())
            .and_then(|positions| positions.first())
            .map(|&i| self.fields[i].1.as_str())
    }

    /// Gets all values for a header, in arrival order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|positions| {
                positions
                    .iter()
                    .map(|&i| self.fields[i].1.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns true if at least one field with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    /// Returns an iterator over all fields in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of fields, counting repeats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. Continuation lines (starting
    /// with a space or tab) are unfolded onto the previous field with a
    /// single space. Lines without a `:` are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::parse_lines(text.split('\n')).0
    }

    /// Parses a raw header block, decoding each line on its own.
    ///
    /// A line that is not UTF-8 is read as Latin-1 without affecting its
    /// neighbours. Also returns the lines that were skipped as malformed.
    #[must_use]
    pub fn parse_raw(raw: &[u8]) -> (Self, Vec<String>) {
        Self::parse_lines(raw.split(|&b| b == b'\n').map(decode_raw_text))
    }

    fn parse_lines<I, L>(lines: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        let mut headers = Self::new();
        let mut skipped = Vec::new();
        let mut current: Option<(String, String)> = None;

        for line in lines {
            let line = line.as_ref();
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = current.as_mut() {
                    let continuation = line.trim();
                    if !continuation.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(continuation);
                    }
                } else {
                    tracing::debug!(line, "Continuation line before any header field");
                    skipped.push(line.to_string());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    current = Some((name.trim().to_string(), value.trim().to_string()));
                }
                _ => {
                    tracing::debug!(line, "Skipping malformed header line");
                    skipped.push(line.to_string());
                }
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        (headers, skipped)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
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
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.add("X-Custom", "value1");
        headers.add("x-custom", "value2");

        assert_eq!(headers.get("subject"), Some("Test"));
        assert_eq!(headers.get("SUBJECT"), Some("Test"));
        assert_eq!(headers.get_all("X-CUSTOM"), vec!["value1", "value2"]);
        assert!(headers.contains("x-custom"));
        assert!(!headers.contains("From"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_parse_keeps_order_and_casing() {
        let text = "Received: hop2\r\nFrom: a@x.org\r\nReceived: hop1\r\nX-TDC-Received-From-IP: 74.125.82.54\r\n";
        let headers = Headers::parse(text);

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["Received", "From", "Received", "X-TDC-Received-From-IP"]
        );
        assert_eq!(headers.get_all("received"), vec!["hop2", "hop1"]);
        assert_eq!(headers.get("x-tdc-received-from-ip"), Some("74.125.82.54"));
    }

    #[test]
    fn test_parse_unfolds_continuations() {
        let text = "Subject: This is a\r\n  long subject\r\n\tline\r\nTo: b@x.org\r\n";
        let headers = Headers::parse(text);

        assert_eq!(headers.get("Subject"), Some("This is a long subject line"));
        assert_eq!(headers.get("To"), Some("b@x.org"));
    }

    #[test]
    fn test_parse_stops_at_blank_line() {
        let text = "Subject: Hi\nFrom: a@x.org\n\nNot: a header\n";
        let headers = Headers::parse(text);

        assert_eq!(headers.len(), 2);
        assert!(!headers.contains("Not"));
    }

    #[test]
    fn test_parse_skips_garbage_lines() {
        let text = " leading continuation\r\nno colon here\r\n: empty name\r\nSubject: ok\r\n";
        let headers = Headers::parse(text);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Subject"), Some("ok"));
    }

    #[test]
    fn test_parse_raw_decodes_lines_independently() {
        let raw = b"Subject: caf\xc3\xa9\r\nX-Old: \xe6\r\nno colon\r\n\r\nBody: \xff\r\n";
        let (headers, skipped) = Headers::parse_raw(raw);

        assert_eq!(headers.get("Subject"), Some("caf\u{e9}"));
        assert_eq!(headers.get("X-Old"), Some("\u{e6}"));
        assert_eq!(headers.len(), 2);
        assert_eq!(skipped, vec!["no colon".to_string()]);
    }

    #[test]
    fn test_value_with_colon() {
        let headers = Headers::parse("Date: Tue, 05 Oct 2010 04:02:06 +0200\r\n");
        assert_eq!(headers.get("date"), Some("Tue, 05 Oct 2010 04:02:06 +0200"));
    }

    #[test]
    fn test_display_reparse_is_idempotent() {
        let text = "From: test <test@test.com>\r\nSubject: folded\r\n  subject\r\nX-A: 1\r\nx-a: 2\r\nEmpty:\r\n";
        let first = Headers::parse(text);
        let second = Headers::parse(&first.to_string());

        let a: Vec<_> = first.iter().collect();
        let b: Vec<_> = second.iter().collect();
        assert_eq!(a, b);
        assert_eq!(second.get("Empty"), Some(""));
    }
}
