//! MIME content type handling.

use crate::encoding::{decode_charset, decode_raw_text};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Charset assumed for text parts that do not declare one (RFC 2045 §5.2).
pub const DEFAULT_CHARSET: &str = "us-ascii";

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters keyed by lower-cased name (e.g., charset=utf-8, boundary=xxx).
    pub parameters: BTreeMap<String, String>,
}

impl Default for ContentType {
    /// `text/plain`, the type of any part without a Content-Type header.
    fn default() -> Self {
        Self::text_plain()
    }
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into().to_ascii_lowercase(),
            sub_type: sub_type.into().to_ascii_lowercase(),
            parameters: BTreeMap::new(),
        }
    }

    /// Creates a text/plain content type without parameters.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Returns the media type as `type/subtype`, lower-cased.
    #[must_use]
    pub fn media_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset of this content.
    ///
    /// Text types without a charset parameter report `us-ascii`; other types
    /// without one report `None`.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters
            .get("charset")
            .map(String::as_str)
            .or_else(|| self.is_text().then_some(DEFAULT_CHARSET))
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters
            .get("boundary")
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }

    /// Returns the `name` parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// Checks if this is an encapsulated message (`message/rfc822`).
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.main_type == "message" && self.sub_type == "rfc822"
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, params) = split_first_unquoted(s, ';');

        let (main_type, sub_type) = type_str
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype: {s}")))?;

        let main_type = main_type.trim();
        let sub_type = sub_type.trim();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!("Empty type: {s}")));
        }

        let mut content_type = Self::new(main_type, sub_type);
        content_type.parameters = parse_parameters(params.unwrap_or_default())
            .into_iter()
            .collect();

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        for (key, value) in &self.parameters {
            // Quote value if it contains special characters
            if value.is_empty()
                || value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c))
            {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {key}=\"{escaped}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

/// Splits `s` at the first `delimiter` that is not inside a quoted string.
pub(crate) fn split_first_unquoted(s: &str, delimiter: char) -> (&str, Option<&str>) {
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_quotes {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            return (&s[..i], Some(&s[i + c.len_utf8()..]));
        }
    }

    (s, None)
}

/// Removes surrounding double quotes and backslash escapes.
pub(crate) fn unquote(s: &str) -> String {
    let Some(inner) = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return s.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Parses `; key=value` parameter lists (RFC 2045 with RFC 2231 extensions).
///
/// Keys are lower-cased. Extended values (`key*=charset'lang'%XX`) and
/// continuations (`key*0`, `key*1*`) are reassembled into a single entry that
/// takes precedence over a plain value of the same name.
pub(crate) fn parse_parameters(s: &str) -> HashMap<String, String> {
    let mut parameters = HashMap::new();
    let mut sections: HashMap<String, Vec<(u32, bool, String)>> = HashMap::new();

    let mut rest = Some(s);
    while let Some(current) = rest {
        let (param, remaining) = split_first_unquoted(current, ';');
        rest = remaining;

        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = unquote(value.trim());
        if key.is_empty() {
            continue;
        }

        if !key.contains('*') {
            parameters.insert(key, value);
            continue;
        }
        let (name, section) = key.split_once('*').unwrap_or((key.as_str(), ""));

        if section.is_empty() {
            sections
                .entry(name.to_string())
                .or_default()
                .push((0, true, value));
            continue;
        }

        let (index, extended) = section
            .strip_suffix('*')
            .map_or((section, false), |index| (index, true));
        match index.parse::<u32>() {
            Ok(index) => sections
                .entry(name.to_string())
                .or_default()
                .push((index, extended, value)),
            Err(_) => {
                parameters.insert(key.clone(), value);
            }
        }
    }

    for (name, mut parts) in sections {
        parts.sort_by_key(|(index, _, _)| *index);

        let mut charset: Option<String> = None;
        let mut bytes = Vec::new();
        for (position, (_, extended, value)) in parts.iter().enumerate() {
            if !extended {
                bytes.extend_from_slice(value.as_bytes());
                continue;
            }

            let mut encoded = value.as_str();
            if position == 0 {
                let pieces: Vec<&str> = value.splitn(3, '\'').collect();
                if let [declared, _language, text] = pieces.as_slice() {
                    charset = Some((*declared).to_string());
                    encoded = *text;
                }
            }
            bytes.extend(percent_decode(encoded));
        }

        let text = match charset.as_deref() {
            Some(charset) if !charset.is_empty() => decode_charset(&bytes, charset),
            _ => decode_raw_text(&bytes),
        };
        parameters.insert(name, text);
    }

    parameters
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = s.get(i + 1..i + 3)
            && hex.bytes().all(|b| b.is_ascii_hexdigit())
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            result.push(byte);
            i += 3;
            continue;
        }
        result.push(bytes[i]);
        i += 1;
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

    #[test]
    fn test_content_type_new() {
        let ct = ContentType::new("Text", "PLAIN");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_default_is_text_plain_us_ascii() {
        let ct = ContentType::default();
        assert_eq!(ct.media_type(), "text/plain");
        assert_eq!(ct.charset(), Some("us-ascii"));
        assert!(ct.boundary().is_none());
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_parse_keeps_charset_case() {
        let ct = ContentType::parse("Text/Plain; CharSet=ISO-8859-1").unwrap();
        assert_eq!(ct.media_type(), "text/plain");
        assert_eq!(ct.charset(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"").unwrap();
        assert_eq!(ct.main_type, "multipart");
        assert_eq!(ct.sub_type, "mixed");
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
        assert!(ct.is_multipart());
        assert_eq!(ct.charset(), None);
    }

    #[test]
    fn test_content_type_parse_quoted_semicolon() {
        let ct = ContentType::parse(r#"application/pdf; name="a;b \"c\".pdf"; x=1"#).unwrap();
        assert_eq!(ct.name(), Some(r#"a;b "c".pdf"#));
        assert_eq!(ct.parameters.get("x").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_content_type_trailing_semicolon() {
        let ct = ContentType::parse("text/plain; charset=US-ASCII;").unwrap();
        assert_eq!(ct.charset(), Some("US-ASCII"));
    }

    #[test]
    fn test_content_type_rfc2231_extended() {
        let ct = ContentType::parse("application/octet-stream; name*=utf-8''%E2%82%AC%20rates.txt")
            .unwrap();
        assert_eq!(ct.name(), Some("€ rates.txt"));
    }

    #[test]
    fn test_content_type_rfc2231_continuations() {
        let ct = ContentType::parse(
            "message/external-body; access-type=URL; URL*0=\"ftp://\"; URL*1=\"cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"",
        )
        .unwrap();
        assert_eq!(
            ct.parameters.get("url").map(String::as_str),
            Some("ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar")
        );
    }

    #[test]
    fn test_content_type_missing_subtype() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("/plain").is_err());
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::text_plain().with_parameter("charset", "utf-8");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");

        let ct = ContentType::new("multipart", "mixed").with_parameter("boundary", "a b");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"a b\"");
    }

    #[test]
    fn test_content_type_with_parameter() {
        let ct = ContentType::new("text", "plain")
            .with_parameter("charset", "iso-8859-1")
            .with_parameter("format", "flowed");

        assert_eq!(ct.charset(), Some("iso-8859-1"));
        assert_eq!(ct.parameters.get("format"), Some(&"flowed".to_string()));
    }
}
