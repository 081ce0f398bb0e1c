//! Content-Disposition handling (RFC 2183).

use crate::content_type::{parse_parameters, split_first_unquoted};
use crate::encoding::decode_encoded_words;
use std::collections::BTreeMap;

/// Parsed Content-Disposition header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type, lower-cased (`inline`, `attachment`, ...).
    pub disposition_type: String,
    /// Parameters keyed by lower-cased name.
    pub parameters: BTreeMap<String, String>,
}

impl ContentDisposition {
    /// Parses a Content-Disposition value. Never fails; an empty type is
    /// reported as `attachment`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (kind, params) = split_first_unquoted(s, ';');
        let kind = kind.trim().to_ascii_lowercase();

        Self {
            disposition_type: if kind.is_empty() {
                "attachment".to_string()
            } else {
                kind
            },
            parameters: parse_parameters(params.unwrap_or_default())
                .into_iter()
                .collect(),
        }
    }

    /// Returns true for `attachment` dispositions.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition_type == "attachment"
    }

    /// Returns true for `inline` dispositions.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition_type == "inline"
    }

    /// Returns the decoded `filename` parameter.
    ///
    /// Some senders put RFC 2047 encoded words in parameters; those are
    /// decoded too.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameters
            .get("filename")
            .map(|name| decode_encoded_words(name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attachment() {
        let cd = ContentDisposition::parse("Attachment; filename=\"report 2010.pdf\"; size=1024");
        assert!(cd.is_attachment());
        assert!(!cd.is_inline());
        assert_eq!(cd.filename().as_deref(), Some("report 2010.pdf"));
        assert_eq!(cd.parameters.get("size").map(String::as_str), Some("1024"));
    }

    #[test]
    fn test_parse_inline_without_parameters() {
        let cd = ContentDisposition::parse("inline");
        assert!(cd.is_inline());
        assert!(cd.filename().is_none());
    }

    #[test]
    fn test_encoded_word_filename() {
        let cd = ContentDisposition::parse("attachment; filename=\"=?ISO-8859-1?Q?F=F8ns.txt?=\"");
        assert_eq!(cd.filename().as_deref(), Some("Føns.txt"));
    }

    #[test]
    fn test_rfc2231_filename() {
        let cd = ContentDisposition::parse("attachment; filename*=iso-8859-1'da'F%F8ns.txt");
        assert_eq!(cd.filename().as_deref(), Some("Føns.txt"));
    }

    #[test]
    fn test_empty_type_defaults_to_attachment() {
        let cd = ContentDisposition::parse("; filename=a.txt");
        assert!(cd.is_attachment());
    }
}
