//! Content-Transfer-Encoding handling.

use crate::encoding::{decode_base64, decode_quoted_printable};
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII (the default when no header is present).
    #[default]
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Binary (no encoding).
    Binary,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Any other token, kept verbatim. Bodies pass through undecoded.
    Unknown(String),
}

impl TransferEncoding {
    /// Parses transfer encoding from a header value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let token = s.trim().trim_matches('"');
        match token.to_ascii_lowercase().as_str() {
            "" | "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Unknown(token.to_string()),
        }
    }

    /// Reverses this transfer encoding.
    #[must_use]
    pub fn decode(&self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => decode_base64(body),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary | Self::Unknown(_) => body.to_vec(),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Unknown(token) => write!(f, "{token}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("8BIT"), TransferEncoding::EightBit);
        assert_eq!(TransferEncoding::parse("binary"), TransferEncoding::Binary);
        assert_eq!(
            TransferEncoding::parse("x-uuencode"),
            TransferEncoding::Unknown("x-uuencode".to_string())
        );
    }

    #[test]
    fn test_default_is_seven_bit() {
        assert_eq!(TransferEncoding::default(), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_decode_dispatch() {
        assert_eq!(TransferEncoding::Base64.decode(b"SGk="), b"Hi");
        assert_eq!(TransferEncoding::QuotedPrintable.decode(b"H=69"), b"Hi");
        assert_eq!(TransferEncoding::EightBit.decode(b"=48"), b"=48");
        assert_eq!(
            TransferEncoding::Unknown("x-uuencode".into()).decode(b"begin"),
            b"begin"
        );
    }

    #[test]
    fn test_display_round_trip() {
        for encoding in [
            TransferEncoding::SevenBit,
            TransferEncoding::EightBit,
            TransferEncoding::Binary,
            TransferEncoding::Base64,
            TransferEncoding::QuotedPrintable,
        ] {
            assert_eq!(TransferEncoding::parse(&encoding.to_string()), encoding);
        }
    }
}
