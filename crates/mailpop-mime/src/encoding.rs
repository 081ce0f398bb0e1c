//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words and charset
//! transcoding. Every decoder here is lenient: malformed input is decoded as
//! far as possible and never rejected outright, because real-world senders
//! routinely get these encodings slightly wrong.

use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use encoding_rs::Encoding;

/// Base64 engine that accepts missing, excess or misplaced padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// Whitespace, line breaks and stray characters are ignored. Padding ends a
/// chunk, so separately padded pieces decode back to back. A dangling final
/// character in a chunk that cannot form a byte is dropped.
#[must_use]
pub fn decode_base64(data: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(data.len() / 4 * 3);

    for chunk in data.split(|&b| b == b'=') {
        let mut cleaned: Vec<u8> = chunk
            .iter()
            .copied()
            .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
            .collect();

        // A single leftover sextet carries no complete byte.
        if cleaned.len() % 4 == 1 {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            continue;
        }

        match LENIENT_BASE64.decode(&cleaned) {
            Ok(bytes) => decoded.extend_from_slice(&bytes),
            Err(e) => tracing::warn!(error = %e, "undecodable base64 content"),
        }
    }

    decoded
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks (`=` followed by optional whitespace and a line ending)
/// are removed and `=XX` escapes are replaced by their byte. An `=` that
/// starts neither is kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break
        let mut j = i + 1;
        while j < data.len() && (data[j] == b' ' || data[j] == b'\t') {
            j += 1;
        }
        if j == data.len() {
            i = j;
            continue;
        }
        if data[j] == b'\n' {
            i = j + 1;
            continue;
        }
        if data[j] == b'\r' && data.get(j + 1) == Some(&b'\n') {
            i = j + 2;
            continue;
        }

        // Hex encoded byte
        let high = data.get(i + 1).copied().and_then(hex_value);
        let low = data.get(i + 2).copied().and_then(hex_value);
        if let (Some(high), Some(low)) = (high, low) {
            result.push((high << 4) | low);
            i += 3;
        } else {
            result.push(b'=');
            i += 1;
        }
    }

    result
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Decodes every RFC 2047 encoded word (`=?charset?encoding?text?=`) in a
/// header value.
///
/// Whitespace between two adjacent encoded words is dropped; whitespace
/// between an encoded word and ordinary text is kept. Anything that only
/// looks like an encoded word is passed through unchanged.
#[must_use]
pub fn decode_encoded_words(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_encoded_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            let only_whitespace = before.chars().all(char::is_whitespace);
            if !(after_encoded_word && only_whitespace) {
                result.push_str(before);
            }
            result.push_str(&decoded);
            rest = &candidate[consumed..];
            after_encoded_word = true;
        } else {
            result.push_str(before);
            result.push_str("=?");
            rest = &candidate[2..];
            after_encoded_word = false;
        }
    }

    result.push_str(rest);
    result
}

/// Decodes the encoded word at the start of `text`.
///
/// Returns the decoded text and the number of bytes the word occupied.
fn decode_encoded_word(text: &str) -> Option<(String, usize)> {
    let inner = text.strip_prefix("=?")?;

    let charset_end = inner.find('?')?;
    let charset = &inner[..charset_end];
    let after_charset = &inner[charset_end + 1..];

    let encoding_end = after_charset.find('?')?;
    let encoding = &after_charset[..encoding_end];
    let payload_start = &after_charset[encoding_end + 1..];

    let payload_end = payload_start.find("?=")?;
    let payload = &payload_start[..payload_end];

    if charset.is_empty()
        || charset.contains(char::is_whitespace)
        || payload.contains(char::is_whitespace)
    {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes()),
        "Q" | "q" => {
            // _ stands for ASCII space regardless of charset
            let spaced: Vec<u8> = payload
                .bytes()
                .map(|b| if b == b'_' { b' ' } else { b })
                .collect();
            decode_quoted_printable(&spaced)
        }
        _ => return None,
    };

    // RFC 2231 allows a language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    let consumed = 2 + charset_end + 1 + encoding_end + 1 + payload_end + 2;

    Some((decode_charset(&bytes, charset), consumed))
}

/// Transcodes bytes in the named charset to a Rust string.
///
/// Labels are resolved with the WHATWG encoding rules (so `us-ascii` and
/// `iso-8859-1` decode as windows-1252). Labels `encoding_rs` does not know,
/// UTF-7 among them, fall back to [`decode_latin1`], which never fails and
/// keeps every byte recoverable.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    let label = charset.trim().trim_matches('"');

    if let Some(encoding) = Encoding::for_label_no_replacement(label.as_bytes()) {
        encoding.decode_with_bom_removal(bytes).0.into_owned()
    } else {
        tracing::debug!(charset = label, "unsupported charset, decoding as latin-1");
        decode_latin1(bytes)
    }
}

/// Maps every byte to the Unicode code point of the same value.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decodes raw header bytes: UTF-8 when valid, Latin-1 otherwise.
#[must_use]
pub fn decode_raw_text(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).map_or_else(|_| decode_latin1(bytes), str::to_string)
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

    const MAN_IS_DISTINGUISHED: &str = "Man is distinguished, not only by his reason, but by this singular passion from other animals, which is a lust of the mind, that by a perseverance of delight in the continued and indefatigable generation of knowledge, exceeds the short vehemence of any carnal pleasure.";

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(encoded.as_bytes());
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wikipedia_example_with_bad_padding() {
        let encoded = concat!(
            "TWFuIGlzIGRpc3Rpbmd1aXNoZWQsIG5vdCBvbmx5IGJ5IGhpcyByZWFzb24sIGJ1dCBieSB0aGlz\r\n",
            "IHNpbmd1bGFyIHBhc3Npb24gZnJvbSBvdGhlciBhbmltYWxzLCB3aGljaCBpcyBhIGx1c3Qgb2Yg\r\n",
            "dGhlIG1pbmQsIHRoYXQgYnkgYSBwZXJzZXZlcmFuY2Ugb2YgZGVsaWdodCBpbiB0aGUgY29udGlu\r\n",
            "dWVkIGFuZCBpbmRlZmF0aWdhYmxlIGdlbmVyYXRpb24gb2Yga25vd2xlZGdlLCBleGNlZWRzIHRo\r\n",
            "ZSBzaG9ydCB2ZWhlbWVuY2Ugb2YgYW55IGNhcm5hbCBwbGVhc3VyZS4=="
        );
        let decoded = decode_base64(encoded.as_bytes());
        assert_eq!(String::from_utf8(decoded).unwrap(), MAN_IS_DISTINGUISHED);
    }

    #[test]
    fn test_base64_missing_padding() {
        assert_eq!(decode_base64(b"SGVsbG8"), b"Hello");
        assert_eq!(decode_base64(b"SGVs\nbG8=\n"), b"Hello");
    }

    #[test]
    fn test_base64_dangling_character() {
        assert_eq!(decode_base64(b"SGVsbG8hS"), b"Hello!");
    }

    #[test]
    fn test_base64_concatenated_padded_chunks() {
        assert_eq!(decode_base64(b"SGk=\r\nSGk="), b"HiHi");
        assert_eq!(decode_base64(b"SA==SGk=\nIQ=="), b"HHi!");
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo"),
            "Héllo".as_bytes()
        );
        assert_eq!(decode_quoted_printable(b"h=c3=a9"), "hé".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \t\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"trailing="), b"trailing");
    }

    #[test]
    fn test_quoted_printable_invalid_escape_kept() {
        assert_eq!(decode_quoted_printable(b"a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable(b"50=%"), b"50=%");
        assert_eq!(decode_quoted_printable(b"x=4"), b"x=4");
    }

    #[test]
    fn test_encoded_word_rfc2047_examples() {
        assert_eq!(decode_encoded_words("=?US-ASCII?Q?Keith_Moore?="), "Keith Moore");
        assert_eq!(
            decode_encoded_words("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?="),
            "Keld Jørn Simonsen"
        );
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?Andr=E9?= Pirard"), "André Pirard");
        assert_eq!(
            decode_encoded_words(
                "=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?= =?ISO-8859-2?B?dSB1bmRlcnN0YW5kIHRoZSBleGFtcGxlLg==?="
            ),
            "If you can read this you understand the example."
        );
    }

    #[test]
    fn test_encoded_word_adjacency() {
        assert_eq!(decode_encoded_words("(=?ISO-8859-1?Q?a?=)"), "(a)");
        assert_eq!(decode_encoded_words("(=?ISO-8859-1?Q?a?= b)"), "(a b)");
        assert_eq!(
            decode_encoded_words("(=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?=)"),
            "(ab)"
        );
        assert_eq!(
            decode_encoded_words("(=?ISO-8859-1?Q?a?=    =?ISO-8859-1?Q?b?=)"),
            "(ab)"
        );
        assert_eq!(decode_encoded_words("(=?ISO-8859-1?Q?a_b?=)"), "(a b)");
    }

    #[test]
    fn test_encoded_word_subject() {
        assert_eq!(
            decode_encoded_words("Test =?ISO-8859-1?Q?=E6=F8=E5=C6=D8=C5?="),
            "Test æøåÆØÅ"
        );
        assert_eq!(decode_encoded_words("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_encoded_words("=?utf-8?q?H=C3=A9llo?="), "Héllo");
    }

    #[test]
    fn test_encoded_word_language_suffix() {
        assert_eq!(decode_encoded_words("=?US-ASCII*EN?Q?Keith_Moore?="), "Keith Moore");
    }

    #[test]
    fn test_malformed_encoded_word_passes_through() {
        assert_eq!(decode_encoded_words("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_encoded_words("price =? unknown"), "price =? unknown");
        assert_eq!(decode_encoded_words("=?utf-8?Q?no end"), "=?utf-8?Q?no end");
        assert_eq!(
            decode_encoded_words("=?utf-8?Q?a b?= =?utf-8?Q?c?="),
            "=?utf-8?Q?a b?= c"
        );
    }

    #[test]
    fn test_decode_charset_unknown_falls_back_to_latin1() {
        assert_eq!(decode_charset(&[0x61, 0xE6], "x-made-up"), "aæ");
        assert_eq!(decode_charset(&[0x61, 0xE6], "utf-7"), "aæ");
    }

    #[test]
    fn test_decode_charset_known_labels() {
        assert_eq!(decode_charset(&[0xE6, 0xF8], "ISO-8859-1"), "æø");
        assert_eq!(decode_charset("héllo".as_bytes(), "\"UTF-8\""), "héllo");
        assert_eq!(decode_charset(&[0xC1, 0xC2], "koi8-r"), "аб");
    }

    #[test]
    fn test_decode_raw_text() {
        assert_eq!(decode_raw_text("Føns".as_bytes()), "Føns");
        assert_eq!(decode_raw_text(&[b'F', 0xF8, b'n', b's']), "Føns");
    }

    proptest! {
        #[test]
        fn base64_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(decode_base64(encode_base64(&data).as_bytes()), data);
        }

        #[test]
        fn quoted_printable_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_quoted_printable(&data);
        }

        #[test]
        fn encoded_words_never_panic(s in r"=\?.*\?.*\?.*\?=.*") {
            let _ = decode_encoded_words(&s);
        }
    }
}
