//! MIME message structure and body assembly.

use crate::content_type::ContentType;
use crate::encoding::{decode_charset, decode_encoded_words};
use crate::error::Error;
use crate::message_header::MessageHeader;

/// Deepest multipart nesting that is still split into parts.
pub const MAX_DEPTH: usize = 64;

/// Decoded body of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// `text/*` content, transfer-decoded and converted from its charset.
    Text(String),
    /// Any other leaf content, transfer-decoded.
    Binary(Vec<u8>),
    /// Child parts of a `multipart/*` container.
    Multipart(Vec<MessagePart>),
    /// A part whose structure could not be decoded, kept as it arrived.
    Opaque {
        /// Undecoded body bytes.
        raw: Vec<u8>,
        /// Why the body could not be decoded.
        defect: Error,
    },
}

/// A node of the MIME tree: its own header and body.
#[derive(Debug, Clone)]
pub struct MessagePart {
    /// Header fields of this part.
    pub header: MessageHeader,
    /// Decoded body.
    pub body: Body,
}

impl PartialEq for MessagePart {
    fn eq(&self, other: &Self) -> bool {
        self.header.headers().iter().eq(other.header.headers().iter()) && self.body == other.body
    }
}

impl Eq for MessagePart {}

impl MessagePart {
    /// Parses a header block plus body.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self::parse_at(raw, 0)
    }

    fn parse_at(raw: &[u8], depth: usize) -> Self {
        let (header_block, body) = split_header_body(raw);
        let header = MessageHeader::parse(header_block);
        let body = decode_body(&header, body, depth);
        Self { header, body }
    }

    /// Content type of this part.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.header.content_type
    }

    /// Returns true for containers.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }

    /// Returns true for leaves of a `text/*` type.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.body, Body::Text(_))
    }

    /// Child parts; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Multipart(children) => children,
            _ => &[],
        }
    }

    /// Decoded text of a text leaf.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Body bytes of a leaf: the UTF-8 text, the decoded binary content, or
    /// the raw bytes of an opaque part. Empty for containers.
    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        match &self.body {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) | Body::Opaque { raw: bytes, .. } => bytes,
            Body::Multipart(_) => &[],
        }
    }

    /// Structural defect of an opaque part.
    #[must_use]
    pub const fn defect(&self) -> Option<&Error> {
        match &self.body {
            Body::Opaque { defect, .. } => Some(defect),
            _ => None,
        }
    }

    /// File name from Content-Disposition, else from the Content-Type
    /// `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.header
            .content_disposition
            .as_ref()
            .and_then(crate::ContentDisposition::filename)
            .or_else(|| self.content_type().name().map(decode_encoded_words))
    }

    /// Returns true if this leaf should be presented as an attachment.
    ///
    /// Non-text leaves are attachments, as is anything with a disposition
    /// other than inline.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        if self.is_multipart() {
            return false;
        }
        let explicit = self
            .header
            .content_disposition
            .as_ref()
            .is_some_and(|cd| !cd.is_inline());
        explicit || !self.content_type().is_text()
    }

    /// Parses an enclosed `message/rfc822` body.
    #[must_use]
    pub fn embedded_message(&self) -> Option<Message> {
        match &self.body {
            Body::Binary(bytes) if self.content_type().media_type() == "message/rfc822" => {
                Some(Message::parse(bytes))
            }
            _ => None,
        }
    }

    /// Leaves below (or equal to) this part, depth first in document order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(part) = stack.pop() {
            match &part.body {
                Body::Multipart(children) => stack.extend(children.iter().rev()),
                _ => leaves.push(part),
            }
        }
        leaves
    }
}

/// A complete message: the root part plus the bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    root: MessagePart,
    raw: Vec<u8>,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// Never fails: recoverable field errors are listed in the header's
    /// defects and structural errors turn the affected part opaque.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            root: MessagePart::parse(raw),
            raw: raw.to_vec(),
        }
    }

    /// Top-level header.
    #[must_use]
    pub const fn header(&self) -> &MessageHeader {
        &self.root.header
    }

    /// Root part.
    #[must_use]
    pub const fn root(&self) -> &MessagePart {
        &self.root
    }

    /// The message exactly as received.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Decoded Subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.header().subject.as_deref()
    }

    /// Text leaves that are not attachments.
    #[must_use]
    pub fn text_bodies(&self) -> Vec<&MessagePart> {
        self.root
            .leaves()
            .into_iter()
            .filter(|part| part.is_text() && !part.is_attachment())
            .collect()
    }

    /// Leaves that are attachments.
    #[must_use]
    pub fn attachments(&self) -> Vec<&MessagePart> {
        self.root
            .leaves()
            .into_iter()
            .filter(|part| part.is_attachment())
            .collect()
    }

    /// First leaf of the given media type, e.g. `text/html`.
    #[must_use]
    pub fn find_first(&self, media_type: &str) -> Option<&MessagePart> {
        self.root
            .leaves()
            .into_iter()
            .find(|part| part.content_type().media_type().eq_ignore_ascii_case(media_type))
    }

    /// Text of the first `text/plain` leaf.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        self.find_first("text/plain").and_then(MessagePart::body_text)
    }
}

/// Splits at the first empty line (CRLF or bare LF).
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut start = 0;
    while start < raw.len() {
        let end = raw[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| start + i);
        let line = &raw[start..end];
        if line.is_empty() || line == b"\r" {
            let body_start = (end + 1).min(raw.len());
            return (&raw[..start], &raw[body_start..]);
        }
        start = end + 1;
    }
    (raw, &[])
}

fn decode_body(header: &MessageHeader, body: &[u8], depth: usize) -> Body {
    let content_type = &header.content_type;

    if content_type.is_multipart() {
        return match split_multipart(content_type, body, depth) {
            Ok(children) => Body::Multipart(children),
            Err(defect) => {
                tracing::warn!(
                    media_type = %content_type.media_type(),
                    %defect,
                    "Keeping multipart body undecoded"
                );
                Body::Opaque {
                    raw: body.to_vec(),
                    defect,
                }
            }
        };
    }

    let decoded = header.content_transfer_encoding.decode(body);
    if content_type.is_text() {
        let charset = content_type.charset().unwrap_or(crate::DEFAULT_CHARSET);
        Body::Text(decode_charset(&decoded, charset))
    } else {
        Body::Binary(decoded)
    }
}

fn split_multipart(
    content_type: &ContentType,
    body: &[u8],
    depth: usize,
) -> Result<Vec<MessagePart>, Error> {
    if depth >= MAX_DEPTH {
        return Err(Error::TooDeeplyNested { limit: MAX_DEPTH });
    }
    let boundary = content_type.boundary().ok_or_else(|| {
        Error::MalformedMultipart(format!("{} without boundary", content_type.media_type()))
    })?;

    let delimiter = format!("--{boundary}");
    let mut segments: Vec<&[u8]> = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (line_end + 1).min(body.len());
        let line = &body[pos..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if let Some(rest) = line.strip_prefix(delimiter.as_bytes()) {
            let rest = rest.trim_ascii_end();
            if rest.is_empty() || rest == b"--" {
                if let Some(start) = part_start.take() {
                    segments.push(strip_line_break(&body[start..pos]));
                }
                if rest == b"--" {
                    // Epilogue
                    break;
                }
                part_start = Some(next);
            }
        }
        pos = next;
    }
    // Unterminated final part
    if let Some(start) = part_start {
        segments.push(&body[start..]);
    }

    if segments.is_empty() {
        return Err(Error::MalformedMultipart(format!(
            "boundary \"{boundary}\" not found"
        )));
    }

    Ok(segments
        .into_iter()
        .map(|segment| MessagePart::parse_at(segment, depth + 1))
        .collect())
}

/// Drops the line break that belongs to the following delimiter line.
fn strip_line_break(segment: &[u8]) -> &[u8] {
    let segment = segment.strip_suffix(b"\n").unwrap_or(segment);
    segment.strip_suffix(b"\r").unwrap_or(segment)
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
    use crate::TransferEncoding;
    use proptest::prelude::*;

    #[test]
    fn test_no_content_type_is_plain_text() {
        let raw = b"Subject: plain\r\n\r\nHello\r\nWorld";
        let message = Message::parse(raw);

        assert_eq!(message.root().content_type().media_type(), "text/plain");
        assert_eq!(message.body_text(), Some("Hello\r\nWorld"));
        assert_eq!(message.raw(), raw);
    }

    #[test]
    fn test_latin1_body() {
        let raw = b"Content-Type: text/plain; charset=ISO-8859-1\r\n\
                    Content-Transfer-Encoding: 8bit\r\n\r\n\xe6\xf8\xe5";
        assert_eq!(Message::parse(raw).body_text(), Some("æøå"));
    }

    #[test]
    fn test_quoted_printable_body() {
        let raw = b"Content-Type: text/plain; charset=utf-8\r\n\
                    Content-Transfer-Encoding: quoted-printable\r\n\r\n\
                    caf=C3=A9 soft=\r\nbreak";
        assert_eq!(Message::parse(raw).body_text(), Some("café softbreak"));
    }

    #[test]
    fn test_base64_body_with_bad_padding() {
        let raw = b"Content-Type: text/plain\r\n\
                    Content-Transfer-Encoding: base64\r\n\r\n\
                    TWFuIGlzIGRpc3Rpbmd1aXNoZWQ=\r\n==";
        assert_eq!(Message::parse(raw).body_text(), Some("Man is distinguished"));
    }

    #[test]
    fn test_lf_only_line_endings() {
        let raw = b"Subject: lf\n\nbody line\n";
        let message = Message::parse(raw);
        assert_eq!(message.subject(), Some("lf"));
        assert_eq!(message.body_text(), Some("body line\n"));
    }

    #[test]
    fn test_no_body() {
        let message = Message::parse(b"Subject: only headers\r\n");
        assert_eq!(message.subject(), Some("only headers"));
        assert_eq!(message.body_text(), Some(""));
    }

    const MIXED: &[u8] = b"From: a@x.org\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
This is the preamble.\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=us-ascii\r\n\
\r\n\
plain body\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html body</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/octet-stream; name=\"data.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-Disposition: attachment\r\n\
\r\n\
AAEC\r\n\
--outer--\r\n\
This is the epilogue.\r\n";

    #[test]
    fn test_multipart_tree() {
        let message = Message::parse(MIXED);
        let root = message.root();

        assert!(root.is_multipart());
        assert_eq!(root.children().len(), 2);

        let alternative = &root.children()[0];
        assert_eq!(alternative.content_type().media_type(), "multipart/alternative");
        assert_eq!(alternative.children().len(), 2);
        assert_eq!(alternative.children()[0].body_text(), Some("plain body"));
        assert_eq!(alternative.children()[1].body_text(), Some("<p>html body</p>"));

        let attachment = &root.children()[1];
        assert_eq!(attachment.body, Body::Binary(vec![0, 1, 2]));
        assert_eq!(
            attachment.header.content_transfer_encoding,
            TransferEncoding::Base64
        );
    }

    #[test]
    fn test_multipart_views() {
        let message = Message::parse(MIXED);

        let texts: Vec<_> = message
            .text_bodies()
            .iter()
            .map(|part| part.body_text().unwrap())
            .collect();
        assert_eq!(texts, vec!["plain body", "<p>html body</p>"]);

        let attachments = message.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("data.bin"));
        assert_eq!(
            message.find_first("TEXT/HTML").and_then(MessagePart::body_text),
            Some("<p>html body</p>")
        );
    }

    #[test]
    fn test_preamble_and_epilogue_discarded() {
        let message = Message::parse(MIXED);
        for leaf in message.root().leaves() {
            let bytes = leaf.body_bytes();
            assert!(!bytes.windows(8).any(|w| w == b"preamble"));
            assert!(!bytes.windows(8).any(|w| w == b"epilogue"));
        }
    }

    #[test]
    fn test_missing_boundary_is_opaque() {
        let raw = b"Subject: broken\r\nContent-Type: multipart/mixed\r\n\r\nbody";
        let message = Message::parse(raw);

        assert_eq!(message.subject(), Some("broken"));
        assert!(matches!(
            message.root().defect(),
            Some(Error::MalformedMultipart(_))
        ));
        assert_eq!(message.root().body_bytes(), b"body");
    }

    #[test]
    fn test_boundary_never_seen_is_opaque() {
        let raw = b"Content-Type: multipart/mixed; boundary=zzz\r\n\r\nno parts here";
        let message = Message::parse(raw);
        assert!(matches!(
            message.root().defect(),
            Some(Error::MalformedMultipart(_))
        ));
    }

    #[test]
    fn test_multipart_parts_keep_line_endings() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\n\n\
                    --b\nContent-Type: text/plain\n\nline one\nline two\n\
                    --b\r\n\r\ncrlf one\r\ncrlf two\r\n--b--\n";
        let message = Message::parse(raw);
        let texts: Vec<_> = message
            .root()
            .children()
            .iter()
            .map(|part| part.body_text().unwrap())
            .collect();
        assert_eq!(texts, vec!["line one\nline two", "crlf one\r\ncrlf two"]);
    }

    #[test]
    fn test_unterminated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n\
                    --b\r\n\r\nfirst\r\n--b\r\n\r\nsecond";
        let message = Message::parse(raw);
        let texts: Vec<_> = message
            .root()
            .children()
            .iter()
            .map(|part| part.body_text().unwrap())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_nesting_limit() {
        let mut raw = Vec::new();
        for level in 0..=MAX_DEPTH {
            raw.extend_from_slice(
                format!("Content-Type: multipart/mixed; boundary=b{level}\r\n\r\n--b{level}\r\n")
                    .as_bytes(),
            );
        }
        raw.extend_from_slice(b"\r\ninnermost");

        let message = Message::parse(&raw);
        let mut part = message.root();
        let mut depth = 0;
        while part.is_multipart() {
            part = &part.children()[0];
            depth += 1;
        }

        assert_eq!(depth, MAX_DEPTH);
        assert_eq!(
            part.defect(),
            Some(&Error::TooDeeplyNested { limit: MAX_DEPTH })
        );
    }

    #[test]
    fn test_embedded_message() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n\
                    --b\r\n\
                    Content-Type: message/rfc822\r\n\r\n\
                    Subject: inner\r\n\r\ninner body\r\n\
                    --b--\r\n";
        let message = Message::parse(raw);
        let enclosed = message.root().children()[0].embedded_message().unwrap();

        assert_eq!(enclosed.subject(), Some("inner"));
        assert_eq!(enclosed.body_text(), Some("inner body"));
        assert!(message.root().embedded_message().is_none());
    }

    #[test]
    fn test_inline_text_attachment() {
        let raw = b"Content-Type: text/plain; name=notes.txt\r\n\
                    Content-Disposition: attachment\r\n\r\nnotes";
        let message = Message::parse(raw);

        assert!(message.root().is_attachment());
        assert_eq!(message.root().filename().as_deref(), Some("notes.txt"));
        assert!(message.text_bodies().is_empty());
    }

    #[test]
    fn test_header_reserialization_is_idempotent() {
        let message = Message::parse(MIXED);
        let reserialized = message.header().headers().to_string();
        let reparsed = Message::parse(format!("{reserialized}\r\n").as_bytes());

        let original: Vec<_> = message.header().headers().iter().collect();
        let again: Vec<_> = reparsed.header().headers().iter().collect();
        assert_eq!(original, again);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
            let message = Message::parse(&raw);
            prop_assert_eq!(message.raw(), &raw[..]);
        }

        #[test]
        fn prop_multipart_children_never_exceed_segments(
            bodies in proptest::collection::vec("[a-z ]{0,20}", 1..6)
        ) {
            let mut raw = String::from("Content-Type: multipart/mixed; boundary=sep\r\n\r\n");
            for body in &bodies {
                raw.push_str("--sep\r\n\r\n");
                raw.push_str(body);
                raw.push_str("\r\n");
            }
            raw.push_str("--sep--\r\n");

            let message = Message::parse(raw.as_bytes());
            let texts: Vec<_> = message
                .root()
                .children()
                .iter()
                .map(|part| part.body_text().unwrap_or_default().to_string())
                .collect();
            prop_assert_eq!(texts, bodies);
        }
    }
}
