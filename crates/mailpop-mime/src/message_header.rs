//! Typed view over a message's header block.

use crate::address::{EmailAddress, parse_address_list};
use crate::content_type::ContentType;
use crate::date::{parse_date, strip_comments};
use crate::disposition::ContentDisposition;
use crate::encoding::decode_encoded_words;
use crate::error::Error;
use crate::header::Headers;
use crate::transfer_encoding::TransferEncoding;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Message priority as announced by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Importance {
    /// Urgent or high priority.
    High,
    /// No priority given.
    #[default]
    Normal,
    /// Low priority or bulk.
    Low,
}

impl Importance {
    /// Parses an `Importance` or `Priority` value.
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" | "urgent" => Some(Self::High),
            "normal" => Some(Self::Normal),
            "low" | "non-urgent" => Some(Self::Low),
            _ => None,
        }
    }

    /// Parses an `X-Priority` value such as `1 (Highest)`.
    fn parse_x_priority(value: &str) -> Option<Self> {
        match value.trim().chars().next()? {
            '1' | '2' => Some(Self::High),
            '3' => Some(Self::Normal),
            '4' | '5' => Some(Self::Low),
            _ => None,
        }
    }
}

/// One `Received` trace field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// The unfolded field value.
    pub value: String,
    /// Clauses such as `from`, `by`, `with`, `id`, `for`, keyed in lower case.
    pub names: BTreeMap<String, String>,
    /// Time stamp after the final `;`, if it parsed.
    pub date: Option<DateTime<Utc>>,
}

impl Received {
    /// Parses a `Received` field value.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let (clauses, date) = match value.rsplit_once(';') {
            Some((clauses, date)) => (clauses, parse_date(date).ok()),
            None => (value, None),
        };

        let mut names = BTreeMap::new();
        let cleaned = strip_comments(clauses);
        let mut tokens = cleaned.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            let key = token.to_ascii_lowercase();
            if matches!(key.as_str(), "from" | "by" | "via" | "with" | "id" | "for")
                && let Some(next) = tokens.peek()
            {
                names.entry(key).or_insert_with(|| (*next).to_string());
                tokens.next();
            }
        }

        Self {
            value: value.to_string(),
            names,
            date,
        }
    }
}

/// Header fields of a message or part, decoded into typed values.
///
/// Fields without a typed slot are kept in [`MessageHeader::unknown`].
/// Malformed values never fail the whole header: they are left unset and
/// the problem is recorded in [`MessageHeader::defects`].
#[derive(Debug, Clone, Default)]
pub struct MessageHeader {
    /// `From` mailboxes.
    pub from: Vec<EmailAddress>,
    /// `Sender` mailbox.
    pub sender: Option<EmailAddress>,
    /// `Reply-To` mailboxes.
    pub reply_to: Vec<EmailAddress>,
    /// `To` recipients.
    pub to: Vec<EmailAddress>,
    /// `Cc` recipients.
    pub cc: Vec<EmailAddress>,
    /// `Bcc` recipients.
    pub bcc: Vec<EmailAddress>,
    /// `Return-Path` mailbox.
    pub return_path: Option<EmailAddress>,
    /// `Disposition-Notification-To` mailboxes.
    pub disposition_notification_to: Vec<EmailAddress>,
    /// Decoded `Subject`.
    pub subject: Option<String>,
    /// `Date` exactly as sent.
    pub date: Option<String>,
    /// `Date` normalized to UTC, when it parsed.
    pub date_sent: Option<DateTime<Utc>>,
    /// `Message-ID` without angle brackets.
    pub message_id: Option<String>,
    /// `In-Reply-To` ids without angle brackets.
    pub in_reply_to: Vec<String>,
    /// `References` ids without angle brackets.
    pub references: Vec<String>,
    /// `MIME-Version`, comments removed.
    pub mime_version: Option<String>,
    /// `Content-Type`; `text/plain` when absent.
    pub content_type: ContentType,
    /// `Content-Transfer-Encoding`; 7bit when absent.
    pub content_transfer_encoding: TransferEncoding,
    /// `Content-Disposition`.
    pub content_disposition: Option<ContentDisposition>,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// Decoded `Content-Description`.
    pub content_description: Option<String>,
    /// `Received` fields, topmost first.
    pub received: Vec<Received>,
    /// Decoded `Keywords`.
    pub keywords: Vec<String>,
    /// From `Importance`, `Priority` or `X-Priority`.
    pub importance: Importance,
    /// Every field without a typed slot, in arrival order.
    pub unknown: Headers,
    /// Problems found while decoding field values.
    pub defects: Vec<Error>,
    raw: Headers,
}

impl MessageHeader {
    /// Decodes a raw header block.
    ///
    /// Each line that is not UTF-8 is read as Latin-1 on its own. Lines that
    /// are not header fields are recorded as [`Error::InvalidHeader`].
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (headers, skipped) = Headers::parse_raw(raw);
        let mut header = Self::from_headers(headers);
        header
            .defects
            .extend(skipped.into_iter().map(Error::InvalidHeader));
        header
    }

    /// Builds the typed view from an already parsed header collection.
    #[must_use]
    pub fn from_headers(headers: Headers) -> Self {
        let mut header = Self::default();

        for (name, value) in &headers {
            match name.to_ascii_lowercase().as_str() {
                "from" => header.from.extend(parse_address_list(value)),
                "sender" => header.sender = header.sender.take().or_else(|| first_address(value)),
                "reply-to" => header.reply_to.extend(parse_address_list(value)),
                "to" => header.to.extend(parse_address_list(value)),
                "cc" => header.cc.extend(parse_address_list(value)),
                "bcc" => header.bcc.extend(parse_address_list(value)),
                "return-path" => {
                    header.return_path = header.return_path.take().or_else(|| first_address(value));
                }
                "disposition-notification-to" => header
                    .disposition_notification_to
                    .extend(parse_address_list(value)),
                "subject" => {
                    header
                        .subject
                        .get_or_insert_with(|| decode_encoded_words(value));
                }
                "date" => {
                    if header.date.is_none() {
                        header.set_date(value);
                    }
                }
                "message-id" => {
                    header.message_id.get_or_insert_with(|| strip_brackets(value));
                }
                "in-reply-to" => header.in_reply_to.extend(parse_message_ids(value)),
                "references" => header.references.extend(parse_message_ids(value)),
                "mime-version" => {
                    header
                        .mime_version
                        .get_or_insert_with(|| strip_comments(value).trim().to_string());
                }
                "content-type" => header.set_content_type(value),
                "content-transfer-encoding" => {
                    header.content_transfer_encoding = TransferEncoding::parse(value);
                }
                "content-disposition" => {
                    header.content_disposition = Some(ContentDisposition::parse(value));
                }
                "content-id" => header.content_id = Some(strip_brackets(value)),
                "content-description" => {
                    header.content_description = Some(decode_encoded_words(value));
                }
                "received" => header.received.push(Received::parse(value)),
                "keywords" => header.keywords.extend(
                    value
                        .split(',')
                        .map(|keyword| decode_encoded_words(keyword.trim()))
                        .filter(|keyword| !keyword.is_empty()),
                ),
                "importance" | "priority" => {
                    if let Some(importance) = Importance::parse(value) {
                        header.importance = importance;
                    }
                }
                "x-priority" => {
                    if let Some(importance) = Importance::parse_x_priority(value) {
                        header.importance = importance;
                    }
                }
                _ => header.unknown.add(name, value),
            }
        }

        header.raw = headers;
        header
    }

    /// The complete header collection, typed fields included.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.raw
    }

    /// First `From` mailbox.
    #[must_use]
    pub fn author(&self) -> Option<&EmailAddress> {
        self.from.first()
    }

    fn set_date(&mut self, value: &str) {
        self.date = Some(value.to_string());
        match parse_date(value) {
            Ok(instant) => self.date_sent = Some(instant),
            Err(e) => {
                tracing::warn!(date = value, "Unparseable Date header");
                self.defects.push(e);
            }
        }
    }

    fn set_content_type(&mut self, value: &str) {
        match ContentType::parse(value) {
            Ok(content_type) => self.content_type = content_type,
            Err(e) => {
                tracing::warn!(content_type = value, "Malformed Content-Type, using text/plain");
                self.defects.push(e);
            }
        }
    }
}

fn first_address(value: &str) -> Option<EmailAddress> {
    parse_address_list(value).into_iter().next()
}

fn strip_brackets(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
        .trim()
        .to_string()
}

/// Extracts `<id>` tokens; falls back to whitespace-separated words when
/// the sender left the brackets out.
fn parse_message_ids(value: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let id = rest[open + 1..open + close].trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
        rest = &rest[open + close + 1..];
    }

    if ids.is_empty() {
        ids = strip_comments(value)
            .split_whitespace()
            .map(str::to_string)
            .collect();
    }
    ids
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

    const HEADER: &str = "Return-Path: <test@test.com>\r\n\
        Received: from mail.example.com (mail.example.com [74.125.82.54])\r\n\
        \tby mx.test.com with ESMTP id 1234; Tue, 05 Oct 2010 04:02:07 +0200\r\n\
        X-TDC-Received-From-IP: 74.125.82.54\r\n\
        MIME-Version: 1.0\r\n\
        Date: Tue, 05 Oct 2010 04:02:06 +0200\r\n\
        Message-ID: <AANLkTim=test@mail.gmail.com>\r\n\
        Subject: Test =?ISO-8859-1?Q?=E6=F8=E5=C6=D8=C5?=\r\n\
        From: test <test@test.com>\r\n\
        To: test2@test.com\r\n\
        Content-Type: text/plain; charset=ISO-8859-1\r\n\
        \r\n";

    #[test]
    fn test_typed_fields() {
        let header = MessageHeader::parse(HEADER.as_bytes());

        assert_eq!(header.subject.as_deref(), Some("Test æøåÆØÅ"));
        assert_eq!(header.author().unwrap().display_name, "test");
        assert_eq!(header.author().unwrap().address, "test@test.com");
        assert_eq!(header.to.len(), 1);
        assert_eq!(header.to[0].address, "test2@test.com");
        assert!(header.to[0].display_name.is_empty());
        assert_eq!(header.return_path.as_ref().unwrap().address, "test@test.com");
        assert_eq!(header.message_id.as_deref(), Some("AANLkTim=test@mail.gmail.com"));
        assert_eq!(header.mime_version.as_deref(), Some("1.0"));
        assert_eq!(header.content_type.media_type(), "text/plain");
        assert_eq!(header.content_type.charset(), Some("ISO-8859-1"));
        assert_eq!(header.content_transfer_encoding, TransferEncoding::SevenBit);
        assert!(header.defects.is_empty());
    }

    #[test]
    fn test_date_literal_and_instant() {
        let header = MessageHeader::parse(HEADER.as_bytes());

        assert_eq!(header.date.as_deref(), Some("Tue, 05 Oct 2010 04:02:06 +0200"));
        assert_eq!(
            header.date_sent.unwrap().to_rfc3339(),
            "2010-10-05T02:02:06+00:00"
        );
    }

    #[test]
    fn test_unknown_bucket() {
        let header = MessageHeader::parse(HEADER.as_bytes());

        assert_eq!(header.unknown.get("X-TDC-Received-From-IP"), Some("74.125.82.54"));
        assert!(!header.unknown.contains("Subject"));
        assert_eq!(header.headers().len(), 10);
    }

    #[test]
    fn test_received_clauses() {
        let header = MessageHeader::parse(HEADER.as_bytes());
        let received = &header.received[0];

        assert_eq!(received.names.get("from").map(String::as_str), Some("mail.example.com"));
        assert_eq!(received.names.get("by").map(String::as_str), Some("mx.test.com"));
        assert_eq!(received.names.get("with").map(String::as_str), Some("ESMTP"));
        assert_eq!(received.names.get("id").map(String::as_str), Some("1234"));
        assert_eq!(
            received.date.unwrap().to_rfc3339(),
            "2010-10-05T02:02:07+00:00"
        );
    }

    #[test]
    fn test_no_content_type_is_text_plain() {
        let header = MessageHeader::parse(b"Subject: hi\r\n\r\n");
        assert_eq!(header.content_type.media_type(), "text/plain");
        assert_eq!(header.content_type.charset(), Some("us-ascii"));
        assert_eq!(header.content_transfer_encoding, TransferEncoding::SevenBit);
    }

    #[test]
    fn test_bad_date_is_recoverable() {
        let header = MessageHeader::parse(b"Date: someday\r\nSubject: still here\r\n");

        assert_eq!(header.date.as_deref(), Some("someday"));
        assert!(header.date_sent.is_none());
        assert_eq!(header.subject.as_deref(), Some("still here"));
        assert_eq!(header.defects, vec![Error::InvalidDate("someday".into())]);
    }

    #[test]
    fn test_bad_content_type_is_recoverable() {
        let header = MessageHeader::parse(b"Content-Type: garbage\r\n");
        assert_eq!(header.content_type.media_type(), "text/plain");
        assert_eq!(header.defects.len(), 1);
    }

    #[test]
    fn test_message_id_lists() {
        let header = MessageHeader::parse(
            b"In-Reply-To: <a@x>\r\nReferences: <a@x> <b@y>\r\n\t<c@z>\r\n",
        );
        assert_eq!(header.in_reply_to, vec!["a@x"]);
        assert_eq!(header.references, vec!["a@x", "b@y", "c@z"]);

        let header = MessageHeader::parse(b"References: a@x b@y\r\n");
        assert_eq!(header.references, vec!["a@x", "b@y"]);
    }

    #[test]
    fn test_importance() {
        assert_eq!(
            MessageHeader::parse(b"Importance: High\r\n").importance,
            Importance::High
        );
        assert_eq!(
            MessageHeader::parse(b"X-Priority: 5 (Lowest)\r\n").importance,
            Importance::Low
        );
        assert_eq!(
            MessageHeader::parse(b"Subject: x\r\n").importance,
            Importance::Normal
        );
    }

    #[test]
    fn test_keywords_and_disposition() {
        let header = MessageHeader::parse(
            b"Keywords: work, =?UTF-8?Q?caf=C3=A9?= ,\r\n\
              Content-Disposition: attachment; filename=\"a.pdf\"\r\n\
              Content-ID: <part1@x>\r\n",
        );
        assert_eq!(header.keywords, vec!["work", "café"]);
        assert_eq!(
            header.content_disposition.unwrap().filename().as_deref(),
            Some("a.pdf")
        );
        assert_eq!(header.content_id.as_deref(), Some("part1@x"));
    }

    #[test]
    fn test_latin1_header_bytes() {
        let header = MessageHeader::parse(b"Subject: K\xf8benhavn\r\n");
        assert_eq!(header.subject.as_deref(), Some("København"));
    }

    #[test]
    fn test_mixed_header_encodings() {
        let header = MessageHeader::parse(b"Subject: caf\xc3\xa9\r\nX-Old: \xe6\r\n\r\n");
        assert_eq!(header.subject.as_deref(), Some("café"));
        assert_eq!(header.unknown.get("X-Old"), Some("æ"));
        assert!(header.defects.is_empty());
    }

    #[test]
    fn test_malformed_line_recorded() {
        let header = MessageHeader::parse(b"Subject: ok\r\n>From nowhere\r\nTo: a@x.org\r\n");
        assert_eq!(header.subject.as_deref(), Some("ok"));
        assert_eq!(header.to.len(), 1);
        assert_eq!(
            header.defects,
            vec![Error::InvalidHeader(">From nowhere".into())]
        );
    }

    #[test]
    fn test_encoded_from() {
        let header =
            MessageHeader::parse(b"From: =?ISO-8859-1?Q?Kasper_F=F8ns?= <thefeds@spam.mail.dk>\r\n");
        assert_eq!(header.author().unwrap().display_name, "Kasper Føns");
    }

    #[test]
    fn test_group_and_comment_addresses() {
        let header = MessageHeader::parse(
            b"To: friends: a@x.org, b@x.org;\r\nCc: c@x.org (Carl)\r\n",
        );
        assert_eq!(header.to.len(), 2);
        assert_eq!(header.cc[0].display_name, "Carl");
    }
}
