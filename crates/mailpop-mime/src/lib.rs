//! # mailpop-mime
//!
//! Lenient MIME decoding for messages retrieved from a mail server.
//!
//! ## Features
//!
//! - **Header parsing**: ordered, case-insensitive header collection with a
//!   typed view (addresses, dates, content type, trace fields)
//! - **Encoded words**: RFC 2047 `=?charset?Q|B?...?=` in subjects and names
//! - **Charsets**: any label `encoding_rs` knows, with a Latin-1 fallback
//! - **Transfer encodings**: Base64 and Quoted-Printable, tolerant of the
//!   mistakes real senders make
//! - **Multipart**: recursive body tree with a fixed nesting limit
//!
//! Parsing never fails as a whole. A bad Date is recorded as a defect on the
//! header, and a multipart body that cannot be split becomes an opaque part.
//!
//! ## Quick Start
//!
//! ```
//! use mailpop_mime::Message;
//!
//! let raw = b"From: Sender <sender@example.com>\r\n\
//!             Subject: =?ISO-8859-1?Q?Gr=FC=DFe?=\r\n\
//!             Date: Tue, 05 Oct 2010 04:02:06 +0200\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.subject(), Some("Grüße"));
//! assert_eq!(message.header().author().unwrap().display_name, "Sender");
//! assert_eq!(message.body_text(), Some("Hello, World!"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod date;
mod disposition;
mod error;
mod header;
mod message;
mod message_header;
mod transfer_encoding;

pub mod encoding;

pub use address::{EmailAddress, parse_address_list};
pub use content_type::{ContentType, DEFAULT_CHARSET};
pub use date::parse_date;
pub use disposition::ContentDisposition;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, MAX_DEPTH, Message, MessagePart};
pub use message_header::{Importance, MessageHeader, Received};
pub use transfer_encoding::TransferEncoding;
