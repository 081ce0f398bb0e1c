//! # mailpop-pop3
//!
//! An async POP3 client implementing RFC 1939, with APOP login, `CAPA`
//! (RFC 2449) and `STLS` (RFC 2595). Retrieved messages are decoded with
//! [`mailpop_mime`].
//!
//! ## Features
//!
//! - **Runtime-checked session states**: commands sent in the wrong state
//!   fail with [`Error::InvalidState`] before anything reaches the wire
//! - **Correct framing**: multi-line responses are read up to the lone `.`
//!   line and dot-unstuffed exactly once
//! - **Any transport**: the client is generic over
//!   `AsyncRead + AsyncWrite + Unpin`; [`connection::connect`] provides
//!   plain TCP and rustls TLS streams
//! - **Fail closed**: a transport failure or a framing violation moves the
//!   session to [`SessionState::Closed`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpop_pop3::{AuthMethod, Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> mailpop_pop3::Result<()> {
//!     let config = Config::new("pop.example.com");
//!     let mut client = Client::open(&config).await?;
//!     client.authenticate("user", "password", AuthMethod::Auto).await?;
//!
//!     let (count, octets) = client.stat().await?;
//!     println!("{count} messages, {octets} octets");
//!
//!     for id in 1..=count {
//!         let message = client.fetch_message(id).await?;
//!         println!("{id}: {}", message.subject().unwrap_or("(no subject)"));
//!     }
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ── connect() ──→ Authorization ── authenticate() ──→ Transaction
//!                                     │                                  │
//!                                     └──────── disconnect() ────────────┴──→ Closed
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Client, Config, ConfigBuilder, Security};
pub use error::{Error, Result};
pub use types::{AuthMethod, ListEntry, Reply, ServerGreeting, SessionState, Status, UidEntry};

pub use mailpop_mime;
