//! POP3 connection management.
//!
//! This module provides:
//! - Configuration (host, port, security mode, timeouts)
//! - TLS/plaintext stream abstraction
//! - Framed line I/O with dot-unstuffing
//! - The session state machine

mod client;
mod config;
mod framed;
mod stream;

pub use client::Client;
pub use config::{Config, ConfigBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, Security};
pub use framed::{FramedStream, MAX_LINE_LENGTH};
pub use stream::{Pop3Stream, connect, connect_plain, connect_tls, create_tls_connector};
