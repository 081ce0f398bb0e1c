//! Error types for POP3 operations.

use std::io;

use thiserror::Error;

use crate::types::SessionState;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during POP3 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport read or write failed, or timed out.
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// The server greeted with `-ERR`.
    #[error("Server refused connection: {0}")]
    NegativeGreeting(String),

    /// The server answered a command with `-ERR`.
    #[error("{command} rejected: {message}")]
    Rejected {
        /// Command verb.
        command: String,
        /// Text after `-ERR`.
        message: String,
    },

    /// Login failed. The session stays in the authorization state.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server does not know this message number, or it is deleted.
    #[error("No such message {id}: {message}")]
    NoSuchMessage {
        /// Message number that was asked for.
        id: u32,
        /// Text after `-ERR`.
        message: String,
    },

    /// A positive reply whose content could not be read.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A command argument would break the command line. Nothing was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The server broke the framing rules.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Command not allowed in the current session state. Nothing was sent.
    #[error("{command} not allowed in {state} state")]
    InvalidState {
        /// Command verb.
        command: &'static str,
        /// State the session was in.
        state: SessionState,
    },
}

impl Error {
    /// Creates a rejection error.
    #[must_use]
    pub fn rejected(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error ends the session.
    ///
    /// After a fatal error the client is in [`SessionState::Closed`].
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::Protocol(_)
                | Self::NegativeGreeting(_)
        )
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
    fn test_fatal_classification() {
        let io = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "closed"));
        assert!(io.is_fatal());
        assert!(Error::Protocol("bad status".into()).is_fatal());
        assert!(!Error::rejected("DELE", "already deleted").is_fatal());
        assert!(!Error::Parse("STAT".into()).is_fatal());
        assert!(!Error::Authentication("bad password".into()).is_fatal());
        assert!(!Error::InvalidArgument("USER".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::rejected("RSET", "no").to_string(),
            "RSET rejected: no"
        );
        assert_eq!(
            Error::InvalidState {
                command: "STAT",
                state: SessionState::Authorization,
            }
            .to_string(),
            "STAT not allowed in Authorization state"
        );
    }
}
