//! Session state and authentication choices.

use std::fmt;

/// POP3 session state (RFC 1939 section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Transport attached, greeting not read yet.
    #[default]
    Disconnected,
    /// Greeting accepted, waiting for credentials.
    Authorization,
    /// Logged in; mailbox commands are allowed.
    Transaction,
    /// QUIT sent or the transport failed. Nothing more can be sent.
    Closed,
}

impl SessionState {
    /// Returns the state name as used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Authorization => "Authorization",
            Self::Transaction => "Transaction",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// `USER` followed by `PASS`.
    UserPass,
    /// `APOP` digest; requires a timestamp in the greeting.
    Apop,
    /// `APOP` when the greeting offers it, `USER`/`PASS` otherwise.
    #[default]
    Auto,
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
    fn test_defaults() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
        assert_eq!(AuthMethod::default(), AuthMethod::Auto);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Transaction.to_string(), "Transaction");
        assert_eq!(SessionState::Closed.to_string(), "Closed");
    }
}
