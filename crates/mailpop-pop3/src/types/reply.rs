//! Single-line server replies.

use std::fmt;

/// Status indicator of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `+OK`
    Ok,
    /// `-ERR`
    Err,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("+OK"),
            Self::Err => f.write_str("-ERR"),
        }
    }
}

/// A status line: indicator plus the optional text after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Positive or negative.
    pub status: Status,
    /// Text following the indicator, without the separating space.
    pub text: String,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    /// Returns true for `+OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok)
    }
}

/// The banner sent by the server when the connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerGreeting {
    /// Banner text after `+OK`.
    pub text: String,
    /// APOP timestamp including its angle brackets, e.g.
    /// `<1896.697170952@dbc.mtview.ca.us>`.
    pub timestamp: Option<String>,
}

impl ServerGreeting {
    /// Returns true if the server offers APOP.
    #[must_use]
    pub const fn supports_apop(&self) -> bool {
        self.timestamp.is_some()
    }
}
