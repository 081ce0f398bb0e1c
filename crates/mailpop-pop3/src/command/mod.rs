//! POP3 command serialization.

use std::fmt;

use crate::{Error, Result};

/// POP3 command (RFC 1939, RFC 2449, RFC 2595).
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Name the mailbox
    User {
        /// Mailbox name
        name: String,
    },
    /// PASS - Server/mailbox password
    Pass {
        /// Password
        password: String,
    },
    /// APOP - Digest login
    Apop {
        /// Mailbox name
        name: String,
        /// Lower-case hex MD5 of timestamp and secret
        digest: String,
    },
    /// STAT - Message count and mailbox size
    Stat,
    /// LIST - Scan listing, for one message or all
    List(Option<u32>),
    /// UIDL - Unique-id listing, for one message or all
    Uidl(Option<u32>),
    /// RETR - Whole message
    Retr(u32),
    /// TOP - Header plus the first `lines` body lines
    Top {
        /// Message number
        id: u32,
        /// Body lines to include
        lines: u32,
    },
    /// DELE - Mark for deletion
    Dele(u32),
    /// RSET - Unmark all deletions
    Rset,
    /// NOOP - No operation
    Noop,
    /// QUIT - Commit and close
    Quit,
    /// CAPA - Capability listing
    Capa,
    /// STLS - Upgrade to TLS
    Stls,
}

impl Command {
    /// Builds an `APOP` command from the greeting timestamp and the shared
    /// secret (RFC 1939 section 7).
    ///
    /// The timestamp is used as captured, angle brackets included.
    #[must_use]
    pub fn apop(name: &str, timestamp: &str, secret: &str) -> Self {
        let digest = md5::compute(format!("{timestamp}{secret}"));
        Self::Apop {
            name: name.to_string(),
            digest: format!("{digest:x}"),
        }
    }

    /// Returns the command verb.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::User { .. } => "USER",
            Self::Pass { .. } => "PASS",
            Self::Apop { .. } => "APOP",
            Self::Stat => "STAT",
            Self::List(_) => "LIST",
            Self::Uidl(_) => "UIDL",
            Self::Retr(_) => "RETR",
            Self::Top { .. } => "TOP",
            Self::Dele(_) => "DELE",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
            Self::Capa => "CAPA",
            Self::Stls => "STLS",
        }
    }

    /// Checks that no argument can end the command line early.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if a mailbox name or password holds
    /// CR, LF or NUL.
    pub fn validate(&self) -> Result<()> {
        let argument = match self {
            Self::User { name } | Self::Apop { name, .. } => name,
            Self::Pass { password } => password,
            _ => return Ok(()),
        };
        if argument.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
            return Err(Error::InvalidArgument(format!(
                "{} argument contains CR, LF or NUL",
                self.verb()
            )));
        }
        Ok(())
    }

    /// Serializes the command to bytes, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(self.verb().as_bytes());

        match self {
            Self::User { name } => {
                buf.push(b' ');
                buf.extend_from_slice(name.as_bytes());
            }
            Self::Pass { password } => {
                buf.push(b' ');
                buf.extend_from_slice(password.as_bytes());
            }
            Self::Apop { name, digest } => {
                buf.extend_from_slice(format!(" {name} {digest}").as_bytes());
            }
            Self::List(Some(id)) | Self::Uidl(Some(id)) | Self::Retr(id) | Self::Dele(id) => {
                buf.extend_from_slice(format!(" {id}").as_bytes());
            }
            Self::Top { id, lines } => {
                buf.extend_from_slice(format!(" {id} {lines}").as_bytes());
            }
            Self::Stat
            | Self::List(None)
            | Self::Uidl(None)
            | Self::Rset
            | Self::Noop
            | Self::Quit
            | Self::Capa
            | Self::Stls => {}
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Formats the command as it appears on the wire, minus CRLF, with
/// secrets replaced.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass { .. } => write!(f, "PASS <redacted>"),
            Self::Apop { name, .. } => write!(f, "APOP {name} <redacted>"),
            _ => {
                let wire = self.serialize();
                let line = wire.strip_suffix(b"\r\n").unwrap_or(&wire);
                f.write_str(&String::from_utf8_lossy(line))
            }
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({self})")
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
    fn test_auth_commands() {
        let user = Command::User {
            name: "mrose".to_string(),
        };
        assert_eq!(user.serialize(), b"USER mrose\r\n");

        let pass = Command::Pass {
            password: "tanstaaf".to_string(),
        };
        assert_eq!(pass.serialize(), b"PASS tanstaaf\r\n");

        let apop = Command::Apop {
            name: "mrose".to_string(),
            digest: "c4c9334bac560ecc979e58001b3e22fb".to_string(),
        };
        assert_eq!(
            apop.serialize(),
            b"APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n"
        );
    }

    #[test]
    fn test_apop_digest() {
        let apop = Command::apop("mrose", "<1896.697170952@dbc.mtview.ca.us>", "tanstaaf");
        assert_eq!(
            apop,
            Command::Apop {
                name: "mrose".to_string(),
                digest: "c4c9334bac560ecc979e58001b3e22fb".to_string(),
            }
        );
    }

    #[test]
    fn test_mailbox_commands() {
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(Command::List(None).serialize(), b"LIST\r\n");
        assert_eq!(Command::List(Some(9)).serialize(), b"LIST 9\r\n");
        assert_eq!(Command::Uidl(None).serialize(), b"UIDL\r\n");
        assert_eq!(Command::Uidl(Some(2)).serialize(), b"UIDL 2\r\n");
        assert_eq!(Command::Retr(1).serialize(), b"RETR 1\r\n");
        assert_eq!(Command::Top { id: 7, lines: 0 }.serialize(), b"TOP 7 0\r\n");
        assert_eq!(Command::Dele(2).serialize(), b"DELE 2\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
        assert_eq!(Command::Capa.serialize(), b"CAPA\r\n");
        assert_eq!(Command::Stls.serialize(), b"STLS\r\n");
    }

    #[test]
    fn test_validate_rejects_line_breaks() {
        let user = Command::User {
            name: "bob\r\nDELE 1".to_string(),
        };
        assert!(matches!(user.validate(), Err(Error::InvalidArgument(_))));

        let pass = Command::Pass {
            password: "pw\0".to_string(),
        };
        let err = pass.validate().unwrap_err();
        assert!(!err.to_string().contains("pw"));

        let apop = Command::apop("bob\n", "<1.2@host>", "secret");
        assert!(apop.validate().is_err());

        assert!(Command::User {
            name: "bob smith".to_string()
        }
        .validate()
        .is_ok());
        assert!(Command::Dele(1).validate().is_ok());
    }

    #[test]
    fn test_display_redacts_secrets() {
        let pass = Command::Pass {
            password: "tanstaaf".to_string(),
        };
        assert_eq!(pass.to_string(), "PASS <redacted>");
        assert!(!format!("{pass:?}").contains("tanstaaf"));

        let apop = Command::Apop {
            name: "mrose".to_string(),
            digest: "c4c9334bac560ecc979e58001b3e22fb".to_string(),
        };
        assert_eq!(apop.to_string(), "APOP mrose <redacted>");

        assert_eq!(Command::Top { id: 3, lines: 10 }.to_string(), "TOP 3 10");
    }
}
