//! Connection settings for a POP3 server.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// Default bound on TCP connect plus TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on each line read or command write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// How the transport is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plain TCP on port 110. Credentials travel in the clear.
    None,
    /// Plain TCP on port 110, upgraded with `STLS` before login.
    StartTls,
    /// TLS from the first byte, port 995.
    #[default]
    Implicit,
}

impl Security {
    /// Well-known port for this mode (RFC 1939, RFC 8314).
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 110,
            Self::Implicit => 995,
        }
    }

    /// Lower-case name, as accepted by [`Security::from_str`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::StartTls => "starttls",
            Self::Implicit => "tls",
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "starttls" | "stls" => Ok(Self::StartTls),
            "tls" | "ssl" | "implicit" => Ok(Self::Implicit),
            other => Err(Error::Parse(format!("unknown security mode {other:?}"))),
        }
    }
}

/// Where and how to reach a POP3 server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server hostname, also used as the TLS server name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport security.
    pub security: Security,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on each line read or command write.
    pub io_timeout: Duration,
}

impl Config {
    /// Implicit TLS on port 995 with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Starts a builder for `host`.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// `host:port`, as passed to the TCP connect.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`Config`]. The port follows the security mode unless set.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ConfigBuilder {
    /// Starts with implicit TLS and default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the transport security.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-line I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let port = self.port.unwrap_or(self.security.default_port());
        Config {
            host: self.host,
            port,
            security: self.security,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
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
    fn test_pop3_ports() {
        assert_eq!(Security::None.default_port(), 110);
        assert_eq!(Security::StartTls.default_port(), 110);
        assert_eq!(Security::Implicit.default_port(), 995);
    }

    #[test]
    fn test_security_from_str() {
        assert_eq!("STARTTLS".parse::<Security>().unwrap(), Security::StartTls);
        assert_eq!(" ssl ".parse::<Security>().unwrap(), Security::Implicit);
        assert_eq!("plain".parse::<Security>().unwrap(), Security::None);
        assert!(matches!("pop3s".parse::<Security>(), Err(Error::Parse(_))));

        for mode in [Security::None, Security::StartTls, Security::Implicit] {
            assert_eq!(mode.to_string().parse::<Security>().unwrap(), mode);
        }
    }

    #[test]
    fn test_new_uses_implicit_tls() {
        let config = Config::new("pop.example.com");
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.address(), "pop.example.com:995");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
    }

    #[test]
    fn test_port_follows_security() {
        let config = Config::builder("pop.example.com")
            .security(Security::StartTls)
            .build();
        assert_eq!(config.port, 110);

        let config = Config::builder("pop.example.com")
            .port(1100)
            .security(Security::None)
            .io_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.address(), "pop.example.com:1100");
        assert_eq!(config.io_timeout, Duration::from_secs(5));
    }
}
