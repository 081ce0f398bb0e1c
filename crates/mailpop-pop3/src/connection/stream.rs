//! Transports for POP3: plain TCP or TLS over TCP.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::{Error, Result};

/// Connected POP3 transport.
pub enum Pop3Stream {
    /// Unencrypted TCP (port 110, before `STLS`).
    Plain(TcpStream),
    /// TLS session over TCP. Boxed: the TLS state is large.
    Tls(Box<TlsStream<TcpStream>>),
}

impl Pop3Stream {
    /// Runs the TLS handshake on a plain stream after the server accepted
    /// `STLS`.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => handshake(tcp, host).await,
            Self::Tls(_) => Err(Error::Protocol("STLS on a TLS stream".to_string())),
        }
    }

    /// Returns true once the transport is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for Pop3Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Pop3Stream::Plain"),
            Self::Tls(_) => f.write_str("Pop3Stream::Tls"),
        }
    }
}

impl AsyncRead for Pop3Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Pop3Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// TLS connector trusting the Mozilla root set from `webpki-roots`.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

async fn handshake(tcp: TcpStream, host: &str) -> Result<Pop3Stream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = create_tls_connector().connect(server_name, tcp).await?;
    Ok(Pop3Stream::Tls(Box::new(tls)))
}

/// Opens the transport described by `config` within its `connect_timeout`.
///
/// [`Security::Implicit`] completes the TLS handshake here.
/// [`Security::StartTls`] returns a plain stream; the client upgrades it
/// after reading the greeting.
pub async fn connect(config: &Config) -> Result<Pop3Stream> {
    let attempt = async {
        match config.security {
            Security::Implicit => connect_tls(&config.host, config.port).await,
            Security::None | Security::StartTls => connect_plain(&config.host, config.port).await,
        }
    };

    match tokio::time::timeout(config.connect_timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(Error::Connection(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out", config.address()),
        ))),
    }
}

/// Opens a TCP connection and immediately negotiates TLS (port 995).
pub async fn connect_tls(host: &str, port: u16) -> Result<Pop3Stream> {
    let tcp = TcpStream::connect((host, port)).await?;
    let stream = handshake(tcp, host).await?;
    tracing::debug!(host, port, "TLS connection established");
    Ok(stream)
}

/// Opens a plain TCP connection (for `STLS` or local testing).
pub async fn connect_plain(host: &str, port: u16) -> Result<Pop3Stream> {
    let tcp = TcpStream::connect((host, port)).await?;
    tracing::debug!(host, port, "TCP connection established");
    Ok(Pop3Stream::Plain(tcp))
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
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_connect_plain_for_starttls() {
        let (_listener, port) = local_listener().await;
        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::StartTls)
            .build();

        let stream = connect(&config).await.unwrap();
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_upgrade_rejects_invalid_server_name() {
        let (_listener, port) = local_listener().await;
        let stream = connect_plain("127.0.0.1", port).await.unwrap();

        let err = stream.upgrade_to_tls("not a host name").await.unwrap_err();
        assert!(matches!(err, Error::InvalidDnsName(_)));
        assert!(err.is_fatal());
    }
}
