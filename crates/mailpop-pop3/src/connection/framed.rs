//! Framed I/O for the POP3 protocol.
//!
//! POP3 exchanges CRLF-terminated lines. Multi-line responses end with a
//! line holding a single `.`, and lines starting with `.` arrive with the
//! dot doubled (RFC 1939 section 3).

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Line-oriented connection to a POP3 server.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    io_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream without an I/O timeout.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            io_timeout: None,
        }
    }

    /// Sets the timeout applied to every line read and write.
    pub const fn set_io_timeout(&mut self, timeout: Option<Duration>) {
        self.io_timeout = timeout;
    }

    /// Returns the I/O timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// Reads one line and returns it without its line terminator.
    ///
    /// A bare LF is accepted as terminator as well as CRLF.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let timeout = self.io_timeout;
        let mut line = timed(timeout, self.read_raw_line()).await?;

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Reads a multi-line block up to its terminating `.` line.
    ///
    /// One leading dot is removed from each dot-stuffed line. Lines are
    /// joined with CRLF; the result has no trailing CRLF.
    pub async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut block = Vec::new();
        let mut first = true;

        loop {
            let line = self.read_line().await?;
            if line == b"." {
                break;
            }

            if !first {
                block.extend_from_slice(b"\r\n");
            }
            first = false;

            let content = line.strip_prefix(b".").unwrap_or(&line);
            block.extend_from_slice(content);
        }

        tracing::trace!(octets = block.len(), "Read multi-line block");
        Ok(block)
    }

    /// Writes a serialized command and flushes.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let timeout = self.io_timeout;
        let stream = self.reader.get_mut();
        let buffer = &self.write_buffer;
        timed(timeout, async move {
            stream.write_all(buffer).await?;
            stream.flush().await?;
            Ok(())
        })
        .await
    }

    /// Shuts down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    /// Reads up to and including the next LF.
    async fn read_raw_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Connection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = find_lf(buf) {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                break;
            }

            // No LF yet, consume all and continue
            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }

        if line.len() > MAX_LINE_LENGTH + 2 {
            return Err(Error::Protocol("line too long".to_string()));
        }

        Ok(line)
    }
}

/// Runs `fut`, failing with a timed-out connection error after `timeout`.
async fn timed<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(duration) => tokio::time::timeout(duration, fut).await.map_err(|_| {
            Error::Connection(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no response within {duration:?}"),
            ))
        })?,
        None => fut.await,
    }
}

/// Finds the position of LF in a buffer.
fn find_lf(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
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
    use tokio_test::io::Builder;

    #[test]
    fn test_find_lf() {
        assert_eq!(find_lf(b"hello\r\n"), Some(6));
        assert_eq!(find_lf(b"\n"), Some(0));
        assert_eq!(find_lf(b"no newline"), None);
    }

    #[tokio::test]
    async fn test_read_line_strips_terminator() {
        let mock = Builder::new().read(b"+OK ready\r\n").read(b"bare lf\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap(), b"+OK ready");
        assert_eq!(framed.read_line().await.unwrap(), b"bare lf");
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new().read(b"+OK PO").read(b"P3 ready\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap(), b"+OK POP3 ready");
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mock = Builder::new().read(b"+OK partial").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Connection(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_read_multiline_unstuffs_once() {
        let mock = Builder::new()
            .read(b"Subject: dots\r\n\r\n..\r\n...two\r\n.one\r\nplain\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let block = framed.read_multiline().await.unwrap();
        assert_eq!(block, b"Subject: dots\r\n\r\n.\r\n..two\r\none\r\nplain");
    }

    #[tokio::test]
    async fn test_read_multiline_keeps_trailing_empty_line() {
        let mock = Builder::new().read(b"line\r\n\r\n.\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_multiline().await.unwrap(), b"line\r\n");
    }

    #[tokio::test]
    async fn test_read_multiline_empty_block() {
        let mock = Builder::new().read(b".\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert!(framed.read_multiline().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"STAT\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"STAT\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let result = framed.read_line().await;
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(5)).build();
        let mut framed = FramedStream::new(mock);
        framed.set_io_timeout(Some(Duration::from_millis(10)));

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Connection(ref e) if e.kind() == io::ErrorKind::TimedOut));
    }
}
