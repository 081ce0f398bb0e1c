//! POP3 client state machine.

use std::fmt;
use std::time::Duration;

use mailpop_mime::{Message, MessageHeader};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, trace, warn};

use super::config::{Config, Security};
use super::framed::FramedStream;
use super::stream::{Pop3Stream, connect};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{parse_list_entry, parse_reply, parse_stat, parse_timestamp, parse_uid_entry};
use crate::types::{AuthMethod, ListEntry, Reply, ServerGreeting, SessionState, UidEntry};

const AUTHORIZATION: &[SessionState] = &[SessionState::Authorization];
const TRANSACTION: &[SessionState] = &[SessionState::Transaction];
const CONNECTED: &[SessionState] = &[SessionState::Authorization, SessionState::Transaction];

/// POP3 client over any duplex byte stream.
///
/// Every command takes `&mut self` and returns only after its whole
/// response has been read, so at most one command is in flight. A fatal
/// error (see [`Error::is_fatal`]) moves the client to
/// [`SessionState::Closed`].
pub struct Client<S> {
    stream: FramedStream<S>,
    state: SessionState,
    greeting: Option<ServerGreeting>,
}

impl<S> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("greeting", &self.greeting)
            .finish_non_exhaustive()
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already connected stream. The greeting is not read yet.
    pub fn new(stream: S) -> Self {
        Self {
            stream: FramedStream::new(stream),
            state: SessionState::Disconnected,
            greeting: None,
        }
    }

    /// Wraps a stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// See [`Client::connect`].
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self::new(stream);
        client.connect().await?;
        Ok(client)
    }

    /// Sets the timeout applied to every line read and command write.
    pub const fn set_io_timeout(&mut self, timeout: Option<Duration>) {
        self.stream.set_io_timeout(timeout);
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the server greeting, once read.
    #[must_use]
    pub const fn greeting(&self) -> Option<&ServerGreeting> {
        self.greeting.as_ref()
    }

    /// Returns true if the greeting carried an APOP timestamp.
    #[must_use]
    pub fn apop_supported(&self) -> bool {
        self.greeting.as_ref().is_some_and(ServerGreeting::supports_apop)
    }

    /// Reads the server greeting and enters the authorization state.
    ///
    /// # Errors
    ///
    /// Returns `Error::NegativeGreeting` if the server greets with `-ERR`,
    /// or a connection or protocol error if the line cannot be read. All of
    /// these close the session.
    pub async fn connect(&mut self) -> Result<()> {
        self.require("greeting", &[SessionState::Disconnected])?;

        let result = self.read_reply().await;
        let reply = self.track(result)?;
        if !reply.is_ok() {
            warn!(response = %reply.text, "Server refused connection");
            return self.track(Err(Error::NegativeGreeting(reply.text)));
        }

        let timestamp = parse_timestamp(&reply.text);
        debug!(apop = timestamp.is_some(), "Greeting received");
        self.greeting = Some(ServerGreeting {
            text: reply.text,
            timestamp,
        });
        self.transition(SessionState::Authorization);
        Ok(())
    }

    /// Logs in and enters the transaction state.
    ///
    /// [`AuthMethod::Auto`] uses APOP when the greeting offered it and
    /// USER/PASS otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` if APOP was requested but not
    /// offered, or if the server rejects any step. The session then stays in
    /// the authorization state.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
        method: AuthMethod,
    ) -> Result<()> {
        let timestamp = self.greeting.as_ref().and_then(|g| g.timestamp.clone());
        let use_apop = match method {
            AuthMethod::Apop => true,
            AuthMethod::UserPass => false,
            AuthMethod::Auto => timestamp.is_some(),
        };

        if use_apop {
            self.require("APOP", AUTHORIZATION)?;
            let Some(timestamp) = timestamp else {
                return Err(Error::Authentication(
                    "server does not support APOP".to_string(),
                ));
            };
            self.login_step(&Command::apop(username, &timestamp, password))
                .await?;
        } else {
            self.require("USER", AUTHORIZATION)?;
            let user = Command::User {
                name: username.to_string(),
            };
            let pass = Command::Pass {
                password: password.to_string(),
            };
            // Both lines are checked before USER goes out.
            user.validate()?;
            pass.validate()?;
            self.login_step(&user).await?;
            self.login_step(&pass).await?;
        }

        self.transition(SessionState::Transaction);
        Ok(())
    }

    /// Lists the server's capabilities (RFC 2449).
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server does not implement `CAPA`.
    pub async fn capabilities(&mut self) -> Result<Vec<String>> {
        self.require("CAPA", CONNECTED)?;
        self.expect_ok(&Command::Capa).await?;
        let block = self.read_block().await?;
        Ok(block_lines(&block).collect())
    }

    /// Returns the message count and mailbox size in octets.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if the reply lacks the two numbers.
    pub async fn stat(&mut self) -> Result<(u32, u64)> {
        self.require("STAT", TRANSACTION)?;
        let reply = self.expect_ok(&Command::Stat).await?;
        parse_stat(&reply.text)
    }

    /// Returns the scan listing of all messages, ordered by message number.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if a listing line is malformed.
    pub async fn list(&mut self) -> Result<Vec<ListEntry>> {
        self.require("LIST", TRANSACTION)?;
        self.expect_ok(&Command::List(None)).await?;
        let block = self.read_block().await?;

        let mut entries = block_lines(&block)
            .map(|line| parse_list_entry(&line))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    /// Returns the size of every message, ordered by message number.
    ///
    /// # Errors
    ///
    /// See [`Client::list`].
    pub async fn list_sizes(&mut self) -> Result<Vec<u64>> {
        let entries = self.list().await?;
        Ok(entries.into_iter().map(|entry| entry.octets).collect())
    }

    /// Returns the size of one message.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoSuchMessage` if the server rejects the number.
    pub async fn list_size(&mut self, id: u32) -> Result<u64> {
        self.require("LIST", TRANSACTION)?;
        let reply = self.send(&Command::List(Some(id))).await?;
        if !reply.is_ok() {
            return Err(no_such_message(id, reply));
        }
        Ok(parse_list_entry(&reply.text)?.octets)
    }

    /// Returns the unique-id listing of all messages, ordered by message
    /// number.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if a listing line is malformed.
    pub async fn uidl(&mut self) -> Result<Vec<UidEntry>> {
        self.require("UIDL", TRANSACTION)?;
        self.expect_ok(&Command::Uidl(None)).await?;
        let block = self.read_block().await?;

        let mut entries = block_lines(&block)
            .map(|line| parse_uid_entry(&line))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    /// Returns the unique id of every message, ordered by message number.
    ///
    /// # Errors
    ///
    /// See [`Client::uidl`].
    pub async fn unique_ids(&mut self) -> Result<Vec<String>> {
        let entries = self.uidl().await?;
        Ok(entries.into_iter().map(|entry| entry.uid).collect())
    }

    /// Returns the unique id of one message.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoSuchMessage` if the server rejects the number.
    pub async fn unique_id(&mut self, id: u32) -> Result<String> {
        self.require("UIDL", TRANSACTION)?;
        let reply = self.send(&Command::Uidl(Some(id))).await?;
        if !reply.is_ok() {
            return Err(no_such_message(id, reply));
        }
        Ok(parse_uid_entry(&reply.text)?.uid)
    }

    /// Retrieves a whole message as raw bytes, dot-stuffing removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server refuses the number.
    pub async fn retrieve(&mut self, id: u32) -> Result<Vec<u8>> {
        self.require("RETR", TRANSACTION)?;
        self.expect_ok(&Command::Retr(id)).await?;
        self.read_block().await
    }

    /// Retrieves the header and the first `lines` body lines of a message.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server refuses the number.
    pub async fn retrieve_headers(&mut self, id: u32, lines: u32) -> Result<Vec<u8>> {
        self.require("TOP", TRANSACTION)?;
        self.expect_ok(&Command::Top { id, lines }).await?;
        self.read_block().await
    }

    /// Retrieves and decodes a message.
    ///
    /// # Errors
    ///
    /// See [`Client::retrieve`]. Decoding itself does not fail.
    pub async fn fetch_message(&mut self, id: u32) -> Result<Message> {
        let raw = self.retrieve(id).await?;
        Ok(Message::parse(&raw))
    }

    /// Retrieves and decodes only the header of a message.
    ///
    /// # Errors
    ///
    /// See [`Client::retrieve_headers`].
    pub async fn fetch_headers(&mut self, id: u32) -> Result<MessageHeader> {
        let raw = self.retrieve_headers(id, 0).await?;
        Ok(MessageHeader::parse(&raw))
    }

    /// Marks a message for deletion when the session ends.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server refuses.
    pub async fn delete(&mut self, id: u32) -> Result<()> {
        self.require("DELE", TRANSACTION)?;
        self.expect_ok(&Command::Dele(id)).await?;
        Ok(())
    }

    /// Marks every message in the mailbox for deletion.
    ///
    /// # Errors
    ///
    /// Stops at the first failing `STAT` or `DELE`.
    pub async fn delete_all(&mut self) -> Result<()> {
        let (count, _) = self.stat().await?;
        for id in 1..=count {
            self.delete(id).await?;
        }
        Ok(())
    }

    /// Unmarks all messages marked for deletion.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server refuses.
    pub async fn reset(&mut self) -> Result<()> {
        self.require("RSET", TRANSACTION)?;
        self.expect_ok(&Command::Rset).await?;
        Ok(())
    }

    /// Sends `NOOP`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server refuses.
    pub async fn no_op(&mut self) -> Result<()> {
        self.require("NOOP", TRANSACTION)?;
        self.expect_ok(&Command::Noop).await?;
        Ok(())
    }

    /// Sends `QUIT`, committing deletions, and closes the session.
    ///
    /// The client is [`SessionState::Closed`] afterwards whatever the
    /// outcome. Calling this on a session that never connected or is
    /// already closed sends nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server answered `-ERR`, or the
    /// transport error if `QUIT` could not be exchanged.
    pub async fn disconnect(&mut self) -> Result<()> {
        if matches!(
            self.state,
            SessionState::Disconnected | SessionState::Closed
        ) {
            self.transition(SessionState::Closed);
            return Ok(());
        }

        let result = self.send(&Command::Quit).await;
        self.transition(SessionState::Closed);
        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "Shutdown after QUIT failed");
        }

        let reply = result?;
        if reply.is_ok() {
            Ok(())
        } else {
            warn!(response = %reply.text, "QUIT rejected");
            Err(Error::rejected("QUIT", reply.text))
        }
    }

    fn require(&self, command: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                command,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Session state changed");
            self.state = next;
        }
    }

    /// Closes the session if `result` carries a fatal error.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_fatal()
        {
            warn!(error = %e, "Fatal error, closing session");
            self.transition(SessionState::Closed);
        }
        result
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let line = self.stream.read_line().await?;
        trace!(response = %String::from_utf8_lossy(&line), "Received");
        parse_reply(&line)
    }

    /// Sends a command and reads its status line.
    async fn send(&mut self, command: &Command) -> Result<Reply> {
        command.validate()?;
        debug!(command = %command, "Sending command");
        let result = async {
            self.stream.write_command(&command.serialize()).await?;
            self.read_reply().await
        }
        .await;
        self.track(result)
    }

    /// Sends a command, turning `-ERR` into `Error::Rejected`.
    async fn expect_ok(&mut self, command: &Command) -> Result<Reply> {
        let reply = self.send(command).await?;
        if reply.is_ok() {
            Ok(reply)
        } else {
            warn!(command = command.verb(), response = %reply.text, "Command rejected");
            Err(Error::rejected(command.verb(), reply.text))
        }
    }

    async fn login_step(&mut self, command: &Command) -> Result<()> {
        let reply = self.send(command).await?;
        if reply.is_ok() {
            Ok(())
        } else {
            warn!(command = command.verb(), response = %reply.text, "Login rejected");
            Err(Error::Authentication(format!(
                "{} rejected: {}",
                command.verb(),
                reply.text
            )))
        }
    }

    async fn read_block(&mut self) -> Result<Vec<u8>> {
        let result = self.stream.read_multiline().await;
        self.track(result)
    }
}

impl Client<Pop3Stream> {
    /// Connects as described by `config` and reads the greeting.
    ///
    /// With [`Security::StartTls`] the session is upgraded before it is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, the greeting or the upgrade fails.
    pub async fn open(config: &Config) -> Result<Self> {
        let stream = connect(config).await?;
        let mut client = Self::new(stream);
        client.set_io_timeout(Some(config.io_timeout));
        client.connect().await?;

        if config.security == Security::StartTls {
            client = client.stls(&config.host).await?;
        }
        Ok(client)
    }

    /// Upgrades the session to TLS with `STLS` (RFC 2595).
    ///
    /// # Errors
    ///
    /// Returns `Error::Rejected` if the server refuses, or a TLS error if
    /// the handshake fails.
    pub async fn stls(mut self, host: &str) -> Result<Self> {
        self.require("STLS", AUTHORIZATION)?;
        self.expect_ok(&Command::Stls).await?;

        let timeout = self.stream.io_timeout();
        let upgraded = self.stream.into_inner().upgrade_to_tls(host).await?;
        let mut stream = FramedStream::new(upgraded);
        stream.set_io_timeout(timeout);

        debug!(host, "Session upgraded to TLS");
        Ok(Self {
            stream,
            state: self.state,
            greeting: self.greeting,
        })
    }
}

fn no_such_message(id: u32, reply: Reply) -> Error {
    warn!(id, response = %reply.text, "No such message");
    Error::NoSuchMessage {
        id,
        message: reply.text,
    }
}

/// Splits a multi-line block into its non-empty lines.
fn block_lines(block: &[u8]) -> impl Iterator<Item = String> + '_ {
    block
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| String::from_utf8_lossy(line).into_owned())
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
    use tokio_test::io::{Builder, Mock};

    const GREETING: &[u8] = b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n";

    /// Builder pre-loaded with a greeting and a USER/PASS login.
    fn logged_in() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"+OK ready\r\n")
            .write(b"USER user\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked\r\n");
        builder
    }

    async fn login(mock: Mock) -> Client<Mock> {
        let mut client = Client::from_stream(mock).await.unwrap();
        client
            .authenticate("user", "secret", AuthMethod::UserPass)
            .await
            .unwrap();
        client
    }

    #[test]
    fn test_block_lines() {
        let lines: Vec<String> = block_lines(b"1 120\r\n2 200\r\n\r\n").collect();
        assert_eq!(lines, vec!["1 120", "2 200"]);
        assert_eq!(block_lines(b"").count(), 0);
    }

    #[tokio::test]
    async fn test_connect_captures_timestamp() {
        let mock = Builder::new().read(GREETING).build();
        let mut client = Client::new(mock);
        assert_eq!(client.state(), SessionState::Disconnected);

        client.connect().await.unwrap();
        assert_eq!(client.state(), SessionState::Authorization);
        assert!(client.apop_supported());
        assert_eq!(
            client.greeting().unwrap().timestamp.as_deref(),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );
    }

    #[tokio::test]
    async fn test_negative_greeting_closes() {
        let mock = Builder::new().read(b"-ERR go away\r\n").build();
        let mut client = Client::new(mock);

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, Error::NegativeGreeting(ref text) if text == "go away"));
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_twice_is_invalid() {
        let mock = Builder::new().read(b"+OK\r\n").build();
        let mut client = Client::from_stream(mock).await.unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_apop_login() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n")
            .read(b"+OK mrose's maildrop has 2 messages (320 octets)\r\n")
            .build();
        let mut client = Client::from_stream(mock).await.unwrap();

        client
            .authenticate("mrose", "tanstaaf", AuthMethod::Auto)
            .await
            .unwrap();
        assert_eq!(client.state(), SessionState::Transaction);
    }

    #[tokio::test]
    async fn test_auto_falls_back_to_user_pass() {
        let mock = logged_in().build();
        let client = login(mock).await;
        assert_eq!(client.state(), SessionState::Transaction);
        assert!(!client.apop_supported());
    }

    #[tokio::test]
    async fn test_apop_without_timestamp() {
        let mock = Builder::new().read(b"+OK ready\r\n").build();
        let mut client = Client::from_stream(mock).await.unwrap();

        let err = client
            .authenticate("user", "secret", AuthMethod::Apop)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(client.state(), SessionState::Authorization);
    }

    #[tokio::test]
    async fn test_line_break_in_credentials_sends_nothing() {
        // No write actions: any byte on the wire fails the login.
        let mock = Builder::new().read(b"+OK ready\r\n").build();
        let mut client = Client::from_stream(mock).await.unwrap();

        let err = client
            .authenticate("bob\r\nDELE 1", "pw", AuthMethod::UserPass)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!err.is_fatal());
        assert_eq!(client.state(), SessionState::Authorization);

        let err = client
            .authenticate("bob", "pw\r\nQUIT", AuthMethod::UserPass)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(client.state(), SessionState::Authorization);
    }

    #[tokio::test]
    async fn test_rejected_password_stays_in_authorization() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER user\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS wrong\r\n")
            .read(b"-ERR invalid password\r\n")
            .build();
        let mut client = Client::from_stream(mock).await.unwrap();

        let err = client
            .authenticate("user", "wrong", AuthMethod::UserPass)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(ref m) if m.contains("invalid password")));
        assert!(!err.is_fatal());
        assert_eq!(client.state(), SessionState::Authorization);

        let err = client.stat().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                command: "STAT",
                state: SessionState::Authorization
            }
        ));
    }

    #[tokio::test]
    async fn test_stat() {
        let mock = logged_in().write(b"STAT\r\n").read(b"+OK 5 10\r\n").build();
        let mut client = login(mock).await;

        assert_eq!(client.stat().await.unwrap(), (5, 10));
    }

    #[tokio::test]
    async fn test_malformed_stat_keeps_state() {
        let mock = logged_in().write(b"STAT\r\n").read(b"+OK many\r\n").build();
        let mut client = login(mock).await;

        assert!(matches!(client.stat().await, Err(Error::Parse(_))));
        assert_eq!(client.state(), SessionState::Transaction);
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let mock = logged_in()
            .write(b"LIST\r\n")
            .read(b"+OK 2 messages\r\n2 200\r\n1 120\r\n.\r\n")
            .build();
        let mut client = login(mock).await;

        let entries = client.list().await.unwrap();
        assert_eq!(
            entries,
            vec![
                ListEntry { id: 1, octets: 120 },
                ListEntry { id: 2, octets: 200 }
            ]
        );
    }

    #[tokio::test]
    async fn test_list_size_no_such_message() {
        let mock = logged_in()
            .write(b"LIST 9\r\n")
            .read(b"-ERR no such message\r\n")
            .build();
        let mut client = login(mock).await;

        let err = client.list_size(9).await.unwrap_err();
        assert!(matches!(err, Error::NoSuchMessage { id: 9, .. }));
        assert_eq!(client.state(), SessionState::Transaction);
    }

    #[tokio::test]
    async fn test_unique_id() {
        let mock = logged_in()
            .write(b"UIDL 2\r\n")
            .read(b"+OK 2 QhdPYR:00WBw1Ph7x7\r\n")
            .build();
        let mut client = login(mock).await;

        assert_eq!(client.unique_id(2).await.unwrap(), "QhdPYR:00WBw1Ph7x7");
    }

    #[tokio::test]
    async fn test_retrieve_unstuffs() {
        let mock = logged_in()
            .write(b"RETR 1\r\n")
            .read(b"+OK 40 octets\r\nSubject: x\r\n\r\n..hidden\r\n.\r\n")
            .build();
        let mut client = login(mock).await;

        assert_eq!(
            client.retrieve(1).await.unwrap(),
            b"Subject: x\r\n\r\n.hidden"
        );
    }

    #[tokio::test]
    async fn test_retrieve_rejected() {
        let mock = logged_in()
            .write(b"RETR 7\r\n")
            .read(b"-ERR message 7 already deleted\r\n")
            .build();
        let mut client = login(mock).await;

        let err = client.retrieve(7).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { ref command, .. } if command == "RETR"));
    }

    #[tokio::test]
    async fn test_capabilities_in_authorization() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"CAPA\r\n")
            .read(b"+OK Capability list follows\r\nTOP\r\nUSER\r\nUIDL\r\nSTLS\r\n.\r\n")
            .build();
        let mut client = Client::from_stream(mock).await.unwrap();

        let caps = client.capabilities().await.unwrap();
        assert_eq!(caps, vec!["TOP", "USER", "UIDL", "STLS"]);
    }

    #[tokio::test]
    async fn test_reset_and_noop() {
        let mock = logged_in()
            .write(b"DELE 1\r\n")
            .read(b"+OK message 1 deleted\r\n")
            .write(b"RSET\r\n")
            .read(b"+OK\r\n")
            .write(b"NOOP\r\n")
            .read(b"+OK\r\n")
            .build();
        let mut client = login(mock).await;

        client.delete(1).await.unwrap();
        client.reset().await.unwrap();
        client.no_op().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_closes() {
        let mock = logged_in().write(b"STAT\r\n").read(b"+OK 1").build();
        let mut client = login(mock).await;

        let err = client.stat().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(client.state(), SessionState::Closed);
        assert!(matches!(
            client.no_op().await,
            Err(Error::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_garbage_status_line_closes() {
        let mock = logged_in().write(b"NOOP\r\n").read(b"* BYE\r\n").build();
        let mut client = login(mock).await;

        assert!(matches!(client.no_op().await, Err(Error::Protocol(_))));
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_disconnect_always_closes() {
        let mock = logged_in()
            .write(b"QUIT\r\n")
            .read(b"-ERR some deleted messages not removed\r\n")
            .build();
        let mut client = login(mock).await;

        let err = client.disconnect().await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        assert_eq!(client.state(), SessionState::Closed);

        // Already closed: nothing is written
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_before_connect() {
        let mock = Builder::new().build();
        let mut client = Client::new(mock);

        client.disconnect().await.unwrap();
        assert_eq!(client.state(), SessionState::Closed);
    }
}
