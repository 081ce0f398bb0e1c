//! Full POP3 sessions against scripted server transcripts.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::similar_names)]

use chrono::{TimeZone, Utc};
use mailpop_pop3::mailpop_mime::TransferEncoding;
use mailpop_pop3::{AuthMethod, Client, Error, SessionState};
use tokio_test::io::{Builder, Mock};

/// Greeting without APOP timestamp followed by a USER/PASS login.
fn session() -> Builder {
    let mut builder = Builder::new();
    builder
        .read(b"+OK POP3 ready\r\n")
        .write(b"USER test\r\n")
        .read(b"+OK\r\n")
        .write(b"PASS test\r\n")
        .read(b"+OK\r\n");
    builder
}

async fn login(mock: Mock) -> Client<Mock> {
    let mut client = Client::from_stream(mock).await.unwrap();
    client
        .authenticate("test", "test", AuthMethod::Auto)
        .await
        .unwrap();
    assert_eq!(client.state(), SessionState::Transaction);
    client
}

/// Wraps a message into a positive multi-line response.
fn retr_response(message: &str) -> Vec<u8> {
    format!("+OK message follows\r\n{message}\r\n.\r\n").into_bytes()
}

const CRON_MESSAGE: &str = concat!(
    "Return-path: <cron@example.com>\r\n",
    "Envelope-to: admin@example.com\r\n",
    "Received: from cron by example.com with local (Exim 4.69)\r\n",
    "\t(envelope-from <cron@example.com>)\r\n",
    "\tid 1P2wr0-0003vw-U9\r\n",
    "\tfor admin@example.com; Tue, 05 Oct 2010 04:02:06 +0200\r\n",
    "To: admin@example.com\r\n",
    "Subject: CRON-APT completed on build-host [/etc/cron-apt/config]\r\n",
    "Message-Id: <E1P2wr0-0003vw-U9@example.com>\r\n",
    "From: cron <cron@example.com>\r\n",
    "Date: Tue, 05 Oct 2010 04:02:06 +0200\r\n",
    "\r\n",
    "CRON-APT RUN [/etc/cron-apt/config]: Tue Oct  5 04:00:01 CEST 2010\r\n",
    "CRON-APT ACTION: 3-download\r\n",
    "2 upgraded, 0 newly installed, 0 to remove and 0 not upgraded.\r\n",
    ".leading dot kept once\r\n",
);

#[tokio::test]
async fn test_apop_authentication() {
    let mock = Builder::new()
        .read(b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n")
        .write(b"APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n")
        .read(b"+OK mrose's maildrop has 2 messages (320 octets)\r\n")
        .build();

    let mut client = Client::from_stream(mock).await.unwrap();
    assert!(client.apop_supported());
    client
        .authenticate("mrose", "tanstaaf", AuthMethod::Apop)
        .await
        .unwrap();
    assert_eq!(client.state(), SessionState::Transaction);
}

#[tokio::test]
async fn test_stat_and_delete_all_then_quit() {
    let mock = session()
        .write(b"STAT\r\n")
        .read(b"+OK 2 320\r\n")
        .write(b"DELE 1\r\n")
        .read(b"+OK message 1 deleted\r\n")
        .write(b"DELE 2\r\n")
        .read(b"+OK message 2 deleted\r\n")
        .write(b"QUIT\r\n")
        .read(b"+OK dewey POP3 server signing off\r\n")
        .build();
    let mut client = login(mock).await;

    client.delete_all().await.unwrap();
    client.disconnect().await.unwrap();
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_listings() {
    let mock = session()
        .write(b"UIDL\r\n")
        .read(b"+OK\r\n1 psycho\r\n2 lord\r\n.\r\n")
        .write(b"UIDL 2\r\n")
        .read(b"+OK 2 lord\r\n")
        .write(b"LIST\r\n")
        .read(b"+OK 2 messages (320 octets)\r\n1 120\r\n2 200\r\n.\r\n")
        .write(b"LIST 2\r\n")
        .read(b"+OK 2 200\r\n")
        .build();
    let mut client = login(mock).await;

    assert_eq!(client.unique_ids().await.unwrap(), vec!["psycho", "lord"]);
    assert_eq!(client.unique_id(2).await.unwrap(), "lord");
    assert_eq!(client.list_sizes().await.unwrap(), vec![120, 200]);
    assert_eq!(client.list_size(2).await.unwrap(), 200);
}

#[tokio::test]
async fn test_fetch_message_without_content_type() {
    let mock = session()
        .write(b"RETR 132\r\n")
        .read(&retr_response(&CRON_MESSAGE.replace("\r\n.", "\r\n..")))
        .build();
    let mut client = login(mock).await;

    let message = client.fetch_message(132).await.unwrap();
    let header = message.header();

    assert_eq!(
        header.subject.as_deref(),
        Some("CRON-APT completed on build-host [/etc/cron-apt/config]")
    );
    assert_eq!(
        header.message_id.as_deref(),
        Some("E1P2wr0-0003vw-U9@example.com")
    );
    assert_eq!(
        header.date.as_deref(),
        Some("Tue, 05 Oct 2010 04:02:06 +0200")
    );
    assert_eq!(
        header.date_sent,
        Some(Utc.with_ymd_and_hms(2010, 10, 5, 2, 2, 6).unwrap())
    );

    let author = header.author().unwrap();
    assert_eq!(author.address, "cron@example.com");
    assert_eq!(author.display_name, "cron");
    assert_eq!(header.to.len(), 1);
    assert_eq!(header.to[0].address, "admin@example.com");
    assert!(header.to[0].display_name.is_empty());
    assert_eq!(
        header.return_path.as_ref().unwrap().address,
        "cron@example.com"
    );
    assert_eq!(header.received.len(), 1);
    assert_eq!(header.received[0].date, header.date_sent);
    assert_eq!(header.unknown.get("envelope-to"), Some("admin@example.com"));

    assert_eq!(header.content_type.media_type(), "text/plain");
    let body = message.body_text().unwrap();
    assert!(body.starts_with("CRON-APT RUN"));
    assert!(body.ends_with("\r\n.leading dot kept once\r\n"));
}

#[tokio::test]
async fn test_fetch_latin1_message() {
    let mut raw = b"Return-Path: <john@example.net>\r\n\
        Received: by 10.227.146.13 with HTTP; Mon, 18 Oct 2010 14:09:41 -0700 (PDT)\r\n\
        X-TDC-Received-From-IP: 74.125.82.54\r\n\
        MIME-Version: 1.0\r\n\
        Date: Mon, 18 Oct 2010 17:09:41 -0400\r\n\
        Message-ID: <AANLkTik0O_9JZCeS7Za__w_G6L=9jKq2@mail.gmail.com>\r\n\
        Subject: Email Addresses\r\n\
        From: John McDaniel <john@example.net>\r\n\
        To: Kasper Foens <kasper@example.dk>\r\n\
        Content-Type: text/plain; charset=ISO-8859-1\r\n\
        \r\n\
        Hilsen fra K"
        .to_vec();
    raw.push(0xF8);
    raw.extend_from_slice(b"benhavn\r\n\r\nJohn");

    let mut response = b"+OK\r\n".to_vec();
    response.extend_from_slice(&raw);
    response.extend_from_slice(b"\r\n.\r\n");

    let mock = session().write(b"RETR 1\r\n").read(&response).build();
    let mut client = login(mock).await;

    let message = client.fetch_message(1).await.unwrap();
    let header = message.header();

    assert_eq!(header.subject.as_deref(), Some("Email Addresses"));
    assert_eq!(header.mime_version.as_deref(), Some("1.0"));
    assert_eq!(
        header.unknown.get_all("X-TDC-Received-From-IP"),
        vec!["74.125.82.54"]
    );
    assert_eq!(header.content_type.charset(), Some("ISO-8859-1"));
    assert_eq!(
        header.date_sent,
        Some(Utc.with_ymd_and_hms(2010, 10, 18, 21, 9, 41).unwrap())
    );
    assert_eq!(header.author().unwrap().display_name, "John McDaniel");
    assert_eq!(header.to[0].display_name, "Kasper Foens");
    assert!(header.return_path.as_ref().unwrap().display_name.is_empty());

    assert_eq!(message.body_text(), Some("Hilsen fra København\r\n\r\nJohn"));
    assert_eq!(message.raw(), raw.as_slice());
}

#[tokio::test]
async fn test_fetch_base64_message() {
    let message = concat!(
        "Return-Path: <kasper@example.dk>\r\n",
        "Message-ID: <4CBACC87.8080600@example.dk>\r\n",
        "Date: Sun, 17 Oct 2010 12:14:31 +0200\r\n",
        "From: =?ISO-8859-1?Q?Kasper_F=F8ns?= <kasper@example.dk>\r\n",
        "MIME-Version: 1.0\r\n",
        "To: =?ISO-8859-1?Q?Kasper_F=F8ns?= <kasper@example.dk>\r\n",
        "Subject: Test =?ISO-8859-1?Q?=E6=F8=E5=C6=D8=C5?=\r\n",
        "Content-Type: text/plain; charset=US-ASCII;\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "TWFuIGlzIGRpc3Rpbmd1aXNoZWQsIG5vdCBvbmx5IGJ5IGhpcyByZWFzb24sIGJ1dCBieSB0aGlz\r\n",
        "IHNpbmd1bGFyIHBhc3Npb24gZnJvbSBvdGhlciBhbmltYWxzLCB3aGljaCBpcyBhIGx1c3Qgb2Yg\r\n",
        "dGhlIG1pbmQsIHRoYXQgYnkgYSBwZXJzZXZlcmFuY2Ugb2YgZGVsaWdodCBpbiB0aGUgY29udGlu\r\n",
        "dWVkIGFuZCBpbmRlZmF0aWdhYmxlIGdlbmVyYXRpb24gb2Yga25vd2xlZGdlLCBleGNlZWRzIHRo\r\n",
        "ZSBzaG9ydCB2ZWhlbWVuY2Ugb2YgYW55IGNhcm5hbCBwbGVhc3VyZS4==",
    );
    let mock = session()
        .write(b"RETR 132\r\n")
        .read(&retr_response(message))
        .build();
    let mut client = login(mock).await;

    let message = client.fetch_message(132).await.unwrap();
    let header = message.header();

    assert_eq!(header.subject.as_deref(), Some("Test æøåÆØÅ"));
    assert_eq!(header.author().unwrap().display_name, "Kasper Føns");
    assert_eq!(header.to[0].display_name, "Kasper Føns");
    assert_eq!(header.content_type.charset(), Some("US-ASCII"));
    assert_eq!(header.content_transfer_encoding, TransferEncoding::Base64);
    assert_eq!(
        header.date_sent,
        Some(Utc.with_ymd_and_hms(2010, 10, 17, 10, 14, 31).unwrap())
    );
    assert_eq!(
        message.body_text(),
        Some(
            "Man is distinguished, not only by his reason, but by this singular passion \
             from other animals, which is a lust of the mind, that by a perseverance of \
             delight in the continued and indefatigable generation of knowledge, exceeds \
             the short vehemence of any carnal pleasure."
        )
    );
}

#[tokio::test]
async fn test_fetch_headers_uses_top_zero() {
    let mock = session()
        .write(b"TOP 7 0\r\n")
        .read(
            b"+OK\r\n\
              Subject: [Blog] New Comment On: Comparison of libraries for fetching mail\r\n\
              \r\n\
              .\r\n",
        )
        .build();
    let mut client = login(mock).await;

    let header = client.fetch_headers(7).await.unwrap();
    assert_eq!(
        header.subject.as_deref(),
        Some("[Blog] New Comment On: Comparison of libraries for fetching mail")
    );
}

#[tokio::test]
async fn test_fetch_multipart_message() {
    let message = concat!(
        "From: alice@example.com\r\n",
        "Subject: report\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "preamble\r\n",
        "--outer\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "Caf=C3=A9 numbers attached.\r\n",
        "--outer\r\n",
        "Content-Type: application/octet-stream; name=\"data.bin\"\r\n",
        "Content-Disposition: attachment; filename=\"data.bin\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "AAECAw==\r\n",
        "--outer--\r\n",
    );
    let mock = session()
        .write(b"RETR 3\r\n")
        .read(&retr_response(message))
        .build();
    let mut client = login(mock).await;

    let message = client.fetch_message(3).await.unwrap();
    assert!(message.root().is_multipart());
    assert_eq!(message.root().children().len(), 2);
    assert_eq!(message.body_text(), Some("Café numbers attached."));

    let attachments = message.attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename().as_deref(), Some("data.bin"));
    assert_eq!(attachments[0].body_bytes(), &[0, 1, 2, 3]);
}

#[tokio::test]
async fn test_commands_checked_against_state() {
    let mock = Builder::new().read(b"+OK ready\r\n").build();
    let mut client = Client::from_stream(mock).await.unwrap();

    let err = client.retrieve(1).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            command: "RETR",
            state: SessionState::Authorization
        }
    ));
    assert_eq!(client.state(), SessionState::Authorization);
}

#[tokio::test]
async fn test_connection_drop_mid_block_closes_session() {
    let mock = session()
        .write(b"RETR 1\r\n")
        .read(b"+OK\r\nSubject: cut short\r\n")
        .build();
    let mut client = login(mock).await;

    let err = client.retrieve(1).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(client.state(), SessionState::Closed);

    // Already closed: QUIT is not sent
    client.disconnect().await.unwrap();
}
