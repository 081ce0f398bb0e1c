#![allow(clippy::doc_markdown)]
//! Example: List a POP3 mailbox
//!
//! Logs in, prints the mailbox size, then the sender and subject of every
//! message. Messages are fetched with TOP so bodies are not downloaded.
//!
//! ## Running
//!
//! ```bash
//! POP3_HOST=pop.example.com POP3_USER=me POP3_PASSWORD=secret \
//!     RUST_LOG=mailpop_pop3=debug \
//!     cargo run --package mailpop-pop3 --example fetch_mailbox
//! ```
//!
//! Set POP3_SECURITY to `starttls` or `none` for servers without implicit
//! TLS on port 995.

use anyhow::Context;
use mailpop_pop3::{AuthMethod, Client, Config, Security};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = std::env::var("POP3_HOST").context("POP3_HOST is not set")?;
    let user = std::env::var("POP3_USER").context("POP3_USER is not set")?;
    let password = std::env::var("POP3_PASSWORD").context("POP3_PASSWORD is not set")?;
    let security = match std::env::var("POP3_SECURITY") {
        Ok(mode) => mode.parse()?,
        Err(_) => Security::Implicit,
    };

    let config = Config::builder(&host).security(security).build();
    println!("Connecting to {}:{}...", config.host, config.port);

    let mut client = Client::open(&config)
        .await
        .with_context(|| format!("connecting to {host}"))?;
    client
        .authenticate(&user, &password, AuthMethod::Auto)
        .await
        .context("login failed")?;

    let (count, octets) = client.stat().await?;
    println!("{count} messages, {octets} octets\n");

    for id in 1..=count {
        let header = client.fetch_headers(id).await?;
        let from = header
            .author()
            .map_or_else(|| "(unknown sender)".to_string(), ToString::to_string);
        let subject = header.subject.as_deref().unwrap_or("(no subject)");
        println!("{id:>4}  {from}  {subject}");
    }

    client.disconnect().await?;
    Ok(())
}
