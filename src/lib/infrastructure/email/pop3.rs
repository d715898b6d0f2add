//! POP3 mailbox implementation

use std::{future::Future, io, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tokio_native_tls::{native_tls, TlsConnector};
use tracing::debug;

use crate::{
    domain::{
        dispatch::Credentials,
        reconciliation::{errors::MailboxError, Mailbox},
    },
    infrastructure::config::MailboxConfig,
};

/// Reads the sender's mailbox over POP3 with implicit TLS
#[derive(Debug, Clone)]
pub struct Pop3Mailbox {
    config: MailboxConfig,
}

impl Pop3Mailbox {
    /// Create a mailbox; a connection is opened on every fetch
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailbox for Pop3Mailbox {
    async fn fetch_recent(
        &self,
        credentials: &Credentials,
        count: usize,
    ) -> Result<Vec<Vec<u8>>, MailboxError> {
        let limit = self.config.timeout();
        let address = (self.config.host.as_str(), self.config.port);

        let tcp = with_timeout(limit, async { Ok(TcpStream::connect(address).await?) }).await?;

        let connector = native_tls::TlsConnector::new().map_err(io::Error::other)?;
        let tls = with_timeout(limit, async {
            TlsConnector::from(connector)
                .connect(&self.config.host, tcp)
                .await
                .map_err(|e| MailboxError::Connection(io::Error::other(e)))
        })
        .await?;

        debug!("connected to {}:{}", self.config.host, self.config.port);

        let mut session = Pop3Session::new(tls, limit);
        session.greeting().await?;
        session
            .login(&credentials.identifier, credentials.secret.expose())
            .await?;

        let messages = session.fetch_recent(count).await?;
        session.quit().await?;

        Ok(messages)
    }
}

async fn with_timeout<T>(
    limit: Duration,
    future: impl Future<Output = Result<T, MailboxError>>,
) -> Result<T, MailboxError> {
    timeout(limit, future)
        .await
        .map_err(|_| MailboxError::Timeout)?
}

/// A POP3 conversation over any byte stream
#[derive(Debug)]
pub struct Pop3Session<S> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl<S> Pop3Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Start a conversation on an open stream
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    /// Reads the server greeting
    pub async fn greeting(&mut self) -> Result<String, MailboxError> {
        let line = self.read_line().await?;
        status(&line)
    }

    /// Logs in with `USER` and `PASS`
    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), MailboxError> {
        let authentication = |e: MailboxError| match e {
            MailboxError::Protocol(reason) => MailboxError::Authentication(reason),
            other => other,
        };

        self.command(&format!("USER {user}"))
            .await
            .map_err(authentication)?;
        self.command(&format!("PASS {password}"))
            .await
            .map_err(authentication)?;

        debug!("logged in as {user}");

        Ok(())
    }

    /// Number of messages in the mailbox
    pub async fn stat(&mut self) -> Result<usize, MailboxError> {
        let reply = self.command("STAT").await?;

        reply
            .split_whitespace()
            .next()
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| MailboxError::Protocol(format!("bad STAT reply: {reply}")))
    }

    /// Retrieves message `number` (1-based), dot-unstuffed, lines joined with CRLF
    pub async fn retr(&mut self, number: usize) -> Result<Vec<u8>, MailboxError> {
        self.command(&format!("RETR {number}")).await?;

        let mut message = Vec::new();

        loop {
            let line = self.read_line().await?;
            let line = line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n")).unwrap_or(&line);

            if line == b"." {
                break;
            }

            let line = line.strip_prefix(b".").unwrap_or(line);
            message.extend_from_slice(line);
            message.extend_from_slice(b"\r\n");
        }

        Ok(message)
    }

    /// Retrieves up to `count` of the newest messages, newest first
    pub async fn fetch_recent(&mut self, count: usize) -> Result<Vec<Vec<u8>>, MailboxError> {
        let total = self.stat().await?;
        let count = count.min(total);

        debug!("fetching {count} of {total} messages");

        let mut messages = Vec::with_capacity(count);
        for number in (total - count + 1..=total).rev() {
            messages.push(self.retr(number).await?);
        }

        Ok(messages)
    }

    /// Ends the conversation
    pub async fn quit(&mut self) -> Result<(), MailboxError> {
        self.command("QUIT").await?;
        Ok(())
    }

    async fn command(&mut self, command: &str) -> Result<String, MailboxError> {
        let verb = command.split_whitespace().next().unwrap_or_default();
        debug!("> {verb}");

        let stream = self.stream.get_mut();
        with_timeout(self.timeout, async {
            stream.write_all(command.as_bytes()).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await?;
            Ok(())
        })
        .await?;

        let line = self.read_line().await?;
        status(&line)
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, MailboxError> {
        let mut line = Vec::new();
        let stream = &mut self.stream;

        let read = with_timeout(self.timeout, async {
            Ok(stream.read_until(b'\n', &mut line).await?)
        })
        .await?;

        if read == 0 {
            return Err(MailboxError::Protocol(
                "connection closed by the server".to_string(),
            ));
        }

        Ok(line)
    }
}

fn status(line: &[u8]) -> Result<String, MailboxError> {
    let line = String::from_utf8_lossy(line).trim_end().to_string();

    if let Some(rest) = line.strip_prefix("+OK") {
        Ok(rest.trim().to_string())
    } else if let Some(rest) = line.strip_prefix("-ERR") {
        Err(MailboxError::Protocol(rest.trim().to_string()))
    } else {
        Err(MailboxError::Protocol(format!("unexpected reply: {line}")))
    }
}
