//! SMTP relay implementation

use async_trait::async_trait;
use lettre::{
    address::Envelope,
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials as SmtpCredentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use crate::{
    domain::{
        addresses::EmailAddress,
        dispatch::{errors::RelayError, Credentials, Relay},
        messages::CompiledMessage,
    },
    infrastructure::config::RelayConfig,
};

/// Sends messages through an SMTP relay
#[derive(Debug)]
pub struct SmtpRelay {
    config: RelayConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpRelay {
    /// Create a relay; nothing is opened until [`Relay::connect`]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    fn transport(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, RelayError> {
        let builder = if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        }
        .map_err(|e| RelayError::Unreachable(e.to_string()))?;

        let mut builder = builder
            .port(self.config.port)
            .timeout(Some(self.config.timeout()));

        if let Some(credentials) = credentials {
            builder = builder.credentials(SmtpCredentials::new(
                credentials.identifier.clone(),
                credentials.secret.expose().to_string(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Relay for SmtpRelay {
    async fn connect(&mut self) -> Result<(), RelayError> {
        let transport = self.transport(None)?;

        match transport.test_connection().await {
            Ok(true) => {
                debug!("connected to {}:{}", self.config.host, self.config.port);
                self.transport = Some(transport);
                Ok(())
            }
            Ok(false) => Err(RelayError::Unreachable(format!(
                "{}:{} did not answer",
                self.config.host, self.config.port
            ))),
            Err(e) => Err(RelayError::Unreachable(e.to_string())),
        }
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), RelayError> {
        if self.transport.is_none() {
            return Err(RelayError::NotConnected);
        }

        let transport = self.transport(Some(credentials))?;

        match transport.test_connection().await {
            Ok(true) => {
                self.transport = Some(transport);
                Ok(())
            }
            Ok(false) => Err(RelayError::Authentication(
                "the relay closed the connection".to_string(),
            )),
            Err(e) => Err(RelayError::Authentication(e.to_string())),
        }
    }

    async fn send(
        &self,
        message: &CompiledMessage,
        recipients: &[EmailAddress],
    ) -> Result<(), RelayError> {
        let transport = self.transport.as_ref().ok_or(RelayError::NotConnected)?;

        let email = build_message(message)?;

        let from = email.envelope().from().cloned();
        let to = recipients
            .iter()
            .map(|r| address(r.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let envelope =
            Envelope::new(from, to).map_err(|e| RelayError::InvalidMessage(e.to_string()))?;

        transport
            .send_raw(&envelope, &email.formatted())
            .await
            .map_err(|e| RelayError::SendError(e.to_string()))?;

        Ok(())
    }
}

fn address(raw: &str) -> Result<Address, RelayError> {
    raw.parse()
        .map_err(|e| RelayError::InvalidMessage(format!("{raw}: {e}")))
}

/// Builds the MIME message: an HTML part followed by every attachment.
/// `Bcc` is part of the envelope only, never of the transmitted headers.
pub fn build_message(message: &CompiledMessage) -> Result<Message, RelayError> {
    let from = message
        .from()
        .ok_or_else(|| RelayError::InvalidMessage("the sender is not bound".to_string()))?;

    let mut builder = Message::builder()
        .from(Mailbox::new(from.name.clone(), address(from.address.as_str())?))
        .to(Mailbox::new(None, address(message.to().as_str())?))
        .subject(message.subject())
        .date(message.date().into());

    for cc in message.cc() {
        builder = builder.cc(Mailbox::new(None, address(cc.as_str())?));
    }

    for bcc in message.bcc() {
        builder = builder.bcc(Mailbox::new(None, address(bcc.as_str())?));
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::html(message.html_body().to_string()));

    for attachment in message.attachments() {
        let content_type = ContentType::parse(attachment.content_type)
            .map_err(|e| RelayError::InvalidMessage(e.to_string()))?;

        body = body.singlepart(
            Attachment::new(attachment.file_name.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    builder
        .multipart(body)
        .map_err(|e| RelayError::InvalidMessage(e.to_string()))
}
