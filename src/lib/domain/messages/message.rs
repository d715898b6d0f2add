//! Compiled message

use std::{fmt, sync::Arc};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::domain::addresses::EmailAddress;

/// Content type every attachment is sent with
pub const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

/// A display name and address pair, as used in the `From` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderMailbox {
    /// The display name
    pub name: Option<String>,

    /// The address
    pub address: EmailAddress,
}

impl fmt::Display for SenderMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{}\" <{}>", name.replace('"', "\\\""), self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// A file attached to every message of a letter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Base name of the attached file
    pub file_name: String,

    /// MIME content type
    pub content_type: &'static str,

    /// Raw file content
    pub content: Vec<u8>,
}

/// A message addressed to a single recipient.
///
/// `From` and `Bcc` are only final once [`CompiledMessage::bind_sender`] has
/// been called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMessage {
    to: EmailAddress,
    from: Option<SenderMailbox>,
    cc: Vec<EmailAddress>,
    bcc: Vec<EmailAddress>,
    subject: String,
    date: DateTime<Local>,
    html_body: String,
    attachments: Arc<[Attachment]>,

    from_name: Option<String>,
    compiled_bcc: Vec<EmailAddress>,
    bcc_to_sender: bool,
    bound: bool,
}

impl CompiledMessage {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        to: EmailAddress,
        cc: Vec<EmailAddress>,
        bcc: Vec<EmailAddress>,
        subject: String,
        html_body: String,
        attachments: Arc<[Attachment]>,
        from_name: Option<String>,
        bcc_to_sender: bool,
    ) -> Self {
        Self {
            to,
            from: None,
            cc,
            bcc: bcc.clone(),
            subject,
            date: Local::now(),
            html_body,
            attachments,
            from_name,
            compiled_bcc: bcc,
            bcc_to_sender,
            bound: false,
        }
    }

    /// Sets the `From` header and recomputes `Bcc` for the authenticated
    /// sender. Binding again with the same sender yields the same headers.
    pub fn bind_sender(&mut self, sender: &EmailAddress) {
        self.from = Some(SenderMailbox {
            name: self.from_name.clone(),
            address: sender.clone(),
        });

        self.bcc = self.compiled_bcc.clone();
        if self.bcc_to_sender {
            self.bcc.push(sender.clone());
        }

        self.bound = true;
    }

    /// Whether the sender has been bound
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// The recipient
    pub fn to(&self) -> &EmailAddress {
        &self.to
    }

    /// The sender, once bound
    pub fn from(&self) -> Option<&SenderMailbox> {
        self.from.as_ref()
    }

    /// Carbon copies
    pub fn cc(&self) -> &[EmailAddress] {
        &self.cc
    }

    /// Blind carbon copies
    pub fn bcc(&self) -> &[EmailAddress] {
        &self.bcc
    }

    /// The subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// When the message was compiled
    pub fn date(&self) -> DateTime<Local> {
        self.date
    }

    /// The rendered HTML body
    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    /// Attachments, shared by every message of the letter
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Every address the message is delivered to: `To`, `Cc` then `Bcc`
    pub fn envelope_recipients(&self) -> Vec<EmailAddress> {
        std::iter::once(&self.to)
            .chain(&self.cc)
            .chain(&self.bcc)
            .cloned()
            .collect()
    }
}

/// Binds `sender` on every message
pub fn bind_sender(messages: &mut [CompiledMessage], sender: &EmailAddress) {
    debug!("binding {} messages to {sender}", messages.len());

    for message in messages {
        message.bind_sender(sender);
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn message(bcc_to_sender: bool) -> TestResult<CompiledMessage> {
        Ok(CompiledMessage::new(
            EmailAddress::new("a@x.edu")?,
            vec![EmailAddress::new("ta@x.edu")?],
            vec![EmailAddress::new("archive@x.edu")?],
            "Hi".to_string(),
            "<p>Hi</p>".to_string(),
            Arc::from(Vec::<Attachment>::new()),
            Some("系學會".to_string()),
            bcc_to_sender,
        ))
    }

    #[test]
    fn test_unbound_message_has_no_sender() -> TestResult {
        let message = message(true)?;

        assert!(!message.is_bound());
        assert_eq!(message.from(), None);
        assert_eq!(message.bcc(), [EmailAddress::new("archive@x.edu")?]);

        Ok(())
    }

    #[test]
    fn test_bind_sender_sets_from_and_bcc() -> TestResult {
        let sender = EmailAddress::new("me@x.edu")?;
        let mut message = message(true)?;

        message.bind_sender(&sender);

        assert!(message.is_bound());
        assert_eq!(
            message.from().map(ToString::to_string).as_deref(),
            Some("\"系學會\" <me@x.edu>")
        );
        assert_eq!(message.bcc(), [EmailAddress::new("archive@x.edu")?, sender]);

        Ok(())
    }

    #[test]
    fn test_bind_sender_is_idempotent() -> TestResult {
        let sender = EmailAddress::new("me@x.edu")?;
        let mut once = message(true)?;
        once.bind_sender(&sender);

        let mut twice = once.clone();
        twice.bind_sender(&sender);

        assert_eq!(once, twice);

        Ok(())
    }

    #[test]
    fn test_rebinding_replaces_previous_sender() -> TestResult {
        let mut message = message(true)?;

        message.bind_sender(&EmailAddress::new("old@x.edu")?);
        message.bind_sender(&EmailAddress::new("new@x.edu")?);

        assert_eq!(
            message.bcc(),
            [EmailAddress::new("archive@x.edu")?, EmailAddress::new("new@x.edu")?]
        );

        Ok(())
    }

    #[test]
    fn test_envelope_recipients() -> TestResult {
        let mut message = message(false)?;
        message.bind_sender(&EmailAddress::new("me@x.edu")?);

        let envelope: Vec<_> = message
            .envelope_recipients()
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(envelope, vec!["a@x.edu", "ta@x.edu", "archive@x.edu"]);

        Ok(())
    }

    #[test]
    fn test_sender_mailbox_display_without_name() -> TestResult {
        let mailbox = SenderMailbox {
            name: None,
            address: EmailAddress::new("me@x.edu")?,
        };

        assert_eq!(mailbox.to_string(), "me@x.edu");

        Ok(())
    }
}
