//! Mailbox errors

use thiserror::Error;

/// Errors that can occur when reading the mailbox
#[derive(Debug, Error)]
pub enum MailboxError {
    /// The mailbox server could not be reached
    #[error("could not connect to the mailbox: {0}")]
    Connection(#[from] std::io::Error),

    /// The mailbox server did not answer in time
    #[error("the mailbox did not answer in time")]
    Timeout,

    /// The mailbox server rejected the credentials
    #[error("the mailbox rejected the credentials: {0}")]
    Authentication(String),

    /// The mailbox server answered something unexpected
    #[error("unexpected mailbox response: {0}")]
    Protocol(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(anyhow::Error),
}

impl From<anyhow::Error> for MailboxError {
    fn from(err: anyhow::Error) -> Self {
        MailboxError::UnknownError(err)
    }
}
