//! Inbound mailbox

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use crate::domain::{dispatch::Credentials, reconciliation::errors::MailboxError};

/// The sender's inbound mailbox
#[async_trait]
pub trait Mailbox: Send + Sync + 'static {
    /// Fetches the most recent messages, newest first.
    ///
    /// # Arguments
    /// * `credentials` - The account credentials.
    /// * `count` - How many messages to fetch; fewer are returned when the
    ///   mailbox holds fewer.
    ///
    /// # Returns
    /// The raw messages.
    async fn fetch_recent(
        &self,
        credentials: &Credentials,
        count: usize,
    ) -> Result<Vec<Vec<u8>>, MailboxError>;
}

#[cfg(test)]
mock! {
    pub Mailbox {}

    #[async_trait]
    impl Mailbox for Mailbox {
        async fn fetch_recent(&self, credentials: &Credentials, count: usize) -> Result<Vec<Vec<u8>>, MailboxError>;
    }
}
