//! Outbound relay

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use crate::domain::{
    addresses::EmailAddress,
    dispatch::{errors::RelayError, Credentials},
    messages::CompiledMessage,
};

/// An outbound mail relay
#[async_trait]
pub trait Relay: Send + Sync + 'static {
    /// Open the connection to the relay
    async fn connect(&mut self) -> Result<(), RelayError>;

    /// Log in to the relay
    ///
    /// # Arguments
    /// * `credentials` - The account credentials.
    ///
    /// # Returns
    /// [`RelayError::Authentication`] when the relay rejects the credentials.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), RelayError>;

    /// Transmit a message.
    ///
    /// # Arguments
    /// * `message` - The bound message; its headers are sent as is.
    /// * `recipients` - The envelope recipients, which may differ from the
    ///   headers (e.g. in test mode).
    async fn send(
        &self,
        message: &CompiledMessage,
        recipients: &[EmailAddress],
    ) -> Result<(), RelayError>;
}

#[cfg(test)]
mock! {
    pub Relay {}

    #[async_trait]
    impl Relay for Relay {
        async fn connect(&mut self) -> Result<(), RelayError>;
        async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), RelayError>;
        async fn send(&self, message: &CompiledMessage, recipients: &[EmailAddress]) -> Result<(), RelayError>;
    }
}
