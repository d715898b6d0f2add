//! Dispatch errors

use thiserror::Error;

use crate::domain::addresses::EmailAddressError;

/// Errors reported by a [`Relay`](super::Relay)
#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay could not be reached
    #[error("could not connect to the relay: {0}")]
    Unreachable(String),

    /// The relay rejected the credentials
    #[error("the relay rejected the credentials: {0}")]
    Authentication(String),

    /// The relay was used before connecting
    #[error("not connected to the relay")]
    NotConnected,

    /// The message could not be converted for the relay
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The relay refused the message
    #[error("the relay refused the message: {0}")]
    SendError(String),

    /// Unknown error
    #[error(transparent)]
    UnknownError(anyhow::Error),
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::UnknownError(err)
    }
}

/// Errors that can occur when obtaining credentials
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A credential is not configured
    #[error("{0} is not set")]
    Missing(&'static str),

    /// Unknown error
    #[error(transparent)]
    UnknownError(anyhow::Error),
}

impl From<anyhow::Error> for CredentialError {
    fn from(err: anyhow::Error) -> Self {
        CredentialError::UnknownError(err)
    }
}

/// Fatal dispatch errors. Per-message failures are never fatal.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The relay could not be reached
    #[error(transparent)]
    RelayUnreachable(RelayError),

    /// Every authentication attempt failed
    #[error("authentication failed {attempts} times, giving up")]
    AuthExhausted {
        /// How many attempts were made
        attempts: u32,
    },

    /// Credentials could not be obtained
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// The account identifier does not make a valid sender address
    #[error("invalid sender address: {0}")]
    InvalidIdentity(#[from] EmailAddressError),

    /// Dispatch was started before authenticating
    #[error("not authenticated with the relay")]
    NotAuthenticated,

    /// A message reached dispatch without a bound sender
    #[error("message {index} has no bound sender")]
    UnboundSender {
        /// Position of the message in the batch
        index: usize,
    },
}
