//! Relay credentials

use std::{convert::Infallible, fmt, str::FromStr};

#[cfg(test)]
use mockall::mock;

use crate::domain::dispatch::errors::CredentialError;

/// A secret that never shows up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The secret in clear text, for handing to a transport
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for Secret {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

/// Account credentials shared by the relay and the mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The account name, with or without a domain
    pub identifier: String,

    /// The account secret
    pub secret: Secret,
}

impl Credentials {
    /// Create credentials
    pub fn new(identifier: impl Into<String>, secret: Secret) -> Self {
        Self {
            identifier: identifier.into(),
            secret,
        }
    }
}

/// Source of credentials, asked again on every authentication attempt
pub trait CredentialProvider: Send + Sync + 'static {
    /// Obtain credentials
    fn credentials(&self) -> Result<Credentials, CredentialError>;
}

#[cfg(test)]
mock! {
    pub CredentialProvider {}

    impl CredentialProvider for CredentialProvider {
        fn credentials(&self) -> Result<Credentials, CredentialError>;
    }
}
