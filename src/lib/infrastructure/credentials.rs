//! Credentials from the environment

use std::env;

use tracing::debug;

use crate::domain::dispatch::{errors::CredentialError, CredentialProvider, Credentials, Secret};

/// Reads the account from environment variables on every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvCredentials {
    user_var: &'static str,
    password_var: &'static str,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new("MAILER_USER", "MAILER_PASSWORD")
    }
}

impl EnvCredentials {
    /// Read the account from `user_var` and `password_var`
    pub fn new(user_var: &'static str, password_var: &'static str) -> Self {
        Self {
            user_var,
            password_var,
        }
    }

    fn read(name: &'static str) -> Result<String, CredentialError> {
        env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(CredentialError::Missing(name))
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials, CredentialError> {
        let identifier = Self::read(self.user_var)?;
        let secret = Secret::new(Self::read(self.password_var)?);

        debug!("read credentials of {identifier} from {}", self.user_var);

        Ok(Credentials::new(identifier, secret))
    }
}
