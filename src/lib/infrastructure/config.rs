//! Operator configuration, read from the command line or the environment

use std::time::Duration;

use clap::Parser;

use crate::domain::{addresses::DEFAULT_DOMAIN, reconciliation::DEFAULT_SETTLE_DELAY};

/// Outbound SMTP relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
pub struct RelayConfig {
    /// The SMTP host
    #[clap(id = "smtp_host", long = "smtp-host", env = "SMTP_HOST")]
    pub host: String,

    /// The SMTP port
    #[clap(id = "smtp_port", long = "smtp-port", env = "SMTP_PORT")]
    pub port: u16,

    /// Connection timeout, in seconds
    #[clap(id = "smtp_timeout", long = "smtp-timeout", env = "SMTP_TIMEOUT")]
    pub timeout: u64,

    /// Upgrade a plain connection with STARTTLS instead of connecting over TLS
    #[clap(id = "smtp_starttls", long = "smtp-starttls", env = "SMTP_STARTTLS")]
    pub starttls: bool,
}

impl RelayConfig {
    /// The connection timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Inbound POP3 mailbox configuration
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
pub struct MailboxConfig {
    /// The POP3 host
    #[clap(id = "pop3_host", long = "pop3-host", env = "POP3_HOST")]
    pub host: String,

    /// The POP3 port
    #[clap(id = "pop3_port", long = "pop3-port", env = "POP3_PORT")]
    pub port: u16,

    /// Read timeout, in seconds
    #[clap(id = "pop3_timeout", long = "pop3-timeout", env = "POP3_TIMEOUT")]
    pub timeout: u64,
}

impl MailboxConfig {
    /// The read timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// The operator's account
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
pub struct AccountConfig {
    /// Display name substituted for `$sender` and used in the `From` header
    #[clap(long = "name", env = "MAILER_NAME")]
    pub name: String,

    /// Domain appended to addresses written without one
    #[clap(long, env = "MAILER_DEFAULT_DOMAIN", default_value = DEFAULT_DOMAIN)]
    pub default_domain: String,

    /// Wait before checking for bounces, in seconds
    #[clap(long, env = "MAILER_SETTLE_DELAY", default_value_t = DEFAULT_SETTLE_DELAY.as_secs())]
    pub settle_delay: u64,
}

impl AccountConfig {
    /// The wait before checking for bounces
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay)
    }
}

/// Everything needed to send a letter
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
pub struct MailerConfig {
    /// The outbound relay
    #[clap(flatten)]
    pub relay: RelayConfig,

    /// The inbound mailbox
    #[clap(flatten)]
    pub mailbox: MailboxConfig,

    /// The operator's account
    #[clap(flatten)]
    pub account: AccountConfig,
}
