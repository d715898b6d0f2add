//! Infrastructure layer: configuration, terminal output, DNS, SMTP and POP3.

pub mod config;
pub mod console;
pub mod credentials;
pub mod dns;
pub mod email;
