//! Email addresses module.

mod email_address;
mod resolver;

pub use email_address::{complete_address, EmailAddress, EmailAddressError, DEFAULT_DOMAIN};
pub use resolver::DomainResolver;

#[cfg(test)]
pub mod tests {
    pub use super::resolver::MockDomainResolver;
}
