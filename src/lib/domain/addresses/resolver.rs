//! Domain resolvability

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

/// Answers whether a mail domain can receive mail at all
#[async_trait]
pub trait DomainResolver: Send + Sync + 'static {
    /// Returns `true` when `domain` has MX records, or address records acting
    /// as the implicit MX.
    async fn resolves(&self, domain: &str) -> bool;
}

#[cfg(test)]
mock! {
    pub DomainResolver {}

    #[async_trait]
    impl DomainResolver for DomainResolver {
        async fn resolves(&self, domain: &str) -> bool;
    }
}
