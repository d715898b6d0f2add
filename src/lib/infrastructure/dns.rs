//! DNS resolvability checks

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use hickory_resolver::{
    config::ResolverOpts, name_server::TokioConnectionProvider, TokioResolver,
};
use tracing::{debug, warn};

use crate::domain::addresses::DomainResolver;

/// Resolves mail domains with the system's DNS configuration
#[derive(Debug)]
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    /// Create a resolver from the system configuration
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }

    async fn has_address_records(&self, domain: &str) -> bool {
        match self.resolver.lookup_ip(domain).await {
            Ok(ips) => ips.iter().next().is_some(),
            Err(err) => {
                debug!("no address records for {domain}: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl DomainResolver for HickoryResolver {
    async fn resolves(&self, domain: &str) -> bool {
        match self.resolver.mx_lookup(domain).await {
            Ok(mx) if mx.iter().next().is_some() => true,
            Ok(_) => self.has_address_records(domain).await,
            Err(err) if err.is_no_records_found() => {
                debug!("no MX records for {domain}, trying address records");
                self.has_address_records(domain).await
            }
            Err(err) => {
                warn!("MX lookup failed for {domain}: {err}");
                false
            }
        }
    }
}
