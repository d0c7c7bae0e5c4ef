//! Reverse hostname resolution

use async_trait::async_trait;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use once_cell::sync::OnceCell;
use std::net::IpAddr;
use std::time::Duration;

use super::collaborators::HostnameResolver;
use crate::ScanError;

/// PTR lookups through an async resolver built from the system
/// configuration. The resolver is created on first use and shared by every
/// lookup.
#[derive(Default)]
pub struct SystemResolver {
    resolver: OnceCell<TokioResolver>,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolver(&self, timeout: Duration) -> crate::Result<&TokioResolver> {
        self.resolver.get_or_try_init(|| {
            let mut builder = TokioResolver::builder(TokioConnectionProvider::default())
                .map_err(|e| ScanError::ResolveError(format!("Failed to create resolver: {}", e)))?;
            let options = builder.options_mut();
            options.timeout = timeout;
            options.attempts = 1;
            Ok(builder.build())
        })
    }
}

impl std::fmt::Debug for SystemResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemResolver")
            .field("initialized", &self.resolver.get().is_some())
            .finish()
    }
}

#[async_trait]
impl HostnameResolver for SystemResolver {
    async fn resolve(&self, addr: IpAddr, timeout: Duration) -> crate::Result<String> {
        let resolver = self.resolver(timeout)?;

        // Dropping the lookup future on timeout cancels the query.
        let lookup = tokio::time::timeout(timeout, resolver.reverse_lookup(addr))
            .await?
            .map_err(|e| ScanError::ResolveError(format!("no name for {}: {}", addr, e)))?;

        lookup
            .iter()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .find(|name| !name.is_empty())
            .ok_or_else(|| ScanError::ResolveError(format!("no name for {}", addr)))
    }
}
