//! Probe targets

use chrono::Utc;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::network::{HostnameResolver, Protocol};

/// Identity of a service: the address it runs on and the protocol.
/// Keys order by address first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub address: IpAddr,
    pub protocol: Protocol,
}

/// A (protocol, address) probe target with a cached display hostname.
///
/// Equality and hashing only look at the [`ServiceKey`]. The hostname is a
/// side cell shared between clones; filling it never changes how the
/// service behaves as a map key.
#[derive(Clone)]
pub struct Service {
    key: ServiceKey,
    hostname: Arc<Mutex<Option<String>>>,
}

impl Service {
    pub fn new(protocol: Protocol, address: IpAddr) -> Self {
        Self {
            key: ServiceKey { protocol, address },
            hostname: Arc::new(Mutex::new(None)),
        }
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }

    pub fn protocol(&self) -> Protocol {
        self.key.protocol
    }

    pub fn address(&self) -> IpAddr {
        self.key.address
    }

    pub fn port(&self) -> u16 {
        self.key.protocol.port()
    }

    /// Hostname resolved so far, if any
    pub fn cached_hostname(&self) -> Option<String> {
        self.hostname.lock().clone()
    }

    /// Resolve (once) and cache the display hostname.
    ///
    /// A failed lookup caches the textual address. Such a fallback name is
    /// only looked up again on a sampled cadence: during one second out of
    /// every ten.
    pub async fn hostname(&self, resolver: &dyn HostnameResolver, timeout: Duration) -> String {
        self.hostname_at(resolver, timeout, Utc::now().timestamp()).await
    }

    async fn hostname_at(
        &self,
        resolver: &dyn HostnameResolver,
        timeout: Duration,
        now_secs: i64,
    ) -> String {
        if let Some(name) = self.cached_hostname() {
            if name != self.key.address.to_string() || !in_retry_window(now_secs) {
                return name;
            }
        }

        let name = match resolver.resolve(self.key.address, timeout).await {
            Ok(name) => name,
            Err(e) => {
                log::debug!("hostname lookup for {} failed: {}", self.key.address, e);
                self.key.address.to_string()
            }
        };

        *self.hostname.lock() = Some(name.clone());
        name
    }

    /// URL of the service root using the resolved hostname
    pub async fn url(&self, resolver: &dyn HostnameResolver, timeout: Duration) -> String {
        let host = self.hostname(resolver, timeout).await;
        format!("{}://{}/", self.key.protocol, host)
    }
}

fn in_retry_window(now_secs: i64) -> bool {
    now_secs.rem_euclid(10) == 1
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Service {}

impl Hash for Service {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl Borrow<ServiceKey> for Service {
    fn borrow(&self) -> &ServiceKey {
        &self.key
    }
}

impl PartialOrd for Service {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Service {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl From<ServiceKey> for Service {
    fn from(key: ServiceKey) -> Self {
        Service::new(key.protocol, key.address)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("protocol", &self.key.protocol)
            .field("address", &self.key.address)
            .field("hostname", &*self.hostname.lock())
            .finish()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key.address {
            IpAddr::V4(v4) => write!(f, "{}://{}/", self.key.protocol, v4),
            IpAddr::V6(v6) => write!(f, "{}://[{}]/", self.key.protocol, v6),
        }
    }
}
