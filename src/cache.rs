//! Shared access-result cache
//!
//! Holds the latest Service → Access verdicts and answers the acceptance
//! question for URL gating. The map is immutable once published: every
//! mutation builds a new generation and swaps it in under a short write
//! lock, so a reader sees either the old or the new generation in full.
//!
//! Only two mutations exist:
//!
//! * [`AccessCache::replace`] publishes the new results as they are.
//! * [`AccessCache::extend`] keeps previously granted services (trusted to
//!   survive a partial re-scan), drops every other old verdict, then lays
//!   the new results on top.

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::network::{Access, Protocol};
use crate::scanner::{Service, ServiceKey};

type Generation = Arc<HashMap<Service, Access>>;

static GLOBAL: Lazy<AccessCache> = Lazy::new(AccessCache::new);

/// Process-wide verdict cache
#[derive(Debug, Default)]
pub struct AccessCache {
    current: RwLock<Generation>,
    /// Serializes writers so that `extend` never loses a concurrent merge
    writer: Mutex<()>,
}

impl AccessCache {
    /// Create an empty, independent cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance
    pub fn global() -> &'static AccessCache {
        &GLOBAL
    }

    /// Substitute the whole content with `results`
    pub fn replace<I>(&self, results: I)
    where
        I: IntoIterator<Item = (Service, Access)>,
    {
        let next: HashMap<Service, Access> = results.into_iter().collect();
        let size = next.len();

        let _writer = self.writer.lock();
        *self.current.write() = Arc::new(next);
        log::info!("Access cache replaced: {} entries", size);
    }

    /// Keep granted entries, discard every other old verdict, then insert
    /// `results`, overwriting on collision
    pub fn extend<I>(&self, results: I)
    where
        I: IntoIterator<Item = (Service, Access)>,
    {
        let _writer = self.writer.lock();
        let previous = self.snapshot();

        let mut next: HashMap<Service, Access> = previous
            .iter()
            .filter(|(_, access)| access.is_granted())
            .map(|(service, access)| (service.clone(), *access))
            .collect();
        let kept = next.len();
        next.extend(results);

        log::info!(
            "Access cache extended: kept {} granted of {}, now {} entries",
            kept,
            previous.len(),
            next.len()
        );
        *self.current.write() = Arc::new(next);
    }

    /// Whether a reference to `address` over `protocol` may be accepted.
    ///
    /// An empty cache means nothing was scanned and everything is permitted.
    /// Otherwise only services with a `granted` verdict are permitted.
    pub fn query(&self, protocol: Protocol, address: IpAddr) -> bool {
        let current = self.current.read();
        if current.is_empty() {
            return true;
        }
        current
            .get(&ServiceKey { address, protocol })
            .map_or(false, Access::is_granted)
    }

    /// [`query`](Self::query) keyed by a service
    pub fn accept(&self, service: &Service) -> bool {
        self.query(service.protocol(), service.address())
    }

    /// Stored verdict for a service
    pub fn get(&self, protocol: Protocol, address: IpAddr) -> Option<Access> {
        self.current
            .read()
            .get(&ServiceKey { address, protocol })
            .copied()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Consistent view of the current generation for iteration
    pub fn snapshot(&self) -> Generation {
        self.current.read().clone()
    }
}
