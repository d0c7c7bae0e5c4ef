//! Scanner module: address expansion, job queue, probing and dispatch

pub mod engine;
pub mod probe;
pub mod queue;
pub mod range;
pub mod service;

use crate::network::Access;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use engine::{ScanEngine, ScanMonitor, ScanState};
pub use probe::{ProtocolProbe, ResultMap};
pub use queue::{JobReceiver, ScanJob, ScanQueue};
pub use service::{Service, ServiceKey};

/// Verdict counts of one scan run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub granted: usize,
    pub empty: usize,
    pub denied: usize,
    pub unknown: usize,
}

impl ScanSummary {
    pub fn from_services(services: &HashMap<Service, Access>) -> Self {
        let mut summary = Self::default();
        for access in services.values() {
            match access {
                Access::Granted => summary.granted += 1,
                Access::Empty => summary.empty += 1,
                Access::Denied => summary.denied += 1,
                Access::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    /// Number of services that answered at all
    pub fn total(&self) -> usize {
        self.granted + self.empty + self.denied + self.unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Protocol;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_summary_counts() {
        let mut services = HashMap::new();
        for (i, access) in [Access::Granted, Access::Granted, Access::Denied, Access::Unknown]
            .into_iter()
            .enumerate()
        {
            let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, i as u8 + 1));
            services.insert(Service::new(Protocol::Ftp, addr), access);
        }

        let summary = ScanSummary::from_services(&services);
        assert_eq!(summary.granted, 2);
        assert_eq!(summary.denied, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.empty, 0);
        assert_eq!(summary.total(), 4);
    }
}
