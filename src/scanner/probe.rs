//! Per-service probing
//!
//! A probe turns one [`Service`] into an [`Access`] verdict:
//!
//! 1. TCP reachability of the protocol's port. Unreachable services get no
//!    entry at all.
//! 2. A provisional verdict is written at once: `granted` for http/https,
//!    `unknown` for ftp/smb.
//! 3. ftp and smb are then asked for an anonymous root listing: empty means
//!    `empty`, non-empty means `granted`, any failure means `denied`.
//!
//! If the classification step never finishes (the task panics, or the
//! listing grows past the accepted size), the provisional `unknown` stays
//! in place as the terminal verdict.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::error::Elapsed;

use super::service::Service;
use crate::network::{Access, Collaborators, Protocol};

/// Per-run verdict map shared by all probe tasks of one scan
pub type ResultMap = DashMap<Service, Access>;

/// Probing state machine shared by every task of a scan
#[derive(Debug, Clone)]
pub struct ProtocolProbe {
    collaborators: Collaborators,
    timeout: Duration,
}

impl ProtocolProbe {
    pub fn new(collaborators: Collaborators, timeout: Duration) -> Self {
        Self {
            collaborators,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Probe one service and record the verdict in `results`.
    ///
    /// Returns the verdict written, or `None` when the service was
    /// unreachable and nothing was written.
    pub async fn run(&self, service: &Service, results: &ResultMap) -> Option<Access> {
        let addr = service.address();
        let port = service.port();

        let reachable = tokio::time::timeout(
            self.timeout,
            self.collaborators
                .reachability
                .is_reachable(addr, port, self.timeout),
        )
        .await
        .unwrap_or(false);

        if !reachable {
            log::trace!("{} unreachable", service);
            return None;
        }

        let provisional = if service.protocol().is_web() {
            Access::Granted
        } else {
            Access::Unknown
        };
        results.insert(service.clone(), provisional);
        log::debug!("{} reachable, provisional verdict {}", service, provisional);

        if provisional != Access::Unknown {
            return Some(provisional);
        }

        let verdict = match service.protocol() {
            Protocol::Ftp => {
                let listing = tokio::time::timeout(
                    self.timeout,
                    self.collaborators.ftp.list_anonymous(addr, port, self.timeout),
                )
                .await;
                classify(service, listing)
            }
            Protocol::Smb => {
                let listing = tokio::time::timeout(
                    self.timeout,
                    self.collaborators.smb.list_root(addr, port, self.timeout),
                )
                .await;
                classify(service, listing)
            }
            Protocol::Http | Protocol::Https => Access::Granted,
        };

        if verdict != Access::Unknown {
            results.insert(service.clone(), verdict);
        }
        log::debug!("{} verdict {}", service, verdict);
        Some(verdict)
    }
}

fn classify(service: &Service, outcome: Result<crate::Result<Vec<String>>, Elapsed>) -> Access {
    match outcome {
        Ok(Ok(listing)) => Access::from_listing(&listing),
        Ok(Err(e)) if e.is_resource_exhaustion() => {
            log::debug!("{} listing abandoned: {}", service, e);
            Access::Unknown
        }
        Ok(Err(e)) => {
            if e.is_protocol_level() {
                log::debug!("{} refused anonymous access: {}", service, e);
            } else {
                log::debug!("{} listing failed: {}", service, e);
            }
            Access::Denied
        }
        Err(_) => {
            log::debug!("{} listing timed out", service);
            Access::Denied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{FtpLister, HostnameResolver, Reachability, ShareLister};
    use crate::ScanError;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    struct Fixed(bool);

    #[async_trait]
    impl Reachability for Fixed {
        async fn is_reachable(&self, _: IpAddr, _: u16, _: Duration) -> bool {
            self.0
        }
    }

    enum Listing {
        Entries(Vec<&'static str>),
        Fail,
        Oversized,
        Hang,
    }

    #[async_trait]
    impl FtpLister for Listing {
        async fn list_anonymous(&self, _: IpAddr, _: u16, _: Duration) -> crate::Result<Vec<String>> {
            self.answer().await
        }
    }

    #[async_trait]
    impl ShareLister for Listing {
        async fn list_root(&self, _: IpAddr, _: u16, _: Duration) -> crate::Result<Vec<String>> {
            self.answer().await
        }
    }

    impl Listing {
        async fn answer(&self) -> crate::Result<Vec<String>> {
            match self {
                Listing::Entries(e) => Ok(e.iter().map(|s| s.to_string()).collect()),
                Listing::Fail => Err(ScanError::ProtocolError("530 Login incorrect".into())),
                Listing::Oversized => Err(ScanError::ResponseTooLarge("listing".into())),
                Listing::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    struct NoNames;

    #[async_trait]
    impl HostnameResolver for NoNames {
        async fn resolve(&self, _: IpAddr, _: Duration) -> crate::Result<String> {
            Err(ScanError::ResolveError("none".into()))
        }
    }

    fn probe(reachable: bool, listing: Listing) -> ProtocolProbe {
        let listing = Arc::new(listing);
        let collaborators = Collaborators {
            reachability: Arc::new(Fixed(reachable)),
            ftp: listing.clone(),
            smb: listing,
            resolver: Arc::new(NoNames),
        };
        ProtocolProbe::new(collaborators, Duration::from_millis(200))
    }

    fn service(protocol: Protocol) -> Service {
        Service::new(protocol, IpAddr::V4(Ipv4Addr::new(192, 168, 0, 9)))
    }

    #[tokio::test]
    async fn test_web_reachable_is_granted() {
        for protocol in [Protocol::Http, Protocol::Https] {
            let results = ResultMap::new();
            let s = service(protocol);
            let verdict = probe(true, Listing::Fail).run(&s, &results).await;
            assert_eq!(verdict, Some(Access::Granted));
            assert_eq!(results.get(&s).map(|v| *v), Some(Access::Granted));
        }
    }

    #[tokio::test]
    async fn test_unreachable_writes_nothing() {
        let results = ResultMap::new();
        let s = service(Protocol::Ftp);
        assert_eq!(probe(false, Listing::Entries(vec!["pub"])).run(&s, &results).await, None);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_ftp_verdicts() {
        let cases = [
            (Listing::Entries(vec![]), Access::Empty),
            (Listing::Entries(vec!["pub"]), Access::Granted),
            (Listing::Fail, Access::Denied),
        ];
        for (listing, expected) in cases {
            let results = ResultMap::new();
            let s = service(Protocol::Ftp);
            assert_eq!(probe(true, listing).run(&s, &results).await, Some(expected));
            assert_eq!(results.get(&s).map(|v| *v), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_smb_verdicts() {
        let results = ResultMap::new();
        let s = service(Protocol::Smb);
        assert_eq!(
            probe(true, Listing::Entries(vec!["public"])).run(&s, &results).await,
            Some(Access::Granted)
        );

        let results = ResultMap::new();
        assert_eq!(probe(true, Listing::Fail).run(&s, &results).await, Some(Access::Denied));
    }

    #[tokio::test]
    async fn test_listing_timeout_is_denied() {
        let results = ResultMap::new();
        let s = service(Protocol::Smb);
        let verdict = tokio::time::timeout(
            Duration::from_secs(5),
            probe(true, Listing::Hang).run(&s, &results),
        )
        .await
        .unwrap();
        assert_eq!(verdict, Some(Access::Denied));
    }

    #[tokio::test]
    async fn test_oversized_listing_stays_unknown() {
        for protocol in [Protocol::Ftp, Protocol::Smb] {
            let results = ResultMap::new();
            let s = service(protocol);
            let verdict = probe(true, Listing::Oversized).run(&s, &results).await;
            assert_eq!(verdict, Some(Access::Unknown));
            assert_eq!(results.get(&s).map(|v| *v), Some(Access::Unknown));
        }
    }
}
