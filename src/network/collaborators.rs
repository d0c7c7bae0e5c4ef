//! Capability traits the probe depends on
//!
//! The engine never speaks a wire protocol itself. Everything that touches
//! the network goes through one of these traits so that tests can swap in
//! deterministic fakes and deployments can swap in better clients.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use super::ftp::AnonymousFtpClient;
use super::resolver::SystemResolver;
use super::smb::SmbClientLister;
use super::socket::TcpConnectScanner;

/// Bounded-time reachability check
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self, addr: IpAddr, port: u16, timeout: Duration) -> bool;
}

/// Anonymous login followed by a root directory listing
#[async_trait]
pub trait FtpLister: Send + Sync {
    async fn list_anonymous(
        &self,
        addr: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> crate::Result<Vec<String>>;
}

/// Guest listing of the shares/root of a file-share host
#[async_trait]
pub trait ShareLister: Send + Sync {
    async fn list_root(&self, addr: IpAddr, port: u16, timeout: Duration)
        -> crate::Result<Vec<String>>;
}

/// Reverse name lookup
#[async_trait]
pub trait HostnameResolver: Send + Sync {
    async fn resolve(&self, addr: IpAddr, timeout: Duration) -> crate::Result<String>;
}

/// The set of collaborators handed to every probe task
#[derive(Clone)]
pub struct Collaborators {
    pub reachability: Arc<dyn Reachability>,
    pub ftp: Arc<dyn FtpLister>,
    pub smb: Arc<dyn ShareLister>,
    pub resolver: Arc<dyn HostnameResolver>,
}

impl Collaborators {
    /// Default implementations backed by the operating system
    pub fn system(smbclient: impl Into<String>) -> Self {
        Self {
            reachability: Arc::new(TcpConnectScanner::new()),
            ftp: Arc::new(AnonymousFtpClient::default()),
            smb: Arc::new(SmbClientLister::new(smbclient)),
            resolver: Arc::new(SystemResolver::new()),
        }
    }

    pub fn with_reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = reachability;
        self
    }

    pub fn with_ftp(mut self, ftp: Arc<dyn FtpLister>) -> Self {
        self.ftp = ftp;
        self
    }

    pub fn with_smb(mut self, smb: Arc<dyn ShareLister>) -> Self {
        self.smb = smb;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn HostnameResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
