//! TCP connect reachability check

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

use super::collaborators::Reachability;
use crate::ScanError;

/// TCP connect scanner: a service is reachable when a full handshake
/// completes within the timeout
#[derive(Debug, Clone, Default)]
pub struct TcpConnectScanner;

impl TcpConnectScanner {
    pub fn new() -> Self {
        Self
    }

    /// Perform a TCP connect check on a single port
    pub async fn scan_port(&self, target: IpAddr, port: u16, timeout: Duration) -> bool {
        let addr = SocketAddr::new(target, port);

        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                log::trace!("connect {} failed: {}", addr, e);
                false
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Reachability for TcpConnectScanner {
    async fn is_reachable(&self, addr: IpAddr, port: u16, timeout: Duration) -> bool {
        self.scan_port(addr, port, timeout).await
    }
}

/// Determine the primary local IPv4 address by routing a UDP socket
/// towards a public address. No packet is sent.
pub fn local_ipv4() -> crate::Result<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| ScanError::NetworkError(e.to_string()))?;
    socket
        .connect("8.8.8.8:80")
        .map_err(|e| ScanError::NetworkError(e.to_string()))?;

    let local_addr = socket
        .local_addr()
        .map_err(|e| ScanError::NetworkError(e.to_string()))?;

    match local_addr.ip() {
        IpAddr::V4(ipv4) => Ok(ipv4),
        IpAddr::V6(_) => Err(ScanError::InvalidTarget(
            "No local IPv4 address available".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let scanner = TcpConnectScanner::new();
        assert!(
            scanner
                .is_reachable(IpAddr::V4(Ipv4Addr::LOCALHOST), port, Duration::from_secs(2))
                .await
        );
    }

    #[tokio::test]
    async fn test_closed_port() {
        // Bind then drop to obtain a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let scanner = TcpConnectScanner::new();
        assert!(
            !scanner
                .scan_port(IpAddr::V4(Ipv4Addr::LOCALHOST), port, Duration::from_millis(500))
                .await
        );
    }
}
