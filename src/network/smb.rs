//! File-share listing through the Samba `smbclient` tool

use async_trait::async_trait;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::collaborators::ShareLister;
use crate::ScanError;

/// Lists guest-visible shares by running `smbclient -N -g -L //host`
#[derive(Debug, Clone)]
pub struct SmbClientLister {
    smbclient_path: String,
}

impl Default for SmbClientLister {
    fn default() -> Self {
        Self::new("smbclient")
    }
}

impl SmbClientLister {
    pub fn new(smbclient_path: impl Into<String>) -> Self {
        Self {
            smbclient_path: smbclient_path.into(),
        }
    }

    fn command(&self, addr: IpAddr, port: u16, timeout: Duration) -> Command {
        let mut cmd = Command::new(&self.smbclient_path);
        cmd.arg("-N")
            .arg("-g")
            .arg("-L")
            .arg(format!("//{}", addr))
            .arg("-p")
            .arg(port.to_string())
            .arg("-t")
            .arg(timeout.as_secs().max(1).to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ShareLister for SmbClientLister {
    async fn list_root(
        &self,
        addr: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> crate::Result<Vec<String>> {
        let output = tokio::time::timeout(timeout, self.command(addr, port, timeout).output())
            .await?
            .map_err(|e| {
                ScanError::NetworkError(format!("Failed to execute {}: {}", self.smbclient_path, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let reason = stderr
                .lines()
                .chain(stdout.lines())
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output")
                .trim()
                .to_string();
            return Err(ScanError::ProtocolError(format!("share listing failed: {}", reason)));
        }

        Ok(parse_share_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `smbclient -g` output (`Disk|name|comment`). Administrative shares
/// ending in `$` are not content and are skipped.
pub fn parse_share_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('|');
            let kind = fields.next()?.trim();
            let name = fields.next()?.trim();
            if kind.eq_ignore_ascii_case("Disk") && !name.is_empty() && !name.ends_with('$') {
                Some(name.to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_share_list() {
        let out = "\
Disk|public|Public files
IPC|IPC$|IPC Service (Samba)
Disk|print$|Printer Drivers
Disk|media|
Workgroup|WORKGROUP|NAS
";
        assert_eq!(parse_share_list(out), vec!["public".to_string(), "media".to_string()]);
        assert!(parse_share_list("session setup failed: NT_STATUS_ACCESS_DENIED").is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let lister = SmbClientLister::new("/nonexistent/smbclient-for-tests");
        let result = lister
            .list_root(IpAddr::V4(Ipv4Addr::LOCALHOST), 445, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ScanError::NetworkError(_))));
    }
}
