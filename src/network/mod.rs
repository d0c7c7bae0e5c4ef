//! Network module: protocol and verdict types plus the collaborators used
//! while probing a service

pub mod collaborators;
pub mod ftp;
pub mod resolver;
pub mod smb;
pub mod socket;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use collaborators::{Collaborators, FtpLister, HostnameResolver, Reachability, ShareLister};

/// Protocols the scanner knows how to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Ftp,
    Smb,
}

impl Protocol {
    /// Every protocol, in the order they are enqueued by default
    pub const ALL: [Protocol; 4] = [Protocol::Ftp, Protocol::Http, Protocol::Https, Protocol::Smb];

    /// Canonical port of the protocol
    pub fn port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
            Protocol::Ftp => 21,
            Protocol::Smb => 445,
        }
    }

    /// URL scheme name
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Ftp => "ftp",
            Protocol::Smb => "smb",
        }
    }

    /// Web protocols are authorized by reachability alone
    pub fn is_web(&self) -> bool {
        matches!(self, Protocol::Http | Protocol::Https)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = crate::ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "ftp" => Ok(Protocol::Ftp),
            "smb" => Ok(Protocol::Smb),
            other => Err(crate::ScanError::ParseError(format!("Unknown protocol: {}", other))),
        }
    }
}

/// Verdict about a probed service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Reachable, but classification never finished
    Unknown,
    /// Anonymous access works and there is nothing to see
    Empty,
    /// Anonymous access works and content is listed
    Granted,
    /// The service refused anonymous access
    Denied,
}

impl Access {
    /// The only verdict that authorizes acceptance
    pub fn is_granted(&self) -> bool {
        *self == Access::Granted
    }

    /// Classify a directory listing obtained with anonymous credentials
    pub fn from_listing<T>(listing: &[T]) -> Self {
        if listing.is_empty() {
            Access::Empty
        } else {
            Access::Granted
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Unknown => write!(f, "unknown"),
            Access::Empty => write!(f, "empty"),
            Access::Granted => write!(f, "granted"),
            Access::Denied => write!(f, "denied"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_ports() {
        assert_eq!(Protocol::Http.port(), 80);
        assert_eq!(Protocol::Https.port(), 443);
        assert_eq!(Protocol::Ftp.port(), 21);
        assert_eq!(Protocol::Smb.port(), 445);
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("HTTPS".parse::<Protocol>().unwrap(), Protocol::Https);
        assert_eq!(" smb ".parse::<Protocol>().unwrap(), Protocol::Smb);
        assert!("gopher".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_access_from_listing() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(Access::from_listing(&empty), Access::Empty);
        assert_eq!(Access::from_listing(&["pub".to_string()]), Access::Granted);
        assert!(Access::Granted.is_granted());
        assert!(!Access::Empty.is_granted());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Access::Denied).unwrap(), "\"denied\"");
        assert_eq!(serde_json::from_str::<Protocol>("\"ftp\"").unwrap(), Protocol::Ftp);
    }
}
