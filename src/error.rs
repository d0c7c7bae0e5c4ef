//! Error handling for the intrascan engine
//!
//! Errors raised by collaborators (reachability, FTP, SMB, name resolution)
//! never leave a probe task: they are folded into an [`Access`] verdict at
//! the task boundary. The variants below surface only from configuration,
//! address expansion and the collaborators themselves.
//!
//! [`Access`]: crate::network::Access

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid subnet size /{0}: expected 16..=32")]
    InvalidSubnet(u8),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Hostname resolution failed: {0}")]
    ResolveError(String),

    #[error("Response too large: {0}")]
    ResponseTooLarge(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

impl ScanError {
    /// Whether the error came from the remote side refusing or garbling
    /// the conversation rather than from the network path itself.
    pub fn is_protocol_level(&self) -> bool {
        matches!(self, ScanError::ProtocolError(_))
    }

    /// Whether the remote side tried to make us hold more than we accept
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, ScanError::ResponseTooLarge(_))
    }
}

/// Convert common errors to ScanError
impl From<std::net::AddrParseError> for ScanError {
    fn from(e: std::net::AddrParseError) -> Self {
        ScanError::InvalidTarget(e.to_string())
    }
}

impl From<std::num::ParseIntError> for ScanError {
    fn from(e: std::num::ParseIntError) -> Self {
        ScanError::ParseError(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ScanError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ScanError::Timeout
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(e: toml::de::Error) -> Self {
        ScanError::ConfigError(format!("Failed to parse TOML: {}", e))
    }
}
