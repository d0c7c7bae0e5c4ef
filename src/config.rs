//! Configuration module for the intrascan engine

use crate::network::Protocol;
use crate::scanner::range::{MAX_SUBNET, MIN_SUBNET};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for scanning operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of probe tasks allowed to run at the same time
    pub concurrency: usize,

    /// Timeout applied to every network operation of a probe, in milliseconds
    pub timeout: u64,

    /// Subnet size used to expand the base addresses
    pub subnet: u8,

    /// Base addresses; empty means the local interface address
    pub bases: Vec<IpAddr>,

    /// Protocols to probe on every candidate address
    pub protocols: Vec<Protocol>,

    /// Path of the smbclient binary used for share listing
    pub smbclient: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            timeout: 1000,
            subnet: 24,
            bases: Vec::new(),
            protocols: Protocol::ALL.to_vec(),
            smbclient: "smbclient".to_string(),
        }
    }
}

impl ScanConfig {
    /// Create a new scan configuration
    pub fn new(concurrency: usize, timeout: u64) -> Self {
        Self {
            concurrency,
            timeout,
            ..Default::default()
        }
    }

    /// Set the number of concurrent probes
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-operation timeout in milliseconds
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the subnet size
    pub fn with_subnet(mut self, subnet: u8) -> Self {
        self.subnet = subnet;
        self
    }

    /// Set the base addresses
    pub fn with_bases(mut self, bases: Vec<IpAddr>) -> Self {
        self.bases = bases;
        self
    }

    /// Set the protocols to probe
    pub fn with_protocols(mut self, protocols: Vec<Protocol>) -> Self {
        self.protocols = protocols;
        self
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::ScanError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: ScanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let config_path = home_dir.join(".intrascan.toml");

        if config_path.exists() {
            match Self::from_toml_file(&config_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.concurrency == 0 {
            return Err(crate::ScanError::ConfigError(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.concurrency > u32::MAX as usize {
            return Err(crate::ScanError::ConfigError(format!(
                "Concurrency {} is too large",
                self.concurrency
            )));
        }

        if self.timeout == 0 {
            return Err(crate::ScanError::ConfigError(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if !(MIN_SUBNET..=MAX_SUBNET).contains(&self.subnet) {
            return Err(crate::ScanError::InvalidSubnet(self.subnet));
        }

        if self.protocols.is_empty() {
            return Err(crate::ScanError::ConfigError("No protocols selected".to_string()));
        }

        Ok(())
    }
}
