//! Output formatting and management

use crate::network::{Access, Protocol};
use crate::scanner::{ScanSummary, Service};
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::net::IpAddr;
use std::time::Duration;

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
        }
    }
}

/// One line of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub url: String,
    pub protocol: Protocol,
    pub address: IpAddr,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub access: Access,
}

impl ServiceRecord {
    pub fn new(service: &Service, access: Access) -> Self {
        Self {
            url: service.to_string(),
            protocol: service.protocol(),
            address: service.address(),
            port: service.port(),
            hostname: service.cached_hostname(),
            access,
        }
    }
}

/// A finished scan, ready to be written out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub summary: ScanSummary,
    pub services: Vec<ServiceRecord>,
}

impl ScanReport {
    /// Build a report ordered by address, then protocol
    pub fn new(services: &HashMap<Service, Access>, duration: Duration) -> Self {
        let mut entries: Vec<_> = services.iter().collect();
        entries.sort_by_key(|(service, _)| service.key());

        Self {
            finished_at: Utc::now(),
            duration_ms: duration.as_millis() as u64,
            summary: ScanSummary::from_services(services),
            services: entries
                .into_iter()
                .map(|(service, access)| ServiceRecord::new(service, *access))
                .collect(),
        }
    }
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write the report to the configured file or stdout
    pub fn write_report(&self, report: &ScanReport) -> io::Result<()> {
        let output = self.render(report)?;

        match &self.config.file {
            Some(filename) => {
                let mut file = File::create(filename)?;
                file.write_all(output.as_bytes())?;
                log::info!("Report written to {}", filename);
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(output.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Render the report in the configured format
    pub fn render(&self, report: &ScanReport) -> io::Result<String> {
        match self.config.format {
            OutputFormat::Text => Ok(self.format_text(report)),
            OutputFormat::Json => self.format_json(report),
            OutputFormat::Csv => Ok(self.format_csv(report)),
        }
    }

    fn format_text(&self, report: &ScanReport) -> String {
        let mut output = String::new();

        for record in &report.services {
            let verdict = format!("{:<8}", record.access.to_string());
            let verdict = if self.config.colored {
                match record.access {
                    Access::Granted => verdict.bright_green().to_string(),
                    Access::Empty => verdict.bright_blue().to_string(),
                    Access::Denied => verdict.bright_red().to_string(),
                    Access::Unknown => verdict.bright_yellow().to_string(),
                }
            } else {
                verdict
            };

            match &record.hostname {
                Some(host) if host != &record.address.to_string() => {
                    output.push_str(&format!("{} {:<28} ({})\n", verdict, record.url, host))
                }
                _ => output.push_str(&format!("{} {}\n", verdict, record.url)),
            }
        }

        let s = &report.summary;
        output.push_str(&format!(
            "\n{} services answered in {:.2}s: {} granted, {} empty, {} denied, {} unknown\n",
            s.total(),
            report.duration_ms as f64 / 1000.0,
            s.granted,
            s.empty,
            s.denied,
            s.unknown
        ));
        output
    }

    fn format_json(&self, report: &ScanReport) -> io::Result<String> {
        serde_json::to_string_pretty(report).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn format_csv(&self, report: &ScanReport) -> String {
        let mut csv = String::new();
        csv.push_str("protocol,address,port,hostname,access\n");

        for record in &report.services {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                record.protocol,
                record.address,
                record.port,
                record.hostname.as_deref().unwrap_or(""),
                record.access
            ));
        }
        csv
    }
}
