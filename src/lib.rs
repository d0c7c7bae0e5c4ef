//! intrascan - finds anonymously accessible intranet services
//!
//! Probes http, https, ftp and smb on a range of candidate addresses under a
//! concurrency cap, and keeps the verdicts in a shared cache that answers
//! "may a reference to this service be accepted?".

pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;
pub mod utils;

// Re-export commonly used types
pub use cache::AccessCache;
pub use config::ScanConfig;
pub use error::{ScanError, ScanResult};
pub use network::{Access, Collaborators, Protocol};
pub use scanner::engine::ScanEngine;
pub use scanner::{Service, ServiceKey};

pub type Result<T> = std::result::Result<T, ScanError>;
