//! Utility helpers shared by the binary

use std::time::Duration;

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize logger with specified level. `RUST_LOG` still wins when set.
    pub fn init(level: log::LevelFilter) {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level).format_timestamp_secs();
        if let Ok(spec) = std::env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        // A second init (tests, embedding) is harmless.
        let _ = builder.try_init();
    }

    /// Map `-v` repetitions to a level
    pub fn level_for(verbosity: u8) -> log::LevelFilter {
        match verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Log scan start
    pub fn log_scan_start(candidates: usize, protocols: usize, concurrency: usize) {
        log::info!(
            "Scanning {} addresses x {} protocols with {} concurrent probes",
            candidates,
            protocols,
            concurrency
        );
    }

    /// Log scan completion
    pub fn log_scan_complete(duration: Duration, answered: usize, granted: usize) {
        log::info!(
            "Scan completed in {:.2}s - {} services answered, {} granted",
            duration.as_secs_f64(),
            answered,
            granted
        );
    }
}
