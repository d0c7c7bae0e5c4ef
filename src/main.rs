use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use intrascan::{
    cache::AccessCache,
    config::ScanConfig,
    network::{socket::local_ipv4, Protocol},
    output::{OutputConfig, OutputFormat, OutputManager, ScanReport},
    scanner::{range, ScanEngine, ScanSummary},
    utils::Logger,
};

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(ulimit: Option<u64>) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            log::info!("Raised file descriptor limit to {}", limit);
        } else {
            eprintln!("{}", "[!] ERROR: Failed to set ulimit value.".bright_red());
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(_) => {
            eprintln!("{}", "[!] WARNING: Could not get file descriptor limit".bright_yellow());
            65535
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_ulimit: Option<u64>) -> u64 {
    65535
}

fn build_cli() -> Command {
    Command::new("intrascan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Finds anonymously accessible http, https, ftp and smb services on the local network")
        .arg(
            Arg::new("bases")
                .value_name("BASE")
                .help("Base IPv4 address(es) to expand; defaults to the local interface address")
                .value_parser(clap::value_parser!(IpAddr))
                .num_args(0..)
                .index(1),
        )
        .arg(
            Arg::new("subnet")
                .short('s')
                .long("subnet")
                .value_name("SIZE")
                .help("Subnet size: 16..=24 expands the surrounding block, 31 scans the base only")
                .value_parser(clap::value_parser!(u8)),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("N")
                .help("Number of probes running at the same time")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Timeout in milliseconds for every network operation of a probe")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("protocols")
                .short('p')
                .long("protocols")
                .value_name("LIST")
                .help("Comma separated protocols to probe (http,https,ftp,smb)")
                .value_delimiter(',')
                .value_parser(|s: &str| s.parse::<Protocol>().map_err(|e| e.to_string())),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Load configuration from a TOML file instead of ~/.intrascan.toml"),
        )
        .arg(
            Arg::new("smbclient")
                .long("smbclient")
                .value_name("PATH")
                .help("Path of the smbclient binary used to list shares"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .help("Report format: text, json or csv")
                .default_value("text")
                .value_parser(|s: &str| s.parse::<OutputFormat>()),
        )
        .arg(
            Arg::new("output-file")
                .long("output-file")
                .value_name("PATH")
                .help("Write the report to a file instead of stdout"),
        )
        .arg(
            Arg::new("resolve")
                .long("resolve")
                .help("Resolve hostnames of answering services for the report")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("extend")
                .long("extend")
                .help("Merge into the access cache keeping earlier granted services instead of replacing it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Hide the progress bar")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Raise the open file limit to this value before scanning")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count),
        )
}

/// File (or default) configuration overlaid with command line flags
fn build_config(matches: &ArgMatches) -> anyhow::Result<ScanConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_toml_file(path)?,
        None => ScanConfig::load_default_config(),
    };

    if let Some(bases) = matches.get_many::<IpAddr>("bases") {
        config.bases = bases.copied().collect();
    }
    if let Some(subnet) = matches.get_one::<u8>("subnet") {
        config.subnet = *subnet;
    }
    if let Some(concurrency) = matches.get_one::<usize>("concurrency") {
        config.concurrency = *concurrency;
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.timeout = *timeout;
    }
    if let Some(protocols) = matches.get_many::<Protocol>("protocols") {
        config.protocols = protocols.copied().collect();
        config.protocols.sort();
        config.protocols.dedup();
    }
    if let Some(smbclient) = matches.get_one::<String>("smbclient") {
        config.smbclient = smbclient.clone();
    }

    config.validate()?;
    Ok(config)
}

fn progress_bar(total: usize, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} probes {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▓░");
    bar.set_style(style);
    bar
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();
    Logger::init(Logger::level_for(matches.get_count("verbose")));

    if matches.get_flag("no-color") {
        colored::control::set_override(false);
    }

    let config = build_config(&matches)?;
    let fd_limit = adjust_ulimit_size(matches.get_one::<u64>("ulimit").copied());
    if (config.concurrency as u64) * 2 > fd_limit {
        log::warn!(
            "Concurrency {} may exhaust the open file limit ({}); consider --ulimit",
            config.concurrency,
            fd_limit
        );
    }

    let bases = if config.bases.is_empty() {
        let local = local_ipv4()?;
        log::info!("No base address given, using local address {}", local);
        vec![IpAddr::V4(local)]
    } else {
        config.bases.clone()
    };

    let candidates = range::expand_all(bases.iter().copied(), config.subnet)?;
    Logger::log_scan_start(candidates.len(), config.protocols.len(), config.concurrency);

    let mut engine = ScanEngine::new(&config)?;
    for protocol in &config.protocols {
        engine.add_protocol(*protocol, candidates.iter().copied());
    }

    let total = engine.pending();
    let bar = progress_bar(total, matches.get_flag("no-progress"));
    let monitor = engine.monitor();
    let started = Instant::now();
    engine.start();

    while monitor.pending() > 0 || monitor.active() > 0 {
        bar.set_position(total.saturating_sub(monitor.pending()) as u64);
        bar.set_message(format!("({} in flight)", monitor.active()));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    engine.terminate().await;
    bar.finish_and_clear();

    let services = engine.services();
    let elapsed = started.elapsed();

    if matches.get_flag("resolve") {
        let resolver = engine.collaborators().resolver.clone();
        let timeout = engine.timeout();
        stream::iter(services.keys())
            .for_each_concurrent(config.concurrency, |service| {
                let resolver = resolver.clone();
                async move {
                    service.hostname(resolver.as_ref(), timeout).await;
                }
            })
            .await;
    }

    let summary = ScanSummary::from_services(&services);
    Logger::log_scan_complete(elapsed, summary.total(), summary.granted);

    let cache = AccessCache::global();
    if matches.get_flag("extend") {
        cache.extend(services.clone());
    } else {
        cache.replace(services.clone());
    }

    let output = OutputManager::new(OutputConfig {
        format: matches
            .get_one::<OutputFormat>("output")
            .copied()
            .unwrap_or(OutputFormat::Text),
        file: matches.get_one::<String>("output-file").cloned(),
        colored: !matches.get_flag("no-color"),
    });
    output.write_report(&ScanReport::new(&services, elapsed))?;

    Ok(())
}
