//! CLI argument parsing using clap

use super::DEFAULT_UNITS;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Coordinator and workers as tasks in this process (default)
    #[default]
    Local,
    /// Fixed up-front partition across workers, no coordinator
    Static,
    /// Drive worker node services on other hosts
    Coordinator,
    /// Run a node service and wait for a coordinator
    Worker,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionMode::Local => "local",
            ExecutionMode::Static => "static",
            ExecutionMode::Coordinator => "coordinator",
            ExecutionMode::Worker => "worker",
        };
        f.write_str(name)
    }
}

/// MontePulse - distributed Monte Carlo estimation with dynamic load balancing
#[derive(Parser, Debug)]
#[command(name = "montepulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of work units to run
    ///
    /// Missing, non-numeric, or zero values fall back to 1000.
    #[arg(value_name = "UNITS")]
    pub units: Option<String>,

    /// Execution mode: local, static, coordinator, or worker
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,

    /// Number of workers (local and static modes; default: number of CPUs)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Samples per work unit
    #[arg(long)]
    pub unit_size: Option<u64>,

    /// Base seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// TOML configuration file (command-line values take precedence)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Comma-separated worker node addresses for coordinator mode (e.g., "10.0.1.10:9999,10.0.1.11")
    #[arg(long)]
    pub hosts: Option<String>,

    /// Port for the node service to listen on (worker mode only)
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Keep the node service running after a run completes (worker mode only)
    #[arg(long)]
    pub persistent: bool,

    /// Write a JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Interpret the positional unit count
///
/// Anything that is not a positive integer falls back to `DEFAULT_UNITS`
/// with a warning; a bad count is never fatal.
pub fn parse_unit_count(arg: Option<&str>) -> u64 {
    let Some(raw) = arg else {
        return DEFAULT_UNITS;
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => {
            tracing::warn!("unit count must be positive, using default of {}", DEFAULT_UNITS);
            DEFAULT_UNITS
        }
        Ok(units) => units,
        Err(_) => {
            tracing::warn!(
                "could not parse unit count {:?}, using default of {}",
                raw,
                DEFAULT_UNITS
            );
            DEFAULT_UNITS
        }
    }
}

/// Split a comma-separated host list, appending `default_port` where an
/// entry has none
pub fn parse_host_list(list: &str, default_port: u16) -> anyhow::Result<Vec<String>> {
    let mut hosts = Vec::new();

    for entry in list.split(',').map(str::trim) {
        if entry.is_empty() {
            anyhow::bail!("Empty entry in host list {:?}", list);
        }
        if entry.contains(':') {
            hosts.push(entry.to_string());
        } else {
            hosts.push(format!("{}:{}", entry, default_port));
        }
    }

    Ok(hosts)
}
