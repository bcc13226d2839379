//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use cli::{Cli, ExecutionMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Unit count used when the positional argument is missing or unusable
pub const DEFAULT_UNITS: u64 = 1000;

/// Samples per work unit
pub const DEFAULT_UNIT_SIZE: u64 = 100_000;

/// Port the worker node service listens on, and the port assumed for hosts
/// given without one
pub const DEFAULT_LISTEN_PORT: u16 = 9999;

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Number of work units (L)
    #[serde(default = "default_units")]
    pub units: u64,

    /// Number of workers (N) in local and static modes
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Samples per unit (S)
    #[serde(default = "default_unit_size")]
    pub unit_size: u64,

    /// Base seed for reproducible runs; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Worker node addresses, coordinator mode only
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Node service port, worker mode only
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Keep the node service accepting runs after the first one
    #[serde(default)]
    pub persistent: bool,

    /// Write a JSON report here
    #[serde(default)]
    pub json_output: Option<PathBuf>,
}

fn default_units() -> u64 {
    DEFAULT_UNITS
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_unit_size() -> u64 {
    DEFAULT_UNIT_SIZE
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            units: default_units(),
            workers: default_workers(),
            unit_size: default_unit_size(),
            seed: None,
            hosts: Vec::new(),
            listen_port: default_listen_port(),
            persistent: false,
            json_output: None,
        }
    }
}

impl RunConfig {
    /// Workers taking part in the run
    ///
    /// In coordinator mode this is the number of hosts; worker mode has no
    /// pool of its own.
    pub fn effective_workers(&self) -> usize {
        match self.mode {
            ExecutionMode::Coordinator => self.hosts.len(),
            ExecutionMode::Worker => 1,
            ExecutionMode::Local | ExecutionMode::Static => self.workers,
        }
    }

    /// Total samples drawn by the run, if it fits in a u64
    pub fn total_samples(&self) -> Option<u64> {
        self.units.checked_mul(self.unit_size)
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mode:        {}", self.mode)?;
        match self.mode {
            ExecutionMode::Worker => {
                writeln!(f, "Listen port: {}", self.listen_port)?;
                write!(f, "Persistent:  {}", self.persistent)
            }
            _ => {
                writeln!(f, "Workers:     {}", self.effective_workers())?;
                writeln!(f, "Units:       {}", self.units)?;
                write!(f, "Unit size:   {}", self.unit_size)?;
                if let Some(seed) = self.seed {
                    write!(f, "\nSeed:        {}", seed)?;
                }
                Ok(())
            }
        }
    }
}

/// Build the run configuration from the command line
///
/// Starts from the TOML file when `--config` is given, otherwise from the
/// defaults, then applies every value set on the command line.
pub fn build_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let base = match &cli.config {
        Some(path) => toml::parse_toml_file(path)?,
        None => RunConfig::default(),
    };

    toml::merge_cli_with_config(cli, base)
}
