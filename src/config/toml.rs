//! TOML configuration file parsing
//!
//! Every field is optional in the file; missing ones take the same defaults as
//! the command line.
//!
//! ```toml
//! mode = "local"
//! units = 5000
//! workers = 8
//! unit_size = 100000
//! seed = 42
//! hosts = ["10.0.1.10:9999", "10.0.1.11:9999"]
//! ```

use super::cli::{parse_host_list, parse_unit_count, Cli};
use super::RunConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<RunConfig> {
    let config: RunConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: RunConfig) -> Result<RunConfig> {
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(units) = cli.units.as_deref() {
        config.units = parse_unit_count(Some(units));
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(unit_size) = cli.unit_size {
        config.unit_size = unit_size;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    if let Some(list) = cli.hosts.as_deref() {
        config.hosts = parse_host_list(list, super::DEFAULT_LISTEN_PORT)?;
    }
    if cli.persistent {
        config.persistent = true;
    }
    if cli.json.is_some() {
        config.json_output = cli.json.clone();
    }

    Ok(config)
}
