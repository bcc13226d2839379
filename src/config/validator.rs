//! Configuration validation

use super::cli::ExecutionMode;
use super::RunConfig;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &RunConfig) -> Result<()> {
    validate_workload(config)?;

    match config.mode {
        ExecutionMode::Local | ExecutionMode::Static => validate_workers(config.workers)?,
        ExecutionMode::Coordinator => validate_hosts(&config.hosts)?,
        ExecutionMode::Worker => {}
    }

    Ok(())
}

/// Validate unit count and unit size
pub fn validate_workload(config: &RunConfig) -> Result<()> {
    if config.unit_size == 0 {
        anyhow::bail!("unit_size must be greater than 0");
    }

    if config.total_samples().is_none() {
        anyhow::bail!(
            "units ({}) × unit_size ({}) overflows the attempt counter",
            config.units,
            config.unit_size
        );
    }

    Ok(())
}

/// Validate the local worker count
pub fn validate_workers(workers: usize) -> Result<()> {
    if workers == 0 {
        anyhow::bail!("workers must be greater than 0");
    }

    Ok(())
}

/// Validate the coordinator's host list
pub fn validate_hosts(hosts: &[String]) -> Result<()> {
    if hosts.is_empty() {
        anyhow::bail!("coordinator mode needs at least one worker address (--hosts)");
    }

    for (i, host) in hosts.iter().enumerate() {
        if hosts[..i].contains(host) {
            anyhow::bail!("worker address {} is listed more than once", host);
        }
    }

    Ok(())
}
