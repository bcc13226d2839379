//! MontePulse CLI entry point

use anyhow::{Context, Result};
use montepulse::config::cli::{Cli, ExecutionMode};
use montepulse::config::{build_config, validator::validate_config, RunConfig};
use montepulse::distributed::NodeService;
use montepulse::output::{json::write_json_output, text::print_results};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    montepulse::logging::init_logging(cli.debug)?;

    let config = build_config(&cli)?;
    validate_config(&config).context("Configuration validation failed")?;

    println!("MontePulse v{}", env!("CARGO_PKG_VERSION"));
    println!("Distributed Monte Carlo estimation");
    println!();
    println!("{}", config);
    println!();

    match config.mode {
        ExecutionMode::Worker => run_worker(&config),
        ExecutionMode::Local | ExecutionMode::Static | ExecutionMode::Coordinator => {
            run_estimate(&config)
        }
    }
}

/// Run a coordinated estimate and report it
fn run_estimate(config: &RunConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let summary = runtime.block_on(montepulse::runner::execute(config))?;

    print_results(&summary);

    if let Some(path) = &config.json_output {
        write_json_output(path, &summary, true)?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

/// Run in worker mode (node service waiting for a coordinator)
fn run_worker(config: &RunConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let address = format!("0.0.0.0:{}", config.listen_port);
        let service = NodeService::bind(&address, config.seed)
            .await
            .context("Failed to create node service")?;

        if let Some(report) = service.run(config.persistent).await? {
            println!(
                "[Worker #{}] Terminated after {} units",
                report.worker_id, report.units_processed
            );
        }

        Ok(())
    })
}
