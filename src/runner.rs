//! Run orchestration
//!
//! Wires a coordinator, its workers and a transport together for each mode
//! and turns the finished run into a `RunSummary`.
//!
//! A run is all-or-nothing: when any participant fails, every other
//! participant is torn down and no aggregate is reported.

use crate::baseline::run_static;
use crate::config::cli::ExecutionMode;
use crate::config::RunConfig;
use crate::coordinator::Coordinator;
use crate::distributed::channel::WorkerChannel;
use crate::distributed::coordinator::TcpCoordinatorChannel;
use crate::distributed::local::local_channels;
use crate::kernel::{QuarterCircleKernel, SamplingKernel};
use crate::output::{RunSummary, WorkerUnits};
use crate::worker::{WorkerAgent, WorkerReport};
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};

/// Finished local run
#[derive(Debug)]
pub struct LocalOutcome {
    /// Coordinator in its `Done` state
    pub coordinator: Coordinator,

    /// Worker reports in worker id order
    pub reports: Vec<WorkerReport>,
}

/// Run the coordinator and `workers` worker tasks in this process
///
/// The first worker failure aborts the remaining workers and the coordinator.
pub async fn run_local(
    workers: usize,
    units: u64,
    unit_size: u64,
    kernel: Arc<dyn SamplingKernel>,
) -> Result<LocalOutcome> {
    let mut coordinator = Coordinator::new(workers, units, unit_size)?;
    let (mut channel, endpoints) = local_channels(workers);

    let mut tasks = JoinSet::new();
    for mut endpoint in endpoints {
        let mut agent = WorkerAgent::new(endpoint.worker_id(), unit_size, Arc::clone(&kernel));
        tasks.spawn(async move { agent.serve(&mut endpoint).await });
    }

    let mut reports = Vec::with_capacity(workers);

    let coordinated = {
        let run = coordinator.run(&mut channel);
        tokio::pin!(run);

        loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = flatten(joined).map(|report| reports.push(report)) {
                        tasks.abort_all();
                        return Err(e.context("Worker failed; run aborted"));
                    }
                }
            }
        }
    };

    if let Err(e) = coordinated {
        tasks.abort_all();
        return Err(e.context("Coordinator failed; run aborted"));
    }

    while let Some(joined) = tasks.join_next().await {
        reports.push(flatten(joined)?);
    }
    reports.sort_by_key(|report| report.worker_id);

    Ok(LocalOutcome {
        coordinator,
        reports,
    })
}

/// Drive remote node services at `hosts` as the coordinator
///
/// Returns the coordinator in its `Done` state.
pub async fn run_remote(hosts: &[String], units: u64, unit_size: u64) -> Result<Coordinator> {
    let mut coordinator = Coordinator::new(hosts.len(), units, unit_size)?;
    let mut channel = TcpCoordinatorChannel::connect(hosts, unit_size).await?;

    coordinator
        .run(&mut channel)
        .await
        .context("Distributed run aborted")?;

    Ok(coordinator)
}

/// Run one of the coordinating modes described by `config`
///
/// Worker mode has no summary of its own and is rejected here.
pub async fn execute(config: &RunConfig) -> Result<RunSummary> {
    let kernel: Arc<dyn SamplingKernel> = Arc::new(QuarterCircleKernel::from_seed(config.seed));
    execute_with_kernel(config, kernel).await
}

/// `execute` with an explicit kernel
pub async fn execute_with_kernel(
    config: &RunConfig,
    kernel: Arc<dyn SamplingKernel>,
) -> Result<RunSummary> {
    let start = Instant::now();

    match config.mode {
        ExecutionMode::Local => {
            let outcome =
                run_local(config.workers, config.units, config.unit_size, Arc::clone(&kernel)).await?;
            Ok(dynamic_summary(config.mode, &outcome.coordinator, kernel.as_ref(), start))
        }
        ExecutionMode::Coordinator => {
            let coordinator = run_remote(&config.hosts, config.units, config.unit_size).await?;
            Ok(dynamic_summary(config.mode, &coordinator, kernel.as_ref(), start))
        }
        ExecutionMode::Static => {
            let (workers, units, unit_size) = (config.workers, config.units, config.unit_size);
            let rank_kernel = Arc::clone(&kernel);

            let outcome = tokio::task::spawn_blocking(move || {
                run_static(workers, units, unit_size, rank_kernel.as_ref())
            })
            .await
            .context("Static run panicked")??;

            let per_worker = outcome
                .assignments
                .iter()
                .enumerate()
                .map(|(rank, &units)| WorkerUnits {
                    worker_id: rank,
                    units,
                })
                .collect();

            Ok(RunSummary {
                mode: config.mode,
                kernel: kernel.name().to_string(),
                workers,
                units,
                unit_size,
                aggregate: outcome.aggregate,
                estimate: kernel.estimate(&outcome.aggregate),
                reference: kernel.reference_value(),
                elapsed: start.elapsed(),
                per_worker,
                turnaround: None,
            })
        }
        ExecutionMode::Worker => {
            anyhow::bail!("Worker mode runs a node service, not a coordinated run")
        }
    }
}

fn dynamic_summary(
    mode: ExecutionMode,
    coordinator: &Coordinator,
    kernel: &dyn SamplingKernel,
    start: Instant,
) -> RunSummary {
    RunSummary::from_coordinator(
        mode,
        coordinator,
        kernel.name(),
        coordinator.estimate_with(|aggregate| kernel.estimate(aggregate)),
        kernel.reference_value(),
        start.elapsed(),
    )
}

fn flatten(joined: std::result::Result<Result<WorkerReport>, JoinError>) -> Result<WorkerReport> {
    joined.context("Worker task panicked or was cancelled")?
}
