//! Output formatting
//!
//! Every mode ends in a `RunSummary`, which is then printed as a text report
//! and optionally written as JSON.

pub mod json;
pub mod text;

use crate::config::cli::ExecutionMode;
use crate::coordinator::Coordinator;
use crate::distributed::protocol::WorkerId;
use crate::stats::histogram::TurnaroundSummary;
use crate::stats::GlobalAggregate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Units completed by one worker (or rank, in static mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerUnits {
    pub worker_id: WorkerId,
    pub units: u64,
}

/// Final result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: ExecutionMode,
    pub kernel: String,
    pub workers: usize,
    pub units: u64,
    pub unit_size: u64,
    pub aggregate: GlobalAggregate,
    pub estimate: Option<f64>,

    /// Value the estimate should converge to, when the kernel knows it
    pub reference: Option<f64>,

    pub elapsed: Duration,
    pub per_worker: Vec<WorkerUnits>,

    /// Dispatch-to-result turnaround; only the dynamic modes measure it
    pub turnaround: Option<TurnaroundSummary>,
}

impl RunSummary {
    /// Summary of a finished dynamic run
    pub fn from_coordinator(
        mode: ExecutionMode,
        coordinator: &Coordinator,
        kernel: &str,
        estimate: Option<f64>,
        reference: Option<f64>,
        elapsed: Duration,
    ) -> Self {
        let per_worker = coordinator
            .workers()
            .iter()
            .map(|w| WorkerUnits {
                worker_id: w.id(),
                units: w.units_completed(),
            })
            .collect();

        Self {
            mode,
            kernel: kernel.to_string(),
            workers: coordinator.workers().len(),
            units: coordinator.total_units(),
            unit_size: coordinator.unit_size(),
            aggregate: coordinator.aggregate(),
            estimate,
            reference,
            elapsed,
            per_worker,
            turnaround: Some(coordinator.turnaround().summary()),
        }
    }

    /// Absolute difference between the estimate and the reference value
    pub fn abs_error(&self) -> Option<f64> {
        match (self.estimate, self.reference) {
            (Some(estimate), Some(reference)) => Some((estimate - reference).abs()),
            _ => None,
        }
    }

    /// Samples per second over the whole run
    pub fn samples_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.aggregate.total_attempts() as f64 / secs
    }
}

/// Format duration in human-readable format
pub fn format_duration_human(d: Duration) -> String {
    let micros = d.as_micros() as u64;

    if micros == 0 {
        return "0µs".to_string();
    }

    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else if micros < 3_600_000_000 {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    } else {
        format!("{:.2}h", micros as f64 / 3_600_000_000.0)
    }
}
