//! JSON output formatting
//!
//! Wraps a `RunSummary` with a timestamp and tool version, and writes durations
//! both as microseconds and in human-readable form.

use super::{format_duration_human, RunSummary, WorkerUnits};
use crate::config::cli::ExecutionMode;
use crate::stats::histogram::TurnaroundSummary;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = format_duration_human(d);
        Self { micros, human }
    }
}

/// Turnaround percentiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTurnaround {
    pub samples: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<JsonDuration>,
}

impl From<&TurnaroundSummary> for JsonTurnaround {
    fn from(summary: &TurnaroundSummary) -> Self {
        Self {
            samples: summary.samples,
            min: summary.min.map(JsonDuration::from_duration),
            p50: summary.p50.map(JsonDuration::from_duration),
            p99: summary.p99.map(JsonDuration::from_duration),
            max: summary.max.map(JsonDuration::from_duration),
            mean: summary.mean.map(JsonDuration::from_duration),
        }
    }
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    /// RFC 3339 local time the report was written
    pub timestamp: String,
    pub version: String,
    pub mode: ExecutionMode,
    pub kernel: String,
    pub workers: usize,
    pub units: u64,
    pub unit_size: u64,
    pub total_attempts: u64,
    pub total_hits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_error: Option<f64>,
    pub elapsed: JsonDuration,
    pub samples_per_sec: f64,
    pub per_worker: Vec<WorkerUnits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnaround: Option<JsonTurnaround>,
}

impl JsonReport {
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: summary.mode,
            kernel: summary.kernel.clone(),
            workers: summary.workers,
            units: summary.units,
            unit_size: summary.unit_size,
            total_attempts: summary.aggregate.total_attempts(),
            total_hits: summary.aggregate.total_hits(),
            estimate: summary.estimate,
            reference: summary.reference,
            abs_error: summary.abs_error(),
            elapsed: JsonDuration::from_duration(summary.elapsed),
            samples_per_sec: summary.samples_per_sec(),
            per_worker: summary.per_worker.clone(),
            turnaround: summary.turnaround.as_ref().map(JsonTurnaround::from),
        }
    }
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, summary: &RunSummary, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let report = JsonReport::from_summary(summary);

    if pretty {
        serde_json::to_writer_pretty(file, &report)?;
    } else {
        serde_json::to_writer(file, &report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_summary;

    #[test]
    fn test_json_duration() {
        let d = JsonDuration::from_duration(Duration::from_micros(1500));
        assert_eq!(d.micros, 1500);
        assert_eq!(d.human, "1.500ms");
    }

    #[test]
    fn test_report_fields() {
        let report = JsonReport::from_summary(&sample_summary());

        assert_eq!(report.total_attempts, 2000);
        assert_eq!(report.total_hits, 1571);
        assert_eq!(report.elapsed.micros, 1_500_000);
        assert!(report.abs_error.is_some());
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        write_json_output(&path, &sample_summary(), true).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mode"], "local");
        assert_eq!(value["units"], 2);
        assert_eq!(value["per_worker"][1]["worker_id"], 2);
        // Static-style summaries carry no turnaround section
        assert!(value.get("turnaround").is_none());
    }

    #[test]
    fn test_turnaround_section_when_present() {
        let mut summary = sample_summary();
        summary.turnaround = Some(TurnaroundSummary {
            samples: 2,
            min: Some(Duration::from_micros(5)),
            ..TurnaroundSummary::default()
        });

        let json = serde_json::to_value(JsonReport::from_summary(&summary)).unwrap();
        assert_eq!(json["turnaround"]["samples"], 2);
        assert_eq!(json["turnaround"]["min"]["micros"], 5);
        assert!(json["turnaround"].get("p99").is_none());
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("run.json");
        assert!(write_json_output(&path, &sample_summary(), false).is_err());
    }
}
