//! Human-readable text output

use super::{format_duration_human, RunSummary};
use crate::stats::histogram::TurnaroundSummary;
use std::time::Duration;

/// Print run results to console
///
/// Displays:
/// - Aggregate attempts and hits
/// - The estimate and its distance from the reference value
/// - Elapsed time and sampling rate
/// - Units per worker
/// - Turnaround percentiles (dynamic modes)
pub fn print_results(summary: &RunSummary) {
    print!("{}", render_results(summary));
}

/// Build the report printed by `print_results`
pub fn render_results(summary: &RunSummary) -> String {
    let mut out = String::new();
    let rule = "═══════════════════════════════════════════════════════════";

    out.push_str(rule);
    out.push('\n');
    out.push_str("                    RUN RESULTS\n");
    out.push_str(rule);
    out.push_str("\n\n");

    out.push_str(&format!(
        "Mode: {} ({} workers, kernel {})\n",
        summary.mode, summary.workers, summary.kernel
    ));
    out.push_str(&format!(
        "Units: {} × {} samples\n\n",
        format_number(summary.units),
        format_number(summary.unit_size)
    ));

    out.push_str("Aggregate:\n");
    out.push_str(&format!(
        "  Attempts: {}\n",
        format_number(summary.aggregate.total_attempts())
    ));
    out.push_str(&format!(
        "  Hits:     {}\n\n",
        format_number(summary.aggregate.total_hits())
    ));

    match summary.estimate {
        Some(estimate) => {
            out.push_str(&format!("Estimate: {:.10}\n", estimate));
            if let (Some(reference), Some(error)) = (summary.reference, summary.abs_error()) {
                out.push_str(&format!("  Reference:  {:.10}\n", reference));
                out.push_str(&format!("  Difference: {:.10}\n", error));
            }
        }
        None => out.push_str("Estimate: n/a (no samples)\n"),
    }
    out.push('\n');

    out.push_str(&format!(
        "Elapsed Time: {:.3}s ({} samples/s)\n\n",
        summary.elapsed.as_secs_f64(),
        format_number(summary.samples_per_sec() as u64)
    ));

    if !summary.per_worker.is_empty() {
        out.push_str("Units per worker:\n");
        for worker in &summary.per_worker {
            out.push_str(&format!(
                "  [Worker #{}] {} units\n",
                worker.worker_id,
                format_number(worker.units)
            ));
        }
        out.push('\n');
    }

    if let Some(turnaround) = &summary.turnaround {
        out.push_str(&render_turnaround(turnaround));
        out.push('\n');
    }

    out.push_str(rule);
    out.push('\n');
    out
}

fn render_turnaround(turnaround: &TurnaroundSummary) -> String {
    if turnaround.samples == 0 {
        return "Turnaround: no units dispatched\n".to_string();
    }

    let show = |d: Option<Duration>| d.map(format_duration_human).unwrap_or_else(|| "-".to_string());

    format!(
        "Turnaround ({} units):\n  min {}  p50 {}  p99 {}  max {}  mean {}\n",
        format_number(turnaround.samples),
        show(turnaround.min),
        show(turnaround.p50),
        show(turnaround.p99),
        show(turnaround.max),
        show(turnaround.mean),
    )
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_summary;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(500000), "500,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_report_contents() {
        let report = render_results(&sample_summary());

        assert!(report.contains("Attempts: 2,000"));
        assert!(report.contains("Hits:     1,571"));
        assert!(report.contains("Estimate: 3.1420000000"));
        assert!(report.contains("Difference:"));
        assert!(report.contains("[Worker #2] 1 units"));
        assert!(report.contains("Elapsed Time: 1.500s"));
        assert!(!report.contains("Turnaround"));
    }

    #[test]
    fn test_report_without_samples() {
        let mut summary = sample_summary();
        summary.estimate = None;
        summary.turnaround = Some(TurnaroundSummary::default());

        let report = render_results(&summary);
        assert!(report.contains("n/a"));
        assert!(!report.contains("Difference"));
        assert!(report.contains("no units dispatched"));
    }

    #[test]
    fn test_turnaround_line() {
        let turnaround = TurnaroundSummary {
            samples: 3,
            min: Some(Duration::from_micros(10)),
            p50: Some(Duration::from_micros(20)),
            p99: Some(Duration::from_millis(2)),
            max: Some(Duration::from_millis(2)),
            mean: Some(Duration::from_micros(700)),
        };

        let line = render_turnaround(&turnaround);
        assert!(line.contains("min 10µs"));
        assert!(line.contains("p99 2.000ms"));
    }
}
