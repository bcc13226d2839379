//! Turnaround histogram using HdrHistogram
//!
//! Tracks how long each work unit spent between being dispatched by the
//! coordinator and its result arriving back. The spread of these values is the
//! quickest way to see whether the pool is evenly loaded or whether some
//! workers (or hosts) are consistently slower.
//!
//! # Example
//!
//! ```
//! use montepulse::stats::histogram::TurnaroundHistogram;
//! use std::time::Duration;
//!
//! let mut hist = TurnaroundHistogram::new();
//! hist.record(Duration::from_millis(4));
//! hist.record(Duration::from_millis(6));
//!
//! assert_eq!(hist.len(), 2);
//! assert!(hist.percentile(50.0).is_some());
//! ```

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound of the tracked range: 1 hour in nanoseconds
const MAX_TRACKABLE_NANOS: u64 = 3_600_000_000_000;

/// Dispatch→result turnaround histogram
///
/// Configured for 1ns..1h with 3 significant digits, so every recorded value
/// is accurate to within 0.1%.
#[derive(Debug, Clone)]
pub struct TurnaroundHistogram {
    histogram: Histogram<u64>,
}

impl TurnaroundHistogram {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, 3)
            .expect("static histogram bounds are valid");

        Self { histogram }
    }

    /// Record one unit's turnaround, clamped into the trackable range
    #[inline]
    pub fn record(&mut self, turnaround: Duration) {
        let nanos = turnaround.as_nanos().min(MAX_TRACKABLE_NANOS as u128) as u64;
        let _ = self.histogram.record(nanos.max(1));
    }

    /// Value at `percentile` (0.0 - 100.0), or `None` when empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.value_at_percentile(percentile)))
    }

    pub fn min(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.mean() as u64))
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Condense into the fixed set of figures the reports print
    pub fn summary(&self) -> TurnaroundSummary {
        TurnaroundSummary {
            samples: self.len(),
            min: self.min(),
            p50: self.percentile(50.0),
            p99: self.percentile(99.0),
            max: self.max(),
            mean: self.mean(),
        }
    }
}

impl Default for TurnaroundHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Reported turnaround figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnaroundSummary {
    pub samples: u64,
    pub min: Option<Duration>,
    pub p50: Option<Duration>,
    pub p99: Option<Duration>,
    pub max: Option<Duration>,
    pub mean: Option<Duration>,
}
