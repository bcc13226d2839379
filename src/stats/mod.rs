//! Result aggregation
//!
//! This module holds the values that flow back from workers and the running
//! totals the coordinator folds them into:
//!
//! - **ResultUnit**: the (attempts, hits) pair produced by one executed work unit
//! - **GlobalAggregate**: the coordinator-owned running total of all results
//! - **TurnaroundHistogram**: dispatch→result latency per unit (see `histogram`)
//!
//! # Example
//!
//! ```
//! use montepulse::stats::{GlobalAggregate, ResultUnit};
//!
//! let mut aggregate = GlobalAggregate::new();
//! aggregate.fold(ResultUnit::new(100_000, 78_540));
//! aggregate.fold(ResultUnit::new(100_000, 78_532));
//!
//! assert_eq!(aggregate.total_attempts(), 200_000);
//! assert_eq!(aggregate.total_hits(), 157_072);
//! ```

pub mod histogram;

use serde::{Deserialize, Serialize};

/// Outcome of one executed work unit
///
/// Transient: the coordinator consumes it into the aggregate as soon as it
/// arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultUnit {
    /// Number of samples drawn
    pub attempts: u64,

    /// Number of samples that satisfied the kernel's predicate
    pub hits: u64,
}

impl ResultUnit {
    pub fn new(attempts: u64, hits: u64) -> Self {
        Self { attempts, hits }
    }
}

/// Running (attempts, hits) total
///
/// Only ever grows. The coordinator is the sole owner during a run; once the
/// run finishes the value is handed out by copy and treated as read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAggregate {
    total_attempts: u64,
    total_hits: u64,
}

impl GlobalAggregate {
    /// Create a zeroed aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one result into the running totals
    ///
    /// Saturates instead of wrapping; the config validator already rejects
    /// runs whose attempt count would not fit in a u64.
    pub fn fold(&mut self, result: ResultUnit) {
        self.total_attempts = self.total_attempts.saturating_add(result.attempts);
        self.total_hits = self.total_hits.saturating_add(result.hits);
    }

    /// Add another aggregate's totals into this one
    pub fn merge(&mut self, other: &GlobalAggregate) {
        self.fold(ResultUnit::new(other.total_attempts, other.total_hits));
    }

    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Fraction of attempts that were hits, or `None` before any attempt
    pub fn hit_ratio(&self) -> Option<f64> {
        if self.total_attempts == 0 {
            return None;
        }
        Some(self.total_hits as f64 / self.total_attempts as f64)
    }
}

impl FromIterator<ResultUnit> for GlobalAggregate {
    fn from_iter<I: IntoIterator<Item = ResultUnit>>(iter: I) -> Self {
        let mut aggregate = GlobalAggregate::new();
        for result in iter {
            aggregate.fold(result);
        }
        aggregate
    }
}
