//! Mock sampling kernel for testing
//!
//! `MockKernel` returns a deterministic hit count for every unit and counts how
//! many units it has executed, which makes protocol tests exact instead of
//! statistical.
//!
//! # Example
//!
//! ```
//! use montepulse::kernel::SamplingKernel;
//! use montepulse::kernel::mock::MockKernel;
//!
//! let kernel = MockKernel::new(3, 4);
//! let result = kernel.sample(100);
//! assert_eq!(result.attempts, 100);
//! assert_eq!(result.hits, 75);
//! assert_eq!(kernel.calls(), 1);
//! ```

use super::SamplingKernel;
use crate::stats::{GlobalAggregate, ResultUnit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Deterministic kernel: `hits = unit_size × numerator / denominator`
///
/// Clones share the invocation counter.
#[derive(Debug, Clone)]
pub struct MockKernel {
    numerator: u64,
    denominator: u64,
    calls: Arc<AtomicU64>,
}

impl MockKernel {
    pub fn new(numerator: u64, denominator: u64) -> Self {
        assert!(denominator > 0, "MockKernel denominator must be non-zero");
        assert!(numerator <= denominator, "MockKernel hit ratio must be <= 1");

        Self {
            numerator,
            denominator,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of units executed so far, across all clones
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new(1, 2)
    }
}

impl SamplingKernel for MockKernel {
    fn sample(&self, unit_size: u64) -> ResultUnit {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hits = (unit_size as u128 * self.numerator as u128 / self.denominator as u128) as u64;
        ResultUnit::new(unit_size, hits)
    }

    fn estimate(&self, aggregate: &GlobalAggregate) -> Option<f64> {
        aggregate.hit_ratio()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
