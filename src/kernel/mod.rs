//! Sampling kernel abstraction
//!
//! A sampling kernel executes exactly one work unit: given a unit size it draws
//! that many samples and reports how many of them were hits. Kernels are
//! stateless from the protocol's point of view, so any implementation of the
//! `SamplingKernel` trait can be plugged into the worker agent, the local
//! runner or the static baseline without touching the coordinator.
//!
//! A kernel also owns the reduction that turns the final aggregate into the
//! number the run is after. For the quarter-circle kernel that is the classic
//! `4 × hits / attempts` estimate of π.
//!
//! # Example
//!
//! ```
//! use montepulse::kernel::{QuarterCircleKernel, SamplingKernel};
//! use montepulse::stats::GlobalAggregate;
//!
//! let kernel = QuarterCircleKernel::with_seed(7);
//! let result = kernel.sample(10_000);
//! assert_eq!(result.attempts, 10_000);
//! assert!(result.hits <= 10_000);
//!
//! let aggregate: GlobalAggregate = std::iter::once(result).collect();
//! let estimate = kernel.estimate(&aggregate).unwrap();
//! assert!(estimate > 2.0 && estimate < 4.0);
//! ```

pub mod mock;

use crate::stats::{GlobalAggregate, ResultUnit};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kernel trait for all samplers
///
/// Kernels must be `Send + Sync`: in local mode one kernel instance is shared
/// by every worker task and invoked on the blocking thread pool.
pub trait SamplingKernel: Send + Sync {
    /// Execute one work unit of `unit_size` samples
    ///
    /// The returned `attempts` must equal `unit_size`; the coordinator treats
    /// anything else as a protocol violation.
    fn sample(&self, unit_size: u64) -> ResultUnit;

    /// Reduce the final aggregate into the run's estimate
    ///
    /// Returns `None` when the aggregate holds no attempts.
    fn estimate(&self, aggregate: &GlobalAggregate) -> Option<f64>;

    /// Value the estimate converges to, if known (used for the error line)
    fn reference_value(&self) -> Option<f64> {
        None
    }

    /// Short name for reports
    fn name(&self) -> &'static str;
}

/// `4 × hits / attempts`
pub fn quarter_circle_estimate(aggregate: &GlobalAggregate) -> Option<f64> {
    aggregate.hit_ratio().map(|ratio| 4.0 * ratio)
}

/// Monte Carlo π sampler
///
/// Draws points uniformly from the unit square and counts those that land
/// inside the quarter circle `x² + y² ≤ 1`.
///
/// Every call gets a fresh `Xoshiro256PlusPlus`. Unseeded kernels pull each
/// generator from OS entropy. Seeded kernels derive the generator from the
/// base seed and a per-call counter, so two calls never share a stream.
#[derive(Debug, Default)]
pub struct QuarterCircleKernel {
    seed: Option<u64>,
    calls: AtomicU64,
}

impl QuarterCircleKernel {
    /// Kernel seeded from OS entropy on every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel with a reproducible per-call seed sequence
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            calls: AtomicU64::new(0),
        }
    }

    /// Kernel for a given seed option, as carried by `RunConfig`
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    fn rng(&self) -> Xoshiro256PlusPlus {
        match self.seed {
            Some(seed) => {
                let call = self.calls.fetch_add(1, Ordering::Relaxed);
                // seed_from_u64 runs the input through SplitMix64, so adjacent
                // inputs still give unrelated streams
                Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(call))
            }
            None => Xoshiro256PlusPlus::from_entropy(),
        }
    }
}

impl SamplingKernel for QuarterCircleKernel {
    fn sample(&self, unit_size: u64) -> ResultUnit {
        let mut rng = self.rng();
        let mut hits = 0u64;

        for _ in 0..unit_size {
            let x: f64 = rng.gen();
            let y: f64 = rng.gen();
            if x * x + y * y <= 1.0 {
                hits += 1;
            }
        }

        ResultUnit::new(unit_size, hits)
    }

    fn estimate(&self, aggregate: &GlobalAggregate) -> Option<f64> {
        quarter_circle_estimate(aggregate)
    }

    fn reference_value(&self) -> Option<f64> {
        Some(std::f64::consts::PI)
    }

    fn name(&self) -> &'static str {
        "quarter-circle"
    }
}

/// Per-worker seed for processes that each build their own kernel
///
/// Keeps worker streams apart when every worker process is started with the
/// same `--seed`.
pub fn derive_worker_seed(seed: u64, worker_id: usize) -> u64 {
    seed ^ (worker_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_reports_unit_size_attempts() {
        let kernel = QuarterCircleKernel::new();
        let result = kernel.sample(1_000);
        assert_eq!(result.attempts, 1_000);
        assert!(result.hits <= 1_000);
    }

    #[test]
    fn test_empty_unit() {
        let kernel = QuarterCircleKernel::new();
        assert_eq!(kernel.sample(0), ResultUnit::new(0, 0));
    }

    #[test]
    fn test_seeded_kernels_repeat() {
        let a = QuarterCircleKernel::with_seed(42);
        let b = QuarterCircleKernel::with_seed(42);

        let first: Vec<_> = (0..4).map(|_| a.sample(500)).collect();
        let second: Vec<_> = (0..4).map(|_| b.sample(500)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeded_calls_use_distinct_streams() {
        let kernel = QuarterCircleKernel::with_seed(42);
        let results: Vec<_> = (0..8).map(|_| kernel.sample(10_000)).collect();
        // Eight identical hit counts from 10k samples each would mean the
        // generator is being reused
        assert!(results.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_estimate_formula() {
        let aggregate: GlobalAggregate =
            std::iter::once(ResultUnit::new(1_000, 785)).collect();
        let kernel = QuarterCircleKernel::new();
        assert_eq!(kernel.estimate(&aggregate), Some(3.14));
        assert_eq!(kernel.estimate(&GlobalAggregate::new()), None);
    }

    #[test]
    fn test_hit_ratio_near_quarter_pi() {
        let kernel = QuarterCircleKernel::with_seed(1);
        let result = kernel.sample(200_000);
        let ratio = result.hits as f64 / result.attempts as f64;
        assert!((ratio - std::f64::consts::FRAC_PI_4).abs() < 0.01);
    }

    #[test]
    fn test_derive_worker_seed_differs_per_worker() {
        assert_ne!(derive_worker_seed(5, 1), derive_worker_seed(5, 2));
        assert_eq!(derive_worker_seed(5, 0), 5);
    }
}
