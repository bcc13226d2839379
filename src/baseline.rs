//! Static partition baseline
//!
//! The comparison point for the dynamic coordinator: the unit count is split
//! once, up front, and every rank runs its share without talking to anyone
//! until the final gather. Ranks `0..N-1` get `L / N` units each and the last
//! rank gets whatever is left, so one slow rank holds up the whole run.

use crate::kernel::SamplingKernel;
use crate::stats::GlobalAggregate;
use crate::Result;
use rayon::prelude::*;

/// Units assigned to each rank, indexed by rank
pub fn partition(workers: usize, units: u64) -> Vec<u64> {
    if workers == 0 {
        return Vec::new();
    }

    let base = units / workers as u64;
    let mut shares = vec![base; workers];
    shares[workers - 1] = units - base * (workers as u64 - 1);
    shares
}

/// Outcome of a static run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticOutcome {
    /// Units each rank was assigned
    pub assignments: Vec<u64>,

    /// Partial aggregate gathered from each rank
    pub per_rank: Vec<GlobalAggregate>,

    pub aggregate: GlobalAggregate,
}

/// Run `units` units of `unit_size` samples split statically across `workers`
///
/// Ranks execute in parallel on a dedicated rayon pool with one thread per rank.
pub fn run_static(
    workers: usize,
    units: u64,
    unit_size: u64,
    kernel: &dyn SamplingKernel,
) -> Result<StaticOutcome> {
    if workers == 0 {
        anyhow::bail!("Static run needs at least one worker");
    }
    if unit_size == 0 {
        anyhow::bail!("Unit size must be at least 1 sample");
    }
    if units.checked_mul(unit_size).is_none() {
        anyhow::bail!("{} units of {} samples overflow the attempt counter", units, unit_size);
    }

    let assignments = partition(workers, units);
    tracing::info!(
        base = assignments[0],
        last = assignments[workers - 1],
        "static partition: base ranks / last rank"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build rank thread pool: {}", e))?;

    let per_rank: Vec<GlobalAggregate> = pool.install(|| {
        assignments
            .par_iter()
            .enumerate()
            .map(|(rank, &share)| {
                tracing::debug!(rank, units = share, "rank starting");
                (0..share).map(|_| kernel.sample(unit_size)).collect()
            })
            .collect()
    });

    let mut aggregate = GlobalAggregate::new();
    for partial in &per_rank {
        aggregate.merge(partial);
    }

    Ok(StaticOutcome {
        assignments,
        per_rank,
        aggregate,
    })
}
