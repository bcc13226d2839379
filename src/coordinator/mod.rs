//! Dynamic work coordinator
//!
//! The coordinator owns the work queue and the global aggregate and drives the
//! whole run through an explicit state machine:
//!
//! ```text
//! DispatchingInitial ──> AwaitingResults ──> Draining ──> Terminating ──> Done
//!                              │   ▲            ▲
//!                              └───┘            │
//!                     refill the replying       │
//!                     worker while units   last unit
//!                     remain               dispatched
//! ```
//!
//! - **DispatchingInitial**: one WORK to each of the first `min(N, L)` workers
//! - **AwaitingResults**: wildcard receive; every RESULT is folded into the
//!   aggregate and the worker that sent it immediately gets the next unit
//! - **Draining**: every unit has been dispatched; keep collecting until all
//!   `L` results are in
//! - **Terminating**: exactly one TERMINATE to every worker `1..=N`, including
//!   workers that never received a unit
//! - **Done**: the aggregate is final
//!
//! Refilling whichever worker just replied keeps the pool saturated without a
//! separate scheduler: fast workers simply come back more often.
//!
//! # Guarantees
//!
//! - every unit id in `0..L` is dispatched exactly once and completed once
//! - `total_attempts == L × unit_size` when the run returns `Ok`
//! - TERMINATE goes out only after the last RESULT, once per worker, and no
//!   WORK follows it
//!
//! There are no timeouts. A worker that dies without its connection closing
//! stalls the run forever.
//!
//! # Example
//!
//! ```
//! use montepulse::coordinator::Coordinator;
//! use montepulse::distributed::channel::WorkerChannel;
//! use montepulse::distributed::local::local_channels;
//! use montepulse::kernel::mock::MockKernel;
//! use montepulse::worker::WorkerAgent;
//! use std::sync::Arc;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let (mut channel, workers) = local_channels(2);
//!     let kernel = Arc::new(MockKernel::new(1, 2));
//!
//!     for mut worker_channel in workers {
//!         let mut agent = WorkerAgent::new(worker_channel.worker_id(), 1_000, kernel.clone());
//!         tokio::spawn(async move { agent.serve(&mut worker_channel).await });
//!     }
//!
//!     let mut coordinator = Coordinator::new(2, 10, 1_000).unwrap();
//!     let aggregate = coordinator.run(&mut channel).await.unwrap();
//!     assert_eq!(aggregate.total_attempts(), 10_000);
//! });
//! ```

use crate::distributed::channel::CoordinatorChannel;
use crate::distributed::protocol::{Message, ProtocolError, WorkUnit, WorkerId};
use crate::kernel::quarter_circle_estimate;
use crate::stats::histogram::TurnaroundHistogram;
use crate::stats::{GlobalAggregate, ResultUnit};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorState {
    DispatchingInitial,
    AwaitingResults,
    Draining,
    Terminating,
    Done,
}

/// Queue of undispatched unit identifiers `0..total`
///
/// Ids are handed out in ascending order, each exactly once.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    next: u64,
    total: u64,
}

impl WorkQueue {
    pub fn new(total: u64) -> Self {
        Self { next: 0, total }
    }

    /// Take the next undispatched unit
    pub fn pop(&mut self) -> Option<WorkUnit> {
        if self.next >= self.total {
            return None;
        }
        let unit = WorkUnit { id: self.next };
        self.next += 1;
        Some(unit)
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.next
    }

    pub fn dispatched(&self) -> u64 {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Unit currently assigned to a worker
#[derive(Debug, Clone, Copy)]
struct InFlight {
    unit: WorkUnit,
    dispatched_at: Instant,
}

/// Coordinator-side view of one worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    in_flight: Option<InFlight>,
    units_completed: u64,
    terminated: bool,
}

impl WorkerHandle {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            in_flight: None,
            units_completed: 0,
            terminated: false,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn units_completed(&self) -> u64 {
        self.units_completed
    }

    /// Whether this worker has been sent its TERMINATE
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Unit currently assigned to this worker, if any
    pub fn in_flight(&self) -> Option<WorkUnit> {
        self.in_flight.map(|f| f.unit)
    }
}

/// Dynamic work coordinator
///
/// All counters live here and nowhere else; nothing outside the coordinator
/// can observe them except through the read-only accessors.
#[derive(Debug)]
pub struct Coordinator {
    unit_size: u64,
    total_units: u64,
    queue: WorkQueue,
    completed: u64,
    aggregate: GlobalAggregate,
    workers: Vec<WorkerHandle>,
    state: CoordinatorState,
    turnaround: TurnaroundHistogram,
}

impl Coordinator {
    /// Create a coordinator for `worker_count` workers and `total_units` units
    /// of `unit_size` samples each
    pub fn new(worker_count: usize, total_units: u64, unit_size: u64) -> Result<Self> {
        if worker_count == 0 {
            anyhow::bail!("Coordinator needs at least one worker");
        }
        if unit_size == 0 {
            anyhow::bail!("Unit size must be at least 1 sample");
        }
        if total_units.checked_mul(unit_size).is_none() {
            anyhow::bail!(
                "{} units of {} samples overflow the attempt counter",
                total_units,
                unit_size
            );
        }

        Ok(Self {
            unit_size,
            total_units,
            queue: WorkQueue::new(total_units),
            completed: 0,
            aggregate: GlobalAggregate::new(),
            workers: (1..=worker_count).map(WorkerHandle::new).collect(),
            state: CoordinatorState::DispatchingInitial,
            turnaround: TurnaroundHistogram::new(),
        })
    }

    /// Run the distribution/collection/termination state machine to completion
    ///
    /// Returns the final aggregate. Any protocol violation or transport error
    /// aborts the run; the caller is expected to tear the whole group down.
    pub async fn run<C: CoordinatorChannel>(&mut self, channel: &mut C) -> Result<GlobalAggregate> {
        if self.state != CoordinatorState::DispatchingInitial {
            anyhow::bail!("Coordinator has already run (state {:?})", self.state);
        }
        if channel.worker_count() != self.workers.len() {
            anyhow::bail!(
                "Channel reaches {} workers but the coordinator was set up for {}",
                channel.worker_count(),
                self.workers.len()
            );
        }

        tracing::info!(
            workers = self.workers.len(),
            units = self.total_units,
            unit_size = self.unit_size,
            "coordinator starting"
        );

        self.dispatch_initial(channel).await?;
        self.collect_results(channel).await?;
        self.terminate_all(channel).await?;

        self.state = CoordinatorState::Done;
        tracing::info!(
            attempts = self.aggregate.total_attempts(),
            hits = self.aggregate.total_hits(),
            "coordinator finished"
        );

        Ok(self.aggregate)
    }

    async fn dispatch_initial<C: CoordinatorChannel>(&mut self, channel: &mut C) -> Result<()> {
        // Never more than one unit per worker and never more units than exist
        let initial = (self.workers.len() as u64).min(self.total_units) as usize;

        for worker_id in 1..=initial {
            if let Some(unit) = self.queue.pop() {
                self.dispatch(channel, worker_id, unit).await?;
            }
        }

        self.state = if self.queue.is_empty() {
            CoordinatorState::Draining
        } else {
            CoordinatorState::AwaitingResults
        };
        Ok(())
    }

    async fn collect_results<C: CoordinatorChannel>(&mut self, channel: &mut C) -> Result<()> {
        while self.completed < self.total_units {
            let (from, message) = channel.receive_any().await?;

            let result = match message {
                Message::Result(result) => result,
                other => {
                    let err = ProtocolError::UnexpectedAtCoordinator {
                        worker: from,
                        kind: other.kind(),
                    };
                    tracing::error!(%err, "aborting run");
                    return Err(err.into());
                }
            };

            self.record_result(from, result)?;

            if let Some(unit) = self.queue.pop() {
                self.dispatch(channel, from, unit).await?;
            }
            if self.queue.is_empty() {
                self.state = CoordinatorState::Draining;
            }
        }
        Ok(())
    }

    async fn terminate_all<C: CoordinatorChannel>(&mut self, channel: &mut C) -> Result<()> {
        self.state = CoordinatorState::Terminating;

        for index in 0..self.workers.len() {
            let handle = &mut self.workers[index];
            debug_assert!(!handle.terminated, "second TERMINATE");
            handle.terminated = true;
            let worker_id = handle.id;

            channel.send(worker_id, Message::Terminate).await?;
            tracing::debug!(worker = worker_id, "sent TERMINATE");
        }
        Ok(())
    }

    async fn dispatch<C: CoordinatorChannel>(
        &mut self,
        channel: &mut C,
        worker_id: WorkerId,
        unit: WorkUnit,
    ) -> Result<()> {
        let handle = self.handle_mut(worker_id)?;
        debug_assert!(!handle.terminated, "WORK after TERMINATE");
        debug_assert!(handle.in_flight.is_none(), "second unit in flight");

        handle.in_flight = Some(InFlight {
            unit,
            dispatched_at: Instant::now(),
        });

        channel.send(worker_id, Message::Work(unit)).await?;
        tracing::debug!(worker = worker_id, unit = unit.id, "dispatched unit");
        Ok(())
    }

    fn record_result(&mut self, from: WorkerId, result: ResultUnit) -> Result<()> {
        let unit_size = self.unit_size;
        let handle = self.handle_mut(from)?;

        let in_flight = handle
            .in_flight
            .take()
            .ok_or(ProtocolError::UnsolicitedResult(from))?;

        if result.attempts != unit_size {
            return Err(ProtocolError::AttemptMismatch {
                worker: from,
                expected: unit_size,
                got: result.attempts,
            }
            .into());
        }

        handle.units_completed += 1;
        let turnaround = in_flight.dispatched_at.elapsed();

        self.turnaround.record(turnaround);
        self.aggregate.fold(result);
        self.completed += 1;

        tracing::debug!(
            worker = from,
            unit = in_flight.unit.id,
            hits = result.hits,
            completed = self.completed,
            "collected result"
        );
        Ok(())
    }

    fn handle_mut(&mut self, worker_id: WorkerId) -> Result<&mut WorkerHandle> {
        worker_id
            .checked_sub(1)
            .and_then(|index| self.workers.get_mut(index))
            .ok_or_else(|| ProtocolError::UnknownWorker(worker_id).into())
    }

    /// Reduce the final aggregate with `reduce`
    ///
    /// Returns `None` until the run is done, and whenever `reduce` does.
    pub fn estimate_with<F>(&self, reduce: F) -> Option<f64>
    where
        F: FnOnce(&GlobalAggregate) -> Option<f64>,
    {
        if self.state != CoordinatorState::Done {
            return None;
        }
        reduce(&self.aggregate)
    }

    /// `4 × hits / attempts` over the final aggregate
    pub fn estimate(&self) -> Option<f64> {
        self.estimate_with(quarter_circle_estimate)
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn aggregate(&self) -> GlobalAggregate {
        self.aggregate
    }

    pub fn completed_units(&self) -> u64 {
        self.completed
    }

    pub fn dispatched_units(&self) -> u64 {
        self.queue.dispatched()
    }

    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    pub fn unit_size(&self) -> u64 {
        self.unit_size
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn turnaround(&self) -> &TurnaroundHistogram {
        &self.turnaround
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::protocol::MessageKind;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::collections::{HashMap, VecDeque};

    /// Order in which simulated workers answer outstanding units
    enum ReplyOrder {
        /// Oldest dispatch answers first
        Fifo,
        /// Newest dispatch answers first
        Lifo,
        /// Random outstanding unit answers first
        Shuffled(Xoshiro256PlusPlus),
    }

    /// Channel that plays every worker itself and records all traffic
    struct ScriptedChannel {
        worker_count: usize,
        unit_size: u64,
        order: ReplyOrder,
        outstanding: VecDeque<(WorkerId, WorkUnit)>,
        /// Every message the coordinator sent, in order
        sent: Vec<(WorkerId, Message)>,
        /// Number of RESULTs delivered before each send, parallel to `sent`
        results_before: Vec<u64>,
        delivered: u64,
        /// Injected replies returned ahead of simulated ones
        injected: VecDeque<(WorkerId, Message)>,
    }

    impl ScriptedChannel {
        fn new(worker_count: usize, unit_size: u64, order: ReplyOrder) -> Self {
            Self {
                worker_count,
                unit_size,
                order,
                outstanding: VecDeque::new(),
                sent: Vec::new(),
                results_before: Vec::new(),
                delivered: 0,
                injected: VecDeque::new(),
            }
        }

        fn shuffled(worker_count: usize, unit_size: u64, seed: u64) -> Self {
            Self::new(
                worker_count,
                unit_size,
                ReplyOrder::Shuffled(Xoshiro256PlusPlus::seed_from_u64(seed)),
            )
        }

        fn work_ids(&self) -> Vec<u64> {
            self.sent
                .iter()
                .filter_map(|(_, m)| match m {
                    Message::Work(unit) => Some(unit.id),
                    _ => None,
                })
                .collect()
        }

        fn terminates(&self) -> Vec<WorkerId> {
            self.sent
                .iter()
                .filter(|(_, m)| *m == Message::Terminate)
                .map(|(w, _)| *w)
                .collect()
        }
    }

    impl CoordinatorChannel for ScriptedChannel {
        fn worker_count(&self) -> usize {
            self.worker_count
        }

        async fn send(&mut self, to: WorkerId, message: Message) -> Result<()> {
            if let Message::Work(unit) = message {
                self.outstanding.push_back((to, unit));
            }
            self.sent.push((to, message));
            self.results_before.push(self.delivered);
            Ok(())
        }

        async fn receive_any(&mut self) -> Result<(WorkerId, Message)> {
            if let Some(injected) = self.injected.pop_front() {
                return Ok(injected);
            }

            let next = match &mut self.order {
                ReplyOrder::Fifo => self.outstanding.pop_front(),
                ReplyOrder::Lifo => self.outstanding.pop_back(),
                ReplyOrder::Shuffled(rng) => {
                    if self.outstanding.is_empty() {
                        None
                    } else {
                        let index = rng.gen_range(0..self.outstanding.len());
                        self.outstanding.remove(index)
                    }
                }
            };

            let (worker, unit) = match next {
                Some(next) => next,
                None => anyhow::bail!("receive_any with nothing outstanding would block forever"),
            };

            self.delivered += 1;
            let hits = unit.id % (self.unit_size + 1);
            Ok((worker, Message::Result(ResultUnit::new(self.unit_size, hits))))
        }
    }

    /// Check every run-level invariant against the recorded traffic
    fn assert_protocol_invariants(channel: &ScriptedChannel, workers: usize, units: u64) {
        // Exactly-once dispatch
        let mut ids = channel.work_ids();
        ids.sort_unstable();
        assert_eq!(ids, (0..units).collect::<Vec<_>>());

        // One TERMINATE per worker
        let mut terminates = channel.terminates();
        terminates.sort_unstable();
        assert_eq!(terminates, (1..=workers).collect::<Vec<_>>());

        // TERMINATEs only after all results, and never followed by WORK
        let mut terminated: HashMap<WorkerId, bool> = HashMap::new();
        for ((to, message), results_before) in channel.sent.iter().zip(&channel.results_before) {
            match message {
                Message::Terminate => {
                    assert_eq!(*results_before, units, "TERMINATE before all results");
                    terminated.insert(*to, true);
                }
                Message::Work(_) => {
                    assert!(!terminated.get(to).copied().unwrap_or(false), "WORK after TERMINATE");
                }
                Message::Result(_) => panic!("coordinator sent a RESULT"),
            }
        }
    }

    #[test]
    fn test_work_queue() {
        let mut queue = WorkQueue::new(2);
        assert_eq!(queue.remaining(), 2);
        assert_eq!(queue.pop(), Some(WorkUnit { id: 0 }));
        assert_eq!(queue.pop(), Some(WorkUnit { id: 1 }));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
        assert_eq!(queue.dispatched(), 2);
    }

    #[test]
    fn test_new_rejects_empty_pool() {
        assert!(Coordinator::new(0, 10, 100).is_err());
    }

    #[test]
    fn test_new_rejects_zero_unit_size() {
        assert!(Coordinator::new(2, 10, 0).is_err());
    }

    #[test]
    fn test_new_rejects_attempt_overflow() {
        assert!(Coordinator::new(2, 3, u64::MAX / 2).is_err());
        assert!(Coordinator::new(2, 2, u64::MAX / 2).is_ok());
    }

    #[test]
    fn test_new_coordinator_is_zeroed() {
        let coordinator = Coordinator::new(4, 10, 100).unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::DispatchingInitial);
        assert_eq!(coordinator.aggregate(), GlobalAggregate::new());
        assert_eq!(coordinator.workers().len(), 4);
        assert_eq!(coordinator.estimate(), None);
    }

    #[tokio::test]
    async fn test_three_workers_five_units_scenario() {
        let mut channel = ScriptedChannel::new(3, 100_000, ReplyOrder::Fifo);
        let mut coordinator = Coordinator::new(3, 5, 100_000).unwrap();

        let aggregate = coordinator.run(&mut channel).await.unwrap();

        let expected = vec![
            // initial dispatch
            (1, Message::Work(WorkUnit { id: 0 })),
            (2, Message::Work(WorkUnit { id: 1 })),
            (3, Message::Work(WorkUnit { id: 2 })),
            // first two repliers get the remaining units
            (1, Message::Work(WorkUnit { id: 3 })),
            (2, Message::Work(WorkUnit { id: 4 })),
            // all five results in
            (1, Message::Terminate),
            (2, Message::Terminate),
            (3, Message::Terminate),
        ];
        assert_eq!(channel.sent, expected);
        assert_eq!(channel.results_before[5], 5);

        assert_eq!(aggregate.total_attempts(), 500_000);
        assert_eq!(coordinator.completed_units(), 5);
        assert_eq!(coordinator.state(), CoordinatorState::Done);

        let per_worker: Vec<_> = coordinator.workers().iter().map(|w| w.units_completed()).collect();
        assert_eq!(per_worker, vec![2, 2, 1]);
        assert!(coordinator.workers().iter().all(|w| w.is_terminated()));
        assert_eq!(coordinator.turnaround().len(), 5);
    }

    #[tokio::test]
    async fn test_invariants_hold_for_any_arrival_order() {
        for workers in 1..=5usize {
            for units in [0u64, 1, 2, 4, 5, 7, 23] {
                for seed in 0..4 {
                    let mut channel = ScriptedChannel::shuffled(workers, 10, seed);
                    let mut coordinator = Coordinator::new(workers, units, 10).unwrap();

                    let aggregate = coordinator.run(&mut channel).await.unwrap();

                    assert_eq!(aggregate.total_attempts(), units * 10);
                    assert_protocol_invariants(&channel, workers, units);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_lifo_replies_keep_one_worker_busy() {
        let mut channel = ScriptedChannel::new(3, 1, ReplyOrder::Lifo);
        let mut coordinator = Coordinator::new(3, 10, 1).unwrap();
        coordinator.run(&mut channel).await.unwrap();

        assert_protocol_invariants(&channel, 3, 10);
        // Worker 3 always answers last-dispatched first, so it gets every refill
        let per_worker: Vec<_> = coordinator.workers().iter().map(|w| w.units_completed()).collect();
        assert_eq!(per_worker, vec![1, 1, 8]);
    }

    #[tokio::test]
    async fn test_fewer_units_than_workers() {
        let mut channel = ScriptedChannel::new(4, 50, ReplyOrder::Fifo);
        let mut coordinator = Coordinator::new(4, 2, 50).unwrap();

        let aggregate = coordinator.run(&mut channel).await.unwrap();

        assert_eq!(aggregate.total_attempts(), 100);
        assert_eq!(channel.work_ids(), vec![0, 1]);
        // idle workers 3 and 4 still get their TERMINATE
        assert_eq!(channel.terminates(), vec![1, 2, 3, 4]);
        assert_protocol_invariants(&channel, 4, 2);
    }

    #[tokio::test]
    async fn test_zero_units_terminates_everyone() {
        let mut channel = ScriptedChannel::new(3, 50, ReplyOrder::Fifo);
        let mut coordinator = Coordinator::new(3, 0, 50).unwrap();

        let aggregate = coordinator.run(&mut channel).await.unwrap();

        assert_eq!(aggregate, GlobalAggregate::new());
        assert_eq!(channel.terminates(), vec![1, 2, 3]);
        assert!(channel.work_ids().is_empty());
        assert_eq!(coordinator.estimate(), None);
    }

    #[tokio::test]
    async fn test_single_worker_runs_sequentially() {
        let mut channel = ScriptedChannel::new(1, 10, ReplyOrder::Fifo);
        let mut coordinator = Coordinator::new(1, 4, 10).unwrap();

        coordinator.run(&mut channel).await.unwrap();

        let kinds: Vec<_> = channel.sent.iter().map(|(w, m)| (*w, m.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (1, MessageKind::Work),
                (1, MessageKind::Work),
                (1, MessageKind::Work),
                (1, MessageKind::Work),
                (1, MessageKind::Terminate),
            ]
        );
        // Each refill happens only after the previous result arrived
        assert_eq!(channel.results_before, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_estimate_after_run() {
        let mut channel = ScriptedChannel::new(2, 4, ReplyOrder::Fifo);
        channel.injected.push_back((1, Message::Result(ResultUnit::new(4, 3))));
        let mut coordinator = Coordinator::new(2, 1, 4).unwrap();

        coordinator.run(&mut channel).await.unwrap();

        assert_eq!(coordinator.estimate(), Some(3.0));
        assert_eq!(coordinator.estimate_with(|a| a.hit_ratio()), Some(0.75));
    }

    #[tokio::test]
    async fn test_unexpected_kind_at_coordinator_aborts() {
        let mut channel = ScriptedChannel::new(2, 10, ReplyOrder::Fifo);
        channel.injected.push_back((2, Message::Work(WorkUnit { id: 99 })));
        let mut coordinator = Coordinator::new(2, 3, 10).unwrap();

        let err = coordinator.run(&mut channel).await.unwrap_err();
        match err.downcast_ref::<ProtocolError>() {
            Some(ProtocolError::UnexpectedAtCoordinator { worker: 2, kind: MessageKind::Work }) => {}
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(channel.terminates().is_empty());
    }

    #[tokio::test]
    async fn test_unsolicited_result_aborts() {
        let mut channel = ScriptedChannel::new(3, 10, ReplyOrder::Fifo);
        // Only one unit exists, so worker 3 never has anything in flight
        channel.injected.push_back((3, Message::Result(ResultUnit::new(10, 1))));
        let mut coordinator = Coordinator::new(3, 1, 10).unwrap();

        let err = coordinator.run(&mut channel).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UnsolicitedResult(3))
        ));
    }

    #[tokio::test]
    async fn test_unknown_worker_aborts() {
        let mut channel = ScriptedChannel::new(2, 10, ReplyOrder::Fifo);
        channel.injected.push_back((7, Message::Result(ResultUnit::new(10, 1))));
        let mut coordinator = Coordinator::new(2, 2, 10).unwrap();

        let err = coordinator.run(&mut channel).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UnknownWorker(7))
        ));
    }

    #[tokio::test]
    async fn test_attempt_mismatch_aborts() {
        let mut channel = ScriptedChannel::new(1, 10, ReplyOrder::Fifo);
        channel.injected.push_back((1, Message::Result(ResultUnit::new(9, 1))));
        let mut coordinator = Coordinator::new(1, 1, 10).unwrap();

        let err = coordinator.run(&mut channel).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::AttemptMismatch { worker: 1, expected: 10, got: 9 })
        ));
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let mut channel = ScriptedChannel::new(1, 10, ReplyOrder::Fifo);
        let mut coordinator = Coordinator::new(1, 1, 10).unwrap();
        coordinator.run(&mut channel).await.unwrap();

        assert!(coordinator.run(&mut channel).await.is_err());
    }

    #[tokio::test]
    async fn test_channel_size_mismatch_is_rejected() {
        let mut channel = ScriptedChannel::new(2, 10, ReplyOrder::Fifo);
        let mut coordinator = Coordinator::new(3, 1, 10).unwrap();
        assert!(coordinator.run(&mut channel).await.is_err());
    }
}
