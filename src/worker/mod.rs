//! Worker agent
//!
//! The worker agent is the request/execute/reply loop that runs inside every
//! worker. It is entirely passive: it only ever reacts to what the coordinator
//! sends and never leaves on its own initiative.
//!
//! # State Machine
//!
//! ```text
//!            WORK(id) ─┐
//!                      ▼
//!   ┌──────────> Serving ──── TERMINATE ────> Stopped
//!   │               │
//!   └─ RESULT sent ─┘
//!
//!   anything else while Serving ──> protocol violation (run aborts)
//! ```
//!
//! The unit id in a WORK message is opaque here: the agent runs the kernel
//! with the run-wide unit size and replies with the (attempts, hits) pair.
//! TERMINATE is never acknowledged.

use crate::distributed::channel::WorkerChannel;
use crate::distributed::protocol::{Message, ProtocolError, WorkUnit, WorkerId};
use crate::kernel::SamplingKernel;
use crate::stats::ResultUnit;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Worker agent state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Serving,
    Stopped,
}

/// What the agent does in response to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run the kernel for this unit and reply with a RESULT
    Execute(WorkUnit),
    /// Leave the serve loop
    Stop,
}

/// Summary returned when a worker stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker_id: WorkerId,
    pub units_processed: u64,
}

/// Request/execute/reply loop for one worker
pub struct WorkerAgent {
    id: WorkerId,
    unit_size: u64,
    kernel: Arc<dyn SamplingKernel>,
    state: WorkerState,
    units_processed: u64,
}

impl WorkerAgent {
    pub fn new(id: WorkerId, unit_size: u64, kernel: Arc<dyn SamplingKernel>) -> Self {
        Self {
            id,
            unit_size,
            kernel,
            state: WorkerState::Serving,
            units_processed: 0,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn units_processed(&self) -> u64 {
        self.units_processed
    }

    /// Serve the coordinator until TERMINATE
    ///
    /// Returns an error on any protocol violation or transport failure. The
    /// caller must treat that as fatal for the whole run, not just this worker.
    pub async fn serve<C: WorkerChannel>(&mut self, channel: &mut C) -> Result<WorkerReport> {
        if self.state == WorkerState::Stopped {
            anyhow::bail!("Worker {} has already stopped", self.id);
        }

        tracing::info!(worker = self.id, "worker started");

        while self.state == WorkerState::Serving {
            let message = channel.receive().await?;

            match self.on_message(message)? {
                Step::Execute(unit) => {
                    let result = self.execute(unit).await?;
                    channel.send(Message::Result(result)).await?;
                    tracing::debug!(worker = self.id, unit = unit.id, hits = result.hits, "sent result");
                }
                Step::Stop => {}
            }
        }

        tracing::info!(worker = self.id, units = self.units_processed, "worker terminated");

        Ok(WorkerReport {
            worker_id: self.id,
            units_processed: self.units_processed,
        })
    }

    /// Apply one message to the state machine
    ///
    /// Only WORK and TERMINATE are valid, and only while serving.
    pub fn on_message(&mut self, message: Message) -> Result<Step> {
        match (self.state, message) {
            (WorkerState::Serving, Message::Work(unit)) => Ok(Step::Execute(unit)),
            (WorkerState::Serving, Message::Terminate) => {
                self.state = WorkerState::Stopped;
                Ok(Step::Stop)
            }
            (WorkerState::Stopped, Message::Terminate) => {
                Err(ProtocolError::DuplicateTerminate(self.id).into())
            }
            (_, other) => {
                let err = ProtocolError::UnexpectedAtWorker {
                    worker: self.id,
                    kind: other.kind(),
                };
                tracing::error!(%err, "aborting run");
                Err(err.into())
            }
        }
    }

    /// Run the kernel for one unit on the blocking pool
    async fn execute(&mut self, unit: WorkUnit) -> Result<ResultUnit> {
        let kernel = Arc::clone(&self.kernel);
        let unit_size = self.unit_size;

        let result = tokio::task::spawn_blocking(move || kernel.sample(unit_size))
            .await
            .with_context(|| format!("Sampling kernel failed on unit {}", unit.id))?;

        self.units_processed += 1;
        Ok(result)
    }
}
