//! In-process transport
//!
//! Wires one coordinator and N workers together with bounded tokio mpsc
//! channels. Each endpoint owns exactly one inbox:
//!
//! - the coordinator's inbox carries `(sender id, message)` pairs from every
//!   worker, which gives `receive_any` its "first from anyone" semantics
//! - each worker's inbox carries messages from the coordinator only
//!
//! mpsc preserves order per sender, so the per-pair FIFO guarantee holds.

use super::channel::{CoordinatorChannel, WorkerChannel};
use super::protocol::{Message, WorkerId, COORDINATOR_ID};
use crate::Result;
use anyhow::Context;
use tokio::sync::mpsc;

/// Capacity of every local inbox
///
/// The protocol never has more than one WORK and one TERMINATE outstanding per
/// worker, so a small bound is enough to keep senders from ever blocking
/// each other into a cycle.
pub const LOCAL_CHANNEL_CAPACITY: usize = 8;

/// Coordinator endpoint of the in-process transport
pub struct LocalCoordinatorChannel {
    inbox: mpsc::Receiver<(WorkerId, Message)>,

    /// Outboxes indexed by `worker_id - 1`
    outboxes: Vec<mpsc::Sender<Message>>,
}

/// Worker endpoint of the in-process transport
pub struct LocalWorkerChannel {
    worker_id: WorkerId,
    inbox: mpsc::Receiver<Message>,
    coordinator: mpsc::Sender<(WorkerId, Message)>,
}

/// Build a connected coordinator endpoint and `worker_count` worker endpoints
///
/// Worker endpoints are returned in id order, starting at worker 1.
pub fn local_channels(worker_count: usize) -> (LocalCoordinatorChannel, Vec<LocalWorkerChannel>) {
    let (coordinator_tx, coordinator_rx) =
        mpsc::channel(LOCAL_CHANNEL_CAPACITY.max(worker_count));

    let mut outboxes = Vec::with_capacity(worker_count);
    let mut workers = Vec::with_capacity(worker_count);

    for worker_id in 1..=worker_count {
        let (tx, rx) = mpsc::channel(LOCAL_CHANNEL_CAPACITY);
        outboxes.push(tx);
        workers.push(LocalWorkerChannel {
            worker_id,
            inbox: rx,
            coordinator: coordinator_tx.clone(),
        });
    }

    let coordinator = LocalCoordinatorChannel {
        inbox: coordinator_rx,
        outboxes,
    };

    (coordinator, workers)
}

impl CoordinatorChannel for LocalCoordinatorChannel {
    fn worker_count(&self) -> usize {
        self.outboxes.len()
    }

    async fn send(&mut self, to: WorkerId, message: Message) -> Result<()> {
        let outbox = to
            .checked_sub(1)
            .and_then(|index| self.outboxes.get(index))
            .with_context(|| format!("No local worker with id {}", to))?;

        outbox
            .send(message)
            .await
            .map_err(|_| anyhow::anyhow!("Worker {} hung up before receiving {}", to, message.kind()))
    }

    async fn receive_any(&mut self) -> Result<(WorkerId, Message)> {
        self.inbox
            .recv()
            .await
            .context("Every worker hung up while the coordinator was waiting for results")
    }
}

impl WorkerChannel for LocalWorkerChannel {
    fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    async fn send(&mut self, message: Message) -> Result<()> {
        self.coordinator
            .send((self.worker_id, message))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Coordinator (id {}) hung up before receiving {} from worker {}",
                    COORDINATOR_ID,
                    message.kind(),
                    self.worker_id
                )
            })
    }

    async fn receive(&mut self) -> Result<Message> {
        self.inbox
            .recv()
            .await
            .with_context(|| format!("Coordinator hung up on worker {}", self.worker_id))
    }
}
