//! Message channel abstraction
//!
//! The coordinator and the worker agent only ever talk through these two
//! traits, which lets the same state machines run over in-process tokio
//! channels (`local`) or over TCP connections (`coordinator` / `node_service`).
//!
//! # Contract
//!
//! - `send` resolves once the transport has accepted the message.
//! - `receive_any` resolves with the first message delivered by *any* worker.
//!   There is no ordering across workers; whichever arrives first wins.
//! - Between one worker and the coordinator messages are never lost and never
//!   reordered.
//! - Receives have no timeout. A silent peer stalls the caller forever; a
//!   closed transport surfaces as an error.
//!
//! Receivers get every kind on one inbox and classify by `Message::kind()`.

use super::protocol::{Message, WorkerId};
use crate::Result;

/// Coordinator side of the channel
#[allow(async_fn_in_trait)]
pub trait CoordinatorChannel {
    /// Number of workers reachable through this channel, numbered `1..=N`
    fn worker_count(&self) -> usize;

    /// Send `message` to worker `to`
    async fn send(&mut self, to: WorkerId, message: Message) -> Result<()>;

    /// Wait for the next message from any worker
    async fn receive_any(&mut self) -> Result<(WorkerId, Message)>;
}

/// Worker side of the channel
#[allow(async_fn_in_trait)]
pub trait WorkerChannel {
    /// This worker's identifier
    fn worker_id(&self) -> WorkerId;

    /// Send `message` to the coordinator
    async fn send(&mut self, message: Message) -> Result<()>;

    /// Wait for the next message from the coordinator
    async fn receive(&mut self) -> Result<Message>;
}
