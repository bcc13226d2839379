//! Message transports
//!
//! The coordinator and the worker agent only ever talk through the channel
//! traits in `channel`. Two transports implement them:
//!
//! - **Local**: tokio mpsc channels between tasks of one process
//! - **TCP**: length-prefixed MessagePack frames between processes, with the
//!   coordinator dialing out to a node service on every worker host
//!
//! # Modules
//!
//! - `protocol`: Message definitions, errors and framing
//! - `channel`: Coordinator and worker endpoint traits
//! - `local`: In-process transport
//! - `coordinator`: TCP transport, coordinator side
//! - `node_service`: TCP transport, worker side

pub mod channel;
pub mod coordinator;
pub mod local;
pub mod node_service;
pub mod protocol;

// Re-export key types
pub use channel::{CoordinatorChannel, WorkerChannel};
pub use coordinator::TcpCoordinatorChannel;
pub use local::{local_channels, LocalCoordinatorChannel, LocalWorkerChannel};
pub use node_service::{NodeService, TcpWorkerChannel};
pub use protocol::{Message, MessageKind, ProtocolError, WorkUnit, WorkerId, PROTOCOL_VERSION};
