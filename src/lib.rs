//! MontePulse - distributed Monte Carlo estimation with dynamic load balancing
//!
//! A coordinator hands out fixed-size work units to a pool of workers one at a
//! time, refilling each worker as soon as it reports back, so fast workers
//! naturally take on more units than slow ones. Once every unit is back the
//! coordinator folds the results into a single aggregate and reduces it to an
//! estimate (π, for the default quarter-circle kernel).
//!
//! # Architecture
//!
//! - **Coordinator**: Explicit state machine owning the work queue and aggregate
//! - **Worker agent**: Passive request/execute/reply loop
//! - **Transports**: In-process channels or TCP with a node service per host
//! - **Kernels**: Pluggable samplers behind the `SamplingKernel` trait
//! - **Static baseline**: Up-front partition for comparison

pub mod baseline;
pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod kernel;
pub mod logging;
pub mod output;
pub mod runner;
pub mod stats;
pub mod worker;

// Re-export commonly used types
pub use config::RunConfig;
pub use coordinator::Coordinator;
pub use kernel::SamplingKernel;
pub use worker::WorkerAgent;

/// Result type used throughout MontePulse
pub type Result<T> = anyhow::Result<T>;
