//! Coordinator/worker protocol
//!
//! This module defines every value that crosses the boundary between the
//! coordinator and a worker, independent of the transport that carries it.
//!
//! # Message Kinds
//!
//! | Kind      | Direction            | Payload              |
//! |-----------|----------------------|----------------------|
//! | WORK      | Coordinator → Worker | unit identifier      |
//! | TERMINATE | Coordinator → Worker | none (sentinel)      |
//! | RESULT    | Worker → Coordinator | (attempts, hits)     |
//!
//! The enum discriminant of `Message` is the tag that multiplexes the three
//! kinds over a single inbox per endpoint.
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Worker
//!     |                              |
//!     |-------- HELLO -------------->|   (TCP transport only)
//!     |<------- READY ---------------|
//!     |                              |
//!     |-------- WORK(id) ----------->|
//!     |<------- RESULT(a, h) --------|
//!     |-------- WORK(id) ----------->|   refill while units remain
//!     |<------- RESULT(a, h) --------|
//!     |                              |
//!     |-------- TERMINATE ---------->|   exactly once, after all results
//! ```
//!
//! # Message Framing
//!
//! On byte-stream transports each frame is prefixed with a 4-byte length field
//! (little-endian u32) followed by a MessagePack (rmp-serde) body:
//!
//! ```text
//! [4 bytes: body length][N bytes: MessagePack body]
//! ```

use crate::stats::ResultUnit;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Checked during the TCP handshake; both sides must match.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body (16 MiB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Worker identifier
///
/// Workers are numbered `1..=N`; 0 is reserved for the coordinator.
pub type WorkerId = usize;

/// Identifier of the coordinator endpoint
pub const COORDINATOR_ID: WorkerId = 0;

/// One discrete unit of work
///
/// The identifier is opaque to workers. The number of samples per unit is not
/// carried here: it is a run-wide constant both sides agree on up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: u64,
}

/// Protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Assign one unit of work (Coordinator → Worker)
    Work(WorkUnit),

    /// Stop serving and exit (Coordinator → Worker)
    ///
    /// Sent exactly once per worker, never acknowledged.
    Terminate,

    /// Report a completed unit (Worker → Coordinator)
    Result(ResultUnit),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Work(_) => MessageKind::Work,
            Message::Terminate => MessageKind::Terminate,
            Message::Result(_) => MessageKind::Result,
        }
    }
}

/// Message tag, used for classification and error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Work,
    Terminate,
    Result,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Work => "WORK",
            MessageKind::Terminate => "TERMINATE",
            MessageKind::Result => "RESULT",
        };
        f.write_str(name)
    }
}

/// Handshake opener (Coordinator → Worker, TCP only)
///
/// Tells a freshly connected worker who it is and how many samples a unit has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub protocol_version: u32,
    pub worker_id: WorkerId,
    pub unit_size: u64,
}

/// Handshake reply (Worker → Coordinator, TCP only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    pub protocol_version: u32,
    pub worker_id: WorkerId,

    /// Host the worker runs on, for logs
    pub hostname: String,
}

/// Protocol violations
///
/// Every variant is fatal for the whole run: neither side has a way to bring
/// the other back to a consistent state once the exchange has gone off script.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("worker {worker} received unexpected {kind} message")]
    UnexpectedAtWorker { worker: WorkerId, kind: MessageKind },

    #[error("coordinator received unexpected {kind} message from worker {worker}")]
    UnexpectedAtCoordinator { worker: WorkerId, kind: MessageKind },

    #[error("message from unknown worker {0}")]
    UnknownWorker(WorkerId),

    #[error("worker {0} sent a RESULT with no unit in flight")]
    UnsolicitedResult(WorkerId),

    #[error("worker {worker} reported {got} attempts for a unit of {expected}")]
    AttemptMismatch { worker: WorkerId, expected: u64, got: u64 },

    #[error("protocol version mismatch: local {local}, remote {remote}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("handshake for worker {expected} answered by worker {got}")]
    WorkerIdMismatch { expected: WorkerId, got: WorkerId },

    #[error("worker {0} received a second TERMINATE")]
    DuplicateTerminate(WorkerId),
}

/// Serialize a value into a length-prefixed frame
pub fn serialize_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let body = rmp_serde::to_vec(value).context("Failed to serialize frame")?;

    if body.len() > MAX_FRAME_LEN {
        anyhow::bail!("Frame too large: {} bytes (max {})", body.len(), MAX_FRAME_LEN);
    }

    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
    framed.extend_from_slice(&body);

    Ok(framed)
}

/// Deserialize one frame from the front of `buf`
///
/// Returns the value and the number of bytes consumed, length prefix included.
pub fn deserialize_frame<T: DeserializeOwned>(buf: &[u8]) -> Result<(T, usize)> {
    if buf.len() < 4 {
        anyhow::bail!("Buffer too small for frame length (need 4 bytes, got {})", buf.len());
    }

    let body_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if body_len > MAX_FRAME_LEN {
        anyhow::bail!("Frame too large: {} bytes (max {})", body_len, MAX_FRAME_LEN);
    }
    if buf.len() < 4 + body_len {
        anyhow::bail!("Incomplete frame (need {} bytes, got {})", 4 + body_len, buf.len());
    }

    let value = rmp_serde::from_slice(&buf[4..4 + body_len])
        .context("Failed to deserialize frame")?;

    Ok((value, 4 + body_len))
}

/// Read one complete frame from a byte stream
pub async fn read_frame<T, R>(reader: &mut R) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read frame length")?;

    let body_len = u32::from_le_bytes(len_buf) as usize;
    if body_len > MAX_FRAME_LEN {
        anyhow::bail!("Frame too large: {} bytes (max {})", body_len, MAX_FRAME_LEN);
    }

    let mut body = vec![0u8; body_len];
    reader
        .read_exact(&mut body)
        .await
        .context("Failed to read frame body")?;

    rmp_serde::from_slice(&body).context("Failed to deserialize frame")
}

/// Write one frame to a byte stream and flush it
pub async fn write_frame<T, W>(writer: &mut W, value: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let framed = serialize_frame(value)?;

    writer.write_all(&framed).await.context("Failed to write frame")?;
    writer.flush().await.context("Failed to flush stream")?;

    Ok(())
}
