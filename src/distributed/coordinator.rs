//! TCP transport, coordinator side
//!
//! `TcpCoordinatorChannel` connects to every worker node, runs the HELLO/READY
//! handshake, and then exposes the connections through `CoordinatorChannel`:
//!
//! - outgoing messages go straight to the worker's write half
//! - one reader task per connection forwards `(worker id, message)` into a
//!   single inbox, so `receive_any` returns whichever worker's frame lands first
//!
//! A reader that hits EOF or a decode error forwards the error and stops; the
//! coordinator sees it on its next `receive_any` and aborts the run.

use super::channel::CoordinatorChannel;
use super::protocol::*;
use crate::Result;
use anyhow::Context;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What the coordinator knows about one connected worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub worker_id: WorkerId,
    pub address: String,
    pub hostname: String,
}

/// Coordinator endpoint over TCP
pub struct TcpCoordinatorChannel {
    inbox: mpsc::Receiver<Result<(WorkerId, Message)>>,

    /// Write halves indexed by `worker_id - 1`
    writers: Vec<OwnedWriteHalf>,

    readers: Vec<JoinHandle<()>>,
    peers: Vec<PeerInfo>,
}

impl TcpCoordinatorChannel {
    /// Connect to every worker node in `addresses`
    ///
    /// Workers are numbered in address order starting at 1. Every worker is
    /// told the run's `unit_size` during the handshake.
    pub async fn connect(addresses: &[String], unit_size: u64) -> Result<Self> {
        if addresses.is_empty() {
            anyhow::bail!("No worker addresses given for coordinator mode");
        }

        let (tx, inbox) = mpsc::channel(addresses.len() * 2);
        let mut writers = Vec::with_capacity(addresses.len());
        let mut readers = Vec::with_capacity(addresses.len());
        let mut peers = Vec::with_capacity(addresses.len());

        for (index, address) in addresses.iter().enumerate() {
            let worker_id = index + 1;
            tracing::info!(worker = worker_id, %address, "connecting");

            let mut stream = TcpStream::connect(address)
                .await
                .with_context(|| format!("Failed to connect to worker {} at {}", worker_id, address))?;
            stream
                .set_nodelay(true)
                .context("Failed to set TCP_NODELAY")?;

            let ready = handshake(&mut stream, worker_id, unit_size)
                .await
                .with_context(|| format!("Handshake with worker {} at {} failed", worker_id, address))?;

            tracing::info!(worker = worker_id, hostname = %ready.hostname, "worker ready");

            let (read_half, write_half) = stream.into_split();
            readers.push(tokio::spawn(forward_frames(worker_id, read_half, tx.clone())));
            writers.push(write_half);
            peers.push(PeerInfo {
                worker_id,
                address: address.clone(),
                hostname: ready.hostname,
            });
        }

        Ok(Self {
            inbox,
            writers,
            readers,
            peers,
        })
    }

    pub fn peers(&self) -> &[PeerInfo] {
        &self.peers
    }
}

impl Drop for TcpCoordinatorChannel {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

impl CoordinatorChannel for TcpCoordinatorChannel {
    fn worker_count(&self) -> usize {
        self.writers.len()
    }

    async fn send(&mut self, to: WorkerId, message: Message) -> Result<()> {
        let writer = to
            .checked_sub(1)
            .and_then(|index| self.writers.get_mut(index))
            .with_context(|| format!("No connected worker with id {}", to))?;

        write_frame(writer, &message)
            .await
            .with_context(|| format!("Failed to send {} to worker {}", message.kind(), to))
    }

    async fn receive_any(&mut self) -> Result<(WorkerId, Message)> {
        match self.inbox.recv().await {
            Some(frame) => frame,
            None => anyhow::bail!("All worker connections are closed"),
        }
    }
}

/// Send HELLO, wait for READY, and check it matches
async fn handshake(stream: &mut TcpStream, worker_id: WorkerId, unit_size: u64) -> Result<Ready> {
    let hello = Hello {
        protocol_version: PROTOCOL_VERSION,
        worker_id,
        unit_size,
    };
    write_frame(stream, &hello).await?;

    let ready: Ready = read_frame(stream).await?;

    if ready.protocol_version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            local: PROTOCOL_VERSION,
            remote: ready.protocol_version,
        }
        .into());
    }
    if ready.worker_id != worker_id {
        return Err(ProtocolError::WorkerIdMismatch {
            expected: worker_id,
            got: ready.worker_id,
        }
        .into());
    }

    Ok(ready)
}

/// Reader task: forward every frame from one worker into the shared inbox
async fn forward_frames(
    worker_id: WorkerId,
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    inbox: mpsc::Sender<Result<(WorkerId, Message)>>,
) {
    loop {
        let frame = read_frame::<Message, _>(&mut read_half)
            .await
            .with_context(|| format!("Lost connection to worker {}", worker_id));
        let failed = frame.is_err();

        if inbox.send(frame.map(|message| (worker_id, message))).await.is_err() || failed {
            break;
        }
    }
}
