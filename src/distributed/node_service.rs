//! TCP transport, worker side
//!
//! The node service runs in every worker process when the pool spans hosts:
//! - Listens for the coordinator's connection
//! - Answers HELLO with READY, learning its worker id and the unit size
//! - Runs a `WorkerAgent` over the connection until TERMINATE
//!
//! By default the service handles one run and returns, so the process exits
//! together with the rest of the group. In persistent mode it goes back to
//! accepting connections after each run.

use super::channel::WorkerChannel;
use super::protocol::*;
use crate::kernel::{derive_worker_seed, QuarterCircleKernel, SamplingKernel};
use crate::worker::{WorkerAgent, WorkerReport};
use crate::Result;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Worker endpoint over TCP
pub struct TcpWorkerChannel {
    worker_id: WorkerId,
    stream: TcpStream,
}

impl TcpWorkerChannel {
    /// Answer the coordinator's HELLO on a freshly accepted connection
    ///
    /// Returns the ready channel and the HELLO that configured it.
    pub async fn accept_handshake(mut stream: TcpStream, hostname: &str) -> Result<(Self, Hello)> {
        let hello: Hello = read_frame(&mut stream)
            .await
            .context("Failed to read HELLO from coordinator")?;

        if hello.protocol_version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: hello.protocol_version,
            }
            .into());
        }
        if hello.worker_id == COORDINATOR_ID {
            anyhow::bail!("Coordinator assigned reserved worker id {}", COORDINATOR_ID);
        }

        let ready = Ready {
            protocol_version: PROTOCOL_VERSION,
            worker_id: hello.worker_id,
            hostname: hostname.to_string(),
        };
        write_frame(&mut stream, &ready)
            .await
            .context("Failed to send READY to coordinator")?;

        let channel = Self {
            worker_id: hello.worker_id,
            stream,
        };
        Ok((channel, hello))
    }
}

impl WorkerChannel for TcpWorkerChannel {
    fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    async fn send(&mut self, message: Message) -> Result<()> {
        write_frame(&mut self.stream, &message)
            .await
            .with_context(|| format!("Worker {} failed to send {}", self.worker_id, message.kind()))
    }

    async fn receive(&mut self) -> Result<Message> {
        read_frame(&mut self.stream)
            .await
            .with_context(|| format!("Worker {} lost its coordinator connection", self.worker_id))
    }
}

/// Node service
///
/// Owns the listening socket of one worker process.
pub struct NodeService {
    listener: TcpListener,

    /// Host name reported in READY
    node_id: String,

    /// Base seed; each run derives a per-worker seed from it
    seed: Option<u64>,

    /// Kernel used instead of the quarter-circle sampler, if set
    kernel: Option<Arc<dyn SamplingKernel>>,
}

impl NodeService {
    /// Bind the service to `address` (e.g. `0.0.0.0:9999`)
    pub async fn bind(address: &str, seed: Option<u64>) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind node service to {}", address))?;

        Ok(Self {
            listener,
            node_id: get_node_id(),
            seed,
            kernel: None,
        })
    }

    /// Use `kernel` for every run instead of the quarter-circle sampler
    pub fn with_kernel(mut self, kernel: Arc<dyn SamplingKernel>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read node service address")
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Accept one coordinator connection and serve it until TERMINATE
    pub async fn serve_once(&self) -> Result<WorkerReport> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .context("Failed to accept coordinator connection")?;
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

        tracing::info!(%peer, "coordinator connected");

        let (mut channel, hello) = TcpWorkerChannel::accept_handshake(stream, &self.node_id).await?;
        let kernel = self.kernel_for(hello.worker_id);

        let mut agent = WorkerAgent::new(hello.worker_id, hello.unit_size, kernel);
        agent.serve(&mut channel).await
    }

    /// Serve runs until one fails, or forever in persistent mode
    ///
    /// In persistent mode a failed run is logged and the service goes back to
    /// accepting; otherwise the first run's outcome is returned.
    pub async fn run(self, persistent: bool) -> Result<Option<WorkerReport>> {
        let address = self.local_addr()?;
        tracing::info!(%address, node_id = %self.node_id, "node service listening");

        loop {
            let outcome = self.serve_once().await;

            if !persistent {
                return outcome.map(Some);
            }

            match outcome {
                Ok(report) => tracing::info!(
                    worker = report.worker_id,
                    units = report.units_processed,
                    "run complete, waiting for next connection"
                ),
                Err(e) => tracing::error!("run failed: {:#}", e),
            }
        }
    }

    fn kernel_for(&self, worker_id: WorkerId) -> Arc<dyn SamplingKernel> {
        match &self.kernel {
            Some(kernel) => Arc::clone(kernel),
            None => {
                let seed = self.seed.map(|seed| derive_worker_seed(seed, worker_id));
                Arc::new(QuarterCircleKernel::from_seed(seed))
            }
        }
    }
}

/// Host name of this node, or "unknown"
fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::mock::MockKernel;
    use crate::stats::ResultUnit;

    async fn mock_service() -> (NodeService, String, MockKernel) {
        let kernel = MockKernel::new(1, 2);
        let service = NodeService::bind("127.0.0.1:0", None)
            .await
            .unwrap()
            .with_kernel(Arc::new(kernel.clone()));
        let address = service.local_addr().unwrap().to_string();
        (service, address, kernel)
    }

    async fn connect_and_greet(address: &str, hello: &Hello) -> TcpStream {
        let mut stream = TcpStream::connect(address).await.unwrap();
        write_frame(&mut stream, hello).await.unwrap();
        stream
    }

    fn hello(worker_id: WorkerId) -> Hello {
        Hello {
            protocol_version: PROTOCOL_VERSION,
            worker_id,
            unit_size: 40,
        }
    }

    #[tokio::test]
    async fn test_serve_once_until_terminate() {
        let (service, address, kernel) = mock_service().await;
        let served = tokio::spawn(async move { service.serve_once().await });

        let mut stream = connect_and_greet(&address, &hello(2)).await;
        let ready: Ready = read_frame(&mut stream).await.unwrap();
        assert_eq!(ready.worker_id, 2);
        assert_eq!(ready.protocol_version, PROTOCOL_VERSION);

        for id in 0..3 {
            write_frame(&mut stream, &Message::Work(WorkUnit { id })).await.unwrap();
            let reply: Message = read_frame(&mut stream).await.unwrap();
            assert_eq!(reply, Message::Result(ResultUnit::new(40, 20)));
        }
        write_frame(&mut stream, &Message::Terminate).await.unwrap();

        let report = served.await.unwrap().unwrap();
        assert_eq!(report, WorkerReport { worker_id: 2, units_processed: 3 });
        assert_eq!(kernel.calls(), 3);
    }

    #[tokio::test]
    async fn test_protocol_violation_fails_the_run() {
        let (service, address, _kernel) = mock_service().await;
        let served = tokio::spawn(async move { service.serve_once().await });

        let mut stream = connect_and_greet(&address, &hello(1)).await;
        let _ready: Ready = read_frame(&mut stream).await.unwrap();
        write_frame(&mut stream, &Message::Result(ResultUnit::new(1, 1))).await.unwrap();

        let err = served.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UnexpectedAtWorker { worker: 1, kind: MessageKind::Result })
        ));
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let (service, address, _kernel) = mock_service().await;
        let served = tokio::spawn(async move { service.serve_once().await });

        let bad = Hello {
            protocol_version: PROTOCOL_VERSION + 1,
            ..hello(1)
        };
        let _stream = connect_and_greet(&address, &bad).await;

        let err = served.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_coordinator_id_rejected() {
        let (service, address, _kernel) = mock_service().await;
        let served = tokio::spawn(async move { service.serve_once().await });

        let _stream = connect_and_greet(&address, &hello(COORDINATOR_ID)).await;
        assert!(served.await.unwrap().is_err());
    }

    #[test]
    fn test_node_id_is_never_empty() {
        assert!(!get_node_id().is_empty());
    }
}
