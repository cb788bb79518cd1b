use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::ov_error::PeerError;
use crate::ov_files::FileSet;
use crate::ov_handler::{PeerContext, Session};
use crate::ov_interface::{Address, EventSink, LogSink, PeerEvent, PeerId, RoutingMode};
use crate::ov_routing::RoutingStrategy;

/// Construction arguments of a peer
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub peer_id: PeerId,
    pub address: Address,
    pub shared_folder: PathBuf,
}

impl PeerConfig {
    pub fn new(
        peer_id: impl Into<PeerId>,
        address: Address,
        shared_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            address,
            shared_folder: shared_folder.into(),
        }
    }
}

/// A peer with its file snapshot and strategy, not yet listening
pub struct PeerNode {
    address: Address,
    context: Arc<PeerContext>,
}

impl PeerNode {
    /// Creates the shared folder if absent and snapshots its files
    pub fn new(config: PeerConfig, strategy: RoutingStrategy) -> Result<Self, PeerError> {
        Self::new_with_sink(config, strategy, Arc::new(LogSink))
    }

    pub fn new_with_sink(
        config: PeerConfig,
        strategy: RoutingStrategy,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, PeerError> {
        let files = FileSet::scan(&config.shared_folder)?;
        info!(
            "{} sharing {} files from {}",
            config.peer_id,
            files.len(),
            config.shared_folder.display()
        );

        Ok(Self {
            address: config.address,
            context: Arc::new(PeerContext {
                peer_id: config.peer_id,
                files,
                strategy,
                sink,
            }),
        })
    }

    pub fn peer_id(&self) -> &str {
        &self.context.peer_id
    }

    pub fn mode(&self) -> RoutingMode {
        self.context.strategy.mode()
    }

    pub fn files(&self) -> &FileSet {
        &self.context.files
    }

    /// Bind the configured address. Failing here is fatal for a peer process.
    pub async fn listen(self) -> Result<PeerListener, PeerError> {
        let listener = TcpListener::bind(self.address.connect_string())
            .await
            .map_err(|source| PeerError::Bind {
                address: self.address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        self.context.sink.log(
            &self.context.peer_id,
            PeerEvent::Listening {
                address: Address::from(local_addr),
            },
        );

        Ok(PeerListener {
            listener,
            local_addr,
            context: self.context,
        })
    }
}

/// A bound peer. `run` accepts forever.
pub struct PeerListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    context: Arc<PeerContext>,
}

impl PeerListener {
    /// Actual bound address (differs from the configured one for port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn address(&self) -> Address {
        Address::from(self.local_addr)
    }

    /// Accept loop. Each connection is handled on its own task; the loop
    /// itself never waits on a session.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    log::debug!("{} accepted {}", self.context.peer_id, remote);
                    let session = Session::new(stream, self.context.clone());
                    tokio::spawn(session.run());
                }
                Err(e) => {
                    // e.g. too many open files; keep listening
                    warn!("{} accept failed: {}", self.context.peer_id, e);
                }
            }
        }
    }

    /// Run the accept loop on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
