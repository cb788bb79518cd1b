//! Fleet description, shared-folder provisioning and peer launchers.
//!
//! A `FleetDescriptor` is built per sweep point and handed to whoever needs
//! it; there is no global peer registry.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use log::{info, warn};
use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::ov_directory::{describe_addresses, DirectoryBuilder, PeerDirectory};
use crate::ov_error::PeerError;
use crate::ov_interface::{Address, EventSink, LogSink, RoutingMode};
use crate::ov_node::{PeerConfig, PeerNode};
use crate::ov_routing::RoutingStrategy;

pub const PEER_BINARY: &str = "ov_peer";

/// Everything needed to lay out and start one fleet
#[derive(Debug, Clone)]
pub struct FleetDescriptor {
    pub host: String,
    pub base_port: u16,
    pub peer_count: usize,
    pub folders_root: PathBuf,
    pub mode: RoutingMode,
    pub hop_limit: Option<u32>,
    pub friend_count: Option<usize>,
}

impl FleetDescriptor {
    pub fn new(
        host: impl Into<String>,
        base_port: u16,
        peer_count: usize,
        folders_root: impl Into<PathBuf>,
        mode: RoutingMode,
    ) -> Self {
        Self {
            host: host.into(),
            base_port,
            peer_count,
            folders_root: folders_root.into(),
            mode,
            hop_limit: None,
            friend_count: None,
        }
    }

    /// `base_port + i` for every peer, in fleet order
    pub fn addresses(&self) -> Vec<Address> {
        (0..self.peer_count)
            .map(|i| Address::new(self.host.clone(), self.base_port + i as u16))
            .collect()
    }

    pub fn peer_id(&self, index: usize) -> String {
        format!("Peer{}", index + 1)
    }

    pub fn shared_folder(&self, index: usize) -> PathBuf {
        self.folders_root.join(self.peer_id(index))
    }

    pub fn directory_builder(&self) -> DirectoryBuilder {
        DirectoryBuilder::new(self.addresses()).with_friend_count(self.friend_count)
    }

    pub fn peer_config(&self, index: usize) -> PeerConfig {
        PeerConfig::new(
            self.peer_id(index),
            Address::new(self.host.clone(), self.base_port + index as u16),
            self.shared_folder(index),
        )
    }

    /// Recreate every peer folder from scratch with `file_count` files
    pub fn provision_shared_folders(&self, file_count: usize) -> std::io::Result<()> {
        for index in 0..self.peer_count {
            provision_folder(&self.shared_folder(index), file_count)?;
        }
        Ok(())
    }
}

/// Empty `folder` (creating it if needed) and fill it with
/// `file1.txt..file<N>.txt`, each naming its folder so content differs per peer
pub fn provision_folder(folder: &Path, file_count: usize) -> std::io::Result<()> {
    if folder.exists() {
        for entry in fs::read_dir(folder)? {
            let path = entry?.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = removed {
                warn!("failed to delete {}: {}", path.display(), e);
            }
        }
    } else {
        fs::create_dir_all(folder)?;
    }

    for n in 1..=file_count {
        fs::write(
            folder.join(format!("file{}.txt", n)),
            format!("This is file {} in {}.\n", n, folder.display()),
        )?;
    }
    Ok(())
}

// ============================================================================
// Launchers
// ============================================================================

/// How peers of a fleet are started
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Launcher {
    /// Each peer is a task inside the harness process
    InProcess,
    /// Each peer is an `ov_peer` process. Without `binary` the executable is
    /// looked up next to the running one.
    Process {
        #[serde(default)]
        binary: Option<PathBuf>,
    },
}

impl Default for Launcher {
    fn default() -> Self {
        Launcher::InProcess
    }
}

/// Handle on a started fleet; `stop` tears every peer down
pub enum RunningFleet {
    InProcess(Vec<JoinHandle<()>>),
    Processes(Vec<Child>),
}

impl Launcher {
    pub async fn launch(&self, fleet: &FleetDescriptor) -> Result<RunningFleet, PeerError> {
        info!(
            "launching {} {:?} peers on {}:{}..",
            fleet.peer_count, fleet.mode, fleet.host, fleet.base_port
        );
        match self {
            Launcher::InProcess => launch_in_process(fleet, Arc::new(LogSink)).await,
            Launcher::Process { binary } => launch_processes(fleet, &peer_binary(binary)?),
        }
    }
}

/// Start every peer of `fleet` as a task of the current runtime
pub async fn launch_in_process(
    fleet: &FleetDescriptor,
    sink: Arc<dyn EventSink>,
) -> Result<RunningFleet, PeerError> {
    let builder = fleet.directory_builder();
    let mut handles = Vec::with_capacity(fleet.peer_count);

    for index in 0..fleet.peer_count {
        let strategy =
            RoutingStrategy::from_directory(builder.build(index, fleet.mode), fleet.hop_limit);
        let node = PeerNode::new_with_sink(fleet.peer_config(index), strategy, sink.clone());
        let started = match node {
            Ok(node) => node.listen().await,
            Err(e) => Err(e),
        };
        match started {
            Ok(listener) => handles.push(listener.spawn()),
            Err(e) => {
                handles.iter().for_each(JoinHandle::abort);
                return Err(e);
            }
        }
    }

    Ok(RunningFleet::InProcess(handles))
}

fn launch_processes(fleet: &FleetDescriptor, binary: &Path) -> Result<RunningFleet, PeerError> {
    let builder = fleet.directory_builder();
    let mut children = Vec::with_capacity(fleet.peer_count);

    for index in 0..fleet.peer_count {
        let config = fleet.peer_config(index);
        let mut command = Command::new(binary);
        command
            .arg(fleet.mode.as_arg())
            .arg(&config.peer_id)
            .arg(&config.address.host)
            .arg(config.address.port.to_string())
            .arg(&config.shared_folder);

        match builder.build(index, fleet.mode) {
            PeerDirectory::RandomWalk(directory) => {
                command.arg(describe_addresses(directory.neighbors()));
                if let Some(hop_limit) = fleet.hop_limit {
                    command.arg(hop_limit.to_string());
                }
            }
            PeerDirectory::FriendFirst(directory) => {
                command
                    .arg(describe_addresses(directory.friends()))
                    .arg(describe_addresses(directory.known()));
            }
        }

        command.stdin(Stdio::null()).kill_on_drop(true);
        match command.spawn() {
            Ok(child) => children.push(child),
            // kill_on_drop reaps the ones already running
            Err(source) => {
                return Err(PeerError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                })
            }
        }
    }

    Ok(RunningFleet::Processes(children))
}

/// Configured binary, or `ov_peer` next to the running executable. Only
/// `cargo build` builds every binary; `cargo run --bin` does not.
fn peer_binary(configured: &Option<PathBuf>) -> Result<PathBuf, PeerError> {
    let binary = match configured {
        Some(binary) => binary.clone(),
        None => default_peer_binary()?,
    };
    if !binary.is_file() {
        return Err(PeerError::Arguments(format!(
            "peer binary {} not found, run `cargo build --bin {}` or set launcher.binary",
            binary.display(),
            PEER_BINARY
        )));
    }
    Ok(binary)
}

fn default_peer_binary() -> Result<PathBuf, PeerError> {
    let current = std::env::current_exe()?;
    let dir = current.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no parent directory for {}", current.display()),
        )
    })?;
    Ok(dir.join(format!("{}{}", PEER_BINARY, std::env::consts::EXE_SUFFIX)))
}

impl RunningFleet {
    pub fn len(&self) -> usize {
        match self {
            RunningFleet::InProcess(handles) => handles.len(),
            RunningFleet::Processes(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn stop(self) {
        match self {
            RunningFleet::InProcess(handles) => {
                for handle in handles {
                    handle.abort();
                    // cancelled is the expected result
                    let _ = handle.await;
                }
            }
            RunningFleet::Processes(children) => {
                for mut child in children {
                    if let Err(e) = child.kill().await {
                        warn!("failed to stop peer process: {}", e);
                    }
                }
            }
        }
        info!("fleet stopped");
    }
}
