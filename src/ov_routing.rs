//! The two competing routing strategies.
//!
//! RandomWalk resolves misses on the server side: the peer that misses relays
//! the request to one random neighbor and forgets about it. The caller never
//! sees what the relay found. Unless a hop limit is configured there is no
//! TTL and no visited set, so a name nobody holds keeps circulating forever;
//! this is the baseline behavior being measured, not a guarantee.
//!
//! FriendFirst never relays on the server side. The requesting client walks
//! its friends, then its known peers, and stops at the first non-empty
//! answer. The walk is a single bounded pass.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexSet;
use log::{debug, info, warn};
use rand::Rng;
use tokio::net::TcpStream;

use crate::ov_directory::{FriendDirectory, PeerDirectory, RandomWalkDirectory};
use crate::ov_error::RoutingError;
use crate::ov_interface::{Address, RoutingMode, DOWNLOADED_PREFIX};
use crate::ov_protocol::{fetch, send_request, Command, Request};

// ============================================================================
// Server side
// ============================================================================

/// Strategy a peer runs for its whole lifetime
#[derive(Debug, Clone)]
pub enum RoutingStrategy {
    RandomWalk {
        directory: RandomWalkDirectory,
        /// Forwards allowed per request. `None` walks without bound.
        hop_limit: Option<u32>,
    },
    FriendFirst { directory: FriendDirectory },
}

/// What the handler does after a local miss
#[derive(Debug, Clone, PartialEq)]
pub enum MissAction {
    Forward { to: Address, request: Request },
    DropNoNeighbors,
    DropHopLimit,
    /// FriendFirst: close with nothing, resolution is up to the client
    NotFound,
}

impl RoutingStrategy {
    pub fn random_walk(directory: RandomWalkDirectory) -> Self {
        RoutingStrategy::RandomWalk {
            directory,
            hop_limit: None,
        }
    }

    pub fn friend_first(directory: FriendDirectory) -> Self {
        RoutingStrategy::FriendFirst { directory }
    }

    /// `hop_limit` only applies to RandomWalk directories
    pub fn from_directory(directory: PeerDirectory, hop_limit: Option<u32>) -> Self {
        match directory {
            PeerDirectory::RandomWalk(directory) => RoutingStrategy::RandomWalk {
                directory,
                hop_limit,
            },
            PeerDirectory::FriendFirst(directory) => RoutingStrategy::FriendFirst { directory },
        }
    }

    pub fn mode(&self) -> RoutingMode {
        match self {
            RoutingStrategy::RandomWalk { .. } => RoutingMode::RandomWalk,
            RoutingStrategy::FriendFirst { .. } => RoutingMode::FriendFirst,
        }
    }

    /// Decide how to delegate a request this peer could not serve
    pub fn on_miss<R: Rng + ?Sized>(&self, request: &Request, rng: &mut R) -> MissAction {
        let (directory, hop_limit) = match self {
            RoutingStrategy::FriendFirst { .. } => return MissAction::NotFound,
            RoutingStrategy::RandomWalk {
                directory,
                hop_limit,
            } => (directory, hop_limit),
        };

        // a relay tag always wins over the local limit
        let command = match (request.command, hop_limit) {
            (Command::Relay { remaining: 0 }, _) => return MissAction::DropHopLimit,
            (Command::Relay { remaining }, _) => Command::Relay {
                remaining: remaining - 1,
            },
            (Command::Request, Some(0)) => return MissAction::DropHopLimit,
            (Command::Request, Some(limit)) => Command::Relay {
                remaining: limit - 1,
            },
            (Command::Request, None) => Command::Request,
        };

        match directory.choose(rng) {
            Some(to) => MissAction::Forward {
                to: to.clone(),
                request: Request {
                    command,
                    filename: request.filename.clone(),
                },
            },
            None => MissAction::DropNoNeighbors,
        }
    }
}

/// Fire-and-forget relay: connect, send, close without reading
pub async fn forward(to: &Address, request: &Request) -> Result<(), RoutingError> {
    let connection_error = |e: std::io::Error| RoutingError::Connection {
        address: to.clone(),
        reason: e.to_string(),
    };

    let mut stream = TcpStream::connect(to.connect_string())
        .await
        .map_err(connection_error)?;
    send_request(&mut stream, request)
        .await
        .map_err(connection_error)?;
    Ok(())
}

// ============================================================================
// FriendFirst client walk
// ============================================================================

/// Result of a successful walk
#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutcome {
    pub source: Address,
    pub artifact: PathBuf,
    pub bytes: usize,
    /// Peers contacted, the successful one included
    pub attempted: usize,
}

/// Client-side FriendFirst lookup. Downloads land in `download_folder` as
/// `downloaded_<filename>`.
#[derive(Debug, Clone)]
pub struct FriendWalk {
    directory: FriendDirectory,
    download_folder: PathBuf,
    io_timeout: Option<Duration>,
}

impl FriendWalk {
    pub fn new(directory: FriendDirectory, download_folder: impl Into<PathBuf>) -> Self {
        Self {
            directory,
            download_folder: download_folder.into(),
            io_timeout: None,
        }
    }

    /// Bound each attempt. Without it a silent peer blocks the walk forever.
    pub fn with_io_timeout(mut self, io_timeout: Option<Duration>) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn directory(&self) -> &FriendDirectory {
        &self.directory
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        artifact_path(&self.download_folder, filename)
    }

    pub async fn request_file(&self, filename: &str) -> Result<WalkOutcome, RoutingError> {
        let request = Request::new(filename)?;

        // friends first, each address at most once
        let candidates: IndexSet<&Address> = self.directory.candidates().collect();

        let mut attempted = 0;
        for address in candidates {
            attempted += 1;
            let response = match fetch(address, &request, self.io_timeout).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("error requesting {} from {}: {}", filename, address, e);
                    continue;
                }
            };

            if response.is_empty() {
                debug!("{} does not have {}", address, filename);
                continue;
            }

            let artifact = self.artifact_path(filename);
            tokio::fs::write(&artifact, &response).await?;
            info!("{} downloaded from {}", filename, address);

            return Ok(WalkOutcome {
                source: address.clone(),
                artifact,
                bytes: response.len(),
                attempted,
            });
        }

        info!("{} not found on any peer", filename);
        Err(RoutingError::Exhausted { attempted })
    }
}

pub fn artifact_path(folder: &Path, filename: &str) -> PathBuf {
    folder.join(format!("{}{}", DOWNLOADED_PREFIX, filename))
}
