use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

// opaque, unique within a run ("Peer1", "Peer2", ...)
pub type PeerId = String;
pub type FileName = String;

/// Size of every socket read, both for the request and for response chunks.
/// Requests are assumed to fit in one read.
pub const READ_CHUNK_SIZE: usize = 1024;

pub const REQUEST_COMMAND: &str = "REQUEST";
pub const RELAY_COMMAND: &str = "RELAY";

/// Prefix of the artifact a FriendFirst client writes into its own shared folder.
pub const DOWNLOADED_PREFIX: &str = "downloaded_";

// ============================================================================
// Address
// ============================================================================

/// A peer's `(host, port)`. The port alone identifies a peer within a run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` as accepted by `TcpStream::connect`
    pub fn connect_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<(String, u16)> for Address {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<Address> for (String, u16) {
    fn from(address: Address) -> Self {
        (address.host, address.port)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Routing mode
// ============================================================================

/// Which strategy governs a peer (and a whole sweep). Never mixed within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    RandomWalk,
    FriendFirst,
}

impl RoutingMode {
    /// Name used on the `ov_peer` command line
    pub fn as_arg(&self) -> &'static str {
        match self {
            RoutingMode::RandomWalk => "random-walk",
            RoutingMode::FriendFirst => "friend-first",
        }
    }

    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "random-walk" => Some(RoutingMode::RandomWalk),
            "friend-first" => Some(RoutingMode::FriendFirst),
            _ => None,
        }
    }
}

// ============================================================================
// Peer events
// ============================================================================

/// Observable things a peer does while serving sessions
#[derive(Clone, Debug, PartialEq)]
pub enum PeerEvent {
    /// Listener bound
    Listening { address: Address },
    /// Local file streamed back to the caller
    Served { filename: FileName, bytes: usize },
    /// Requested name is not in the local set
    NotFound { filename: FileName },
    /// Request relayed to a neighbor (RandomWalk only)
    Forwarded {
        filename: FileName,
        to: Address,
        remaining_hops: Option<u32>,
    },
    /// Neighbor could not be reached; the forward is dropped
    ForwardFailed {
        filename: FileName,
        to: Address,
        reason: String,
    },
    /// Miss with an empty directory
    DroppedNoNeighbors { filename: FileName },
    /// Miss on a relay whose hop budget is spent
    DroppedHopLimit { filename: FileName },
    /// Malformed request, connection closed without a response
    Rejected { reason: String },
}

pub trait EventSink: Send + Sync {
    fn log(&self, peer: &str, event: PeerEvent);
}

/// No-op event sink for production use
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&self, _peer: &str, _event: PeerEvent) {}
}

/// Forwards events to the `log` facade
pub struct LogSink;

impl EventSink for LogSink {
    fn log(&self, peer: &str, event: PeerEvent) {
        match event {
            PeerEvent::Listening { address } => {
                log::info!("{} listening on {}", peer, address)
            }
            PeerEvent::Served { filename, bytes } => {
                log::info!("{} sent {} ({} bytes)", peer, filename, bytes)
            }
            PeerEvent::NotFound { filename } => {
                log::info!("{} does not have {}", peer, filename)
            }
            PeerEvent::Forwarded {
                filename,
                to,
                remaining_hops,
            } => match remaining_hops {
                Some(hops) => log::info!(
                    "{} forwarded {} to {} ({} hops left)",
                    peer,
                    filename,
                    to,
                    hops
                ),
                None => log::info!("{} forwarded {} to {}", peer, filename, to),
            },
            PeerEvent::ForwardFailed {
                filename,
                to,
                reason,
            } => {
                log::warn!(
                    "{} failed to forward {} to {}: {}",
                    peer,
                    filename,
                    to,
                    reason
                )
            }
            PeerEvent::DroppedNoNeighbors { filename } => {
                log::info!("{} has no neighbors, dropping {}", peer, filename)
            }
            PeerEvent::DroppedHopLimit { filename } => {
                log::info!("{} hop budget spent, dropping {}", peer, filename)
            }
            PeerEvent::Rejected { reason } => {
                log::warn!("{} rejected request: {}", peer, reason)
            }
        }
    }
}
