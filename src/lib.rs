//! # overlay-share - Unstructured P2P File Sharing Overlay
//!
//! Peers serve a fixed local file set over TCP and resolve misses with one of
//! two competing query-routing strategies. The crate also carries the
//! measurement side used to benchmark them.
//!
//! ## Core Components
//!
//! - **Wire protocol** (`ov_protocol`): `REQUEST:<filename>` in, raw bytes out,
//!   end of stream ends the response
//! - **Session** (`ov_handler`): per-connection state machine
//! - **Routing** (`ov_routing`): `RandomWalk` (server relays to a random
//!   neighbor) and `FriendFirst` (client walks friends, then known peers)
//! - **PeerNode** (`ov_node`): listener dispatching one task per connection
//! - **Fleet / workload** (`ov_fleet`, `ov_workload`): provisioning,
//!   launching and serial query measurement for experiments
//!
//! ## Usage
//!
//! ```no_run
//! use ov_share::{Address, PeerConfig, PeerNode, RandomWalkDirectory, RoutingStrategy};
//!
//! # async fn run() -> Result<(), ov_share::PeerError> {
//! let own = Address::new("127.0.0.1", 5000);
//! let directory = RandomWalkDirectory::new(&own, vec![Address::new("127.0.0.1", 5001)]);
//!
//! let node = PeerNode::new(
//!     PeerConfig::new("Peer1", own, "./peer_folders/Peer1"),
//!     RoutingStrategy::random_walk(directory),
//! )?;
//! node.listen().await?.run().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Experiments
//!
//! The sweep runner lives in `simulator/` (`experiment_runner` binary). It
//! reads a YAML sweep description, launches a fleet per parameter value and
//! reports mean latency and throughput.

pub mod ov_directory;
pub mod ov_error;
pub mod ov_files;
pub mod ov_fleet;
pub mod ov_handler;
pub mod ov_interface;
pub mod ov_node;
pub mod ov_protocol;
pub mod ov_routing;
pub mod ov_workload;

// Re-export commonly used types
pub use ov_directory::{
    parse_addresses, DirectoryBuilder, FriendDirectory, PeerDirectory, RandomWalkDirectory,
};
pub use ov_error::{PeerError, ProtocolError, QueryError, RoutingError};
pub use ov_fleet::{FleetDescriptor, Launcher, RunningFleet};
pub use ov_interface::{
    Address, EventSink, FileName, LogSink, NoOpSink, PeerEvent, PeerId, RoutingMode,
};
pub use ov_node::{PeerConfig, PeerListener, PeerNode};
pub use ov_protocol::{fetch, Request};
pub use ov_routing::{FriendWalk, RoutingStrategy, WalkOutcome};
pub use ov_workload::{ExperimentRecord, QueryMode, QueryStats, Workload};
