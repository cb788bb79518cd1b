use rand::seq::SliceRandom;
use rand::Rng;

use crate::ov_error::PeerError;
use crate::ov_interface::{Address, RoutingMode};

// ============================================================================
// Directories
// ============================================================================

/// Flat neighbor list for RandomWalk, sampled uniformly for the next hop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RandomWalkDirectory {
    neighbors: Vec<Address>,
}

impl RandomWalkDirectory {
    /// `own` is removed so a peer never forwards to itself
    pub fn new(own: &Address, neighbors: Vec<Address>) -> Self {
        Self {
            neighbors: without_self(own, neighbors),
        }
    }

    pub fn neighbors(&self) -> &[Address] {
        &self.neighbors
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Address> {
        self.neighbors.choose(rng)
    }
}

/// Two ordered lists for FriendFirst: friends are tried before known peers.
/// They are configured independently and may overlap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FriendDirectory {
    friends: Vec<Address>,
    known: Vec<Address>,
}

impl FriendDirectory {
    pub fn new(own: &Address, friends: Vec<Address>, known: Vec<Address>) -> Self {
        Self {
            friends: without_self(own, friends),
            known: without_self(own, known),
        }
    }

    pub fn friends(&self) -> &[Address] {
        &self.friends
    }

    pub fn known(&self) -> &[Address] {
        &self.known
    }

    /// Friends then known peers, in order, duplicates included
    pub fn candidates(&self) -> impl Iterator<Item = &Address> {
        self.friends.iter().chain(self.known.iter())
    }
}

/// A peer's directory, shaped by its strategy
#[derive(Debug, Clone, PartialEq)]
pub enum PeerDirectory {
    RandomWalk(RandomWalkDirectory),
    FriendFirst(FriendDirectory),
}

impl PeerDirectory {
    pub fn mode(&self) -> RoutingMode {
        match self {
            PeerDirectory::RandomWalk(_) => RoutingMode::RandomWalk,
            PeerDirectory::FriendFirst(_) => RoutingMode::FriendFirst,
        }
    }
}

fn without_self(own: &Address, addresses: Vec<Address>) -> Vec<Address> {
    // ports are unique within a run
    addresses
        .into_iter()
        .filter(|addr| addr.port != own.port)
        .collect()
}

// ============================================================================
// Serialized descriptions
// ============================================================================

/// Parse a directory description: a flow list of `[host, port]` pairs such as
/// `[["127.0.0.1", 5001], ["127.0.0.1", 5002]]`. Tuple-style lists
/// (`[('localhost', 5001)]`) are accepted as well.
pub fn parse_addresses(description: &str) -> Result<Vec<Address>, PeerError> {
    let normalized: String = description
        .chars()
        .map(|c| match c {
            '(' => '[',
            ')' => ']',
            other => other,
        })
        .collect();

    if normalized.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_yaml::from_str::<Vec<Address>>(&normalized)
        .map_err(|e| PeerError::Directory(format!("{}: {:?}", e, description)))
}

/// Inverse of [`parse_addresses`]
pub fn describe_addresses(addresses: &[Address]) -> String {
    let pairs: Vec<String> = addresses
        .iter()
        .map(|addr| format!("[{:?}, {}]", addr.host, addr.port))
        .collect();
    format!("[{}]", pairs.join(", "))
}

// ============================================================================
// Directory builder
// ============================================================================

/// Computes each peer's directory from the full list of fleet addresses.
/// Peers never build their own directories.
#[derive(Debug, Clone)]
pub struct DirectoryBuilder {
    fleet: Vec<Address>,
    /// Friends per FriendFirst peer, taken as the next peers in fleet order.
    /// `None` makes every other peer a friend.
    friend_count: Option<usize>,
}

impl DirectoryBuilder {
    pub fn new(fleet: Vec<Address>) -> Self {
        Self {
            fleet,
            friend_count: None,
        }
    }

    pub fn with_friend_count(mut self, friend_count: Option<usize>) -> Self {
        self.friend_count = friend_count;
        self
    }

    /// Every fleet address except the one at `index`
    pub fn others(&self, index: usize) -> Vec<Address> {
        self.fleet
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, addr)| addr.clone())
            .collect()
    }

    /// Friends of the peer at `index`: the following peers, wrapping around
    pub fn friends(&self, index: usize) -> Vec<Address> {
        let others = self.fleet.len().saturating_sub(1);
        let count = self.friend_count.map_or(others, |c| c.min(others));
        (1..=count)
            .map(|offset| self.fleet[(index + offset) % self.fleet.len()].clone())
            .collect()
    }

    pub fn build(&self, index: usize, mode: RoutingMode) -> PeerDirectory {
        let own = &self.fleet[index];
        match mode {
            RoutingMode::RandomWalk => {
                PeerDirectory::RandomWalk(RandomWalkDirectory::new(own, self.others(index)))
            }
            RoutingMode::FriendFirst => PeerDirectory::FriendFirst(FriendDirectory::new(
                own,
                self.friends(index),
                self.others(index),
            )),
        }
    }
}
