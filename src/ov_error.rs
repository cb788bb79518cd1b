use std::path::PathBuf;

use thiserror::Error;

use crate::ov_interface::Address;

/// Malformed request on the wire. The handler answers these by closing the
/// connection without a response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Caller closed before sending anything
    #[error("empty request")]
    Empty,

    #[error("request is not valid utf-8")]
    NotUtf8,

    /// Did not split into exactly `command:filename`
    #[error("malformed request: {0:?}")]
    Malformed(String),

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("invalid hop count: {0:?}")]
    InvalidHopCount(String),

    /// Empty names and names containing `:` cannot be framed
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
}

/// Errors raised while constructing or running a peer
#[derive(Debug, Error)]
pub enum PeerError {
    /// Fatal: the process cannot start without its listener
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: Address,
        #[source]
        source: std::io::Error,
    },

    #[error("shared folder {}: {source}", .path.display())]
    SharedFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid directory description: {0}")]
    Directory(String),

    #[error("invalid arguments: {0}")]
    Arguments(String),

    /// Peer process could not be started
    #[error("failed to spawn {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while routing a request across peers
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A chosen hop or candidate could not be reached
    #[error("connection to {address} failed: {reason}")]
    Connection { address: Address, reason: String },

    /// FriendFirst walk tried every known address without a hit
    #[error("no peer returned the file after {attempted} attempts")]
    Exhausted { attempted: usize },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single client-side query that failed at the connection level
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out")]
    Timeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_names_binary() {
        let error = PeerError::Spawn {
            binary: PathBuf::from("/opt/fleet/ov_peer"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(error.to_string(), "failed to spawn /opt/fleet/ov_peer: missing");
    }
}
