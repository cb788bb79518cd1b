//! Client side of an experiment: single queries and the serial measurement
//! loop.
//!
//! Queries run one after another on the calling task, so the throughput this
//! reports is what a single serial client achieves against the fleet, not the
//! fleet's saturation throughput.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ov_directory::FriendDirectory;
use crate::ov_error::RoutingError;
use crate::ov_interface::Address;
use crate::ov_protocol::{fetch, Request};
use crate::ov_routing::FriendWalk;

// ============================================================================
// Query modes
// ============================================================================

/// How the harness issues each query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QueryMode {
    /// Ask one uniformly chosen peer directly
    Direct,
    /// Act as a FriendFirst client: `friends` random peers first, then the
    /// whole fleet
    FriendWalk { friends: usize },
}

impl Default for QueryMode {
    fn default() -> Self {
        QueryMode::Direct
    }
}

// ============================================================================
// Measurement
// ============================================================================

/// Raw outcome of one measurement loop
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub attempted: usize,
    /// Queries that returned at least one byte
    pub successful: usize,
    /// Connection-level failures: no latency sample, time still counted
    pub failed: usize,
    /// One entry per successful query
    pub latencies: Vec<Duration>,
    pub elapsed: Duration,
}

impl QueryStats {
    /// Mean latency of successful queries in seconds, 0 when there were none
    pub fn mean_latency(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let total: f64 = self.latencies.iter().map(Duration::as_secs_f64).sum();
        total / self.latencies.len() as f64
    }

    /// Successful queries per second of wall-clock time
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.successful as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Queries that completed but found nothing
    pub fn misses(&self) -> usize {
        self.attempted - self.successful - self.failed
    }

    fn record_success(&mut self, latency: Duration) {
        self.successful += 1;
        self.latencies.push(latency);
    }
}

/// One point of a sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentRecord {
    pub parameter: usize,
    /// Seconds
    pub mean_latency: f64,
    /// Successful queries per second
    pub throughput: f64,
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
}

impl ExperimentRecord {
    pub fn from_stats(parameter: usize, stats: &QueryStats) -> Self {
        Self {
            parameter,
            mean_latency: stats.mean_latency(),
            throughput: stats.throughput(),
            attempted: stats.attempted,
            successful: stats.successful,
            failed: stats.failed,
            elapsed_secs: stats.elapsed.as_secs_f64(),
        }
    }
}

/// Parameters of one measurement loop
#[derive(Debug, Clone)]
pub struct Workload {
    pub query_count: usize,
    pub filename: String,
    pub mode: QueryMode,
    pub io_timeout: Option<Duration>,
    /// Where FriendWalk queries store their downloads
    pub download_folder: PathBuf,
}

impl Workload {
    pub fn direct(query_count: usize, filename: impl Into<String>) -> Self {
        Self {
            query_count,
            filename: filename.into(),
            mode: QueryMode::Direct,
            io_timeout: None,
            download_folder: PathBuf::from("."),
        }
    }

    /// Issue `query_count` sequential queries against uniformly chosen peers
    pub async fn run<R: Rng + Send>(&self, peers: &[Address], rng: &mut R) -> QueryStats {
        let mut stats = QueryStats::default();
        let start = Instant::now();

        for _ in 0..self.query_count {
            let Some(target) = peers.choose(rng).cloned() else {
                break;
            };
            stats.attempted += 1;

            match self.mode {
                QueryMode::Direct => self.query_direct(&target, &mut stats).await,
                QueryMode::FriendWalk { friends } => {
                    let friend_list: Vec<Address> = std::iter::once(target.clone())
                        .chain(
                            peers
                                .iter()
                                .filter(|p| **p != target)
                                .cloned()
                                .choose_multiple(rng, friends.saturating_sub(1)),
                        )
                        .take(friends.max(1))
                        .collect();
                    self.query_walk(friend_list, peers.to_vec(), &mut stats).await
                }
            }
        }

        stats.elapsed = start.elapsed();
        stats
    }

    async fn query_direct(&self, target: &Address, stats: &mut QueryStats) {
        let request = match Request::new(self.filename.clone()) {
            Ok(request) => request,
            Err(e) => {
                warn!("cannot request {}: {}", self.filename, e);
                stats.failed += 1;
                return;
            }
        };

        let started = Instant::now();
        match fetch(target, &request, self.io_timeout).await {
            Ok(response) if !response.is_empty() => stats.record_success(started.elapsed()),
            Ok(_) => debug!("{} returned nothing for {}", target, self.filename),
            Err(e) => {
                warn!("error requesting {} from {}: {}", self.filename, target, e);
                stats.failed += 1;
            }
        }
    }

    async fn query_walk(&self, friends: Vec<Address>, known: Vec<Address>, stats: &mut QueryStats) {
        // the harness is not a fleet member, nothing to exclude
        let own = Address::new("", 0);
        let walk = FriendWalk::new(
            FriendDirectory::new(&own, friends, known),
            self.download_folder.clone(),
        )
        .with_io_timeout(self.io_timeout);

        let started = Instant::now();
        match walk.request_file(&self.filename).await {
            Ok(_) => stats.record_success(started.elapsed()),
            Err(RoutingError::Exhausted { .. }) => {
                debug!("walk for {} exhausted", self.filename)
            }
            Err(e) => {
                warn!("walk for {} failed: {}", self.filename, e);
                stats.failed += 1;
            }
        }
    }
}
