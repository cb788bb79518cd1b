// Experiment Sweep Configuration

use std::path::PathBuf;
use std::time::Duration;

use ov_share::{FleetDescriptor, Launcher, QueryMode, RoutingMode};
use serde::Deserialize;

// ============================================================================
// Scenario File
// ============================================================================

/// Sweep description as stored in a YAML file
#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub meta: ScenarioMeta,

    pub experiment: ExperimentConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hypothesis: Option<String>,
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Parameter varied by a sweep; the other two stay at their fixed values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepAxis {
    Files,
    Peers,
    Queries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    pub axis: SweepAxis,

    /// One sweep point per value
    pub values: Vec<usize>,

    #[serde(default = "default_routing")]
    pub routing: RoutingMode,

    /// RandomWalk forwards per request (None = unbounded baseline)
    #[serde(default)]
    pub hop_limit: Option<u32>,

    /// FriendFirst friends per peer (None = every other peer)
    #[serde(default)]
    pub friend_count: Option<usize>,

    #[serde(default)]
    pub query_mode: QueryMode,

    #[serde(default)]
    pub launcher: Launcher,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_base_port")]
    pub base_port: u16,

    #[serde(default = "default_folders_root")]
    pub folders_root: PathBuf,

    #[serde(default = "default_fixed_peers")]
    pub fixed_peers: usize,

    #[serde(default = "default_fixed_files")]
    pub fixed_files: usize,

    #[serde(default = "default_fixed_queries")]
    pub fixed_queries: usize,

    /// Pause between launch and the first query
    #[serde(default = "default_stabilize_ms")]
    pub stabilize_ms: u64,

    /// Per-query bound; None waits forever like the baseline
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,

    /// Overrides the requested file name
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

fn default_routing() -> RoutingMode {
    RoutingMode::RandomWalk
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_base_port() -> u16 {
    5000
}

fn default_folders_root() -> PathBuf {
    PathBuf::from("./peer_folders")
}

fn default_fixed_peers() -> usize {
    5
}

fn default_fixed_files() -> usize {
    10
}

fn default_fixed_queries() -> usize {
    10
}

fn default_stabilize_ms() -> u64 {
    5000
}

/// Concrete sizes of one sweep point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPoint {
    pub parameter: usize,
    pub peers: usize,
    pub files: usize,
    pub queries: usize,
}

impl ExperimentConfig {
    /// Config with every default applied
    #[allow(dead_code)] // YAML sweeps never call it
    pub fn new(axis: SweepAxis, values: Vec<usize>) -> Self {
        Self {
            axis,
            values,
            routing: default_routing(),
            hop_limit: None,
            friend_count: None,
            query_mode: QueryMode::default(),
            launcher: Launcher::default(),
            host: default_host(),
            base_port: default_base_port(),
            folders_root: default_folders_root(),
            fixed_peers: default_fixed_peers(),
            fixed_files: default_fixed_files(),
            fixed_queries: default_fixed_queries(),
            stabilize_ms: default_stabilize_ms(),
            query_timeout_ms: None,
            filename: None,
            seed: None,
            csv_path: None,
        }
    }

    pub fn point(&self, value: usize) -> SweepPoint {
        let mut point = SweepPoint {
            parameter: value,
            peers: self.fixed_peers,
            files: self.fixed_files,
            queries: self.fixed_queries,
        };
        match self.axis {
            SweepAxis::Files => point.files = value,
            SweepAxis::Peers => point.peers = value,
            SweepAxis::Queries => point.queries = value,
        }
        point
    }

    pub fn fleet(&self, point: &SweepPoint) -> FleetDescriptor {
        let mut fleet = FleetDescriptor::new(
            self.host.clone(),
            self.base_port,
            point.peers,
            self.folders_root.clone(),
            self.routing,
        );
        fleet.hop_limit = self.hop_limit;
        fleet.friend_count = self.friend_count;
        fleet
    }

    pub fn stabilize(&self) -> Duration {
        Duration::from_millis(self.stabilize_ms)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Where FriendWalk queries put their downloads
    pub fn download_folder(&self) -> PathBuf {
        self.folders_root.join("harness")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.values.is_empty() {
            return Err("no sweep values".to_string());
        }
        if self.values.contains(&0) {
            return Err("sweep values must be positive".to_string());
        }
        let max_peers = match self.axis {
            SweepAxis::Peers => self.values.iter().copied().max().unwrap_or(0),
            _ => self.fixed_peers,
        };
        if self.base_port as usize + max_peers > u16::MAX as usize + 1 {
            return Err(format!(
                "{} peers do not fit above port {}",
                max_peers, self.base_port
            ));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "{:?} sweep over {:?}, {:?}, fixed {} peers / {} files / {} queries",
            self.axis,
            self.values,
            self.routing,
            self.fixed_peers,
            self.fixed_files,
            self.fixed_queries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_defaults() {
        let yaml = r#"
meta:
  name: files
experiment:
  axis: files
  values: [5, 10, 20]
"#;
        let scenario: ScenarioFile = serde_yaml::from_str(yaml).unwrap();
        let config = scenario.experiment;
        assert_eq!(scenario.meta.name.as_deref(), Some("files"));
        assert_eq!(config.axis, SweepAxis::Files);
        assert_eq!(config.routing, RoutingMode::RandomWalk);
        assert_eq!(config.base_port, 5000);
        assert_eq!(config.stabilize(), Duration::from_secs(5));
        assert_eq!(config.query_timeout(), None);
        assert_eq!(config.launcher, Launcher::InProcess);
        assert_eq!(config.query_mode, QueryMode::Direct);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scenario_overrides() {
        let yaml = r#"
experiment:
  axis: peers
  values: [5, 10]
  routing: friend_first
  friend_count: 2
  query_mode:
    kind: friend_walk
    friends: 1
  launcher:
    kind: process
    binary: ./target/release/ov_peer
  query_timeout_ms: 2000
  seed: 7
"#;
        let scenario: ScenarioFile = serde_yaml::from_str(yaml).unwrap();
        let config = scenario.experiment;
        assert_eq!(config.routing, RoutingMode::FriendFirst);
        assert_eq!(config.friend_count, Some(2));
        assert_eq!(config.query_mode, QueryMode::FriendWalk { friends: 1 });
        assert_eq!(
            config.launcher,
            Launcher::Process {
                binary: Some(PathBuf::from("./target/release/ov_peer"))
            }
        );
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_points_hold_other_axes_fixed() {
        let config = ExperimentConfig::new(SweepAxis::Peers, vec![20]);
        let point = config.point(20);
        assert_eq!(
            point,
            SweepPoint {
                parameter: 20,
                peers: 20,
                files: 10,
                queries: 10
            }
        );
        assert_eq!(config.fleet(&point).peer_count, 20);

        let config = ExperimentConfig::new(SweepAxis::Queries, vec![40]);
        assert_eq!(config.point(40).queries, 40);
        assert_eq!(config.point(40).peers, 5);
    }

    #[test]
    fn test_validate_rejects_bad_sweeps() {
        assert!(ExperimentConfig::new(SweepAxis::Files, vec![]).validate().is_err());
        assert!(ExperimentConfig::new(SweepAxis::Files, vec![0]).validate().is_err());

        let mut config = ExperimentConfig::new(SweepAxis::Peers, vec![10]);
        config.base_port = u16::MAX - 3;
        assert!(config.validate().is_err());
    }
}
