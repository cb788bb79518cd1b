//! Experiment sweep runner

use super::config::{ExperimentConfig, SweepAxis, SweepPoint};
use super::stats::SweepResult;
use log::{info, warn};
use ov_share::{ExperimentRecord, PeerError, Workload};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Runs one fleet per sweep value and measures it
pub struct ExperimentRunner {
    config: ExperimentConfig,
    rng: StdRng,
    seed: u64,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub async fn run(mut self) -> Result<SweepResult, PeerError> {
        self.config.validate().map_err(PeerError::Arguments)?;

        let download_folder = self.config.download_folder();
        std::fs::create_dir_all(&download_folder)?;

        let mut records = Vec::with_capacity(self.config.values.len());
        for value in self.config.values.clone() {
            let point = self.config.point(value);
            let record = self.run_point(&point).await?;
            info!(
                "{} = {}: latency {:.6}s, throughput {:.2} q/s ({}/{} ok, {} failed)",
                axis_name(self.config.axis),
                value,
                record.mean_latency,
                record.throughput,
                record.successful,
                record.attempted,
                record.failed
            );
            records.push(record);
        }

        Ok(SweepResult {
            config_summary: self.config.summary(),
            axis: self.config.axis,
            routing: self.config.routing,
            seed_used: self.seed,
            records,
        })
    }

    async fn run_point(&mut self, point: &SweepPoint) -> Result<ExperimentRecord, PeerError> {
        let fleet = self.config.fleet(point);
        fleet
            .provision_shared_folders(point.files)
            .map_err(|source| PeerError::SharedFolder {
                path: fleet.folders_root.clone(),
                source,
            })?;

        let running = self.config.launcher.launch(&fleet).await?;
        tokio::time::sleep(self.config.stabilize()).await;

        let workload = Workload {
            query_count: point.queries,
            filename: self.choose_filename(point),
            mode: self.config.query_mode,
            io_timeout: self.config.query_timeout(),
            download_folder: self.config.download_folder(),
        };
        let stats = workload.run(&fleet.addresses(), &mut self.rng).await;
        running.stop().await;

        if stats.successful == 0 && stats.attempted > 0 {
            warn!(
                "no query for {} succeeded at {} = {}",
                workload.filename,
                axis_name(self.config.axis),
                point.parameter
            );
        }
        Ok(ExperimentRecord::from_stats(point.parameter, &stats))
    }

    /// `file1.txt`, or a random provisioned file when sweeping file counts
    fn choose_filename(&mut self, point: &SweepPoint) -> String {
        if let Some(ref filename) = self.config.filename {
            return filename.clone();
        }
        match self.config.axis {
            SweepAxis::Files => format!("file{}.txt", self.rng.gen_range(1..=point.files)),
            _ => "file1.txt".to_string(),
        }
    }
}

fn axis_name(axis: SweepAxis) -> &'static str {
    match axis {
        SweepAxis::Files => "files",
        SweepAxis::Peers => "peers",
        SweepAxis::Queries => "queries",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ov_share::{QueryMode, RoutingMode};
    use std::net::TcpListener;
    use tempfile::TempDir;

    /// First port of `count` consecutive free ports on localhost
    fn free_port_range(count: u16) -> u16 {
        loop {
            let socket = TcpListener::bind("127.0.0.1:0").unwrap();
            let base = socket.local_addr().unwrap().port();
            drop(socket);
            if base.checked_add(count).is_none() {
                continue;
            }
            let all_free = (base..base + count)
                .all(|port| TcpListener::bind(("127.0.0.1", port)).is_ok());
            if all_free {
                return base;
            }
        }
    }

    fn test_config(temp: &TempDir, axis: SweepAxis, values: Vec<usize>) -> ExperimentConfig {
        let mut config = ExperimentConfig::new(axis, values);
        config.base_port = free_port_range(20);
        config.folders_root = temp.path().to_path_buf();
        config.stabilize_ms = 50;
        config.query_timeout_ms = Some(5_000);
        config.seed = Some(42);
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_random_walk_five_peers() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, SweepAxis::Peers, vec![5]);

        let result = ExperimentRunner::new(config).run().await.unwrap();
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.parameter, 5);
        assert_eq!(record.attempted, 10);
        // every peer holds file1.txt, so every query is served directly
        assert_eq!(record.successful, 10);
        assert_eq!(record.failed, 0);
        assert!(record.mean_latency > 0.0);
        let expected = record.successful as f64 / record.elapsed_secs;
        assert!((record.throughput - expected).abs() < 1e-6 * expected.max(1.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_query_axis_and_seed() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, SweepAxis::Queries, vec![3, 6]);

        let result = ExperimentRunner::new(config).run().await.unwrap();
        assert_eq!(result.seed_used, 42);
        let attempted: Vec<usize> = result.records.iter().map(|r| r.attempted).collect();
        assert_eq!(attempted, vec![3, 6]);
        assert!(result.records.iter().all(|r| r.successful == r.attempted));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_friend_walk_over_friend_first_fleet() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, SweepAxis::Files, vec![4]);
        config.routing = RoutingMode::FriendFirst;
        config.query_mode = QueryMode::FriendWalk { friends: 2 };

        let result = ExperimentRunner::new(config.clone()).run().await.unwrap();
        let record = &result.records[0];
        assert_eq!(record.attempted, 10);
        assert_eq!(record.successful, 10);

        let downloads: Vec<_> = std::fs::read_dir(config.download_folder())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(downloads.len(), 1);
        assert!(downloads[0].starts_with("downloaded_file"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, SweepAxis::Files, vec![]);
        let result = ExperimentRunner::new(config).run().await;
        assert!(matches!(result, Err(PeerError::Arguments(_))));
    }

    #[test]
    fn test_filename_choice() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, SweepAxis::Peers, vec![5]);
        let mut runner = ExperimentRunner::new(config.clone());
        assert_eq!(runner.choose_filename(&config.point(5)), "file1.txt");

        let config = test_config(&temp, SweepAxis::Files, vec![3]);
        let mut runner = ExperimentRunner::new(config.clone());
        for _ in 0..20 {
            let name = runner.choose_filename(&config.point(3));
            assert!(["file1.txt", "file2.txt", "file3.txt"].contains(&name.as_str()));
        }
    }
}
