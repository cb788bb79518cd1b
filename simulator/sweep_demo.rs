// Sweep Demo - runs the three baseline sweeps for both routing strategies
//
// Usage:
//   cargo run --release --example sweep_demo
//
// Files [5, 10, 20], queries [10, 20, 40] and peers [5, 10, 20], each once
// with RandomWalk peers queried directly and once with FriendFirst peers
// queried through a friend walk. Peers run in-process.

mod experiment;

use experiment::{ExperimentConfig, ExperimentRunner, SweepAxis, SweepResult};
use log::LevelFilter;
use ov_share::{QueryMode, RoutingMode};
use simple_logger::SimpleLogger;

const STABILIZE_MS: u64 = 200;
const SEED: u64 = 0x5eed;

#[tokio::main]
async fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Warn).init() {
        eprintln!("failed to initialise logging: {}", e);
    }

    println!("╔════════════════════════════════════════════════════════╗");
    println!("║    Routing Strategy Sweeps                             ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let sweeps = [
        (SweepAxis::Files, vec![5, 10, 20]),
        (SweepAxis::Queries, vec![10, 20, 40]),
        (SweepAxis::Peers, vec![5, 10, 20]),
    ];

    let mut results: Vec<SweepResult> = Vec::new();
    // fresh port block per sweep
    let mut base_port = 5000;

    for routing in [RoutingMode::RandomWalk, RoutingMode::FriendFirst] {
        for (axis, values) in &sweeps {
            let mut config = ExperimentConfig::new(*axis, values.clone());
            config.routing = routing;
            config.query_mode = match routing {
                RoutingMode::RandomWalk => QueryMode::Direct,
                RoutingMode::FriendFirst => QueryMode::FriendWalk { friends: 2 },
            };
            config.base_port = base_port;
            config.stabilize_ms = STABILIZE_MS;
            config.query_timeout_ms = Some(10_000);
            config.seed = Some(SEED);
            base_port += 100;

            println!("Running {:?} sweep over {:?} with {:?}...", axis, values, routing);
            match ExperimentRunner::new(config).run().await {
                Ok(result) => results.push(result),
                Err(e) => {
                    eprintln!("Sweep failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    for result in &results {
        result.print_summary();
    }

    println!("\n✓ Demo complete!\n");
}
