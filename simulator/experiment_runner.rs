// Experiment Runner - Load and execute sweep YAML files
//
// Usage:
//   cargo build --release  (process launchers need the ov_peer binary too)
//   cargo run --release --bin experiment_runner scenarios/files_random_walk.yaml
//   cargo run --release --bin experiment_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --release --bin experiment_runner scenarios/peers_friend_first.yaml --seed 1234

mod experiment;

use std::env;
use std::fs;
use std::path::Path;

use experiment::{ExperimentRunner, ScenarioFile};
use log::{error, LevelFilter};
use simple_logger::SimpleLogger;

#[tokio::main]
async fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Warn).init() {
        eprintln!("failed to initialise logging: {}", e);
    }

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("experiment_runner");

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.yaml | directory/> [--seed SEED]", program);
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/files_random_walk.yaml", program);
        eprintln!("  {} scenarios/", program);
        eprintln!("  {} scenarios/peers_friend_first.yaml --seed 0x2a", program);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    let seed: Option<u64> = if args.len() >= 4 && args[2] == "--seed" {
        Some(parse_seed(&args[3]))
    } else {
        None
    };

    if path.is_file() {
        if !run_scenario_file(path, seed).await {
            std::process::exit(1);
        }
    } else if path.is_dir() {
        run_scenario_directory(path, seed).await;
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

async fn run_scenario_directory(dir: &Path, seed: Option<u64>) {
    let mut scenarios = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str());
            if ext == Some("yaml") || ext == Some("yml") {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  EXPERIMENT RUNNER - Multiple Sweeps                   ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} sweep(s) to run\n", scenarios.len());

    let mut failed = Vec::new();
    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        if !run_scenario_file(scenario_path, seed).await {
            failed.push(scenario_path.display().to_string());
        }
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All sweeps complete!                                  ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    if !failed.is_empty() {
        eprintln!("{} sweep(s) failed:", failed.len());
        for path in &failed {
            eprintln!("  {}", path);
        }
        std::process::exit(1);
    }
}

/// Returns false when the sweep could not run to completion
async fn run_scenario_file(path: &Path, seed: Option<u64>) -> bool {
    println!("Loading sweep from: {}", path.display());

    let yaml_content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path.display(), e);
            return false;
        }
    };

    let scenario: ScenarioFile = match serde_yaml::from_str(&yaml_content) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to parse {}: {}", path.display(), e);
            return false;
        }
    };

    println!("\n╔════════════════════════════════════════════════════════╗");
    let name = scenario
        .meta
        .name
        .clone()
        .unwrap_or_else(|| path.display().to_string());
    println!("║  {}{}", name, " ".repeat(54_usize.saturating_sub(name.len())));
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    let mut config = scenario.experiment;
    if seed.is_some() {
        config.seed = seed;
    }
    let csv_path = config.csv_path.clone();

    println!("Configuration:");
    println!("  Axis: {:?} over {:?}", config.axis, config.values);
    println!("  Routing: {:?}", config.routing);
    if let Some(hop_limit) = config.hop_limit {
        println!("  Hop limit: {}", hop_limit);
    }
    println!("  Query mode: {:?}", config.query_mode);
    println!("  Launcher: {:?}", config.launcher);
    println!(
        "  Fixed: {} peers / {} files / {} queries",
        config.fixed_peers, config.fixed_files, config.fixed_queries
    );
    println!("  Ports from: {}:{}", config.host, config.base_port);
    println!("\nStarting sweep...\n");

    let result = match ExperimentRunner::new(config).run().await {
        Ok(result) => result,
        Err(e) => {
            error!("sweep {} failed: {}", path.display(), e);
            return false;
        }
    };

    result.print_summary();

    if let Some(csv_path) = csv_path {
        match result.export_to_csv(&csv_path) {
            Ok(()) => println!("Results written to {}", csv_path.display()),
            Err(e) => eprintln!("Failed to write {}: {}", csv_path.display(), e),
        }
    }

    println!("\n✓ Sweep complete!\n");
    true
}

/// Decimal or `0x`-prefixed hex
fn parse_seed(raw: &str) -> u64 {
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.unwrap_or_else(|e| {
        eprintln!("Invalid seed {}: {}", raw, e);
        std::process::exit(1);
    })
}
