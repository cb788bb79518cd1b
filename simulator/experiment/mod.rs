//! Experiment harness
//!
//! Sweeps one parameter (file count, peer count or query count) over a list
//! of values. Every value gets a freshly provisioned and launched fleet, a
//! serial measurement loop and a teardown:
//! - `config`: YAML sweep description and per-point sizes
//! - `runner`: fleet lifecycle and measurement per sweep value
//! - `stats`: summary table and CSV export

pub mod config;
pub mod runner;
pub mod stats;

pub use config::ScenarioFile;
pub use runner::ExperimentRunner;

// programmatic sweeps only (sweep_demo)
#[allow(unused_imports)]
pub use config::{ExperimentConfig, SweepAxis};
#[allow(unused_imports)]
pub use stats::SweepResult;
