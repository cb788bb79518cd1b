// Experiment Sweep Results

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ov_share::{ExperimentRecord, RoutingMode};

use super::config::SweepAxis;

/// Outcome of one sweep: one record per parameter value
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub config_summary: String,
    pub axis: SweepAxis,
    pub routing: RoutingMode,
    pub seed_used: u64,
    pub records: Vec<ExperimentRecord>,
}

impl SweepResult {
    pub fn axis_label(&self) -> &'static str {
        match self.axis {
            SweepAxis::Files => "files",
            SweepAxis::Peers => "peers",
            SweepAxis::Queries => "queries",
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║    SWEEP RESULTS                                       ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration: {}", self.config_summary);
        println!("Seed: {}", self.seed_used);
        println!();

        println!("═══ {:?} / # of {} ═══", self.routing, self.axis_label());
        println!(
            "  {:>8}  {:>14}  {:>16}  {:>6}  {:>6}",
            self.axis_label(),
            "latency (s)",
            "throughput (q/s)",
            "ok",
            "err"
        );
        for record in &self.records {
            println!(
                "  {:>8}  {:>14.6}  {:>16.2}  {:>3}/{:<2}  {:>6}",
                record.parameter,
                record.mean_latency,
                record.throughput,
                record.successful,
                record.attempted,
                record.failed
            );
        }
        println!();
    }

    /// One row per sweep point, for external plotting
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(
            writer,
            "routing,axis,parameter,mean_latency,throughput,attempted,successful,failed,elapsed_secs"
        )?;
        for record in &self.records {
            writeln!(
                writer,
                "{},{},{},{:.6},{:.6},{},{},{},{:.6}",
                self.routing.as_arg(),
                self.axis_label(),
                record.parameter,
                record.mean_latency,
                record.throughput,
                record.attempted,
                record.successful,
                record.failed,
                record.elapsed_secs
            )?;
        }
        writer.flush()
    }
}
