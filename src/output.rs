use crate::sweep::SweepReport;
use anyhow::{Context, Result};
use log::info;
use outbreak_common::{OutputConfig, RunSummary};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One CSV row per run; per-round snapshots stay in the full report.
#[derive(Debug, Serialize)]
struct RunRecord {
    run: usize,
    mobility_fraction: f64,
    test_rate: Option<f64>,
    seed: u64,
    termination_round: u32,
    extinct: bool,
    peak_infected: usize,
    total_infections: usize,
    deaths: usize,
    final_population: usize,
}

impl From<&RunSummary> for RunRecord {
    fn from(s: &RunSummary) -> Self {
        RunRecord {
            run: s.run,
            mobility_fraction: s.mobility_fraction,
            test_rate: s.test_rate,
            seed: s.seed,
            termination_round: s.termination_round,
            extinct: s.extinct,
            peak_infected: s.peak_infected,
            total_infections: s.total_infections,
            deaths: s.deaths,
            final_population: s.final_population,
        }
    }
}

/// Writes `<base>_runs.csv`.
pub fn write_runs_csv(path: &Path, runs: &[RunSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Error creating CSV file '{}'", path.display()))?;
    for summary in runs {
        writer.serialize(RunRecord::from(summary))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the full report in `format` ("json", "bincode" or "messagepack").
/// Returns the path written.
pub fn write_report(base_filename: &str, format: &str, report: &SweepReport) -> Result<PathBuf> {
    let extension = match format {
        "json" => "json",
        "bincode" => "bin",
        "messagepack" => "msgpack",
        other => anyhow::bail!("Unknown output format: {}", other),
    };
    let path = PathBuf::from(format!("{}_report.{}", base_filename, extension));
    let file = File::create(&path)
        .with_context(|| format!("Error creating report file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    match format {
        "json" => serde_json::to_writer(&mut writer, report)
            .context("Error serializing report to JSON")?,
        "bincode" => bincode::serialize_into(&mut writer, report)
            .context("Error serializing report to bincode")?,
        _ => rmp_serde::encode::write(&mut writer, report)
            .context("Error serializing report to MessagePack")?,
    }
    writer.flush()?;
    Ok(path)
}

/// Saves everything the output section asks for.
pub fn save_results(output: &OutputConfig, report: &SweepReport) -> Result<()> {
    if !output.save_results {
        info!("Skipping saving results as per config (save_results is false).");
        return Ok(());
    }
    let csv_path = PathBuf::from(format!("{}_runs.csv", output.base_filename));
    write_runs_csv(&csv_path, &report.runs)?;
    info!("Per-run results saved to {}", csv_path.display());

    let format = output.format.as_deref().unwrap_or("json");
    let report_path = write_report(&output.base_filename, format, report)?;
    info!("Full report saved to {} ({} format)", report_path.display(), format);
    Ok(())
}
