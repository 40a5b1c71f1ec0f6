use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, warn};
use outbreak_common::SimulationConfig;
use outbreak_engine::{output, run_sweep};
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments for the outbreak sweep
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the number of runs per mobility fraction
    #[arg(long)]
    runs: Option<usize>,

    /// Override the sweep seed
    #[arg(long)]
    seed: Option<u64>,

    /// Enable test-and-quarantine with this per-round test rate
    #[arg(long)]
    test_rate: Option<f64>,

    /// Run the sweep on a single thread
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting Outbreak Engine...");

    // --- Load Configuration ---
    let mut config = if args.config.exists() {
        SimulationConfig::load(&args.config)?
    } else {
        warn!("Config file '{}' not found. Using built-in defaults.", args.config.display());
        SimulationConfig::default()
    };
    if let Some(runs) = args.runs {
        config.sweep.runs = runs;
    }
    if let Some(seed) = args.seed {
        config.sweep.seed = seed;
    }
    if args.test_rate.is_some() {
        config.sweep.test_rate = args.test_rate;
    }
    if args.sequential {
        config.sweep.parallel = false;
    }
    config.validate()?;

    if config.sweep.parallel {
        info!("Using {} Rayon threads.", rayon::current_num_threads());
    }
    debug!("Run Parameters: {:#?}", config.get_run_params());

    // --- Sweep ---
    let start_time = Instant::now();
    let report = match run_sweep(&config) {
        Ok(report) => report,
        Err(e) => {
            error!("Sweep failed: {}", e);
            anyhow::bail!("Simulation sweep failed.");
        }
    };
    let total_duration = start_time.elapsed();
    info!(
        "Sweep finished in {:.3} seconds ({} simulations).",
        total_duration.as_secs_f64(),
        report.runs.len()
    );

    for stats in &report.fractions {
        info!(
            "S={:.2} | runs: {} | extinct: {} | termination round mean {:.2} (min {}, max {}) | mean peak infected {:.2}",
            stats.mobility_fraction,
            stats.runs,
            stats.extinct_runs,
            stats.mean_termination_round,
            stats.min_termination_round,
            stats.max_termination_round,
            stats.mean_peak_infected
        );
    }

    // --- Save Recorded Data ---
    if let Err(e) = output::save_results(&config.output, &report) {
        error!("Error saving results: {:#}", e);
        return Err(e);
    }

    info!("Simulation Complete.");
    Ok(())
}
