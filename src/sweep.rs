use crate::error::SimResult;
use crate::simulation::{Intervention, Simulation};
use log::{debug, info};
use outbreak_common::{RunSummary, SimulationConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Aggregate outcome of all runs sharing one mobility fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionStats {
    pub mobility_fraction: f64,
    pub runs: usize,
    pub extinct_runs: usize,
    pub mean_termination_round: f64,
    pub min_termination_round: u32,
    pub max_termination_round: u32,
    pub mean_peak_infected: f64,
    pub mean_total_infections: f64,
}

/// Every run of a sweep plus per-fraction aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub test_rate: Option<f64>,
    pub fractions: Vec<FractionStats>,
    /// Ordered by mobility fraction, then by run index.
    pub runs: Vec<RunSummary>,
}

/// Seed for one (run, fraction) pair, derived from the sweep seed.
pub fn derive_seed(base: u64, run: usize, fraction_idx: usize) -> u64 {
    base.wrapping_add((run as u64).wrapping_mul(0x1F3A))
        .wrapping_add((fraction_idx as u64).wrapping_mul(0x58C7))
}

/// Runs one (run, fraction) pair to completion.
pub fn run_one(
    config: &SimulationConfig,
    run: usize,
    fraction_idx: usize,
) -> SimResult<RunSummary> {
    let params = config.get_run_params();
    let mobility_fraction = config.sweep.mobility_fractions[fraction_idx];
    let intervention = match config.sweep.test_rate {
        Some(test_rate) => Intervention::TestAndQuarantine { test_rate },
        None => Intervention::None,
    };
    let seed = derive_seed(config.sweep.seed, run, fraction_idx);
    let mut sim = Simulation::new(params, mobility_fraction, intervention, seed)?
        .with_round_recording(config.output.record_rounds);
    sim.run()?;
    let summary = sim.into_summary(run, seed);
    debug!(
        "Run {} | S={:.2} | ended round {} | extinct: {} | peak {} | infections {} | deaths {}",
        run,
        mobility_fraction,
        summary.termination_round,
        summary.extinct,
        summary.peak_infected,
        summary.total_infections,
        summary.deaths
    );
    Ok(summary)
}

/// Runs `runs x mobility_fractions` independent simulations.
///
/// Each pair owns its population, grid and RNG. With `parallel` set the pairs are spread
/// over the Rayon pool; results come back in the same order either way.
pub fn run_sweep(config: &SimulationConfig) -> SimResult<SweepReport> {
    let pairs: Vec<(usize, usize)> = (0..config.sweep.mobility_fractions.len())
        .flat_map(|fraction_idx| (0..config.sweep.runs).map(move |run| (fraction_idx, run)))
        .collect();
    info!(
        "Sweeping {} runs x {} mobility fractions ({} simulations, {}).",
        config.sweep.runs,
        config.sweep.mobility_fractions.len(),
        pairs.len(),
        if config.sweep.parallel { "parallel" } else { "sequential" }
    );

    let runs: Vec<RunSummary> = if config.sweep.parallel {
        pairs
            .par_iter()
            .map(|&(fraction_idx, run)| run_one(config, run, fraction_idx))
            .collect::<SimResult<Vec<_>>>()?
    } else {
        pairs
            .iter()
            .map(|&(fraction_idx, run)| run_one(config, run, fraction_idx))
            .collect::<SimResult<Vec<_>>>()?
    };

    let fractions = config
        .sweep
        .mobility_fractions
        .iter()
        .enumerate()
        .map(|(fraction_idx, &fraction)| {
            let start = fraction_idx * config.sweep.runs;
            aggregate(fraction, &runs[start..start + config.sweep.runs])
        })
        .collect();

    Ok(SweepReport { test_rate: config.sweep.test_rate, fractions, runs })
}

/// Summarizes the runs of one mobility fraction.
pub fn aggregate(mobility_fraction: f64, runs: &[RunSummary]) -> FractionStats {
    let n = runs.len();
    let mean = |total: f64| if n > 0 { total / n as f64 } else { 0.0 };
    FractionStats {
        mobility_fraction,
        runs: n,
        extinct_runs: runs.iter().filter(|r| r.extinct).count(),
        mean_termination_round: mean(runs.iter().map(|r| r.termination_round as f64).sum()),
        min_termination_round: runs.iter().map(|r| r.termination_round).min().unwrap_or(0),
        max_termination_round: runs.iter().map(|r| r.termination_round).max().unwrap_or(0),
        mean_peak_infected: mean(runs.iter().map(|r| r.peak_infected as f64).sum()),
        mean_total_infections: mean(runs.iter().map(|r| r.total_infections as f64).sum()),
    }
}
