use serde::{Deserialize, Serialize};

/// Population counts observed at the end of one executed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// The 1-based round index.
    pub round: u32,
    /// Surviving agents after this round's health update.
    pub population: usize,
    /// Agents infected when the round started, before health decay. This is what the peak tracks.
    pub infected_at_start: usize,
    pub infected: usize,
    pub recovered: usize,
    pub quarantined: usize,
    /// Transmissions that happened during this round's movement.
    pub new_infections: usize,
    pub deaths: usize,
}

/// Outcome of a single run for one (run index, mobility fraction) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: usize,
    pub mobility_fraction: f64,
    pub test_rate: Option<f64>,
    pub seed: u64,
    /// Round at which the run stopped, or the round budget if the outbreak outlived it.
    pub termination_round: u32,
    /// True if the run stopped because nobody was infected any more (or nobody was left).
    pub extinct: bool,
    pub peak_infected: usize,
    /// Every infection over the run, including the seeded ones.
    pub total_infections: usize,
    pub deaths: usize,
    pub final_population: usize,
    /// Present only when per-round recording is enabled. Always written so positional
    /// formats (bincode, MessagePack) keep every field.
    pub rounds: Option<Vec<RoundSnapshot>>,
}
