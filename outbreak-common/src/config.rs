use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::RunParams;
use std::path::Path;

// Lattice geometry
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    #[serde(default = "default_lattice_size")]
    pub size: usize,
}

// How many infections are seeded at round 0. Exactly one of the two is expected;
// an absolute count wins over a fraction when both are given.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct InitialInfection {
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub fraction: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PopulationConfig {
    #[serde(default = "default_population_size")]
    pub size: usize,
    #[serde(default = "default_initial_infected")]
    pub initial_infected: InitialInfection,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DiseaseConfig {
    #[serde(default = "default_incubation_scale")]
    pub incubation_scale: f64,
    #[serde(default = "default_death_probability")]
    pub death_probability: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MovementConfig {
    #[serde(default = "default_move_probability")]
    pub move_probability: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

// Parameter sweep driven by the binary
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SweepConfig {
    #[serde(default = "default_runs")]
    pub runs: usize,
    #[serde(default = "default_mobility_fractions")]
    pub mobility_fractions: Vec<f64>,
    /// Fraction of the initial population tested each round. `None` runs the baseline model.
    #[serde(default)]
    pub test_rate: Option<f64>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default)]
    pub save_results: bool,
    #[serde(default)]
    pub record_rounds: bool, // Keep a per-round snapshot list in every run summary
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    #[serde(default)]
    pub lattice: LatticeConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub disease: DiseaseConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        LatticeConfig { size: default_lattice_size() }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            size: default_population_size(),
            initial_infected: default_initial_infected(),
        }
    }
}

impl Default for DiseaseConfig {
    fn default() -> Self {
        DiseaseConfig {
            incubation_scale: default_incubation_scale(),
            death_probability: default_death_probability(),
        }
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        MovementConfig { move_probability: default_move_probability() }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig { max_rounds: default_max_rounds() }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            runs: default_runs(),
            mobility_fractions: default_mobility_fractions(),
            test_rate: None,
            seed: default_seed(),
            parallel: default_parallel(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            format: None,
            save_results: false,
            record_rounds: false,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            lattice: LatticeConfig::default(),
            population: PopulationConfig::default(),
            disease: DiseaseConfig::default(),
            movement: MovementConfig::default(),
            timing: TimingConfig::default(),
            sweep: SweepConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| {
                anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e)
            })?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges that would otherwise only surface as sampling failures mid-sweep.
    pub fn validate(&self) -> Result<()> {
        if self.lattice.size == 0 {
            anyhow::bail!("lattice.size must be greater than 0.");
        }
        if self.population.size == 0 {
            anyhow::bail!("population.size must be greater than 0.");
        }
        if self.timing.max_rounds == 0 {
            anyhow::bail!("timing.max_rounds must be greater than 0.");
        }
        if !(self.disease.incubation_scale >= 1.0) {
            anyhow::bail!(
                "disease.incubation_scale must be at least 1 (got {}).",
                self.disease.incubation_scale
            );
        }
        check_unit_interval("disease.death_probability", self.disease.death_probability)?;
        check_unit_interval("movement.move_probability", self.movement.move_probability)?;
        if let Some(fraction) = self.population.initial_infected.fraction {
            check_unit_interval("population.initial_infected.fraction", fraction)?;
        }
        if let Some(rate) = self.sweep.test_rate {
            check_unit_interval("sweep.test_rate", rate)?;
        }
        if self.sweep.mobility_fractions.is_empty() {
            anyhow::bail!("sweep.mobility_fractions must list at least one fraction.");
        }
        for &fraction in &self.sweep.mobility_fractions {
            check_unit_interval("sweep.mobility_fractions", fraction)?;
        }
        if let Some(format) = self.output.format.as_deref() {
            if !matches!(format, "json" | "bincode" | "messagepack") {
                anyhow::bail!(
                    "output.format must be one of json, bincode, messagepack (got '{}').",
                    format
                );
            }
        }
        Ok(())
    }

    /// Number of agents infected at round 0.
    pub fn initial_infected_count(&self) -> usize {
        let seed = &self.population.initial_infected;
        match (seed.count, seed.fraction) {
            (Some(count), _) => count,
            (None, Some(fraction)) => {
                let count = (self.population.size as f64 * fraction).round() as usize;
                // A positive fraction always seeds at least one infection.
                if fraction > 0.0 { count.max(1) } else { 0 }
            }
            (None, None) => 1,
        }
    }

    /// Converts the configuration into the flat parameters used by every run.
    pub fn get_run_params(&self) -> RunParams {
        RunParams::new(
            self.lattice.size,
            self.population.size,
            self.initial_infected_count(),
            self.disease.incubation_scale,
            self.disease.death_probability,
            self.movement.move_probability,
            self.timing.max_rounds,
        )
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} must lie in [0, 1] (got {}).", name, value);
    }
    Ok(())
}

// Defaults follow the reference study: 100x100 lattice, 1000 people, 0.8% seeded.
fn default_lattice_size() -> usize { 100 }
fn default_population_size() -> usize { 1000 }
fn default_initial_infected() -> InitialInfection {
    InitialInfection { count: None, fraction: Some(0.008) }
}
fn default_incubation_scale() -> f64 { 10.0 }
fn default_death_probability() -> f64 { 0.05 }
fn default_move_probability() -> f64 { 0.9 }
fn default_max_rounds() -> u32 { 500 }
fn default_runs() -> usize { 100 }
fn default_mobility_fractions() -> Vec<f64> { vec![0.0, 0.25, 0.5, 0.75, 1.0] }
fn default_seed() -> u64 { 42 }
fn default_parallel() -> bool { true }
fn default_base_filename() -> String { "outbreak".to_string() }
