pub mod config;
pub mod lattice;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{
    DiseaseConfig, InitialInfection, LatticeConfig, MovementConfig, OutputConfig, PopulationConfig,
    SimulationConfig, SweepConfig, TimingConfig,
};
pub use lattice::{Cell, Direction, DIRECTIONS};
pub use sim_params::RunParams;
pub use snapshot::{RoundSnapshot, RunSummary};
