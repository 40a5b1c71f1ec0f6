//! Grid-based agent simulation of an outbreak with optional test-and-quarantine.
//!
//! A run places agents on an `N x N` lattice, then repeats rounds of health update,
//! testing and movement until nobody is infected or the round budget is spent.

pub mod agent;
pub mod error;
pub mod grid;
pub mod output;
pub mod population;
pub mod sampling;
pub mod simulation;
pub mod sweep;

pub use agent::{Agent, AgentId, Health, IncubationOutcome, Mobility};
pub use error::{SimError, SimResult};
pub use grid::OccupancyGrid;
pub use population::{generate_population, Population};
pub use simulation::{
    run_simulation, run_simulation_with_quarantine, transmit, Intervention, RoundOutcome,
    Simulation,
};
pub use sweep::{run_sweep, FractionStats, SweepReport};
