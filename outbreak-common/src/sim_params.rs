use serde::{Deserialize, Serialize};

/// Immutable per-run parameters derived from the configuration, read on every round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    // Lattice
    pub lattice_size: usize, // N, the lattice is N x N
    pub num_cells: usize,    // N * N

    // Population
    pub population_size: usize,    // M
    pub initial_infected: usize,   // Seeded infections at round 0

    // Disease
    pub incubation_scale: f64,  // K, location offset of the incubation draw is K - 1
    pub death_probability: f64, // P_d, decided when the incubation countdown hits zero

    // Movement
    pub move_probability: f64, // P_m, only consulted in the quarantine mode

    // Time
    pub max_rounds: u32, // T
}

impl RunParams {
    /// Builds parameters directly, filling in the derived cell count.
    pub fn new(
        lattice_size: usize,
        population_size: usize,
        initial_infected: usize,
        incubation_scale: f64,
        death_probability: f64,
        move_probability: f64,
        max_rounds: u32,
    ) -> Self {
        Self {
            lattice_size,
            num_cells: lattice_size * lattice_size,
            population_size,
            initial_infected,
            incubation_scale,
            death_probability,
            move_probability,
            max_rounds,
        }
    }
}
