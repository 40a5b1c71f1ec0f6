use crate::agent::{Agent, AgentId, Health, IncubationOutcome};
use crate::error::{SimError, SimResult};
use crate::grid::OccupancyGrid;
use crate::population::{generate_population, Population};
use crate::sampling::{bernoulli, choose_uniform_direction, sample_without_replacement};
use log::{debug, trace};
use outbreak_common::{Cell, RoundSnapshot, RunParams, RunSummary};
use rand::prelude::*;

/// Optional intervention applied on top of the baseline model.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Intervention {
    /// Every mobile agent moves every round and nobody is tested.
    None,
    /// Mobile agents move with probability `P_m`, and `round(test_rate * M)` agents are
    /// tested each round; infected ones found are quarantined.
    TestAndQuarantine { test_rate: f64 },
}

impl Intervention {
    pub fn test_rate(&self) -> Option<f64> {
        match *self {
            Intervention::None => None,
            Intervention::TestAndQuarantine { test_rate } => Some(test_rate),
        }
    }
}

/// Whether the run continues after a round.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Continue,
    /// Nobody is infected any more, or nobody is left.
    Extinct,
}

/// Owns one run: its population, occupancy grid and random source.
pub struct Simulation {
    params: RunParams,
    intervention: Intervention,
    mobility_fraction: f64,
    population: Population,
    grid: OccupancyGrid,
    rng: StdRng,
    /// Population size at round 0; the testing quota is a fraction of this.
    initial_population: usize,
    /// Number of the last executed round (rounds are numbered from 1).
    current_round: u32,
    peak_infected: usize,
    total_infections: usize,
    deaths: usize,
    /// Set once a round ends with no infected agent left.
    extinct: bool,
    record_rounds: bool,
    recorded_rounds: Vec<RoundSnapshot>,
}

impl Simulation {
    /// Creates a run with a freshly generated population.
    pub fn new(
        params: RunParams,
        mobility_fraction: f64,
        intervention: Intervention,
        seed: u64,
    ) -> SimResult<Self> {
        validate_params(&params, intervention)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let population = generate_population(&params, mobility_fraction, &mut rng)?;
        let mut sim = Self::from_parts(params, intervention, population, rng)?;
        sim.mobility_fraction = mobility_fraction;
        Ok(sim)
    }

    /// Creates a run around a hand-built population. The grid is derived from agent positions.
    pub fn from_parts(
        params: RunParams,
        intervention: Intervention,
        population: Population,
        rng: StdRng,
    ) -> SimResult<Self> {
        validate_params(&params, intervention)?;
        let grid = OccupancyGrid::from_agents(params.lattice_size, population.iter())?;
        let initial_population = population.len();
        let total_infections = population.infected_count();
        let stationary = population.iter().filter(|a| a.is_stationary()).count();
        let mobility_fraction = if initial_population > 0 {
            stationary as f64 / initial_population as f64
        } else {
            0.0
        };
        Ok(Self {
            params,
            intervention,
            mobility_fraction,
            population,
            grid,
            rng,
            initial_population,
            current_round: 0,
            peak_infected: 0,
            total_infections,
            deaths: 0,
            extinct: false,
            record_rounds: false,
            recorded_rounds: Vec::new(),
        })
    }

    /// Keep a [`RoundSnapshot`] for every executed round.
    pub fn with_round_recording(mut self, enabled: bool) -> Self {
        self.record_rounds = enabled;
        self
    }

    /// Runs one round: health update, termination check, testing, then movement.
    pub fn step(&mut self) -> SimResult<RoundOutcome> {
        self.current_round += 1;

        // Peak is sampled on the population entering the round, before decay.
        let infected_at_start = self.population.infected_count();
        self.peak_infected = self.peak_infected.max(infected_at_start);

        // --- A. Health update ---
        let deaths = self.update_health()?;

        // --- B. Termination check ---
        if self.population.is_empty() || self.population.infected_count() == 0 {
            self.extinct = true;
            self.record_round(infected_at_start, 0, deaths);
            debug!(
                "Outbreak over at round {} (population {}, peak {}).",
                self.current_round,
                self.population.len(),
                self.peak_infected
            );
            return Ok(RoundOutcome::Extinct);
        }

        // --- C. Testing ---
        if let Intervention::TestAndQuarantine { test_rate } = self.intervention {
            self.test_population(test_rate)?;
        }

        // --- D. Movement & transmission ---
        let new_infections = self.move_agents()?;

        if cfg!(debug_assertions) {
            self.verify_invariants()?;
        }
        self.record_round(infected_at_start, new_infections, deaths);
        Ok(RoundOutcome::Continue)
    }

    /// Runs rounds until the outbreak dies out or the round budget is spent.
    /// Returns the termination round (the budget `T` if the outbreak outlived it).
    pub fn run(&mut self) -> SimResult<u32> {
        while !self.extinct && self.current_round < self.params.max_rounds {
            if self.step()? == RoundOutcome::Extinct {
                break;
            }
        }
        Ok(self.termination_round())
    }

    /// Ticks every survivor's incubation and removes the dead from population and grid.
    fn update_health(&mut self) -> SimResult<usize> {
        let death_probability = self.params.death_probability;
        let mut dead: Vec<AgentId> = Vec::new();
        for i in 0..self.population.len() {
            let id = self.population.ids()[i];
            let agent = self.population.expect_mut(id)?;
            let outcome = agent.advance_incubation(death_probability, &mut self.rng);
            if outcome == IncubationOutcome::Died {
                self.grid.vacate(agent.position, id)?;
                dead.push(id);
            }
        }
        self.population.remove(&dead);
        self.deaths += dead.len();
        Ok(dead.len())
    }

    /// Tests `round(test_rate * M)` survivors, or everyone if fewer remain.
    /// Infected agents found are quarantined.
    fn test_population(&mut self, test_rate: f64) -> SimResult<()> {
        let quota = (test_rate * self.initial_population as f64).round() as usize;
        let alive = self.population.len();
        let tested: Vec<AgentId> = if alive <= quota {
            self.population.ids().to_vec()
        } else {
            sample_without_replacement(&mut self.rng, 0, alive - 1, quota)?
                .into_iter()
                .map(|i| self.population.ids()[i])
                .collect()
        };
        let mut found = 0;
        for id in tested {
            if self.population.expect_mut(id)?.set_quarantined() {
                found += 1;
            }
        }
        trace!(
            "Round {}: tested quota {}, {} infected quarantined.",
            self.current_round,
            quota,
            found
        );
        Ok(())
    }

    /// Moves agents one at a time in population order; later movers see earlier moves.
    fn move_agents(&mut self) -> SimResult<usize> {
        let size = self.params.lattice_size;
        let gate_moves = matches!(self.intervention, Intervention::TestAndQuarantine { .. });
        let mut new_infections = 0;

        for i in 0..self.population.len() {
            let id = self.population.ids()[i];
            let (position, stationary, facing) = {
                let agent = self.population.expect_mut(id)?;
                (agent.position, agent.is_stationary(), agent.facing)
            };
            if stationary {
                continue;
            }
            if gate_moves && !bernoulli(&mut self.rng, self.params.move_probability) {
                continue;
            }

            // Keep heading the same way unless that leads off the lattice.
            let heading = match facing {
                Some(dir) if position.step(dir, size).is_some() => Some(dir),
                _ => self.pick_open_direction(position),
            };
            self.population.expect_mut(id)?.facing = heading;
            let Some(dir) = heading else {
                continue; // Boxed in.
            };
            let target = position.step(dir, size).ok_or_else(|| {
                SimError::InconsistentState(format!("agent {} heading off the lattice", id))
            })?;

            match self.grid.occupant(target) {
                None => self.move_agent(id, position, target)?,
                Some(occupant) => {
                    if self.handle_collision(id, occupant)? {
                        new_infections += 1;
                    }
                    let detour = self.pick_open_direction(position);
                    self.population.expect_mut(id)?.facing = detour;
                    if let Some(dir) = detour {
                        let target = position.step(dir, size).ok_or_else(|| {
                            SimError::InconsistentState(format!(
                                "agent {} detouring off the lattice",
                                id
                            ))
                        })?;
                        self.move_agent(id, position, target)?;
                    }
                }
            }
        }
        self.total_infections += new_infections;
        Ok(new_infections)
    }

    fn pick_open_direction(&mut self, from: Cell) -> Option<outbreak_common::Direction> {
        let open = self.grid.open_directions(from);
        choose_uniform_direction(&mut self.rng, &open)
    }

    /// Vacates the old cell and occupies the new one, then updates the agent.
    fn move_agent(&mut self, id: AgentId, from: Cell, to: Cell) -> SimResult<()> {
        self.grid.relocate(id, from, to)?;
        self.population.expect_mut(id)?.position = to;
        Ok(())
    }

    /// Applies the transmission rule between a mover and the agent it bumped into.
    fn handle_collision(&mut self, mover: AgentId, occupant: AgentId) -> SimResult<bool> {
        let k_scale = self.params.incubation_scale;
        let (a, b) = self.population.pair_mut(mover, occupant)?;
        Ok(transmit(a, b, k_scale, &mut self.rng))
    }

    fn record_round(&mut self, infected_at_start: usize, new_infections: usize, deaths: usize) {
        let infected = self.population.infected_count();
        let recovered = self.population.count_health(Health::Recovered);
        let quarantined = self.population.quarantined_count();
        trace!(
            "Round [{}/{}] | Population: {} | Infected: {} | Recovered: {} | Quarantined: {} | New: {} | Deaths: {}",
            self.current_round,
            self.params.max_rounds,
            self.population.len(),
            infected,
            recovered,
            quarantined,
            new_infections,
            deaths
        );
        if self.record_rounds {
            self.recorded_rounds.push(RoundSnapshot {
                round: self.current_round,
                population: self.population.len(),
                infected_at_start,
                infected,
                recovered,
                quarantined,
                new_infections,
                deaths,
            });
        }
    }

    /// Checks that the grid and the agents agree on every position.
    pub fn verify_invariants(&self) -> SimResult<()> {
        self.grid.verify(self.population.iter())
    }

    /// Round at which the run stopped, or the budget if it has not stopped naturally.
    pub fn termination_round(&self) -> u32 {
        if self.extinct {
            self.current_round
        } else {
            self.current_round.max(self.params.max_rounds)
        }
    }

    pub fn current_round(&self) -> u32 { self.current_round }
    pub fn is_extinct(&self) -> bool { self.extinct }
    pub fn peak_infected(&self) -> usize { self.peak_infected }
    pub fn total_infections(&self) -> usize { self.total_infections }
    pub fn deaths(&self) -> usize { self.deaths }
    pub fn population(&self) -> &Population { &self.population }
    pub fn grid(&self) -> &OccupancyGrid { &self.grid }
    pub fn params(&self) -> &RunParams { &self.params }
    pub fn intervention(&self) -> Intervention { self.intervention }

    /// Provides access to the recorded round snapshots.
    pub fn recorded_rounds(&self) -> &[RoundSnapshot] {
        &self.recorded_rounds
    }

    /// Packs the run's statistics into a serializable summary.
    pub fn into_summary(self, run: usize, seed: u64) -> RunSummary {
        let termination_round = self.termination_round();
        RunSummary {
            run,
            mobility_fraction: self.mobility_fraction,
            test_rate: self.intervention.test_rate(),
            seed,
            termination_round,
            extinct: self.extinct,
            peak_infected: self.peak_infected,
            total_infections: self.total_infections,
            deaths: self.deaths,
            final_population: self.population.len(),
            rounds: if self.record_rounds { Some(self.recorded_rounds) } else { None },
        }
    }
}

/// Transmission between two colliding agents.
///
/// Infection passes only from an infected, unquarantined agent to a healthy one without
/// immunity. Returns whether someone got infected.
pub fn transmit<R: Rng + ?Sized>(a: &mut Agent, b: &mut Agent, k_scale: f64, rng: &mut R) -> bool {
    let (source, target) = match (a.is_infected(), b.is_infected()) {
        (true, false) => (a, b),
        (false, true) => (b, a),
        _ => return false,
    };
    if !source.can_transmit() || !target.is_susceptible() {
        return false;
    }
    target.infect(k_scale, rng)
}

fn validate_params(params: &RunParams, intervention: Intervention) -> SimResult<()> {
    SimError::check_probability("death_probability", params.death_probability)?;
    SimError::check_probability("move_probability", params.move_probability)?;
    if let Intervention::TestAndQuarantine { test_rate } = intervention {
        SimError::check_probability("test_rate", test_rate)?;
    }
    if !params.incubation_scale.is_finite() || params.incubation_scale < 0.0 {
        return Err(SimError::invalid(
            "incubation_scale",
            params.incubation_scale,
            "a finite non-negative scale",
        ));
    }
    let expected_cells = params.lattice_size * params.lattice_size;
    if params.num_cells != expected_cells {
        return Err(SimError::invalid(
            "num_cells",
            params.num_cells,
            format!(
                "{} for a {}x{} lattice",
                expected_cells, params.lattice_size, params.lattice_size
            ),
        ));
    }
    Ok(())
}

/// Baseline model: returns the termination round of one run.
pub fn run_simulation(params: &RunParams, mobility_fraction: f64, seed: u64) -> SimResult<u32> {
    let mut sim = Simulation::new(params.clone(), mobility_fraction, Intervention::None, seed)?;
    sim.run()
}

/// Test-and-quarantine model: returns the termination round and the peak number of
/// simultaneously infected agents.
pub fn run_simulation_with_quarantine(
    params: &RunParams,
    mobility_fraction: f64,
    test_rate: f64,
    seed: u64,
) -> SimResult<(u32, usize)> {
    let mut sim = Simulation::new(
        params.clone(),
        mobility_fraction,
        Intervention::TestAndQuarantine { test_rate },
        seed,
    )?;
    let termination_round = sim.run()?;
    Ok((termination_round, sim.peak_infected()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Mobility;
    use outbreak_common::Direction;

    fn agent(
        id: AgentId,
        x: usize,
        y: usize,
        mobility: Mobility,
        infected: bool,
        rng: &mut StdRng,
    ) -> Agent {
        Agent::new(id, Cell::new(x, y), mobility, infected, 3.0, rng)
    }

    #[test]
    fn transmission_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sick = agent(0, 0, 0, Mobility::Mobile, true, &mut rng);
        let mut well = agent(1, 0, 1, Mobility::Mobile, false, &mut rng);
        assert!(transmit(&mut well, &mut sick, 3.0, &mut rng));
        assert!(well.is_infected());

        let mut sick = agent(0, 0, 0, Mobility::Mobile, true, &mut rng);
        let mut well = agent(1, 0, 1, Mobility::Mobile, false, &mut rng);
        assert!(transmit(&mut sick, &mut well, 3.0, &mut rng));
        assert!(well.is_infected());
    }

    #[test]
    fn quarantined_source_does_not_transmit() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut sick = agent(0, 0, 0, Mobility::Mobile, true, &mut rng);
        let mut well = agent(1, 0, 1, Mobility::Mobile, false, &mut rng);
        sick.set_quarantined();
        assert!(!transmit(&mut sick, &mut well, 3.0, &mut rng));
        assert!(!transmit(&mut well, &mut sick, 3.0, &mut rng));
        assert_eq!(well.health(), Health::Healthy);
    }

    #[test]
    fn same_status_and_immune_pairs_are_inert() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut a = agent(0, 0, 0, Mobility::Mobile, true, &mut rng);
        let mut b = agent(1, 0, 1, Mobility::Mobile, true, &mut rng);
        assert!(!transmit(&mut a, &mut b, 3.0, &mut rng));

        let mut c = agent(2, 1, 0, Mobility::Mobile, false, &mut rng);
        let mut d = agent(3, 1, 1, Mobility::Mobile, false, &mut rng);
        assert!(!transmit(&mut c, &mut d, 3.0, &mut rng));

        // Recover `b`, then it is immune to `a`.
        b.set_remaining_incubation(1);
        assert_eq!(b.advance_incubation(0.0, &mut rng), IncubationOutcome::Recovered);
        assert!(!transmit(&mut a, &mut b, 3.0, &mut rng));
        assert_eq!(b.health(), Health::Recovered);
    }

    #[test]
    fn mover_keeps_heading_until_the_edge() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut walker = agent(0, 2, 0, Mobility::Mobile, false, &mut rng);
        walker.facing = Some(Direction::new(0, 1));
        let mut sick = agent(1, 0, 0, Mobility::Stationary, true, &mut rng);
        sick.set_remaining_incubation(50);
        let population = Population::from_agents(vec![walker, sick]).unwrap();
        let params = RunParams::new(5, 2, 1, 3.0, 0.0, 1.0, 50);
        let mut sim = Simulation::from_parts(params, Intervention::None, population, rng).unwrap();

        for expected_y in 1..=4 {
            assert_eq!(sim.step().unwrap(), RoundOutcome::Continue);
            assert_eq!(sim.population().get(0).unwrap().position, Cell::new(2, expected_y));
        }
        // At the right edge the agent has to turn.
        sim.step().unwrap();
        let walker = sim.population().get(0).unwrap();
        assert_ne!(walker.facing, Some(Direction::new(0, 1)));
        sim.verify_invariants().unwrap();
    }

    #[test]
    fn boxed_in_agent_stays_put() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut agents = Vec::new();
        for idx in 0..4 {
            let cell = Cell::from_index(idx, 2);
            agents.push(agent(idx, cell.x, cell.y, Mobility::Mobile, idx == 0, &mut rng));
        }
        agents[0].set_remaining_incubation(50);
        let population = Population::from_agents(agents).unwrap();
        let params = RunParams::new(2, 4, 1, 3.0, 0.0, 1.0, 10);
        let mut sim = Simulation::from_parts(params, Intervention::None, population, rng).unwrap();
        sim.step().unwrap();
        for idx in 0..4 {
            let a = sim.population().get(idx).unwrap();
            assert_eq!(a.position, Cell::from_index(idx, 2));
            assert_eq!(a.facing, None);
        }
    }

    #[test]
    fn deaths_clear_the_grid_in_the_same_round() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut sick = agent(0, 1, 1, Mobility::Stationary, true, &mut rng);
        sick.set_remaining_incubation(1);
        let mut other = agent(1, 3, 3, Mobility::Stationary, true, &mut rng);
        other.set_remaining_incubation(10);
        let population = Population::from_agents(vec![sick, other]).unwrap();
        let params = RunParams::new(5, 2, 2, 3.0, 1.0, 1.0, 10);
        let mut sim = Simulation::from_parts(params, Intervention::None, population, rng).unwrap();
        assert_eq!(sim.step().unwrap(), RoundOutcome::Continue);
        assert_eq!(sim.population().len(), 1);
        assert_eq!(sim.deaths(), 1);
        assert!(sim.grid().is_free(Cell::new(1, 1)));
        sim.verify_invariants().unwrap();
    }

    #[test]
    fn everyone_dead_is_a_normal_ending() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sick = agent(0, 0, 0, Mobility::Mobile, true, &mut rng);
        sick.set_remaining_incubation(2);
        let population = Population::from_agents(vec![sick]).unwrap();
        let params = RunParams::new(3, 1, 1, 3.0, 1.0, 1.0, 10);
        let mut sim = Simulation::from_parts(params, Intervention::None, population, rng).unwrap();
        assert_eq!(sim.run().unwrap(), 2);
        assert!(sim.is_extinct());
        assert!(sim.population().is_empty());
        assert_eq!(sim.grid().occupied_count(), 0);
    }

    #[test]
    fn budget_exhaustion_reports_budget() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut sick = agent(0, 0, 0, Mobility::Stationary, true, &mut rng);
        sick.set_remaining_incubation(100);
        let population = Population::from_agents(vec![sick]).unwrap();
        let params = RunParams::new(3, 1, 1, 3.0, 0.0, 1.0, 7);
        let mut sim = Simulation::from_parts(params, Intervention::None, population, rng).unwrap();
        assert_eq!(sim.run().unwrap(), 7);
        assert!(!sim.is_extinct());
        assert_eq!(sim.current_round(), 7);
        assert_eq!(sim.peak_infected(), 1);
    }

    #[test]
    fn recorded_rounds_cover_every_executed_round() {
        let params = RunParams::new(10, 30, 3, 3.0, 0.1, 0.9, 40);
        let intervention = Intervention::TestAndQuarantine { test_rate: 0.2 };
        let mut sim = Simulation::new(params, 0.5, intervention, 99)
            .unwrap()
            .with_round_recording(true);
        let end = sim.run().unwrap();
        let rounds = sim.recorded_rounds();
        assert_eq!(rounds.len() as u32, end);
        for (i, snap) in rounds.iter().enumerate() {
            assert_eq!(snap.round, i as u32 + 1);
        }
        let peak = rounds.iter().map(|r| r.infected_at_start).max().unwrap();
        assert_eq!(peak, sim.peak_infected());
    }

    #[test]
    fn testing_draws_exactly_the_quota_when_survivors_outnumber_it() {
        let mut rng = StdRng::seed_from_u64(10);
        let agents: Vec<Agent> = (0..20)
            .map(|id| {
                let cell = Cell::from_index(id, 5);
                let mut a = agent(id, cell.x, cell.y, Mobility::Stationary, true, &mut rng);
                a.set_remaining_incubation(10);
                a
            })
            .collect();
        let population = Population::from_agents(agents).unwrap();
        let params = RunParams::new(5, 20, 20, 3.0, 0.0, 1.0, 10);
        let intervention = Intervention::TestAndQuarantine { test_rate: 0.25 };
        let mut sim = Simulation::from_parts(params, intervention, population, rng).unwrap();

        // round(0.25 * 20) = 5 distinct agents, all of them infected.
        assert_eq!(sim.step().unwrap(), RoundOutcome::Continue);
        assert_eq!(sim.population().len(), 20);
        assert_eq!(sim.population().quarantined_count(), 5);

        // A fresh draw next round; overlaps with the first five are allowed.
        sim.step().unwrap();
        let quarantined = sim.population().quarantined_count();
        assert!((5..=10).contains(&quarantined), "quarantined {}", quarantined);
        assert_eq!(sim.total_infections(), 20);
    }

    #[test]
    fn invalid_probability_is_rejected_up_front() {
        let params = RunParams::new(5, 5, 1, 3.0, 1.2, 0.9, 10);
        assert!(matches!(
            Simulation::new(params, 0.0, Intervention::None, 1),
            Err(SimError::InvalidParameter { name: "death_probability", .. })
        ));
        let params = RunParams::new(5, 5, 1, 3.0, 0.1, 0.9, 10);
        assert!(run_simulation_with_quarantine(&params, 0.0, -0.5, 1).is_err());
    }
}
