use crate::sampling::sample_incubation_period;
use outbreak_common::{Cell, Direction};
use rand::Rng;

/// Stable identity of an agent within a run; also its slot in the population arena.
pub type AgentId = usize;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Infected,
    /// Absorbing: recovered agents are immune and never transmit.
    Recovered,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mobility {
    Stationary,
    Mobile,
}

/// What an incubation tick resolved to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IncubationOutcome {
    /// Nothing decided this round (healthy, recovered, or still counting down).
    Continuing,
    Recovered,
    Died,
}

/// Mutable per-individual state.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub position: Cell,
    pub mobility: Mobility,
    health: Health,
    /// Rounds left before the recovery/death decision. Only `Some` while infected.
    remaining_incubation: Option<u32>,
    immune: bool,
    quarantined: bool,
    /// Current travel direction, kept across rounds until it leads off the lattice.
    pub facing: Option<Direction>,
}

impl Agent {
    /// Creates an agent; an infected agent gets a freshly sampled incubation countdown.
    pub fn new<R: Rng + ?Sized>(
        id: AgentId,
        position: Cell,
        mobility: Mobility,
        infected: bool,
        k_scale: f64,
        rng: &mut R,
    ) -> Self {
        let mut agent = Agent {
            id,
            position,
            mobility,
            health: Health::Healthy,
            remaining_incubation: None,
            immune: false,
            quarantined: false,
            facing: None,
        };
        if infected {
            agent.health = Health::Infected;
            agent.remaining_incubation = Some(sample_incubation_period(rng, k_scale));
        }
        agent
    }

    pub fn health(&self) -> Health { self.health }
    pub fn is_infected(&self) -> bool { self.health == Health::Infected }
    pub fn is_immune(&self) -> bool { self.immune }
    pub fn is_quarantined(&self) -> bool { self.quarantined }
    pub fn is_stationary(&self) -> bool { self.mobility == Mobility::Stationary }
    pub fn remaining_incubation(&self) -> Option<u32> { self.remaining_incubation }

    /// Overrides the countdown of an infected agent. Ignored for anyone else.
    /// Used to pin timing in hand-built scenarios; the engine never calls it.
    #[doc(hidden)]
    pub fn set_remaining_incubation(&mut self, rounds: u32) {
        if self.is_infected() {
            self.remaining_incubation = Some(rounds);
        }
    }

    /// Healthy, non-immune agents become infected with a new countdown. Returns whether it took.
    pub fn infect<R: Rng + ?Sized>(&mut self, k_scale: f64, rng: &mut R) -> bool {
        if self.is_infected() || self.immune {
            return false;
        }
        self.health = Health::Infected;
        self.remaining_incubation = Some(sample_incubation_period(rng, k_scale));
        self.quarantined = false;
        true
    }

    /// Ticks the countdown of an infected agent and resolves it once it reaches zero.
    pub fn advance_incubation<R: Rng + ?Sized>(
        &mut self,
        death_probability: f64,
        rng: &mut R,
    ) -> IncubationOutcome {
        let Some(remaining) = self.remaining_incubation else {
            return IncubationOutcome::Continuing;
        };
        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.remaining_incubation = Some(remaining);
            return IncubationOutcome::Continuing;
        }
        if crate::sampling::bernoulli(rng, death_probability) {
            self.remaining_incubation = Some(0);
            IncubationOutcome::Died
        } else {
            self.recover();
            IncubationOutcome::Recovered
        }
    }

    fn recover(&mut self) {
        self.health = Health::Recovered;
        self.immune = true;
        self.remaining_incubation = None;
        self.quarantined = false;
    }

    /// Flags an infected agent as quarantined. Returns false (and does nothing) otherwise.
    pub fn set_quarantined(&mut self) -> bool {
        if !self.is_infected() {
            return false;
        }
        self.quarantined = true;
        true
    }

    /// Infected and free to spread.
    pub fn can_transmit(&self) -> bool {
        self.is_infected() && !self.quarantined
    }

    /// Healthy and without immunity.
    pub fn is_susceptible(&self) -> bool {
        self.health == Health::Healthy && !self.immune
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn healthy(rng: &mut StdRng) -> Agent {
        Agent::new(0, Cell::new(0, 0), Mobility::Mobile, false, 3.0, rng)
    }

    fn infected(rng: &mut StdRng) -> Agent {
        Agent::new(1, Cell::new(0, 1), Mobility::Mobile, true, 3.0, rng)
    }

    #[test]
    fn seeded_agent_starts_counting_down() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = healthy(&mut rng);
        assert_eq!(a.remaining_incubation(), None);
        assert!(!a.is_immune());

        let b = infected(&mut rng);
        assert!(b.is_infected());
        assert!(b.remaining_incubation().unwrap() >= 2);
    }

    #[test]
    fn recovery_is_absorbing() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut a = infected(&mut rng);
        a.set_remaining_incubation(1);
        assert_eq!(a.advance_incubation(0.0, &mut rng), IncubationOutcome::Recovered);
        assert_eq!(a.health(), Health::Recovered);
        assert!(a.is_immune());
        assert_eq!(a.remaining_incubation(), None);

        assert!(!a.infect(3.0, &mut rng));
        assert_eq!(a.health(), Health::Recovered);
        assert_eq!(a.advance_incubation(1.0, &mut rng), IncubationOutcome::Continuing);
        assert!(!a.set_quarantined());
    }

    #[test]
    fn certain_death_resolves_at_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut a = infected(&mut rng);
        a.set_remaining_incubation(2);
        assert_eq!(a.advance_incubation(1.0, &mut rng), IncubationOutcome::Continuing);
        assert_eq!(a.remaining_incubation(), Some(1));
        assert_eq!(a.advance_incubation(1.0, &mut rng), IncubationOutcome::Died);
    }

    #[test]
    fn zero_length_incubation_resolves_on_next_tick() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut a = infected(&mut rng);
        a.set_remaining_incubation(0);
        assert_eq!(a.advance_incubation(0.0, &mut rng), IncubationOutcome::Recovered);
    }

    #[test]
    fn quarantine_only_applies_to_infected() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut h = healthy(&mut rng);
        assert!(!h.set_quarantined());
        assert!(!h.is_quarantined());

        let mut i = infected(&mut rng);
        assert!(i.set_quarantined());
        assert!(!i.can_transmit());
    }

    #[test]
    fn infection_clears_stale_quarantine() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut a = healthy(&mut rng);
        assert!(a.infect(3.0, &mut rng));
        assert!(a.can_transmit());
        assert!(!a.infect(3.0, &mut rng));
    }
}
