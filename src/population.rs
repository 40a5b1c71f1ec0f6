use crate::agent::{Agent, AgentId, Health, Mobility};
use crate::error::{SimError, SimResult};
use crate::sampling::sample_without_replacement;
use outbreak_common::{Cell, RunParams};
use rand::Rng;
use std::collections::HashSet;

/// Arena of agents indexed by [`AgentId`], plus the processing order of the survivors.
///
/// Dead agents leave an empty slot behind so ids stay stable for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct Population {
    slots: Vec<Option<Agent>>,
    order: Vec<AgentId>,
}

impl Population {
    /// Wraps agents whose ids must equal their position in `agents`.
    pub fn from_agents(agents: Vec<Agent>) -> SimResult<Self> {
        for (slot, agent) in agents.iter().enumerate() {
            if agent.id != slot {
                return Err(SimError::InconsistentState(format!(
                    "agent in slot {} carries id {}",
                    slot, agent.id
                )));
            }
        }
        let order = (0..agents.len()).collect();
        Ok(Self { slots: agents.into_iter().map(Some).collect(), order })
    }

    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Ids of the surviving agents, in processing order.
    pub fn ids(&self) -> &[AgentId] { &self.order }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.slots.get(id).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.slots.get_mut(id).and_then(|slot| slot.as_mut())
    }

    /// Like [`Population::get_mut`], but a missing agent is an internal fault.
    pub fn expect_mut(&mut self, id: AgentId) -> SimResult<&mut Agent> {
        self.get_mut(id)
            .ok_or_else(|| SimError::InconsistentState(format!("agent {} is not alive", id)))
    }

    /// Two distinct live agents, mutably.
    pub fn pair_mut(&mut self, a: AgentId, b: AgentId) -> SimResult<(&mut Agent, &mut Agent)> {
        if a == b || a >= self.slots.len() || b >= self.slots.len() {
            return Err(SimError::InconsistentState(format!("invalid agent pair ({}, {})", a, b)));
        }
        let (lo, hi, swapped) = if a < b { (a, b, false) } else { (b, a, true) };
        let (head, tail) = self.slots.split_at_mut(hi);
        match (head[lo].as_mut(), tail[0].as_mut()) {
            (Some(first), Some(second)) => {
                if swapped { Ok((second, first)) } else { Ok((first, second)) }
            }
            _ => Err(SimError::InconsistentState(format!("agent pair ({}, {}) not alive", a, b))),
        }
    }

    /// Surviving agents in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.order.iter().filter_map(move |&id| self.slots[id].as_ref())
    }

    /// Drops the given agents from the arena and the processing order.
    pub fn remove(&mut self, dead: &[AgentId]) {
        if dead.is_empty() {
            return;
        }
        let dead_set: HashSet<AgentId> = dead.iter().copied().collect();
        for &id in dead {
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = None;
            }
        }
        self.order.retain(|id| !dead_set.contains(id));
    }

    pub fn count_health(&self, health: Health) -> usize {
        self.iter().filter(|a| a.health() == health).count()
    }

    pub fn infected_count(&self) -> usize {
        self.count_health(Health::Infected)
    }

    pub fn quarantined_count(&self) -> usize {
        self.iter().filter(|a| a.is_quarantined()).count()
    }
}

/// Builds the initial population for one run.
///
/// Positions, seeded infections and the stationary subset are three independent draws
/// without replacement, so no two agents share a cell but an agent may be both
/// infected and stationary.
pub fn generate_population<R: Rng + ?Sized>(
    params: &RunParams,
    mobility_fraction: f64,
    rng: &mut R,
) -> SimResult<Population> {
    SimError::check_probability("mobility_fraction", mobility_fraction)?;
    let m = params.population_size;
    if params.num_cells == 0 && m > 0 {
        return Err(SimError::invalid("population_size", m, "0 lattice cells"));
    }
    if m > params.num_cells {
        return Err(SimError::invalid(
            "population_size",
            m,
            format!("{} lattice cells", params.num_cells),
        ));
    }
    if params.initial_infected > m {
        return Err(SimError::invalid(
            "initial_infected",
            params.initial_infected,
            format!("{} agents", m),
        ));
    }
    let stationary_count = (m as f64 * mobility_fraction).round() as usize;

    let positions = if m > 0 {
        sample_without_replacement(rng, 0, params.num_cells - 1, m)?
    } else {
        Vec::new()
    };
    let last_agent = m.saturating_sub(1);
    let infected: HashSet<usize> =
        sample_without_replacement(rng, 0, last_agent, params.initial_infected)?
            .into_iter()
            .collect();
    let stationary: HashSet<usize> =
        sample_without_replacement(rng, 0, last_agent, stationary_count)?
            .into_iter()
            .collect();

    let agents = positions
        .into_iter()
        .enumerate()
        .map(|(id, pos)| {
            let mobility = if stationary.contains(&id) {
                Mobility::Stationary
            } else {
                Mobility::Mobile
            };
            Agent::new(
                id,
                Cell::from_index(pos, params.lattice_size),
                mobility,
                infected.contains(&id),
                params.incubation_scale,
                &mut *rng,
            )
        })
        .collect();

    Population::from_agents(agents)
}
