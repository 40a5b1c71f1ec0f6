use crate::agent::{Agent, AgentId};
use crate::error::{SimError, SimResult};
use outbreak_common::{Cell, Direction, DIRECTIONS};

/// Dense `size x size` index from cell to the agent standing on it.
///
/// The grid is derived from agent positions and is kept in lockstep with them: every
/// move goes through [`OccupancyGrid::relocate`], which checks both ends before writing.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    size: usize,
    cells: Vec<Option<AgentId>>,
}

impl OccupancyGrid {
    pub fn new(size: usize) -> Self {
        Self { size, cells: vec![None; size * size] }
    }

    /// Builds the grid from the agents' recorded positions.
    pub fn from_agents<'a>(
        size: usize,
        agents: impl IntoIterator<Item = &'a Agent>,
    ) -> SimResult<Self> {
        let mut grid = Self::new(size);
        for agent in agents {
            grid.occupy(agent.position, agent.id)?;
        }
        Ok(grid)
    }

    pub fn size(&self) -> usize { self.size }

    #[inline(always)]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x < self.size && cell.y < self.size
    }

    #[inline(always)]
    fn cell_idx(&self, cell: Cell) -> SimResult<usize> {
        if !self.in_bounds(cell) {
            return Err(SimError::InconsistentState(format!(
                "cell ({}, {}) outside {}x{} lattice",
                cell.x, cell.y, self.size, self.size
            )));
        }
        Ok(cell.index(self.size))
    }

    /// The agent on `cell`, if any. Out-of-bounds cells are reported empty.
    #[inline(always)]
    pub fn occupant(&self, cell: Cell) -> Option<AgentId> {
        if self.in_bounds(cell) { self.cells[cell.index(self.size)] } else { None }
    }

    pub fn is_free(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.cells[cell.index(self.size)].is_none()
    }

    /// Places `id` on an empty cell.
    pub fn occupy(&mut self, cell: Cell, id: AgentId) -> SimResult<()> {
        let idx = self.cell_idx(cell)?;
        match self.cells[idx] {
            None => {
                self.cells[idx] = Some(id);
                Ok(())
            }
            Some(other) => Err(SimError::InconsistentState(format!(
                "agent {} placed on ({}, {}) already held by agent {}",
                id, cell.x, cell.y, other
            ))),
        }
    }

    /// Clears `cell`, which must currently hold `id`.
    pub fn vacate(&mut self, cell: Cell, id: AgentId) -> SimResult<()> {
        let idx = self.cell_idx(cell)?;
        if self.cells[idx] != Some(id) {
            return Err(SimError::InconsistentState(format!(
                "agent {} vacating ({}, {}) but the grid holds {:?}",
                id, cell.x, cell.y, self.cells[idx]
            )));
        }
        self.cells[idx] = None;
        Ok(())
    }

    /// Moves `id` from `from` to the empty cell `to`.
    /// Both ends are checked before either is written.
    pub fn relocate(&mut self, id: AgentId, from: Cell, to: Cell) -> SimResult<()> {
        let from_idx = self.cell_idx(from)?;
        let to_idx = self.cell_idx(to)?;
        if self.cells[from_idx] != Some(id) {
            return Err(SimError::InconsistentState(format!(
                "agent {} moving from ({}, {}) but the grid holds {:?}",
                id, from.x, from.y, self.cells[from_idx]
            )));
        }
        if let Some(other) = self.cells[to_idx] {
            return Err(SimError::InconsistentState(format!(
                "agent {} moving onto ({}, {}) held by agent {}",
                id, to.x, to.y, other
            )));
        }
        self.cells[from_idx] = None;
        self.cells[to_idx] = Some(id);
        Ok(())
    }

    /// Compass directions from `cell` whose target is on the lattice and unoccupied.
    pub fn open_directions(&self, cell: Cell) -> Vec<Direction> {
        DIRECTIONS
            .iter()
            .copied()
            .filter(|&dir| {
                cell.step(dir, self.size)
                    .map(|target| self.cells[target.index(self.size)].is_none())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Checks that the grid holds exactly the given agents, each on its recorded cell.
    pub fn verify<'a>(&self, agents: impl IntoIterator<Item = &'a Agent>) -> SimResult<()> {
        let mut seen = 0;
        for agent in agents {
            let idx = self.cell_idx(agent.position)?;
            if self.cells[idx] != Some(agent.id) {
                return Err(SimError::InconsistentState(format!(
                    "agent {} records ({}, {}) but the grid holds {:?}",
                    agent.id, agent.position.x, agent.position.y, self.cells[idx]
                )));
            }
            seen += 1;
        }
        let occupied = self.occupied_count();
        if occupied != seen {
            return Err(SimError::InconsistentState(format!(
                "grid holds {} agents but {} are alive",
                occupied, seen
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_has_three_open_directions() {
        let grid = OccupancyGrid::new(4);
        let open = grid.open_directions(Cell::new(0, 0));
        assert_eq!(open.len(), 3);
        assert!(open.contains(&Direction::new(0, 1)));
        assert!(open.contains(&Direction::new(1, 1)));
        assert!(open.contains(&Direction::new(1, 0)));
    }

    #[test]
    fn occupied_neighbours_are_excluded() {
        let mut grid = OccupancyGrid::new(3);
        grid.occupy(Cell::new(1, 1), 0).unwrap();
        grid.occupy(Cell::new(0, 1), 1).unwrap();
        let open = grid.open_directions(Cell::new(1, 1));
        assert_eq!(open.len(), 7);
        assert!(!open.contains(&Direction::new(-1, 0)));
    }

    #[test]
    fn surrounded_cell_has_no_way_out() {
        let mut grid = OccupancyGrid::new(3);
        for idx in 0..9 {
            grid.occupy(Cell::from_index(idx, 3), idx).unwrap();
        }
        assert!(grid.open_directions(Cell::new(1, 1)).is_empty());
    }

    #[test]
    fn double_occupation_is_rejected() {
        let mut grid = OccupancyGrid::new(3);
        grid.occupy(Cell::new(2, 2), 0).unwrap();
        assert!(matches!(grid.occupy(Cell::new(2, 2), 1), Err(SimError::InconsistentState(_))));
    }

    #[test]
    fn relocate_moves_reference() {
        let mut grid = OccupancyGrid::new(3);
        grid.occupy(Cell::new(0, 0), 7).unwrap();
        grid.relocate(7, Cell::new(0, 0), Cell::new(1, 1)).unwrap();
        assert_eq!(grid.occupant(Cell::new(0, 0)), None);
        assert_eq!(grid.occupant(Cell::new(1, 1)), Some(7));
    }

    #[test]
    fn relocate_checks_both_ends_before_writing() {
        let mut grid = OccupancyGrid::new(3);
        grid.occupy(Cell::new(0, 0), 1).unwrap();
        grid.occupy(Cell::new(0, 1), 2).unwrap();
        assert!(grid.relocate(1, Cell::new(0, 0), Cell::new(0, 1)).is_err());
        assert!(grid.relocate(3, Cell::new(0, 0), Cell::new(2, 2)).is_err());
        // Nothing changed.
        assert_eq!(grid.occupant(Cell::new(0, 0)), Some(1));
        assert_eq!(grid.occupant(Cell::new(0, 1)), Some(2));
        assert_eq!(grid.occupied_count(), 2);
    }

    #[test]
    fn vacate_requires_matching_agent() {
        let mut grid = OccupancyGrid::new(2);
        grid.occupy(Cell::new(1, 0), 4).unwrap();
        assert!(grid.vacate(Cell::new(1, 0), 5).is_err());
        grid.vacate(Cell::new(1, 0), 4).unwrap();
        assert!(grid.is_free(Cell::new(1, 0)));
    }
}
