use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ultron_core::error::GameError;
use ultron_core::grid::{Cell, Grid};
use ultron_core::player::ObstacleId;
use ultron_core::session::{ObstacleKind, ObstacleView};
use ultron_core::time::Timestamp;

/// A placed shield. Destroyed obstacles stay in the registry for history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub kind: ObstacleKind,
    pub position: Cell,
    pub durability: u32,
    pub active: bool,
    pub placed_at: Timestamp,
}

impl Obstacle {
    pub fn view(&self) -> ObstacleView {
        ObstacleView {
            id: self.id,
            kind: self.kind,
            position: self.position,
            durability: self.durability,
        }
    }
}

/// Result of the adversary entering an obstacle's cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub obstacle_id: ObstacleId,
    pub kind: ObstacleKind,
    pub position: Cell,
    pub remaining_durability: u32,
    /// The hit used up the last point of durability.
    pub destroyed: bool,
}

/// Every obstacle a session has placed, in placement order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleRegistry {
    obstacles: Vec<Obstacle>,
    next_id: ObstacleId,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a new obstacle. Fails without mutating when the cell is out of
    /// bounds, reserved, holds an active obstacle, or holds the adversary.
    pub fn place(
        &mut self,
        grid: &Grid,
        position: Cell,
        kind: ObstacleKind,
        durability: u32,
        adversary: Cell,
        now: Timestamp,
    ) -> Result<&Obstacle, GameError> {
        if !grid.contains(position) {
            return Err(GameError::InvalidPosition {
                position,
                reason: "outside the grid",
            });
        }
        if grid.is_reserved(position) {
            return Err(GameError::InvalidPosition {
                position,
                reason: "start and goal cells cannot hold obstacles",
            });
        }
        if self.active_at(position).is_some() {
            return Err(GameError::PositionOccupied {
                position,
                occupant: "an active obstacle",
            });
        }
        if position == adversary {
            return Err(GameError::PositionOccupied {
                position,
                occupant: "the adversary",
            });
        }

        self.next_id += 1;
        self.obstacles.push(Obstacle {
            id: self.next_id,
            kind,
            position,
            durability,
            active: durability > 0,
            placed_at: now,
        });
        let placed = &self.obstacles[self.obstacles.len() - 1];
        Ok(placed)
    }

    pub fn active(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter().filter(|o| o.active)
    }

    pub fn active_at(&self, position: Cell) -> Option<&Obstacle> {
        self.active().find(|o| o.position == position)
    }

    pub fn blocking_cells(&self) -> HashSet<Cell> {
        self.active()
            .filter(|o| o.kind.is_blocking())
            .map(|o| o.position)
            .collect()
    }

    pub fn is_blocking(&self, position: Cell) -> bool {
        self.active_at(position)
            .is_some_and(|o| o.kind.is_blocking())
    }

    /// Consume one point of durability from the active obstacle at `position`.
    pub fn resolve_hit(&mut self, position: Cell) -> Option<Hit> {
        let obstacle = self
            .obstacles
            .iter_mut()
            .find(|o| o.active && o.position == position)?;
        obstacle.durability = obstacle.durability.saturating_sub(1);
        if obstacle.durability == 0 {
            obstacle.active = false;
        }
        Some(Hit {
            obstacle_id: obstacle.id,
            kind: obstacle.kind,
            position,
            remaining_durability: obstacle.durability,
            destroyed: !obstacle.active,
        })
    }

    /// All obstacles ever placed, including destroyed ones.
    pub fn history(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn views(&self) -> Vec<ObstacleView> {
        self.active().map(Obstacle::view).collect()
    }
}

#[cfg(test)]
mod tests {
    use ultron_core::test_helpers::T0;

    use super::*;

    fn place(
        registry: &mut ObstacleRegistry,
        x: i32,
        y: i32,
        kind: ObstacleKind,
    ) -> Result<ObstacleId, GameError> {
        let grid = Grid::standard();
        registry
            .place(&grid, Cell::new(x, y), kind, 1, grid.start(), T0)
            .map(|o| o.id)
    }

    #[test]
    fn ids_are_sequential() {
        let mut registry = ObstacleRegistry::new();
        assert_eq!(place(&mut registry, 3, 3, ObstacleKind::Blocking), Ok(1));
        assert_eq!(place(&mut registry, 4, 3, ObstacleKind::Stun), Ok(2));
        assert_eq!(registry.active().count(), 2);
    }

    #[test]
    fn double_placement_is_rejected() {
        let mut registry = ObstacleRegistry::new();
        place(&mut registry, 5, 5, ObstacleKind::TimerDrain).unwrap();
        let err = place(&mut registry, 5, 5, ObstacleKind::Blocking).unwrap_err();
        assert!(matches!(err, GameError::PositionOccupied { .. }));
        assert_eq!(registry.history().len(), 1);
    }

    #[test]
    fn reserved_and_out_of_bounds_cells_are_invalid() {
        let mut registry = ObstacleRegistry::new();
        for (x, y) in [(0, 7), (14, 7), (15, 0), (-1, 4), (3, 15)] {
            let err = place(&mut registry, x, y, ObstacleKind::Blocking).unwrap_err();
            assert!(
                matches!(err, GameError::InvalidPosition { .. }),
                "({x}, {y}) gave {err:?}"
            );
        }
        assert!(registry.history().is_empty());
    }

    #[test]
    fn adversary_cell_is_occupied() {
        let grid = Grid::standard();
        let mut registry = ObstacleRegistry::new();
        let err = registry
            .place(&grid, Cell::new(6, 7), ObstacleKind::Stun, 1, Cell::new(6, 7), T0)
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::PositionOccupied {
                occupant: "the adversary",
                ..
            }
        ));
    }

    #[test]
    fn single_hit_destroys_and_frees_cell() {
        let mut registry = ObstacleRegistry::new();
        place(&mut registry, 6, 7, ObstacleKind::TimerDrain).unwrap();
        let hit = registry.resolve_hit(Cell::new(6, 7)).unwrap();
        assert!(hit.destroyed);
        assert_eq!(hit.remaining_durability, 0);
        assert!(registry.active_at(Cell::new(6, 7)).is_none());
        assert!(registry.resolve_hit(Cell::new(6, 7)).is_none());
        // Destroyed obstacles are kept; the cell can be reused.
        assert_eq!(registry.history().len(), 1);
        assert!(!registry.history()[0].active);
        assert_eq!(place(&mut registry, 6, 7, ObstacleKind::Stun), Ok(2));
    }

    #[test]
    fn durable_obstacle_survives_until_exhausted() {
        let grid = Grid::standard();
        let mut registry = ObstacleRegistry::new();
        registry
            .place(&grid, Cell::new(2, 2), ObstacleKind::Stun, 2, grid.start(), T0)
            .unwrap();
        let first = registry.resolve_hit(Cell::new(2, 2)).unwrap();
        assert!(!first.destroyed);
        assert_eq!(first.remaining_durability, 1);
        let second = registry.resolve_hit(Cell::new(2, 2)).unwrap();
        assert!(second.destroyed);
    }

    #[test]
    fn blocking_cells_ignore_passable_kinds() {
        let mut registry = ObstacleRegistry::new();
        place(&mut registry, 1, 1, ObstacleKind::Blocking).unwrap();
        place(&mut registry, 2, 1, ObstacleKind::Stun).unwrap();
        place(&mut registry, 3, 1, ObstacleKind::TimerDrain).unwrap();
        assert_eq!(registry.blocking_cells(), HashSet::from([Cell::new(1, 1)]));
        assert!(registry.is_blocking(Cell::new(1, 1)));
        assert!(!registry.is_blocking(Cell::new(2, 1)));
    }
}
