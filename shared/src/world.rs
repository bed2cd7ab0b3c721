use crate::powerup::Powerup;
use crate::protocol::WorldObject;
use crate::snake::Snake;
use crate::vector::Vector2D;
use crate::wall::Wall;
use log::warn;
use std::collections::HashMap;

/// Everything in the universe: snakes, powerups and walls keyed by id, plus
/// the per-session frame configuration.
///
/// The server holds the authoritative copy behind one lock; clients hold a
/// mirror rebuilt from the stream. Player id and size are set once.
#[derive(Debug, Clone, Default)]
pub struct World {
    /// Id of the local player (client mirror only).
    pub player_id: Option<u32>,
    /// Side length of the square universe centred on the origin.
    pub size: u32,
    pub snakes: HashMap<u32, Snake>,
    pub powerups: HashMap<u32, Powerup>,
    pub walls: HashMap<u32, Wall>,
    pub ms_per_frame: u64,
    pub respawn_rate: u32,
}

impl World {
    pub fn new(size: u32, ms_per_frame: u64, respawn_rate: u32, walls: Vec<Wall>) -> Self {
        Self {
            player_id: None,
            size,
            snakes: HashMap::new(),
            powerups: HashMap::new(),
            walls: walls.into_iter().map(|w| (w.id, w)).collect(),
            ms_per_frame,
            respawn_rate,
        }
    }

    pub fn set_player_id(&mut self, id: u32) -> bool {
        if self.player_id.is_some() {
            warn!("Ignoring second player id {}", id);
            return false;
        }
        self.player_id = Some(id);
        true
    }

    pub fn set_size(&mut self, size: u32) -> bool {
        if self.size != 0 {
            warn!("Ignoring second world size {}", size);
            return false;
        }
        self.size = size;
        true
    }

    pub fn half_size(&self) -> f64 {
        self.size as f64 / 2.0
    }

    pub fn in_bounds(&self, point: Vector2D) -> bool {
        let half = self.half_size();
        (-half..=half).contains(&point.x) && (-half..=half).contains(&point.y)
    }

    pub fn player(&self) -> Option<&Snake> {
        self.player_id.and_then(|id| self.snakes.get(&id))
    }

    /// Inserts or replaces an object by id. A snake flagged as disconnected is
    /// removed instead.
    pub fn apply(&mut self, object: WorldObject) {
        match object {
            WorldObject::Snake(snake) if snake.dc => {
                self.snakes.remove(&snake.id);
            }
            WorldObject::Snake(snake) => {
                self.snakes.insert(snake.id, snake);
            }
            WorldObject::Wall(wall) => {
                self.walls.insert(wall.id, wall);
            }
            WorldObject::Powerup(powerup) => {
                self.powerups.insert(powerup.id, powerup);
            }
        }
    }

    /// Ids of a collection in ascending order, for deterministic iteration.
    pub fn sorted_ids<T>(map: &HashMap<u32, T>) -> Vec<u32> {
        let mut ids: Vec<u32> = map.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_set_once() {
        let mut world = World::default();

        assert!(world.set_player_id(3));
        assert!(!world.set_player_id(4));
        assert_eq!(world.player_id, Some(3));

        assert!(world.set_size(2000));
        assert!(!world.set_size(10));
        assert_eq!(world.size, 2000);
    }

    #[test]
    fn test_bounds() {
        let world = World::new(2000, 34, 300, Vec::new());

        assert!(world.in_bounds(Vector2D::new(1000.0, -1000.0)));
        assert!(!world.in_bounds(Vector2D::new(1000.5, 0.0)));
        assert!(!world.in_bounds(Vector2D::new(0.0, -1001.0)));
    }

    #[test]
    fn test_apply_replaces_by_id_and_drops_disconnected() {
        let mut world = World::default();
        let snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::UP);

        world.apply(WorldObject::Snake(snake.clone()));
        let mut moved = snake.clone();
        moved.advance();
        world.apply(WorldObject::Snake(moved.clone()));

        assert_eq!(world.snakes.len(), 1);
        assert_eq!(world.snakes[&1].head(), moved.head());

        moved.mark_disconnected();
        world.apply(WorldObject::Snake(moved));
        assert!(world.snakes.is_empty());
    }

    #[test]
    fn test_new_indexes_walls() {
        let walls = vec![
            Wall::new(4, Vector2D::new(0.0, 0.0), Vector2D::new(0.0, 50.0)),
            Wall::new(9, Vector2D::new(0.0, 0.0), Vector2D::new(50.0, 0.0)),
        ];
        let world = World::new(1000, 16, 10, walls);

        assert_eq!(World::sorted_ids(&world.walls), vec![4, 9]);
    }
}
