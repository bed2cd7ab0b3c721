use log::{debug, info};
use shared::protocol::{parse_handshake_int, WorldObject};
use shared::{ProtocolError, Snake, World};

/// Where the client is in the server's line stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    AwaitingId,
    AwaitingSize,
    /// Walls, then powerups and snakes every tick.
    Objects,
}

/// Local mirror of the server's world, rebuilt line by line.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub world: World,
    phase: StreamPhase,
    /// Object lines applied so far.
    pub objects_received: u64,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            world: World::default(),
            phase: StreamPhase::AwaitingId,
            objects_received: 0,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn is_joined(&self) -> bool {
        self.phase == StreamPhase::Objects
    }

    /// Applies one complete line from the server.
    ///
    /// The first two lines must be the player id and the world size; every
    /// later line is a wall, powerup or snake object.
    pub fn handle_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        match self.phase {
            StreamPhase::AwaitingId => {
                let id = parse_handshake_int(line)?;
                self.world.set_player_id(id);
                self.phase = StreamPhase::AwaitingSize;
                info!("Assigned player id {}", id);
            }
            StreamPhase::AwaitingSize => {
                let size = parse_handshake_int(line)?;
                self.world.set_size(size);
                self.phase = StreamPhase::Objects;
                info!("World size {}", size);
            }
            StreamPhase::Objects => {
                let object = WorldObject::parse(line)?;
                if let WorldObject::Snake(snake) = &object {
                    if snake.dc {
                        debug!("Snake {} left", snake.id);
                    }
                }
                self.world.apply(object);
                self.objects_received += 1;
            }
        }
        Ok(())
    }

    pub fn player(&self) -> Option<&Snake> {
        self.world.player()
    }

    /// One-line summary for the periodic status log.
    pub fn status(&self) -> String {
        let own = match self.player() {
            Some(snake) if snake.died => format!("dead, score {}", snake.score),
            Some(snake) => format!(
                "score {} at ({:.0}, {:.0})",
                snake.score,
                snake.head().x,
                snake.head().y
            ),
            None => "not spawned".to_string(),
        };
        format!(
            "{} | {} snakes, {} powerups, {} walls",
            own,
            self.world.snakes.len(),
            self.world.powerups.values().filter(|p| !p.died).count(),
            self.world.walls.len()
        )
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::protocol::encode_line;
    use shared::{Powerup, Vector2D, Wall};

    fn line<T: serde::Serialize>(value: &T) -> String {
        encode_line(value).unwrap().trim_end().to_string()
    }

    #[test]
    fn test_handshake_then_objects() {
        let mut state = ClientGameState::new();
        assert!(!state.is_joined());

        state.handle_line("7").unwrap();
        assert_eq!(state.phase(), StreamPhase::AwaitingSize);
        state.handle_line("2000").unwrap();
        assert!(state.is_joined());
        assert_eq!(state.world.player_id, Some(7));
        assert_eq!(state.world.size, 2000);

        let wall = Wall::new(0, Vector2D::new(0.0, 0.0), Vector2D::new(0.0, 100.0));
        let snake = Snake::new(7, "Bob", Vector2D::ZERO, Vector2D::UP);
        let powerup = Powerup::new(3, Vector2D::new(50.0, 50.0));
        state.handle_line(&line(&wall)).unwrap();
        state.handle_line(&line(&powerup)).unwrap();
        state.handle_line(&line(&snake)).unwrap();

        assert_eq!(state.world.walls.len(), 1);
        assert_eq!(state.world.powerups.len(), 1);
        assert_eq!(state.player().unwrap().name, "Bob");
        let head = state.player().unwrap().head();
        assert_approx_eq!(head.x, 0.0);
        assert_approx_eq!(head.y, -120.0);
        assert_approx_eq!(state.world.powerups[&3].loc.x, 50.0);
        assert_eq!(state.objects_received, 3);
        assert!(state.status().starts_with("score 0"));
    }

    #[test]
    fn test_rejected_by_full_server() {
        let mut state = ClientGameState::new();
        assert!(matches!(
            state.handle_line("server full"),
            Err(ProtocolError::Rejected(_))
        ));
        assert_eq!(state.phase(), StreamPhase::AwaitingId);
    }

    #[test]
    fn test_disconnected_snake_dropped() {
        let mut state = ClientGameState::new();
        state.handle_line("1").unwrap();
        state.handle_line("1000").unwrap();

        let mut other = Snake::new(2, "Eve", Vector2D::ZERO, Vector2D::LEFT);
        state.handle_line(&line(&other)).unwrap();
        assert_eq!(state.world.snakes.len(), 1);

        other.mark_disconnected();
        state.handle_line(&line(&other)).unwrap();
        assert!(state.world.snakes.is_empty());
        assert_eq!(state.status(), "not spawned | 0 snakes, 0 powerups, 0 walls");
    }

    #[test]
    fn test_malformed_object_is_an_error() {
        let mut state = ClientGameState::new();
        state.handle_line("1").unwrap();
        state.handle_line("1000").unwrap();

        assert!(state.handle_line("{\"snake\":1,").is_err());
        assert!(state.is_joined());
    }
}
