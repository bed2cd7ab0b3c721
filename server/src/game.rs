use crate::physics::{hits_any_wall, hits_other_snake, hits_self, is_clear};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::protocol::encode_line;
use shared::{
    Moving, Powerup, Snake, Vector2D, World, DEATH_GRACE_FRAMES, GROWTH_FRAMES,
    POWERUP_HALF_WIDTH, POWERUP_PICKUP_DISTANCE, POWERUP_RESPAWN_FRAMES, SNAKE_HALF_WIDTH,
    SNAKE_START_LENGTH,
};

/// Placement attempts before a spawn gives up on finding a clear spot.
const MAX_SPAWN_ATTEMPTS: usize = 1000;
/// Spacing of the points checked along a spawning body.
const SPAWN_SAMPLE_STEP: f64 = 5.0;

const HEADINGS: [Vector2D; 4] = [Vector2D::UP, Vector2D::DOWN, Vector2D::LEFT, Vector2D::RIGHT];

/// The authoritative simulation: the world plus the tick counter and the random
/// source used for spawning.
#[derive(Debug, Clone)]
pub struct GameState {
    pub world: World,
    pub tick: u64,
    rng: StdRng,
}

impl GameState {
    pub fn new(world: World) -> Self {
        Self {
            world,
            tick: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Same as [`GameState::new`] with a reproducible random source.
    pub fn with_seed(world: World, seed: u64) -> Self {
        Self {
            world,
            tick: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates `count` powerups with ids `0..count` at clear locations.
    pub fn spawn_powerups(&mut self, count: u32) {
        for id in 0..count {
            let loc = self.random_clear_point(POWERUP_HALF_WIDTH);
            self.world.powerups.insert(id, Powerup::new(id, loc));
        }
        debug!("Spawned {} powerups", count);
    }

    /// Spawns a snake for a newly joined player and returns a copy of it.
    pub fn add_snake(&mut self, id: u32, name: &str) -> Snake {
        let (tail, dir) = self.random_snake_placement();
        let snake = Snake::new(id, name, tail, dir);

        info!("Added snake {} ({:?}) at {:?}", id, name, snake.head());
        self.world.snakes.insert(id, snake.clone());
        snake
    }

    /// Applies a direction command from the owner of snake `id`.
    ///
    /// Returns false if the snake does not exist or the turn was rejected.
    pub fn apply_command(&mut self, id: u32, moving: Moving) -> bool {
        match self.world.snakes.get_mut(&id) {
            Some(snake) => snake.turn(moving.direction()),
            None => {
                debug!("Command for unknown snake {}", id);
                false
            }
        }
    }

    /// Flags a snake whose client went away. It is broadcast once more so
    /// clients can drop it, then purged.
    pub fn mark_disconnected(&mut self, id: u32) {
        if let Some(snake) = self.world.snakes.get_mut(&id) {
            snake.mark_disconnected();
            info!("Snake {} disconnected", id);
        }
    }

    /// One simulation tick. Returns the text broadcast to every client for this
    /// tick, which describes the world as it was before the tick advanced.
    pub fn update(&mut self) -> String {
        let snapshot = self.snapshot();
        self.step();
        snapshot
    }

    /// Serializes every powerup and every relevant snake, one JSON object per
    /// line, ordered by id. Disconnected snakes are purged once serialized.
    pub fn snapshot(&mut self) -> String {
        let mut out = String::new();

        for id in World::sorted_ids(&self.world.powerups) {
            if let Some(powerup) = self.world.powerups.get(&id) {
                push_line(&mut out, powerup);
            }
        }

        let mut acknowledged = Vec::new();
        for id in World::sorted_ids(&self.world.snakes) {
            let Some(snake) = self.world.snakes.get(&id) else {
                continue;
            };
            if snake.dc {
                acknowledged.push(id);
            } else if !snake.alive {
                continue;
            }
            push_line(&mut out, snake);
        }

        for id in acknowledged {
            self.world.snakes.remove(&id);
            debug!("Purged disconnected snake {}", id);
        }
        out
    }

    /// Counts down respawns, then advances every live snake and resolves
    /// collisions. A snake killed in this step starts counting on the next one.
    pub fn step(&mut self) {
        self.advance_snake_respawns();
        self.advance_powerup_respawns();

        let size = self.world.size as f64;
        for snake in self.world.snakes.values_mut() {
            if snake.died || snake.dc {
                continue;
            }
            snake.advance();
            snake.wrap_around(size);
        }

        self.detect_collisions();
        self.tick += 1;
    }

    /// Collects every pickup and death against the state at the start of the
    /// pass, then applies them, so the result does not depend on map order.
    fn detect_collisions(&mut self) {
        let snake_ids = World::sorted_ids(&self.world.snakes);
        let powerup_ids = World::sorted_ids(&self.world.powerups);
        let mut meals = Vec::new();
        let mut deaths = Vec::new();

        for id in &snake_ids {
            let Some(snake) = self.world.snakes.get(id) else {
                continue;
            };
            if snake.died || snake.dc {
                continue;
            }
            let head = snake.head();

            let eaten = powerup_ids.iter().copied().find(|pid| {
                self.world
                    .powerups
                    .get(pid)
                    .is_some_and(|p| !p.died && p.loc.distance(head) < POWERUP_PICKUP_DISTANCE)
            });
            if let Some(pid) = eaten {
                meals.push((*id, pid));
            }

            let into_other = snake_ids.iter().any(|other_id| {
                other_id != id
                    && self
                        .world
                        .snakes
                        .get(other_id)
                        .is_some_and(|other| other.alive && !other.dc && hits_other_snake(snake, other))
            });

            if hits_any_wall(head, self.world.walls.values(), 0.0) || into_other || hits_self(snake) {
                deaths.push(*id);
            }
        }

        for (id, pid) in meals {
            let Some(powerup) = self.world.powerups.get_mut(&pid) else {
                continue;
            };
            // Two heads on one powerup: the lower id gets it.
            if powerup.died {
                continue;
            }
            let (low, high) = POWERUP_RESPAWN_FRAMES;
            powerup.consume(self.rng.gen_range(low..high));
            if let Some(snake) = self.world.snakes.get_mut(&id) {
                snake.grow(GROWTH_FRAMES);
                debug!("Snake {} ate powerup {}", id, pid);
            }
        }

        for id in deaths {
            if let Some(snake) = self.world.snakes.get_mut(&id) {
                snake.kill();
                info!("Snake {} ({}) died with score {}", id, snake.name, snake.score);
            }
        }
    }

    fn advance_snake_respawns(&mut self) {
        let respawn_rate = self.world.respawn_rate;
        let mut due = Vec::new();

        for snake in self.world.snakes.values_mut() {
            if !snake.died || snake.dc {
                continue;
            }
            snake.frames_dead += 1;
            if snake.frames_dead > respawn_rate {
                due.push(snake.id);
            } else if snake.frames_dead > DEATH_GRACE_FRAMES {
                snake.alive = false;
            }
        }

        due.sort_unstable();
        for id in due {
            let (tail, dir) = self.random_snake_placement();
            if let Some(snake) = self.world.snakes.get_mut(&id) {
                snake.respawn(tail, dir);
                debug!("Snake {} respawned at {:?}", id, snake.head());
            }
        }
    }

    fn advance_powerup_respawns(&mut self) {
        let mut due = Vec::new();
        for powerup in self.world.powerups.values_mut() {
            if powerup.pass_frame() {
                due.push(powerup.id);
            }
        }

        due.sort_unstable();
        for id in due {
            let loc = self.random_clear_point(POWERUP_HALF_WIDTH);
            if let Some(powerup) = self.world.powerups.get_mut(&id) {
                powerup.respawn_at(loc);
            }
        }
    }

    fn random_point(&mut self) -> Vector2D {
        let half = self.world.half_size();
        Vector2D::new(
            self.rng.gen_range(-half..=half),
            self.rng.gen_range(-half..=half),
        )
    }

    fn random_clear_point(&mut self, margin: f64) -> Vector2D {
        let mut candidate = self.random_point();
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            if is_clear(&self.world, candidate, margin) {
                return candidate;
            }
            candidate = self.random_point();
        }
        warn!("No clear spot found, placing at {:?}", candidate);
        candidate
    }

    /// Picks a tail position and heading such that the whole starting body is
    /// inside the universe and clear of walls.
    fn random_snake_placement(&mut self) -> (Vector2D, Vector2D) {
        let mut tail = Vector2D::ZERO;
        let mut dir = Vector2D::RIGHT;

        for _ in 0..MAX_SPAWN_ATTEMPTS {
            tail = self.random_point();
            dir = HEADINGS[self.rng.gen_range(0..HEADINGS.len())];
            if self.body_is_clear(tail, dir) {
                return (tail, dir);
            }
        }
        warn!("No clear snake spawn found, placing at {:?}", tail);
        (tail, dir)
    }

    fn body_is_clear(&self, tail: Vector2D, dir: Vector2D) -> bool {
        let samples = (SNAKE_START_LENGTH / SPAWN_SAMPLE_STEP) as usize;
        (0..=samples).all(|i| {
            let point = tail + dir * (i as f64 * SPAWN_SAMPLE_STEP);
            is_clear(&self.world, point, SNAKE_HALF_WIDTH)
        })
    }
}

fn push_line<T: serde::Serialize>(out: &mut String, value: &T) {
    match encode_line(value) {
        Ok(line) => out.push_str(&line),
        Err(e) => warn!("Failed to serialize world object: {}", e),
    }
}
