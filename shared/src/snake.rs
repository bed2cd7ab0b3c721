//! Snake body model and the polyline movement algorithm.
//!
//! A snake is a polyline stored tail-first. Each stored [`TurnPoint`] is a body
//! vertex together with the heading of the segment leaving it; the head is kept
//! separately and is always the last vertex. Turning pushes a new turn point at
//! the head, and the tail walks along its recorded heading until it reaches the
//! next turn point, which is then dropped.

use crate::error::ProtocolError;
use crate::vector::Vector2D;
use crate::{SNAKE_SPEED, SNAKE_START_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A body vertex paired with the heading of the segment that starts at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnPoint {
    pub vertex: Vector2D,
    pub heading: Vector2D,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SnakeWire", try_from = "SnakeWire")]
pub struct Snake {
    pub id: u32,
    pub name: String,
    /// Tail-first; never empty.
    points: VecDeque<TurnPoint>,
    head: Vector2D,
    pub dir: Vector2D,
    pub score: u32,
    pub died: bool,
    pub alive: bool,
    /// The owning client has disconnected.
    pub dc: bool,
    pub speed: f64,
    /// Frames elapsed since death, drives the grace window and respawn.
    pub frames_dead: u32,
    growth_frames: u32,
    pending_score: u32,
}

impl Snake {
    /// Creates a straight snake whose tail sits at `tail` and whose head lies
    /// [`SNAKE_START_LENGTH`] units further along `dir`.
    pub fn new(id: u32, name: impl Into<String>, tail: Vector2D, dir: Vector2D) -> Self {
        let mut points = VecDeque::new();
        points.push_back(TurnPoint {
            vertex: tail,
            heading: dir,
        });

        Self {
            id,
            name: name.into(),
            points,
            head: tail + dir * SNAKE_START_LENGTH,
            dir,
            score: 0,
            died: false,
            alive: true,
            dc: false,
            speed: SNAKE_SPEED,
            frames_dead: 0,
            growth_frames: 0,
            pending_score: 0,
        }
    }

    pub fn head(&self) -> Vector2D {
        self.head
    }

    pub fn tail(&self) -> Vector2D {
        self.points.front().map_or(self.head, |p| p.vertex)
    }

    /// All body vertices, tail first and head last.
    pub fn body(&self) -> Vec<Vector2D> {
        let mut body: Vec<Vector2D> = self.points.iter().map(|p| p.vertex).collect();
        body.push(self.head);
        body
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len() + 1
    }

    /// Direction changes the tail has not caught up to yet.
    pub fn turn_point_count(&self) -> usize {
        self.points.len() - 1
    }

    pub fn is_growing(&self) -> bool {
        self.growth_frames > 0
    }

    /// Starts a turn towards `direction`.
    ///
    /// Zero, unchanged and reversed headings are rejected, as is any turn by a
    /// dead snake. Returns whether the turn was recorded.
    ///
    /// Until the head has moved off its newest corner, that corner is still
    /// pending: reversing the heading before it is rejected too, and turning
    /// back to that heading drops the corner.
    pub fn turn(&mut self, direction: Vector2D) -> bool {
        if self.died || direction.is_zero() || direction == self.dir || direction == -self.dir {
            return false;
        }

        if let Some(previous) = self.pending_corner_heading() {
            if direction == -previous {
                return false;
            }
            if direction == previous {
                self.points.pop_back();
                self.dir = previous;
                return true;
            }
        }

        self.points.push_back(TurnPoint {
            vertex: self.head,
            heading: direction,
        });
        self.dir = direction;
        true
    }

    /// Heading before the newest corner, if the head still sits on it.
    fn pending_corner_heading(&self) -> Option<Vector2D> {
        let count = self.points.len();
        if count < 2 || self.points[count - 1].vertex != self.head {
            return None;
        }
        Some(self.points[count - 2].heading)
    }

    /// Moves the snake one tick: the head advances by `dir * speed`, the tail
    /// follows the recorded turns unless the snake is growing.
    pub fn advance(&mut self) {
        if self.died || self.speed == 0.0 {
            return;
        }

        self.head += self.dir * self.speed;

        if self.growth_frames > 0 {
            self.growth_frames -= 1;
            if self.growth_frames == 0 {
                self.score += self.pending_score;
                self.pending_score = 0;
            }
        } else {
            self.move_tail(self.speed);
        }
    }

    fn move_tail(&mut self, mut step: f64) {
        while step > 0.0 {
            let target = self.points.get(1).map_or(self.head, |p| p.vertex);
            let count = self.points.len();
            let Some(tail) = self.points.front_mut() else {
                return;
            };

            let remaining = tail.vertex.distance(target);
            if remaining > step {
                tail.vertex += tail.heading * step;
                return;
            }
            if count == 1 {
                tail.vertex = target;
                return;
            }

            // The corner is consumed; carry the leftover along the next heading.
            step -= remaining;
            self.points.pop_front();
        }
    }

    /// Holds the tail still for `frames` ticks and credits one point once the
    /// growth has finished.
    pub fn grow(&mut self, frames: u32) {
        self.growth_frames += frames;
        self.pending_score += 1;
    }

    /// Translates every vertex by `offset`, keeping the shape intact.
    pub fn translate(&mut self, offset: Vector2D) {
        for point in self.points.iter_mut() {
            point.vertex += offset;
        }
        self.head += offset;
    }

    /// Moves the whole body to the opposite edge once the head leaves the
    /// square universe of side `world_size` centred on the origin.
    pub fn wrap_around(&mut self, world_size: f64) -> bool {
        let half = world_size / 2.0;
        let mut offset = Vector2D::ZERO;

        if self.head.x > half {
            offset.x = -world_size;
        } else if self.head.x < -half {
            offset.x = world_size;
        }
        if self.head.y > half {
            offset.y = -world_size;
        } else if self.head.y < -half {
            offset.y = world_size;
        }

        if offset.is_zero() {
            return false;
        }
        self.translate(offset);
        true
    }

    pub fn kill(&mut self) {
        self.died = true;
        self.speed = 0.0;
    }

    pub fn mark_disconnected(&mut self) {
        self.dc = true;
        self.died = true;
        self.alive = false;
        self.speed = 0.0;
    }

    /// Replaces the body with a fresh one, keeping id and name.
    pub fn respawn(&mut self, tail: Vector2D, dir: Vector2D) {
        let fresh = Snake::new(self.id, std::mem::take(&mut self.name), tail, dir);
        *self = fresh;
    }
}

#[derive(Serialize, Deserialize)]
struct SnakeWire {
    snake: u32,
    name: String,
    body: Vec<Vector2D>,
    dir: Vector2D,
    score: u32,
    died: bool,
    alive: bool,
    dc: bool,
}

impl From<Snake> for SnakeWire {
    fn from(snake: Snake) -> Self {
        let body = snake.body();
        SnakeWire {
            snake: snake.id,
            name: snake.name,
            body,
            dir: snake.dir,
            score: snake.score,
            died: snake.died,
            alive: snake.alive,
            dc: snake.dc,
        }
    }
}

impl TryFrom<SnakeWire> for Snake {
    type Error = ProtocolError;

    fn try_from(wire: SnakeWire) -> Result<Self, Self::Error> {
        let Some((&head, rest)) = wire.body.split_last() else {
            return Err(ProtocolError::ShortBody(0));
        };
        if rest.is_empty() {
            return Err(ProtocolError::ShortBody(1));
        }

        let points = rest
            .iter()
            .enumerate()
            .map(|(i, &vertex)| {
                let next = wire.body[i + 1];
                TurnPoint {
                    vertex,
                    heading: vertex.axis_direction_to(next).unwrap_or(wire.dir),
                }
            })
            .collect();

        Ok(Snake {
            id: wire.snake,
            name: wire.name,
            points,
            head,
            dir: wire.dir,
            score: wire.score,
            died: wire.died,
            alive: wire.alive,
            dc: wire.dc,
            speed: if wire.died { 0.0 } else { SNAKE_SPEED },
            frames_dead: 0,
            growth_frames: 0,
            pending_score: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GROWTH_FRAMES;
    use assert_approx_eq::assert_approx_eq;

    fn body_length(snake: &Snake) -> f64 {
        snake
            .body()
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    #[test]
    fn test_snake_creation() {
        let snake = Snake::new(4, "Bob", Vector2D::new(10.0, 10.0), Vector2D::RIGHT);

        assert_eq!(snake.id, 4);
        assert_eq!(snake.name, "Bob");
        assert_eq!(snake.tail(), Vector2D::new(10.0, 10.0));
        assert_eq!(snake.head(), Vector2D::new(130.0, 10.0));
        assert_eq!(snake.vertex_count(), 2);
        assert_eq!(snake.turn_point_count(), 0);
        assert!(snake.alive);
        assert!(!snake.died);
    }

    #[test]
    fn test_advance_keeps_length() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::DOWN);

        for _ in 0..10 {
            snake.advance();
        }

        assert_eq!(snake.head(), Vector2D::new(0.0, 150.0));
        assert_eq!(snake.tail(), Vector2D::new(0.0, 30.0));
        assert_approx_eq!(body_length(&snake), SNAKE_START_LENGTH);
    }

    #[test]
    fn test_reversal_and_repeat_rejected() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT);

        assert!(!snake.turn(Vector2D::LEFT));
        assert!(!snake.turn(Vector2D::RIGHT));
        assert!(!snake.turn(Vector2D::ZERO));
        assert_eq!(snake.dir, Vector2D::RIGHT);
        assert_eq!(snake.turn_point_count(), 0);

        assert!(snake.turn(Vector2D::UP));
        assert_eq!(snake.dir, Vector2D::UP);
        assert!(!snake.turn(Vector2D::DOWN));
        assert_eq!(snake.turn_point_count(), 1);
    }

    #[test]
    fn test_two_turns_in_one_tick_cannot_reverse() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT);

        assert!(snake.turn(Vector2D::UP));
        assert!(!snake.turn(Vector2D::LEFT));
        assert_eq!(snake.dir, Vector2D::UP);
        assert_eq!(snake.turn_point_count(), 1);

        snake.advance();
        // Heading up off the corner rather than back along the body.
        assert_eq!(snake.head(), Vector2D::new(120.0, -3.0));
        assert_eq!(snake.tail(), Vector2D::new(3.0, 0.0));

        // Once the head has left the corner, LEFT is an ordinary turn.
        assert!(snake.turn(Vector2D::LEFT));
        assert_eq!(snake.turn_point_count(), 2);
    }

    #[test]
    fn test_turning_back_drops_pending_corner() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT);

        assert!(snake.turn(Vector2D::DOWN));
        assert!(snake.turn(Vector2D::RIGHT));
        assert_eq!(snake.dir, Vector2D::RIGHT);
        assert_eq!(snake.turn_point_count(), 0);
        assert_eq!(snake.vertex_count(), 2);

        snake.advance();
        assert_eq!(snake.head(), Vector2D::new(123.0, 0.0));
        assert_approx_eq!(body_length(&snake), SNAKE_START_LENGTH);
    }

    #[test]
    fn test_tail_consumes_turn_after_distance_over_speed() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT);
        assert!(snake.turn(Vector2D::UP));

        // The corner sits 120 units ahead of the tail; at speed 3 that is 40 ticks.
        for tick in 1..=39 {
            snake.advance();
            assert_eq!(snake.turn_point_count(), 1, "consumed early at tick {}", tick);
            assert_eq!(snake.vertex_count(), snake.turn_point_count() + 2);
        }

        snake.advance();
        assert_eq!(snake.turn_point_count(), 0);
        assert_eq!(snake.vertex_count(), 2);
        assert_eq!(snake.tail(), Vector2D::new(120.0, 0.0));
        assert_eq!(snake.head(), Vector2D::new(120.0, -120.0));
        assert_approx_eq!(body_length(&snake), SNAKE_START_LENGTH);
    }

    #[test]
    fn test_vertex_invariant_over_turn_sequence() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT);
        let turns = [Vector2D::UP, Vector2D::LEFT, Vector2D::UP, Vector2D::RIGHT];

        for turn in turns {
            for _ in 0..7 {
                snake.advance();
                assert_eq!(snake.vertex_count(), snake.turn_point_count() + 2);
            }
            snake.turn(turn);
            assert_eq!(snake.vertex_count(), snake.turn_point_count() + 2);
        }

        for _ in 0..100 {
            snake.advance();
            assert_eq!(snake.vertex_count(), snake.turn_point_count() + 2);
        }
        assert_eq!(snake.turn_point_count(), 0);
        assert_approx_eq!(body_length(&snake), SNAKE_START_LENGTH);
    }

    #[test]
    fn test_growth_holds_tail_and_scores_once() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT);
        snake.grow(GROWTH_FRAMES);

        for _ in 0..GROWTH_FRAMES - 1 {
            snake.advance();
            assert_eq!(snake.tail(), Vector2D::ZERO);
            assert_eq!(snake.score, 0);
        }

        snake.advance();
        assert_eq!(snake.score, 1);
        assert!(!snake.is_growing());
        assert_approx_eq!(
            body_length(&snake),
            SNAKE_START_LENGTH + SNAKE_SPEED * GROWTH_FRAMES as f64
        );
    }

    #[test]
    fn test_dead_snake_does_not_move_or_turn() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT);
        snake.kill();

        snake.advance();
        assert_eq!(snake.head(), Vector2D::new(120.0, 0.0));
        assert!(!snake.turn(Vector2D::UP));
    }

    #[test]
    fn test_wrap_around_is_lossless() {
        let mut snake = Snake::new(1, "a", Vector2D::new(880.0, 5.0), Vector2D::RIGHT);
        let before = snake.body();

        snake.advance();
        assert!(snake.wrap_around(2000.0));

        let after = snake.body();
        for (old, new) in before.iter().zip(after.iter()) {
            assert_approx_eq!(new.x, old.x + 3.0 - 2000.0);
            assert_approx_eq!(new.y, old.y);
        }

        snake.translate(Vector2D::new(2000.0, 0.0));
        snake.translate(Vector2D::new(-2000.0, 0.0));
        for (a, b) in after.iter().zip(snake.body().iter()) {
            assert_approx_eq!(a.x, b.x);
            assert_approx_eq!(a.y, b.y);
        }
    }

    #[test]
    fn test_no_wrap_inside_universe() {
        let mut snake = Snake::new(1, "a", Vector2D::ZERO, Vector2D::UP);
        assert!(!snake.wrap_around(2000.0));
    }

    #[test]
    fn test_respawn_keeps_identity() {
        let mut snake = Snake::new(9, "Bob", Vector2D::ZERO, Vector2D::RIGHT);
        snake.score = 4;
        snake.kill();
        snake.alive = false;

        snake.respawn(Vector2D::new(50.0, 50.0), Vector2D::DOWN);

        assert_eq!(snake.id, 9);
        assert_eq!(snake.name, "Bob");
        assert_eq!(snake.score, 0);
        assert!(snake.alive);
        assert!(!snake.died);
        assert_eq!(snake.speed, SNAKE_SPEED);
        assert_eq!(snake.head(), Vector2D::new(50.0, 170.0));
    }

    #[test]
    fn test_wire_roundtrip_observable_fields() {
        let mut snake = Snake::new(3, "Ada", Vector2D::ZERO, Vector2D::RIGHT);
        snake.advance();
        snake.turn(Vector2D::DOWN);
        snake.advance();
        snake.score = 2;

        let json = serde_json::to_string(&snake).unwrap();
        let parsed: Snake = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, snake.id);
        assert_eq!(parsed.name, snake.name);
        assert_eq!(parsed.body(), snake.body());
        assert_eq!(parsed.dir, snake.dir);
        assert_eq!(parsed.score, snake.score);
        assert_eq!(parsed.died, snake.died);
        assert_eq!(parsed.alive, snake.alive);
        assert_eq!(parsed.dc, snake.dc);
        assert_eq!(parsed.turn_point_count(), snake.turn_point_count());
    }

    #[test]
    fn test_wire_field_names() {
        let snake = Snake::new(3, "Ada", Vector2D::ZERO, Vector2D::RIGHT);
        let value: serde_json::Value = serde_json::to_value(&snake).unwrap();

        for key in ["snake", "name", "body", "dir", "score", "died", "alive", "dc"] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(value["body"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_wire_rejects_short_body() {
        let json = r#"{"snake":1,"name":"x","body":[{"X":0.0,"Y":0.0}],"dir":{"X":1.0,"Y":0.0},"score":0,"died":false,"alive":true,"dc":false}"#;
        assert!(serde_json::from_str::<Snake>(json).is_err());
    }
}
