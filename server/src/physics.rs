//! Collision geometry for heads, walls and snake bodies.
//!
//! Everything here is axis-aligned: walls and body segments are treated as
//! boxes around their segment, widened by a half width, and a head collides
//! when its point lies inside one. All checks are pure functions of their
//! inputs so iteration order never changes the outcome.

use shared::{Snake, Vector2D, Wall, World, SNAKE_HALF_WIDTH, WALL_HALF_WIDTH};

/// Returns true if `point` lies inside the box spanned by `a` and `b`, grown by
/// `margin` on every side.
pub fn point_near_segment(point: Vector2D, a: Vector2D, b: Vector2D, margin: f64) -> bool {
    let (min_x, max_x) = (a.x.min(b.x) - margin, a.x.max(b.x) + margin);
    let (min_y, max_y) = (a.y.min(b.y) - margin, a.y.max(b.y) + margin);
    (min_x..=max_x).contains(&point.x) && (min_y..=max_y).contains(&point.y)
}

pub fn hits_wall(point: Vector2D, wall: &Wall, margin: f64) -> bool {
    point_near_segment(point, wall.p1, wall.p2, WALL_HALF_WIDTH + margin)
}

pub fn hits_any_wall<'a>(
    point: Vector2D,
    walls: impl IntoIterator<Item = &'a Wall>,
    margin: f64,
) -> bool {
    walls
        .into_iter()
        .any(|wall| hits_wall(point, wall, margin))
}

/// Checks `point` against the first `segments` segments of `body`.
pub fn hits_body(point: Vector2D, body: &[Vector2D], segments: usize, margin: f64) -> bool {
    body.windows(2)
        .take(segments)
        .any(|pair| point_near_segment(point, pair[0], pair[1], margin))
}

/// Head of `snake` against the body of `other`, leaving out the segment at
/// `other`'s head.
pub fn hits_other_snake(snake: &Snake, other: &Snake) -> bool {
    let body = other.body();
    let segments = if body.len() > 2 { body.len() - 2 } else { 1 };
    hits_body(snake.head(), &body, segments, SNAKE_HALF_WIDTH)
}

/// Head of `snake` against its own body, leaving out the segments next to the
/// head that it cannot reach.
pub fn hits_self(snake: &Snake) -> bool {
    let body = snake.body();
    if body.len() <= 4 {
        return false;
    }
    hits_body(snake.head(), &body, body.len() - 4, SNAKE_HALF_WIDTH)
}

/// True if an object of half width `margin` at `point` lies inside the universe
/// and clear of every wall.
pub fn is_clear(world: &World, point: Vector2D, margin: f64) -> bool {
    world.in_bounds(point) && !hits_any_wall(point, world.walls.values(), margin)
}
