//! World model, wire protocol and transport shared by the snake server and client.
//!
//! The server owns the authoritative [`World`]; clients rebuild a mirror of it
//! from the newline-delimited JSON stream described in [`protocol`].

pub mod command;
pub mod error;
pub mod powerup;
pub mod protocol;
pub mod snake;
pub mod transport;
pub mod vector;
pub mod wall;
pub mod world;

pub use command::{ControlCommand, Moving};
pub use error::{ConnectionError, ProtocolError};
pub use powerup::Powerup;
pub use snake::Snake;
pub use vector::Vector2D;
pub use wall::Wall;
pub use world::World;

/// Distance a live snake's head travels per tick.
pub const SNAKE_SPEED: f64 = 3.0;
/// Length of a freshly spawned snake body.
pub const SNAKE_START_LENGTH: f64 = 120.0;
/// Frames the tail is held still after eating a powerup.
pub const GROWTH_FRAMES: u32 = 12;
/// Frames a dead snake is still rendered before `alive` drops to false.
pub const DEATH_GRACE_FRAMES: u32 = 5;

/// Half width of a snake body used for snake-vs-snake hits.
pub const SNAKE_HALF_WIDTH: f64 = 5.0;
/// Half width of a powerup used when checking spawn clearance.
pub const POWERUP_HALF_WIDTH: f64 = 8.0;
/// Head-to-powerup distance below which the powerup is eaten.
pub const POWERUP_PICKUP_DISTANCE: f64 = 13.0;
/// Half width of a wall segment.
pub const WALL_HALF_WIDTH: f64 = 25.0;

/// Bounds (inclusive, exclusive) of the random powerup respawn delay, in frames.
pub const POWERUP_RESPAWN_FRAMES: (u32, u32) = (1, 200);
pub const DEFAULT_POWERUP_COUNT: u32 = 20;

pub const DEFAULT_UNIVERSE_SIZE: u32 = 2000;
pub const DEFAULT_MS_PER_FRAME: u64 = 34;
pub const DEFAULT_RESPAWN_RATE: u32 = 300;
pub const DEFAULT_PORT: u16 = 11000;
