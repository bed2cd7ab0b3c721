use crate::vector::Vector2D;
use serde::{Deserialize, Serialize};

/// Direction requested by a client, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Moving {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Moving {
    /// Unit heading for the command; `None` maps to the zero vector.
    pub fn direction(self) -> Vector2D {
        match self {
            Moving::Up => Vector2D::UP,
            Moving::Down => Vector2D::DOWN,
            Moving::Left => Vector2D::LEFT,
            Moving::Right => Vector2D::RIGHT,
            Moving::None => Vector2D::ZERO,
        }
    }
}

/// `{"moving": "up"|"down"|"left"|"right"|"none"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub moving: Moving,
}

impl ControlCommand {
    pub fn new(moving: Moving) -> Self {
        Self { moving }
    }

    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Serialized command with its trailing line terminator.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
