use crate::vector::Vector2D;
use serde::{Deserialize, Serialize};

/// A collectible that grows the snake that eats it.
///
/// After being eaten it waits `respawn_delay` frames and is then recreated
/// under the same id somewhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Powerup {
    #[serde(rename = "power")]
    pub id: u32,
    pub loc: Vector2D,
    pub died: bool,
    #[serde(skip)]
    pub frames_dead: u32,
    #[serde(skip)]
    pub respawn_delay: u32,
}

impl Powerup {
    pub fn new(id: u32, loc: Vector2D) -> Self {
        Self {
            id,
            loc,
            died: false,
            frames_dead: 0,
            respawn_delay: 0,
        }
    }

    /// Marks the powerup eaten and schedules its recreation.
    pub fn consume(&mut self, respawn_delay: u32) {
        self.died = true;
        self.frames_dead = 0;
        self.respawn_delay = respawn_delay;
    }

    /// Counts one dead frame. Returns true once the respawn delay has elapsed.
    pub fn pass_frame(&mut self) -> bool {
        if !self.died {
            return false;
        }
        self.frames_dead += 1;
        self.frames_dead >= self.respawn_delay
    }

    pub fn respawn_at(&mut self, loc: Vector2D) {
        self.loc = loc;
        self.died = false;
        self.frames_dead = 0;
        self.respawn_delay = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powerup_wire_format() {
        let powerup = Powerup::new(7, Vector2D::new(10.0, -20.0));
        let json = serde_json::to_string(&powerup).unwrap();
        assert_eq!(json, r#"{"power":7,"loc":{"X":10.0,"Y":-20.0},"died":false}"#);

        let parsed: Powerup = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, powerup);
    }

    #[test]
    fn test_respawn_delay() {
        let mut powerup = Powerup::new(1, Vector2D::ZERO);
        assert!(!powerup.pass_frame());

        powerup.consume(3);
        assert!(powerup.died);
        assert!(!powerup.pass_frame());
        assert!(!powerup.pass_frame());
        assert!(powerup.pass_frame());

        powerup.respawn_at(Vector2D::new(5.0, 5.0));
        assert!(!powerup.died);
        assert_eq!(powerup.id, 1);
        assert_eq!(powerup.loc, Vector2D::new(5.0, 5.0));
    }
}
