//! Game settings.
//!
//! Loaded from an optional JSON file; every field falls back to its default.

use serde::{Deserialize, Serialize};
use shared::{
    Wall, World, DEFAULT_MS_PER_FRAME, DEFAULT_POWERUP_COUNT, DEFAULT_RESPAWN_RATE,
    DEFAULT_UNIVERSE_SIZE,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("wall {0} is not axis-aligned")]
    DiagonalWall(u32),

    #[error("duplicate wall id {0}")]
    DuplicateWall(u32),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Milliseconds between ticks.
    pub ms_per_frame: u64,
    /// Frames a dead snake waits before it is recreated.
    pub respawn_rate: u32,
    pub universe_size: u32,
    pub powerup_count: u32,
    pub walls: Vec<Wall>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            ms_per_frame: DEFAULT_MS_PER_FRAME,
            respawn_rate: DEFAULT_RESPAWN_RATE,
            universe_size: DEFAULT_UNIVERSE_SIZE,
            powerup_count: DEFAULT_POWERUP_COUNT,
            walls: Vec::new(),
        }
    }
}

impl GameSettings {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ms_per_frame == 0 {
            return Err(ConfigError::Zero("ms_per_frame"));
        }
        if self.universe_size == 0 {
            return Err(ConfigError::Zero("universe_size"));
        }

        let mut seen = HashSet::new();
        for wall in &self.walls {
            if !wall.is_axis_aligned() {
                return Err(ConfigError::DiagonalWall(wall.id));
            }
            if !seen.insert(wall.id) {
                return Err(ConfigError::DuplicateWall(wall.id));
            }
        }
        Ok(())
    }

    /// Builds an empty world with these settings' size, timing and walls.
    pub fn to_world(&self) -> World {
        World::new(
            self.universe_size,
            self.ms_per_frame,
            self.respawn_rate,
            self.walls.clone(),
        )
    }
}
