//! Engine configuration
//!
//! Tunables read from a RON file at startup. Every field has a default, so
//! a config file only needs to name what it changes:
//!
//! ```ron
//! (fps: 60, chunk_cols: 8, debug_rects: true)
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed simulation rate
    pub fps: u32,
    pub tile_width: i32,
    pub tile_height: i32,
    /// Tiles per chunk, horizontally
    pub chunk_cols: usize,
    /// Tiles per chunk, vertically
    pub chunk_rows: usize,
    /// Levels of each layer's quad-tree (the root counts as one)
    pub quadtree_depth: u32,
    /// Camera dead zone around the player
    pub camera_pad: i32,
    pub view_width: i32,
    pub view_height: i32,
    /// Seed for behavior randomness
    pub seed: u64,
    /// Outline hitboxes and trigger zones
    pub debug_rects: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            tile_width: 64,
            tile_height: 64,
            chunk_cols: 10,
            chunk_rows: 10,
            quadtree_depth: 4,
            camera_pad: 64,
            view_width: 1024,
            view_height: 768,
            seed: 1337,
            debug_rects: false,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be positive".into()));
        }
        if self.tile_width <= 0 || self.tile_height <= 0 {
            return Err(ConfigError::Invalid(format!(
                "tile size {}x{} must be positive",
                self.tile_width, self.tile_height
            )));
        }
        if self.chunk_cols == 0 || self.chunk_rows == 0 {
            return Err(ConfigError::Invalid("chunks must hold at least one tile".into()));
        }
        if self.quadtree_depth == 0 {
            return Err(ConfigError::Invalid("quadtree_depth must be at least 1".into()));
        }
        Ok(())
    }

    /// Length of one simulation frame
    pub fn frame_ms(&self) -> f32 {
        1000.0 / self.fps as f32
    }

    /// Chunk size in pixels
    pub fn chunk_pixel_size(&self) -> (i32, i32) {
        (
            self.chunk_cols as i32 * self.tile_width,
            self.chunk_rows as i32 * self.tile_height,
        )
    }
}
