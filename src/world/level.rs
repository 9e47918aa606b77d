//! Level description loading and saving
//!
//! A level file describes a tile grid, its named layers, run-length
//! encoded tile rows, trigger zones and spawn points. JSON is the
//! interchange format produced by the level editor; RON is accepted as
//! well (chosen by file extension) and is what `save_ron` writes.
//!
//! Loaded descriptions are validated before the engine sees them, so the
//! streaming and spawning code can index into them without checks.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rect::{Rect, Vec2i};
use crate::game::components::{BehaviorTag, TileVisual};

/// Validation limits to keep a malformed file from exhausting memory
pub mod limits {
    /// Maximum tile-grid dimension (width or height)
    pub const MAX_GRID_SIZE: usize = 4096;
    /// Maximum number of layers in a level
    pub const MAX_LAYERS: usize = 32;
    /// Maximum length of layer / zone / spawn names
    pub const MAX_NAME_LEN: usize = 256;
}

/// Error type for level loading
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

// =============================================================================
// Schema
// =============================================================================

/// A tile type: index into `files` plus the cell offset inside that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileType(pub usize, pub i32, pub i32);

/// A run of identical tiles: tile type, starting column, column span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRun(pub usize, pub usize, pub usize);

/// All runs of one grid row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRow(pub usize, pub Vec<TileRun>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDesc {
    pub name: String,
    /// Draw order
    pub index: usize,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub tiles: Vec<TileRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBoxDesc {
    /// x, y, width, height in grid units
    pub rect: [i32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnKind {
    Enemy,
    Npc,
}

/// A character placed on the main layer when the level starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnDesc {
    pub kind: SpawnKind,
    pub name: String,
    /// Grid position
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub behaviors: Vec<BehaviorTag>,
}

/// One expanded tile of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlacement {
    /// Index into `LevelDesc::layers`
    pub layer: usize,
    pub row: usize,
    pub col: usize,
    pub visual: TileVisual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDesc {
    #[serde(default)]
    pub name: String,
    /// Grid width in tiles
    pub width: usize,
    /// Grid height in tiles
    pub height: usize,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub tiles: Vec<TileType>,
    pub layers: Vec<LayerDesc>,
    #[serde(default)]
    pub eventboxes: BTreeMap<String, EventBoxDesc>,
    /// Player start in pixels
    #[serde(default)]
    pub start_pos: Option<[i32; 2]>,
    #[serde(default)]
    pub spawns: Vec<SpawnDesc>,
}

impl LevelDesc {
    pub fn from_json_str(s: &str) -> Result<Self, LevelError> {
        let desc: LevelDesc = serde_json::from_str(s)?;
        desc.validate()?;
        Ok(desc)
    }

    pub fn from_ron_str(s: &str) -> Result<Self, LevelError> {
        let desc: LevelDesc = ron::from_str(s)?;
        desc.validate()?;
        Ok(desc)
    }

    /// Load a level file. `.ron` files are parsed as RON, everything else
    /// as JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let is_ron = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ron"));
        let mut desc = if is_ron {
            Self::from_ron_str(&text)?
        } else {
            Self::from_json_str(&text)?
        };
        if desc.name.is_empty() {
            if let Some(stem) = path.file_stem() {
                desc.name = stem.to_string_lossy().into_owned();
            }
        }
        log::info!(
            "Loaded level '{}' ({}x{} tiles, {} layers, {} zones)",
            desc.name,
            desc.width,
            desc.height,
            desc.layers.len(),
            desc.eventboxes.len()
        );
        Ok(desc)
    }

    pub fn save_ron<P: AsRef<Path>>(&self, path: P) -> Result<(), LevelError> {
        let config = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .indentor("  ".to_string());
        let text = ron::ser::to_string_pretty(self, config)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Check every index the engine relies on.
    pub fn validate(&self) -> Result<(), LevelError> {
        validate_desc(self).map_err(LevelError::Validation)
    }

    /// Level size in pixels
    pub fn pixel_size(&self, tile_width: i32, tile_height: i32) -> (i32, i32) {
        (self.width as i32 * tile_width, self.height as i32 * tile_height)
    }

    pub fn pixel_bounds(&self, tile_width: i32, tile_height: i32) -> Rect {
        let (w, h) = self.pixel_size(tile_width, tile_height);
        Rect::new(0, 0, w, h)
    }

    /// Index of the main layer. Validation guarantees exactly one.
    pub fn main_layer(&self) -> usize {
        self.layers.iter().position(|l| l.is_main).unwrap_or(0)
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    pub fn start_position(&self) -> Vec2i {
        self.start_pos
            .map(|[x, y]| Vec2i::new(x, y))
            .unwrap_or(Vec2i::ZERO)
    }

    /// Expand the run-length rows of one layer into individual placements.
    pub fn iter_tiles(&self, layer: usize) -> impl Iterator<Item = TilePlacement> + '_ {
        self.layers[layer].tiles.iter().flat_map(move |TileRow(row, runs)| {
            runs.iter().flat_map(move |&TileRun(tile_id, start_col, colspan)| {
                let TileType(file, tile_x, tile_y) = self.tiles[tile_id];
                (start_col..start_col + colspan).map(move |col| TilePlacement {
                    layer,
                    row: *row,
                    col,
                    visual: TileVisual {
                        file,
                        offset: Vec2i::new(tile_x, tile_y),
                    },
                })
            })
        })
    }

    /// Trigger zones scaled from grid units to pixels.
    pub fn zone_rects(&self, tile_width: i32, tile_height: i32) -> impl Iterator<Item = (&str, Rect)> + '_ {
        self.eventboxes.iter().map(move |(name, eventbox)| {
            let [x, y, w, h] = eventbox.rect;
            (
                name.as_str(),
                Rect::new(x * tile_width, y * tile_height, w * tile_width, h * tile_height),
            )
        })
    }

    /// A generated level: grass background, a walled border with a few
    /// pillars on the main layer, a zone in the middle and some wanderers.
    pub fn demo(width: usize, height: usize) -> Self {
        let mut main_rows = Vec::new();
        for row in 0..height {
            let runs = if row == 0 || row + 1 == height {
                vec![TileRun(1, 0, width)]
            } else if row % 6 == 3 {
                let mut runs = vec![TileRun(1, 0, 1)];
                runs.extend((4..width.saturating_sub(1)).step_by(8).map(|col| TileRun(1, col, 1)));
                runs.push(TileRun(1, width - 1, 1));
                runs
            } else {
                vec![TileRun(1, 0, 1), TileRun(1, width - 1, 1)]
            };
            main_rows.push(TileRow(row, runs));
        }

        let background = (0..height).map(|row| TileRow(row, vec![TileRun(0, 0, width)])).collect();

        let mut eventboxes = BTreeMap::new();
        eventboxes.insert(
            "clearing".to_string(),
            EventBoxDesc {
                rect: [width as i32 / 2 - 2, height as i32 / 2 - 2, 4, 4],
            },
        );

        let spawns = (1..=3)
            .map(|i| SpawnDesc {
                kind: SpawnKind::Enemy,
                name: "infected".to_string(),
                x: (width as i32 * i) / 4,
                y: height as i32 / 3,
                behaviors: vec![BehaviorTag::Wander, BehaviorTag::AttackLine],
            })
            .collect();

        Self {
            name: "demo".to_string(),
            width,
            height,
            files: vec!["ground.png".to_string(), "walls.png".to_string()],
            tiles: vec![TileType(0, 0, 0), TileType(1, 0, 0)],
            layers: vec![
                LayerDesc {
                    name: "bg".to_string(),
                    index: 0,
                    is_main: false,
                    tiles: background,
                },
                LayerDesc {
                    name: "main".to_string(),
                    index: 1,
                    is_main: true,
                    tiles: main_rows,
                },
            ],
            eventboxes,
            start_pos: Some([128, 128]),
            spawns,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_name(name: &str, context: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{}: empty name", context));
    }
    if name.len() > limits::MAX_NAME_LEN {
        return Err(format!("{}: name too long ({} > {})", context, name.len(), limits::MAX_NAME_LEN));
    }
    Ok(())
}

fn validate_layer(desc: &LevelDesc, layer: &LayerDesc) -> Result<(), String> {
    validate_name(&layer.name, "layer")?;
    for TileRow(row, runs) in &layer.tiles {
        if *row >= desc.height {
            return Err(format!("layer '{}': row {} outside grid height {}", layer.name, row, desc.height));
        }
        for &TileRun(tile_id, start_col, colspan) in runs {
            if tile_id >= desc.tiles.len() {
                return Err(format!(
                    "layer '{}' row {}: tile type {} out of range ({} defined)",
                    layer.name,
                    row,
                    tile_id,
                    desc.tiles.len()
                ));
            }
            if colspan == 0 {
                return Err(format!("layer '{}' row {}: empty run at column {}", layer.name, row, start_col));
            }
            if start_col.checked_add(colspan).map_or(true, |end| end > desc.width) {
                return Err(format!(
                    "layer '{}' row {}: run {}+{} exceeds grid width {}",
                    layer.name, row, start_col, colspan, desc.width
                ));
            }
        }
    }
    Ok(())
}

fn validate_desc(desc: &LevelDesc) -> Result<(), String> {
    if desc.width == 0 || desc.height == 0 {
        return Err(format!("empty grid ({}x{})", desc.width, desc.height));
    }
    if desc.width > limits::MAX_GRID_SIZE || desc.height > limits::MAX_GRID_SIZE {
        return Err(format!(
            "grid too large ({}x{} > {})",
            desc.width,
            desc.height,
            limits::MAX_GRID_SIZE
        ));
    }
    if desc.layers.is_empty() || desc.layers.len() > limits::MAX_LAYERS {
        return Err(format!("layer count {} not in 1..={}", desc.layers.len(), limits::MAX_LAYERS));
    }

    let mains = desc.layers.iter().filter(|l| l.is_main).count();
    if mains != 1 {
        return Err(format!("expected exactly one main layer, found {}", mains));
    }

    for (i, layer) in desc.layers.iter().enumerate() {
        if desc.layers[..i].iter().any(|l| l.name == layer.name) {
            return Err(format!("duplicate layer name '{}'", layer.name));
        }
    }

    for (i, TileType(file, _, _)) in desc.tiles.iter().enumerate() {
        if *file >= desc.files.len() {
            return Err(format!("tile type {}: file {} out of range ({} files)", i, file, desc.files.len()));
        }
    }

    for layer in &desc.layers {
        validate_layer(desc, layer)?;
    }

    let grid = Rect::new(0, 0, desc.width as i32, desc.height as i32);
    for (name, eventbox) in &desc.eventboxes {
        validate_name(name, "event box")?;
        let [x, y, w, h] = eventbox.rect;
        if w < 0 || h < 0 {
            return Err(format!("event box '{}': negative size {}x{}", name, w, h));
        }
        let reach = limits::MAX_GRID_SIZE as u32;
        if eventbox.rect.iter().any(|v| v.unsigned_abs() > reach) {
            return Err(format!("event box '{}': {:?} beyond +/-{} tiles", name, eventbox.rect, reach));
        }
        if !grid.intersects(&Rect::new(x, y, w, h)) {
            log::warn!("Event box '{}' lies outside the level grid", name);
        }
    }

    for spawn in &desc.spawns {
        validate_name(&spawn.name, "spawn")?;
        if !grid.contains_point(spawn.x, spawn.y) {
            return Err(format!("spawn '{}' at ({}, {}) outside the grid", spawn.name, spawn.x, spawn.y));
        }
    }

    Ok(())
}
