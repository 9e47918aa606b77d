//! Chunked Level Streaming
//!
//! A large level's static tiles are split into fixed-size chunks. Only the
//! chunks under the camera view have tile entities instantiated; moving the
//! view loads the chunks that came into range and destroys the tiles of the
//! ones that left it.
//!
//! Chunk metadata (the expanded tile placements) is built once at load and
//! never changes; tile entities are created and destroyed on demand.

use hashbrown::HashMap;

use super::level::{LevelDesc, TilePlacement};
use super::layer::LayerId;
use super::rect::Rect;
use crate::config::EngineConfig;
use crate::game::event::{ChunkEvent, ChunkEventKind};
use crate::game::sprite::Sprite;
use crate::game::{Entity, World};

/// Tiles of one chunk across every layer.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub row: usize,
    pub col: usize,
    pub tiles: Vec<TilePlacement>,
}

/// Inclusive range of chunk rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl ChunkRange {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row) && (self.first_col..=self.last_col).contains(&col)
    }

    /// (row, col) pairs, row-major
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> {
        let cols = self.first_col..=self.last_col;
        (self.first_row..=self.last_row).flat_map(move |row| cols.clone().map(move |col| (row, col)))
    }
}

pub struct ChunkedLevel {
    /// Row-major, `grid_rows * grid_cols` entries
    chunks: Vec<Chunk>,
    grid_rows: usize,
    grid_cols: usize,
    tile_width: i32,
    tile_height: i32,
    /// Chunk size in pixels
    chunk_width: i32,
    chunk_height: i32,
    bounds: Rect,
    loaded: HashMap<(usize, usize), Vec<Entity>>,
    loaded_range: Option<ChunkRange>,
}

impl ChunkedLevel {
    /// Partition every layer's tiles into chunks. Nothing is instantiated.
    pub fn new(desc: &LevelDesc, config: &EngineConfig) -> Self {
        let grid_cols = desc.width.div_ceil(config.chunk_cols);
        let grid_rows = desc.height.div_ceil(config.chunk_rows);

        let mut chunks: Vec<Chunk> = (0..grid_rows * grid_cols)
            .map(|i| Chunk {
                row: i / grid_cols,
                col: i % grid_cols,
                tiles: Vec::new(),
            })
            .collect();
        for layer in 0..desc.layers.len() {
            for placement in desc.iter_tiles(layer) {
                let (row, col) = (placement.row / config.chunk_rows, placement.col / config.chunk_cols);
                chunks[row * grid_cols + col].tiles.push(placement);
            }
        }

        let (chunk_width, chunk_height) = config.chunk_pixel_size();
        log::debug!(
            "Level '{}' split into {}x{} chunks of {}x{} tiles",
            desc.name,
            grid_cols,
            grid_rows,
            config.chunk_cols,
            config.chunk_rows
        );
        Self {
            chunks,
            grid_rows,
            grid_cols,
            tile_width: config.tile_width,
            tile_height: config.tile_height,
            chunk_width,
            chunk_height,
            bounds: desc.pixel_bounds(config.tile_width, config.tile_height),
            loaded: HashMap::new(),
            loaded_range: None,
        }
    }

    /// (rows, cols) of the chunk grid
    pub fn grid_size(&self) -> (usize, usize) {
        (self.grid_rows, self.grid_cols)
    }

    pub fn chunk(&self, row: usize, col: usize) -> Option<&Chunk> {
        if row >= self.grid_rows || col >= self.grid_cols {
            return None;
        }
        self.chunks.get(row * self.grid_cols + col)
    }

    /// Chunks overlapping `view`, clipped to the level. None when the view
    /// misses the level entirely.
    pub fn chunk_range_for(&self, view: Rect) -> Option<ChunkRange> {
        if self.grid_rows == 0 || self.grid_cols == 0 {
            return None;
        }
        let left = view.left().max(self.bounds.left());
        let top = view.top().max(self.bounds.top());
        let right = view.right().min(self.bounds.right());
        let bottom = view.bottom().min(self.bounds.bottom());
        if left >= right || top >= bottom {
            return None;
        }

        let col_of = |x: i32| ((x / self.chunk_width) as usize).min(self.grid_cols - 1);
        let row_of = |y: i32| ((y / self.chunk_height) as usize).min(self.grid_rows - 1);
        Some(ChunkRange {
            first_row: row_of(top),
            first_col: col_of(left),
            last_row: row_of(bottom - 1),
            last_col: col_of(right - 1),
        })
    }

    /// Stream tiles for a new view. Returns false (and does nothing) when
    /// the view still covers the same chunks.
    pub fn update_visible(&mut self, world: &mut World, view: Rect) -> bool {
        let range = self.chunk_range_for(view);
        if range == self.loaded_range {
            return false;
        }

        if let Some(old) = self.loaded_range {
            for (row, col) in old.iter() {
                if !range.is_some_and(|r| r.contains(row, col)) {
                    self.evict(world, row, col);
                }
            }
        }
        if let Some(new) = range {
            for (row, col) in new.iter() {
                if !self.loaded.contains_key(&(row, col)) {
                    self.load(world, row, col);
                }
            }
        }
        self.loaded_range = range;
        true
    }

    fn load(&mut self, world: &mut World, row: usize, col: usize) {
        let Some(chunk) = self.chunk(row, col) else {
            return;
        };
        let mut entities = Vec::with_capacity(chunk.tiles.len());
        for placement in &chunk.tiles {
            let rect = Rect::new(
                placement.col as i32 * self.tile_width,
                placement.row as i32 * self.tile_height,
                self.tile_width,
                self.tile_height,
            );
            let tile = world.spawn(Sprite::tile(rect, placement.visual));
            world.add_to_layer(tile, LayerId(placement.layer));
            entities.push(tile);
        }

        log::debug!("Loaded chunk ({}, {}): {} tiles", row, col, entities.len());
        world.events.chunk.send(ChunkEvent {
            row,
            col,
            kind: ChunkEventKind::Loaded,
            tiles: entities.len(),
        });
        self.loaded.insert((row, col), entities);
    }

    fn evict(&mut self, world: &mut World, row: usize, col: usize) {
        let Some(entities) = self.loaded.remove(&(row, col)) else {
            return;
        };
        for &tile in &entities {
            world.despawn_immediate(tile);
        }

        log::debug!("Evicted chunk ({}, {}): {} tiles", row, col, entities.len());
        world.events.chunk.send(ChunkEvent {
            row,
            col,
            kind: ChunkEventKind::Evicted,
            tiles: entities.len(),
        });
    }

    /// Destroy every instantiated tile.
    pub fn unload_all(&mut self, world: &mut World) {
        let keys: Vec<_> = self.loaded.keys().copied().collect();
        for (row, col) in keys {
            self.evict(world, row, col);
        }
        self.loaded_range = None;
    }

    pub fn is_loaded(&self, row: usize, col: usize) -> bool {
        self.loaded.contains_key(&(row, col))
    }

    pub fn loaded_range(&self) -> Option<ChunkRange> {
        self.loaded_range
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded.len()
    }

    /// Tile entities currently instantiated
    pub fn loaded_tile_count(&self) -> usize {
        self.loaded.values().map(Vec::len).sum()
    }

    /// Tiles the chunks in `range` describe
    pub fn tile_count_in(&self, range: ChunkRange) -> usize {
        range
            .iter()
            .filter_map(|(row, col)| self.chunk(row, col))
            .map(|c| c.tiles.len())
            .sum()
    }
}
