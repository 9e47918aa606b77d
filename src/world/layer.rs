//! Layers
//!
//! A layer is one z-ordered drawing/collision plane of a level
//! (background, main, foreground, ...). It owns the spatial index used for
//! rendering and collision queries on that plane, and the ordered list of
//! entities that tick every frame.
//!
//! The layer only does bookkeeping. Attaching a sprite (setting its
//! back-reference, running its `on_added` hook) is done by
//! [`World::add_to_layer`](crate::game::World::add_to_layer), which owns the
//! sprite records.

use super::quadtree::{Query, SpatialIndex};
use super::rect::Rect;
use crate::game::Entity;

/// Position of a layer inside its world (also its draw order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub usize);

pub struct Layer {
    name: String,
    /// z-order key from the level data
    z: usize,
    is_main: bool,
    index: SpatialIndex,
    tick_list: Vec<Entity>,
}

impl Layer {
    pub fn new(name: impl Into<String>, z: usize, is_main: bool, bounds: Rect, depth: u32) -> Self {
        Self {
            name: name.into(),
            z,
            is_main,
            index: SpatialIndex::new(bounds, depth),
            tick_list: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn z(&self) -> usize {
        self.z
    }

    /// The collidable plane the player walks on
    pub fn is_main(&self) -> bool {
        self.is_main
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut SpatialIndex {
        &mut self.index
    }

    /// Entities whose extent intersects `rect` (each at most once).
    pub fn iterate_in_rect(&mut self, rect: Rect) -> Query<'_> {
        self.index.query(Some(rect))
    }

    /// Every indexed entity.
    pub fn iter_all(&mut self) -> Query<'_> {
        self.index.query(None)
    }

    /// Append to the tick list. Already-ticking entities are not duplicated.
    pub fn add_ticking(&mut self, entity: Entity) {
        if !self.tick_list.contains(&entity) {
            self.tick_list.push(entity);
        }
    }

    /// Drop from the tick list. Absent entities are tolerated.
    pub fn remove_ticking(&mut self, entity: Entity) -> bool {
        match self.tick_list.iter().position(|&e| e == entity) {
            Some(pos) => {
                self.tick_list.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn is_ticking(&self, entity: Entity) -> bool {
        self.tick_list.contains(&entity)
    }

    /// Copy of the tick list in insertion order. Ticking iterates the copy so
    /// entities may add or remove themselves mid-tick.
    pub fn tick_snapshot(&self) -> Vec<Entity> {
        self.tick_list.clone()
    }

    pub fn tick_count(&self) -> usize {
        self.tick_list.len()
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("z", &self.z)
            .field("is_main", &self.is_main)
            .field("indexed", &self.index.len())
            .field("ticking", &self.tick_list.len())
            .finish()
    }
}
