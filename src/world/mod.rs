//! World module - tile levels and spatial structure
//!
//! Everything positional about a level:
//! - Integer rects and vectors
//! - The quad-tree spatial index each layer keeps
//! - Layers (z-ordered planes with tick lists)
//! - Level descriptions (JSON/RON) and chunked tile streaming
//! - Trigger zones

mod chunk;
mod layer;
mod level;
mod quadtree;
mod rect;
mod zone;

pub use chunk::*;
pub use layer::*;
pub use level::*;
pub use quadtree::*;
pub use rect::*;
pub use zone::*;
