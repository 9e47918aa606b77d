//! tilequad: a 2D tile-game core
//!
//! Quad-tree spatial indexing, layered sprites with axis-separated
//! collision resolution, chunked tile streaming and trigger zones, with a
//! macroquad renderer on top.

pub mod config;
pub mod game;
pub mod world;

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
