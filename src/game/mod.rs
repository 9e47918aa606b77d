//! Game Simulation
//!
//! Sprites, their layers and the per-frame loop of a tile-based action game.
//!
//! - `Entity` handles address sprites and survive slot reuse by generation
//! - `Sprite` holds a rect, hitboxes, velocity, flags and optional state
//!   blocks (player, health, wander, chase, attack line)
//! - `World` owns sprites, layers, zones, timers and the frame's events
//! - `Game` wraps a world with chunk streaming, the camera and lives
//!
//! Behavior is composed from those state blocks rather than a type
//! hierarchy, and every hook runs as a method on `World`.

pub mod behavior;
pub mod collision;
pub mod component;
pub mod components;
pub mod entity;
pub mod event;
pub mod renderer;
pub mod runtime;
pub mod sprite;
pub mod timer;
pub mod world;

// Re-export main types
pub use component::ComponentStorage;
pub use entity::{Entity, EntityAllocator};
pub use event::Events;
pub use runtime::{Camera, Game};
pub use sprite::Sprite;
pub use world::World;
