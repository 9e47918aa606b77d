//! Event Queues
//!
//! Typed, per-frame event queues replace ad hoc publish/subscribe. Core
//! systems push what happened (an entity moved, two entities touched, a
//! trigger zone was entered) and consumers outside the core (scripting,
//! audio, UI) read the queues after the frame step.
//!
//! Queues are cleared at the start of every frame by the runtime.

use super::components::EntityKind;
use super::entity::Entity;
use crate::world::Vec2i;

/// A queue for events of a single type, in the order they were sent.
#[derive(Debug)]
pub struct EventQueue<T> {
    events: Vec<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn send(&mut self, event: T) {
        self.events.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.events.iter()
    }

    /// Take every queued event, leaving the queue empty
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Every queue the core publishes.
#[derive(Debug, Default)]
pub struct Events {
    /// An entity finished a `move_by` (carries the applied delta)
    pub moved: EventQueue<MovedEvent>,

    /// A collision hook ran (one event per participant per overlap)
    pub collision: EventQueue<CollisionEvent>,

    /// An entity stopped touching something it touched on its previous move
    pub collision_ended: EventQueue<CollisionEndedEvent>,

    pub damage: EventQueue<DamageEvent>,

    /// An entity's health reached zero
    pub death: EventQueue<DeathEvent>,

    /// Trigger zone enter/exit/move/activate notifications
    pub zone: EventQueue<ZoneEvent>,

    /// A chunk of tiles was streamed in or out
    pub chunk: EventQueue<ChunkEvent>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_all(&mut self) {
        self.moved.clear();
        self.collision.clear();
        self.collision_ended.clear();
        self.damage.clear();
        self.death.clear();
        self.zone.clear();
        self.chunk.clear();
    }
}

// =============================================================================
// Event Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovedEvent {
    pub entity: Entity,
    /// Delta actually applied after collision resolution
    pub delta: Vec2i,
}

/// A collision hook invocation, seen from `entity`'s side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    /// Whose hook ran
    pub entity: Entity,
    /// Who it collided with
    pub other: Entity,
    /// The sub-move delta that produced the overlap
    pub delta: Vec2i,
    /// Did `entity` permit the move?
    pub permitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEndedEvent {
    pub entity: Entity,
    pub other: Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    pub target: Entity,
    pub source: Option<Entity>,
    pub amount: u32,
    /// Health left after the hit
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathEvent {
    pub entity: Entity,
    pub kind: EntityKind,
    /// Top-left of the entity when it was defeated
    pub position: Vec2i,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneEventKind {
    /// Went from outside to inside
    Entered,
    /// Moved while already inside
    MovedInside,
    /// Went from inside to outside
    Exited,
    /// An interaction was triggered while inside
    Activated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEvent {
    pub zone: String,
    pub entity: Entity,
    pub kind: ZoneEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEventKind {
    Loaded,
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEvent {
    pub row: usize,
    pub col: usize,
    pub kind: ChunkEventKind,
    /// Tile entities created or destroyed
    pub tiles: usize,
}
