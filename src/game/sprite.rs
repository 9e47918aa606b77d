//! Sprite Records
//!
//! A `Sprite` is the movable/drawable unit of the engine: a position rect,
//! optional local-space collision rects, a velocity, flags controlling
//! ticking, indexing and collision, and the per-kind state (health,
//! facing, animation, composed behaviors).
//!
//! Sprites are plain data stored in the [`World`](super::World); the world
//! owns every operation that has to touch a layer or the spatial index.

use smallvec::SmallVec;

use super::components::*;
use super::entity::Entity;
use super::timer::TimerId;
use crate::world::{LayerId, Rect, Vec2i};

/// Entities a sprite touched during its last collision resolution.
pub type ContactSet = SmallVec<[Entity; 4]>;

#[derive(Debug, Clone)]
pub struct Sprite {
    pub kind: EntityKind,
    pub name: String,

    /// Owning layer, set on attach and cleared on detach
    pub layer: Option<LayerId>,

    pub rect: Rect,
    /// Hitboxes relative to `rect`'s top-left. Empty means the whole rect.
    pub collision_rects: SmallVec<[Rect; 2]>,
    pub velocity: Vec2i,

    pub visible: bool,
    /// Temporarily excluded from collision while staying indexed
    pub collidable: bool,
    /// Runs the collision pipeline on its own moves
    pub checks_collisions: bool,
    /// Needs a per-frame tick
    pub ticks: bool,
    /// Participates in spatial queries
    pub indexed: bool,
    /// Re-bucketed in the spatial index whenever it moves
    pub movable: bool,
    pub policy: CollisionPolicy,

    pub health: Option<Health>,
    pub direction: Direction,
    pub speed: i32,
    pub frame_state: FrameState,
    pub anim_frame: usize,
    pub anim_timer: Option<TimerId>,
    pub visual: Visual,
    pub behaviors: Behaviors,

    pub(crate) contacts: ContactSet,
    pub(crate) started: bool,
    /// Blink state; drawn hidden while set without leaving the tick list
    pub flash_hidden: bool,
}

impl Sprite {
    fn base(kind: EntityKind, name: impl Into<String>, rect: Rect, visual: Visual) -> Self {
        Self {
            kind,
            name: name.into(),
            layer: None,
            rect,
            collision_rects: SmallVec::new(),
            velocity: Vec2i::ZERO,
            visible: true,
            collidable: true,
            checks_collisions: true,
            ticks: true,
            indexed: true,
            movable: true,
            policy: CollisionPolicy::Rollback,
            health: None,
            direction: Direction::Down,
            speed: tuning::MOVE_SPEED,
            frame_state: FrameState::Default,
            anim_frame: 0,
            anim_timer: None,
            visual,
            behaviors: Behaviors::default(),
            contacts: ContactSet::new(),
            started: false,
            flash_hidden: false,
        }
    }

    /// Static tile: indexed and collidable, but never ticks or moves.
    pub fn tile(rect: Rect, visual: TileVisual) -> Self {
        Self {
            ticks: false,
            movable: false,
            checks_collisions: false,
            ..Self::base(EntityKind::Tile, "tile", rect, Visual::Tile(visual))
        }
    }

    pub fn player(x: i32, y: i32) -> Self {
        let (w, h) = tuning::SPRITE_SIZE;
        let mut sprite = Self::base(EntityKind::Player, "player", Rect::new(x, y, w, h), Visual::Sheet("player".into()));
        // Feet-only hitbox so the player can walk in front of walls
        sprite.collision_rects.push(Rect::new(8, h - 32, w - 16, 32));
        sprite.health = Some(Health::new(tuning::PLAYER_MAX_HEALTH));
        sprite.behaviors.player = Some(PlayerControl {
            lives: tuning::PLAYER_MAX_LIVES,
            ..PlayerControl::default()
        });
        sprite
    }

    pub fn enemy(name: impl Into<String>, x: i32, y: i32, behaviors: Behaviors) -> Self {
        let name = name.into();
        let (w, h) = tuning::SPRITE_SIZE;
        let mut sprite = Self::base(EntityKind::Enemy, name.clone(), Rect::new(x, y, w, h), Visual::Sheet(name));
        sprite.collision_rects.push(Rect::new(8, h - 32, w - 16, 32));
        sprite.health = Some(Health::new(tuning::ENEMY_HEALTH));
        sprite.behaviors = behaviors;
        sprite
    }

    pub fn npc(name: impl Into<String>, x: i32, y: i32, behaviors: Behaviors) -> Self {
        let mut sprite = Self::enemy(name, x, y, behaviors);
        sprite.kind = EntityKind::Npc;
        sprite.health = None;
        sprite
    }

    /// Non-colliding overlay (exclamation marks and the like).
    pub fn marker(name: impl Into<String>, x: i32, y: i32) -> Self {
        let name = name.into();
        let (w, h) = tuning::MARKER_SIZE;
        Self {
            collidable: false,
            checks_collisions: false,
            ticks: false,
            ..Self::base(EntityKind::Marker, name.clone(), Rect::new(x, y, w, h), Visual::Sheet(name))
        }
    }

    /// A bare sprite of the given kind with no hitbox offsets or behaviors.
    pub fn new(kind: EntityKind, name: impl Into<String>, rect: Rect) -> Self {
        let name = name.into();
        Self::base(kind, name.clone(), rect, Visual::Sheet(name))
    }

    pub fn with_collision_rects(mut self, rects: &[Rect]) -> Self {
        self.collision_rects = rects.iter().copied().collect();
        self
    }

    pub fn with_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Hitboxes in world space (the whole rect when none are defined).
    pub fn absolute_collision_rects(&self) -> SmallVec<[Rect; 2]> {
        if self.collision_rects.is_empty() {
            let mut rects = SmallVec::new();
            rects.push(self.rect);
            return rects;
        }
        self.collision_rects
            .iter()
            .map(|r| r.translate(self.rect.x, self.rect.y))
            .collect()
    }

    /// Union of the absolute hitboxes, used as the broad-phase query rect.
    pub fn collision_bounds(&self) -> Rect {
        Rect::union_all(&self.absolute_collision_rects()).unwrap_or(self.rect)
    }

    /// Contacts from the last collision resolution
    pub fn contacts(&self) -> &[Entity] {
        &self.contacts
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_dead(&self) -> bool {
        self.health.is_some_and(|h| h.is_dead())
    }

    /// Animations only play on character sheets.
    pub fn is_animated(&self) -> bool {
        matches!(self.visual, Visual::Sheet(_)) && self.kind != EntityKind::Marker
    }

    /// Sprite-sheet cell for the current facing and animation frame.
    pub fn sheet_frame(&self) -> Vec2i {
        let frames = self.frame_state.frames();
        let column = frames[self.anim_frame % frames.len()];
        Vec2i::new(column * self.rect.w, self.direction.sheet_row() * self.rect.h)
    }

    /// Drawn this frame?
    pub fn is_drawn(&self) -> bool {
        self.visible && !self.flash_hidden
    }
}

/// First pair of overlapping hitboxes between two sprites, if any.
pub fn overlapping_rects(a: &Sprite, b: &Sprite) -> Option<(Rect, Rect)> {
    let a_rects = a.absolute_collision_rects();
    let b_rects = b.absolute_collision_rects();
    a_rects
        .iter()
        .find_map(|ar| ar.collide_index(&b_rects).map(|i| (*ar, b_rects[i])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_rects_fall_back_to_position() {
        let sprite = Sprite::new(EntityKind::Npc, "crate", Rect::new(10, 20, 32, 32));
        assert_eq!(sprite.absolute_collision_rects().as_slice(), &[Rect::new(10, 20, 32, 32)]);
    }

    #[test]
    fn test_absolute_rects_are_offset() {
        let sprite = Sprite::player(100, 200);
        let rects = sprite.absolute_collision_rects();
        assert_eq!(rects[0], Rect::new(108, 264, 48, 32));
        assert_eq!(sprite.collision_bounds(), rects[0]);
    }

    #[test]
    fn test_overlapping_rects_uses_hitboxes() {
        let player = Sprite::player(0, 0);
        // Overlaps the player's head but not its feet hitbox
        let head_level = Sprite::new(EntityKind::Npc, "sign", Rect::new(0, 0, 64, 32));
        assert!(overlapping_rects(&player, &head_level).is_none());

        let feet_level = Sprite::new(EntityKind::Npc, "sign", Rect::new(0, 70, 64, 32));
        assert!(overlapping_rects(&player, &feet_level).is_some());
    }

    #[test]
    fn test_tile_flags() {
        let tile = Sprite::tile(Rect::new(0, 0, 64, 64), TileVisual { file: 0, offset: Vec2i::ZERO });
        assert!(!tile.ticks);
        assert!(!tile.movable);
        assert!(tile.collidable);
        assert!(!tile.checks_collisions);
        assert!(!tile.is_animated());
    }

    #[test]
    fn test_sheet_frame_follows_direction() {
        let mut sprite = Sprite::player(0, 0);
        sprite.direction = Direction::Left;
        sprite.frame_state = FrameState::Walking;
        sprite.anim_frame = 2;
        assert_eq!(sprite.sheet_frame(), Vec2i::new(128, 96));
    }
}
