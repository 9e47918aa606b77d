//! Game Components
//!
//! Plain data carried by every sprite record: kind tags, health, facing,
//! visuals and the optional behavior states that can be composed onto any
//! enemy. Behavior lives in `behavior.rs` and `collision.rs`.

use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::timer::TimerId;
use crate::world::Vec2i;

/// Tuning constants shared by the player and enemy behaviors.
pub mod tuning {
    /// Walking speed in pixels per tick
    pub const MOVE_SPEED: i32 = 4;
    /// Running speed in pixels per tick
    pub const RUN_SPEED: i32 = 8;
    /// Time between animation frames
    pub const ANIM_MS: u32 = 150;

    pub const PLAYER_MAX_HEALTH: u32 = 3;
    pub const PLAYER_MAX_LIVES: u32 = 3;
    pub const ENEMY_HEALTH: u32 = 10;

    /// Invulnerability window after the player is hit
    pub const INVULNERABLE_MS: u32 = 1500;
    /// Toggle interval of the hit blink
    pub const BLINK_MS: u32 = 100;

    pub const WANDER_INTERVAL_MS: u32 = 1000;
    pub const WANDER_PAUSE_CHANCE: f64 = 0.1;
    pub const WANDER_CHANGE_DIR_CHANCE: f64 = 0.3;

    pub const CHASE_APPROACH_DISTANCE: i32 = 300;
    pub const CHASE_EXCLAMATION_MS: u32 = 700;

    pub const ATTACK_SPEED: f32 = 8.0;
    pub const ATTACK_DISTANCE: i32 = 400;
    pub const ATTACK_COOLDOWN_MS: u32 = 2000;
    /// Extra ticks an attack keeps going past its target
    pub const ATTACK_TICKS_PAD: i32 = 10;

    /// Player / enemy sprite size
    pub const SPRITE_SIZE: (i32, i32) = (64, 96);
    pub const MARKER_SIZE: (i32, i32) = (32, 32);
}

// =============================================================================
// Identity
// =============================================================================

/// The closed set of sprite kinds. Per-kind update and collision response
/// dispatch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    /// Static tile streamed in by the chunk loader
    Tile,
    Enemy,
    Npc,
    /// Decorative, non-colliding sprite (exclamation marks, effects)
    Marker,
}

impl EntityKind {
    /// Does this kind block other movers?
    pub fn is_obstacle(&self) -> bool {
        !matches!(self, EntityKind::Marker)
    }
}

// =============================================================================
// Combat
// =============================================================================

/// Health of a damageable sprite. Zero means defeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: u32,
    pub max: u32,
    /// Hits are ignored while set
    pub invulnerable: bool,
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            invulnerable: false,
        }
    }

    /// Apply damage. Returns true if this hit defeated the owner.
    pub fn damage(&mut self, amount: u32) -> bool {
        if self.invulnerable || self.current == 0 {
            return false;
        }
        self.current = self.current.saturating_sub(amount);
        self.current == 0
    }

    pub fn heal(&mut self, amount: u32) {
        self.current = (self.current + amount).min(self.max);
    }

    pub fn is_dead(&self) -> bool {
        self.current == 0
    }
}

// =============================================================================
// Facing / Animation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Left, Direction::Right, Direction::Up, Direction::Down];

    /// Unit step along this direction
    pub fn unit(&self) -> Vec2i {
        match self {
            Direction::Left => Vec2i::new(-1, 0),
            Direction::Right => Vec2i::new(1, 0),
            Direction::Up => Vec2i::new(0, -1),
            Direction::Down => Vec2i::new(0, 1),
        }
    }

    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    /// Row of the sprite sheet used for this facing
    pub fn sheet_row(&self) -> i32 {
        match self {
            Direction::Down => 0,
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::Up => 3,
        }
    }
}

/// Which animation strip a sprite is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameState {
    Default,
    Walking,
    Running,
    Wandering,
}

impl FrameState {
    /// Sprite-sheet column of each frame in the strip
    pub fn frames(&self) -> &'static [i32] {
        match self {
            FrameState::Default => &[1],
            FrameState::Walking | FrameState::Wandering => &[0, 1, 2, 1],
            FrameState::Running => &[0, 2],
        }
    }
}

/// What to draw for a sprite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visual {
    /// One cell of a tileset file
    Tile(TileVisual),
    /// A named character sheet, framed by direction and animation state
    Sheet(String),
}

/// Tileset file index plus pixel offset of the cell inside that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileVisual {
    pub file: usize,
    pub offset: Vec2i,
}

// =============================================================================
// Collision Response
// =============================================================================

/// What happens to a mover when one of its hooks vetoes a sub-move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Restore the position from before the sub-move
    #[default]
    Rollback,
    /// Sit flush against the obstacle on the moved axis
    SnapBeside,
}

// =============================================================================
// Behavior State
// =============================================================================

/// Input-driven movement of the player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerControl {
    pub running: bool,
    pub lives: u32,
    /// Blink toggle timer while invulnerable
    pub blink_timer: Option<TimerId>,
}

/// Random roaming with periodic direction changes and pauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WanderState {
    pub timer: Option<TimerId>,
    /// Skip the next wander step
    pub paused: bool,
}

/// Notice the player, show a marker, then follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaseState {
    pub following: bool,
    /// Exclamation marker currently shown above the chaser
    pub exclamation: Option<Entity>,
}

/// Straight-line charge at the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackLineState {
    pub attacking: bool,
    pub can_attack: bool,
    pub start: Vec2i,
    /// Per-tick velocity of the charge
    pub velocity: (f32, f32),
    pub ticks: i32,
    pub max_ticks: i32,
}

impl Default for AttackLineState {
    fn default() -> Self {
        Self {
            attacking: false,
            can_attack: true,
            start: Vec2i::ZERO,
            velocity: (0.0, 0.0),
            ticks: 0,
            max_ticks: 0,
        }
    }
}

/// Optional capabilities of a sprite. Any subset may be present.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Behaviors {
    pub player: Option<PlayerControl>,
    pub wander: Option<WanderState>,
    pub chase: Option<ChaseState>,
    pub attack_line: Option<AttackLineState>,
}

/// Capability tags used when spawning from level data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    Wander,
    Chase,
    AttackLine,
}

impl Behaviors {
    pub fn with_tags(tags: &[BehaviorTag]) -> Self {
        let mut behaviors = Self::default();
        for tag in tags {
            match tag {
                BehaviorTag::Wander => behaviors.wander = Some(WanderState::default()),
                BehaviorTag::Chase => behaviors.chase = Some(ChaseState::default()),
                BehaviorTag::AttackLine => behaviors.attack_line = Some(AttackLineState::default()),
            }
        }
        behaviors
    }

    pub fn is_attacking(&self) -> bool {
        self.attack_line.is_some_and(|a| a.attacking)
    }
}
