//! Game Runtime
//!
//! Drives one loaded level: the fixed-step frame, the follow camera, tile
//! streaming around the view, player lives and level switching.
//!
//! Input and drawing stay outside: the binary maps keys onto the
//! input-facing `World` methods and hands the world to the renderer.

use super::components::tuning;
use super::components::Health;
use super::entity::Entity;
use super::world::World;
use crate::config::EngineConfig;
use crate::world::{ChunkedLevel, LevelDesc, Rect, Vec2i};

// =============================================================================
// Camera
// =============================================================================

/// Dead-zone follow camera. The view only moves once the target's center
/// strays more than `pad` pixels from the view center, and never leaves the
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Camera {
    pub rect: Rect,
    pub pad: i32,
}

impl Camera {
    pub fn new(width: i32, height: i32, pad: i32) -> Self {
        Self {
            rect: Rect::new(0, 0, width, height),
            pad,
        }
    }

    pub fn center_on(&mut self, point: Vec2i) {
        self.rect = self
            .rect
            .with_position(point.x - self.rect.w / 2, point.y - self.rect.h / 2);
    }

    /// Drag the view after `target`, then keep it inside `bounds`.
    pub fn follow(&mut self, target: Rect, bounds: Rect) {
        let target = target.center();
        let mut center = self.rect.center();

        if target.x > center.x + self.pad {
            center.x = target.x - self.pad;
        } else if target.x < center.x - self.pad {
            center.x = target.x + self.pad;
        }
        if target.y > center.y + self.pad {
            center.y = target.y - self.pad;
        } else if target.y < center.y - self.pad {
            center.y = target.y + self.pad;
        }

        self.center_on(center);
        self.rect = self.rect.clamp_into(&bounds);
    }
}

// =============================================================================
// Game
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Playing,
    GameOver,
}

pub struct Game {
    pub config: EngineConfig,
    desc: LevelDesc,
    pub world: World,
    chunks: ChunkedLevel,
    pub camera: Camera,
    /// Frames simulated on this level
    frame: u64,
    /// Is the simulation halted? (frames are skipped, nothing is reset)
    pub paused: bool,
    status: GameStatus,
}

impl Game {
    /// Build a level: layers and zones, the player at the start position,
    /// the level's characters, tiles around the first view. The level is
    /// started.
    pub fn new(config: EngineConfig, desc: LevelDesc) -> Self {
        let mut world = World::for_level(&desc, &config);
        let player = world.spawn_player(desc.start_position());
        world.zones.watch_all(player);
        world.spawn_characters(&desc, config.tile_width, config.tile_height);

        let chunks = ChunkedLevel::new(&desc, &config);
        let camera = Camera::new(config.view_width, config.view_height, config.camera_pad);

        let mut game = Self {
            config,
            desc,
            world,
            chunks,
            camera,
            frame: 0,
            paused: false,
            status: GameStatus::Playing,
        };
        game.snap_camera();
        game.world.start();
        log::info!(
            "Started level '{}' with {} entities",
            game.desc.name,
            game.world.entity_count()
        );
        game
    }

    pub fn player(&self) -> Option<Entity> {
        self.world.player()
    }

    pub fn level(&self) -> &LevelDesc {
        &self.desc
    }

    pub fn chunks(&self) -> &ChunkedLevel {
        &self.chunks
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn toggle_paused(&mut self) {
        self.paused = !self.paused;
    }

    /// Simulate one fixed frame. Returns false when nothing ran (paused or
    /// game over). Events of the frame stay queued until the next call.
    pub fn advance(&mut self) -> bool {
        if self.paused || self.status == GameStatus::GameOver {
            return false;
        }

        self.world.events.clear_all();
        self.world.advance_timers(self.config.frame_ms());
        self.world.tick();
        self.world.flush_despawns();

        if self.player_is_dead() {
            self.player_died();
        }

        self.update_camera();
        self.frame += 1;
        true
    }

    /// Fire `Activated` for every zone the player stands in. Returns the
    /// number of zones activated.
    pub fn activate_zones(&mut self) -> usize {
        let Some(player) = self.player() else {
            return 0;
        };
        self.world.zones.activate(player, &mut self.world.events.zone)
    }

    /// Follow the player and stream tiles for the new view.
    pub fn update_camera(&mut self) {
        if let Some(rect) = self.player_rect() {
            self.camera.follow(rect, self.world.bounds());
        }
        self.chunks.update_visible(&mut self.world, self.camera.rect);
    }

    /// Center on the player, ignoring the dead zone.
    fn snap_camera(&mut self) {
        if let Some(rect) = self.player_rect() {
            self.camera.center_on(rect.center());
        }
        self.camera.rect = self.camera.rect.clamp_into(&self.world.bounds());
        self.chunks.update_visible(&mut self.world, self.camera.rect);
    }

    fn player_rect(&self) -> Option<Rect> {
        self.player().and_then(|p| self.world.sprite(p)).map(|s| s.rect)
    }

    fn player_is_dead(&self) -> bool {
        self.player()
            .and_then(|p| self.world.sprite(p))
            .is_some_and(|s| s.is_dead())
    }

    /// Spend a life: respawn at the start position, or end the game.
    fn player_died(&mut self) {
        let Some(player) = self.player() else {
            return;
        };
        let lives = self
            .world
            .sprite_mut(player)
            .and_then(|s| s.behaviors.player.as_mut())
            .map(|control| {
                control.lives = control.lives.saturating_sub(1);
                control.lives
            })
            .unwrap_or(0);

        if lives == 0 {
            log::info!("Game over on level '{}'", self.desc.name);
            self.status = GameStatus::GameOver;
            self.world.stop();
            return;
        }

        log::info!("Player died, {} lives left", lives);
        self.world.end_invulnerability(player);
        if let Some(sprite) = self.world.sprite_mut(player) {
            sprite.health = Some(Health::new(tuning::PLAYER_MAX_HEALTH));
            sprite.velocity = Vec2i::ZERO;
        }
        let start = self.desc.start_position();
        self.world.move_to(player, start.x, start.y, false);
    }

    /// Leave the current level and enter `desc`, carrying the player (and
    /// its remaining lives) over to the new main layer.
    pub fn switch_level(&mut self, desc: LevelDesc) {
        self.world.stop();
        self.chunks.unload_all(&mut self.world);

        let carried = self.player().and_then(|player| {
            self.world.remove_from_layer(player);
            self.world.sprite(player).cloned()
        });

        let mut world = World::for_level(&desc, &self.config);
        if let Some(mut sprite) = carried {
            sprite.velocity = Vec2i::ZERO;
            sprite.contacts.clear();
            sprite.health = Some(Health::new(tuning::PLAYER_MAX_HEALTH));
            if let Some(control) = sprite.behaviors.player.as_mut() {
                control.running = false;
            }
            let player = world.spawn(sprite);
            let start = desc.start_position();
            world.move_to(player, start.x, start.y, false);
            if let Some(main) = world.main_layer() {
                world.add_to_layer(player, main);
            }
            world.set_player(Some(player));
            world.zones.watch_all(player);
        }
        world.spawn_characters(&desc, self.config.tile_width, self.config.tile_height);

        log::info!("Switching level '{}' -> '{}'", self.desc.name, desc.name);
        self.world = world;
        self.chunks = ChunkedLevel::new(&desc, &self.config);
        self.desc = desc;
        self.frame = 0;
        self.status = GameStatus::Playing;
        self.snap_camera();
        self.world.start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::{Direction, EntityKind};
    use crate::game::event::ZoneEventKind;

    fn game() -> Game {
        Game::new(EngineConfig::default(), LevelDesc::demo(40, 30))
    }

    #[test]
    fn test_camera_dead_zone() {
        let bounds = Rect::new(0, 0, 4000, 4000);
        let mut camera = Camera::new(1000, 800, 64);
        camera.center_on(Vec2i::new(2000, 2000));

        // Inside the pad: no movement
        camera.follow(Rect::new(2040, 1950, 20, 20), bounds);
        assert_eq!(camera.rect.center(), Vec2i::new(2000, 2000));

        // Past the pad: the view is dragged to keep the target on its edge
        camera.follow(Rect::new(2190, 1990, 20, 20), bounds);
        assert_eq!(camera.rect.center(), Vec2i::new(2200 - 64, 2000));
    }

    #[test]
    fn test_camera_clamped_to_level() {
        let bounds = Rect::new(0, 0, 2000, 1000);
        let mut camera = Camera::new(800, 600, 64);
        camera.follow(Rect::new(1990, 990, 10, 10), bounds);
        assert_eq!(camera.rect, Rect::new(1200, 400, 800, 600));

        camera.follow(Rect::new(0, 0, 10, 10), bounds);
        assert_eq!(camera.rect.top_left(), Vec2i::ZERO);
    }

    #[test]
    fn test_new_game_starts_level() {
        let game = game();
        let player = game.player().unwrap();

        assert!(game.world.is_started());
        assert_eq!(game.world.sprite(player).unwrap().rect.top_left(), Vec2i::new(128, 128));
        assert_eq!(game.world.count_kind(EntityKind::Enemy), 3);
        assert_eq!(game.camera.rect, Rect::new(0, 0, 1024, 768));

        // 640 px chunks: the first view covers 2x2 chunks on both layers
        let range = game.chunks().loaded_range().unwrap();
        assert_eq!((range.last_row, range.last_col), (1, 1));
        assert_eq!(game.chunks().loaded_tile_count(), game.world.count_kind(EntityKind::Tile));
    }

    #[test]
    fn test_advance_moves_player() {
        let mut game = game();
        let player = game.player().unwrap();
        game.world.move_direction(player, Direction::Right);

        for _ in 0..10 {
            assert!(game.advance());
        }
        assert_eq!(game.frame(), 10);
        assert_eq!(game.world.sprite(player).unwrap().rect.x, 168);
    }

    #[test]
    fn test_paused_game_does_not_advance() {
        let mut game = game();
        game.toggle_paused();
        assert!(!game.advance());
        assert_eq!(game.frame(), 0);
        game.toggle_paused();
        assert!(game.advance());
    }

    #[test]
    fn test_death_respawns_until_out_of_lives() {
        let mut game = game();
        let player = game.player().unwrap();

        for expected_lives in [2, 1] {
            game.world.move_to(player, 600, 600, false);
            game.world.apply_damage(player, tuning::PLAYER_MAX_HEALTH, None);
            assert!(game.advance());

            let sprite = game.world.sprite(player).unwrap();
            assert_eq!(sprite.rect.top_left(), Vec2i::new(128, 128));
            assert_eq!(sprite.health.unwrap().current, tuning::PLAYER_MAX_HEALTH);
            assert_eq!(sprite.behaviors.player.unwrap().lives, expected_lives);
        }

        game.world.apply_damage(player, tuning::PLAYER_MAX_HEALTH, None);
        game.advance();
        assert_eq!(game.status(), GameStatus::GameOver);
        assert!(!game.world.is_started());
        assert!(!game.advance());
    }

    #[test]
    fn test_activate_zones() {
        let mut game = game();
        let player = game.player().unwrap();
        assert_eq!(game.activate_zones(), 0);

        // The demo clearing spans grid (18, 13) to (22, 17)
        game.world.move_to(player, 19 * 64, 14 * 64, false);
        game.world.events.zone.clear();
        assert_eq!(game.activate_zones(), 1);
        let events: Vec<_> = game.world.events.zone.iter().cloned().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].zone, "clearing");
        assert_eq!(events[0].kind, ZoneEventKind::Activated);
    }

    #[test]
    fn test_camera_streams_tiles_while_walking() {
        let mut game = game();
        let player = game.player().unwrap();
        game.world.move_to(player, 2200, 1600, false);
        game.advance();

        let range = game.chunks().loaded_range().unwrap();
        assert_eq!(range.last_col, 3);
        assert_eq!(range.last_row, 2);
        assert!(!game.chunks().is_loaded(0, 0));
        assert_eq!(game.chunks().loaded_tile_count(), game.world.count_kind(EntityKind::Tile));
    }

    #[test]
    fn test_switch_level_carries_player() {
        let mut game = game();
        let player = game.player().unwrap();
        if let Some(control) = game.world.sprite_mut(player).unwrap().behaviors.player.as_mut() {
            control.lives = 2;
        }

        let mut next = LevelDesc::demo(20, 20);
        next.name = "cellar".into();
        next.start_pos = Some([300, 200]);
        game.switch_level(next);

        let player = game.player().unwrap();
        let sprite = game.world.sprite(player).unwrap();
        assert_eq!(game.level().name, "cellar");
        assert_eq!(sprite.rect.top_left(), Vec2i::new(300, 200));
        assert_eq!(sprite.behaviors.player.unwrap().lives, 2);
        assert_eq!(sprite.layer, game.world.main_layer());
        assert!(sprite.is_started());
        assert_eq!(game.world.count_kind(EntityKind::Player), 1);
        assert_eq!(game.world.bounds(), Rect::new(0, 0, 1280, 1280));
        assert!(game.advance());
    }
}
