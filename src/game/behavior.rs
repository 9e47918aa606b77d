//! Sprite Behaviors
//!
//! Per-frame update of every sprite kind, composed from optional behavior
//! states instead of a class hierarchy. An enemy may carry any subset of:
//!
//! - Wander: every second, maybe pick a new direction, maybe pause
//! - Chase: notice the player within range, show an exclamation marker,
//!   then follow
//! - AttackLine: charge the player in a straight line, then cool down
//!
//! The player carries `PlayerControl`, driven through the input-facing
//! methods (`move_direction`, `stop_moving_direction`, `set_running`).

use rand::Rng;

use super::components::{tuning, ChaseState, Direction, FrameState};
use super::entity::Entity;
use super::sprite::Sprite;
use super::timer::TimerAction;
use super::world::World;
use crate::world::{Rect, Vec2i};

impl World {
    // =========================================================================
    // Tick
    // =========================================================================

    /// One frame of a sprite's behavior.
    pub fn tick_entity(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let has_attack = sprite.behaviors.attack_line.is_some();
        let has_chase = sprite.behaviors.chase.is_some();

        if has_attack && self.tick_attack_line(entity) {
            return;
        }

        let velocity = match self.sprite(entity) {
            Some(sprite) => sprite.velocity,
            None => return,
        };
        if !velocity.is_zero() {
            self.move_by(entity, velocity.x, velocity.y, true);
        }

        if has_chase {
            self.tick_chase(entity);
        }
    }

    /// Start a sprite's behaviors. Starting a started sprite does nothing.
    pub fn start_entity(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        if sprite.started {
            return;
        }
        sprite.started = true;
        let following = sprite.behaviors.chase.is_some_and(|c| c.following);
        if sprite.behaviors.wander.is_some() && !following {
            self.wander(entity);
        }
    }

    /// Stop a sprite's behaviors. Non-player sprites also stop moving.
    pub fn stop_entity(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        sprite.started = false;
        if sprite.behaviors.player.is_none() {
            sprite.velocity = Vec2i::ZERO;
        }
        self.stop_wandering(entity);
        self.stop_animation(entity);
    }

    pub(crate) fn run_timer_action(&mut self, action: TimerAction) {
        match action {
            TimerAction::AnimFrame(entity) => {
                if let Some(sprite) = self.sprite_mut(entity) {
                    let frames = sprite.frame_state.frames().len();
                    sprite.anim_frame = (sprite.anim_frame + 1) % frames;
                }
            }
            TimerAction::WanderStep(entity) => self.wander_step(entity),
            TimerAction::AllowAttack(entity) => {
                if let Some(attack) = self.sprite_mut(entity).and_then(|s| s.behaviors.attack_line.as_mut()) {
                    attack.can_attack = true;
                }
            }
            TimerAction::ExclamationDone { chaser, marker } => {
                self.despawn_immediate(marker);
                if let Some(chase) = self.sprite_mut(chaser).and_then(|s| s.behaviors.chase.as_mut()) {
                    chase.exclamation = None;
                    chase.following = true;
                }
                self.start_entity(chaser);
            }
            TimerAction::Blink(entity) => {
                if let Some(sprite) = self.sprite_mut(entity) {
                    sprite.flash_hidden = !sprite.flash_hidden;
                }
            }
            TimerAction::EndInvulnerable(entity) => self.end_invulnerability(entity),
        }
    }

    // =========================================================================
    // Facing / Animation
    // =========================================================================

    /// Face a direction; a change re-derives the velocity along that axis.
    pub fn set_direction(&mut self, entity: Entity, direction: Direction) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        if sprite.direction != direction {
            sprite.direction = direction;
            let speed = sprite.speed;
            update_velocity(sprite, speed);
        }
    }

    /// Face whichever way the sprite is moving (vertical wins).
    pub fn recompute_direction(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let velocity = sprite.velocity;
        let direction = if velocity.y > 0 {
            Direction::Down
        } else if velocity.y < 0 {
            Direction::Up
        } else if velocity.x > 0 {
            Direction::Right
        } else if velocity.x < 0 {
            Direction::Left
        } else {
            return;
        };
        self.set_direction(entity, direction);
    }

    fn start_animation(&mut self, entity: Entity) {
        if let Some(timer) = self.sprite(entity).and_then(|s| s.anim_timer) {
            self.timers.start(timer);
        }
    }

    fn stop_animation(&mut self, entity: Entity) {
        if let Some(timer) = self.sprite(entity).and_then(|s| s.anim_timer) {
            self.timers.stop(timer);
        }
    }

    fn set_frame_state(&mut self, entity: Entity, state: FrameState) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        if sprite.frame_state != state {
            sprite.frame_state = state;
            sprite.anim_frame = 0;
        }
        if state == FrameState::Default {
            self.stop_animation(entity);
        } else {
            self.start_animation(entity);
        }
    }

    // =========================================================================
    // Player Controls
    // =========================================================================

    /// Start moving in a direction (key pressed).
    pub fn move_direction(&mut self, entity: Entity, direction: Direction) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        sprite.direction = direction;
        let speed = sprite.speed;
        update_velocity(sprite, speed);
        self.update_player_animation(entity);
    }

    /// Stop moving along a direction's axis (key released).
    pub fn stop_moving_direction(&mut self, entity: Entity, direction: Direction) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        if direction.is_horizontal() {
            sprite.velocity.x = 0;
        } else {
            sprite.velocity.y = 0;
        }
        self.recompute_direction(entity);
        self.update_player_animation(entity);
    }

    pub fn set_running(&mut self, entity: Entity, running: bool) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        let Some(control) = sprite.behaviors.player.as_mut() else {
            return;
        };
        control.running = running;
        sprite.speed = if running {
            tuning::RUN_SPEED
        } else {
            tuning::MOVE_SPEED
        };
        if !sprite.velocity.is_zero() {
            let speed = sprite.speed;
            // Rescale both axes that are in motion
            sprite.velocity = Vec2i::new(
                sprite.velocity.x.signum() * speed,
                sprite.velocity.y.signum() * speed,
            );
        }
        self.update_player_animation(entity);
    }

    fn update_player_animation(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let running = sprite.behaviors.player.is_some_and(|p| p.running);
        let state = if sprite.velocity.is_zero() {
            FrameState::Default
        } else if running {
            FrameState::Running
        } else {
            FrameState::Walking
        };
        self.set_frame_state(entity, state);
    }

    // =========================================================================
    // Wander
    // =========================================================================

    /// Begin roaming: random heading now, a decision every interval.
    pub fn wander(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let Some(state) = sprite.behaviors.wander else {
            return;
        };
        if let Some(old) = state.timer {
            self.timers.cancel(old);
        }

        self.set_frame_state(entity, FrameState::Wandering);
        self.generate_direction(entity);
        let timer = self
            .timers
            .schedule(tuning::WANDER_INTERVAL_MS, TimerAction::WanderStep(entity), false);
        if let Some(wander) = self.sprite_mut(entity).and_then(|s| s.behaviors.wander.as_mut()) {
            wander.timer = Some(timer);
            wander.paused = false;
        }
    }

    pub fn stop_wandering(&mut self, entity: Entity) {
        let timer = self
            .sprite_mut(entity)
            .and_then(|s| s.behaviors.wander.as_mut())
            .and_then(|w| w.timer.take());
        if let Some(timer) = timer {
            self.timers.cancel(timer);
        }
    }

    /// Pick a heading by rolling a direction twice, so the two rolls can
    /// combine into a diagonal.
    fn generate_direction(&mut self, entity: Entity) {
        let first = Direction::ALL[self.rng.gen_range(0..4)];
        let second = Direction::ALL[self.rng.gen_range(0..4)];
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        let speed = sprite.speed;
        sprite.velocity = Vec2i::ZERO;
        for direction in [first, second] {
            sprite.direction = direction;
            update_velocity(sprite, speed);
        }
    }

    fn wander_step(&mut self, entity: Entity) {
        let Some(wander) = self.sprite_mut(entity).and_then(|s| s.behaviors.wander.as_mut()) else {
            return;
        };
        if wander.paused {
            wander.paused = false;
            return;
        }

        if self.rng.gen::<f64>() <= tuning::WANDER_CHANGE_DIR_CHANCE {
            self.generate_direction(entity);
        }
        if self.rng.gen::<f64>() <= tuning::WANDER_PAUSE_CHANCE {
            if let Some(sprite) = self.sprite_mut(entity) {
                sprite.velocity = Vec2i::ZERO;
                if let Some(wander) = sprite.behaviors.wander.as_mut() {
                    wander.paused = true;
                }
            }
        }
    }

    // =========================================================================
    // Chase
    // =========================================================================

    fn tick_chase(&mut self, entity: Entity) {
        let Some(player_rect) = self.player_rect() else {
            return;
        };
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let Some(chase) = sprite.behaviors.chase else {
            return;
        };
        if !sprite.started {
            return;
        }

        let rect = sprite.rect;
        let distance_x = (player_rect.x - rect.x).abs();
        let distance_y = (player_rect.y - rect.y).abs();
        let in_range = distance_x <= tuning::CHASE_APPROACH_DISTANCE && distance_y <= tuning::CHASE_APPROACH_DISTANCE;
        if !chase.following && !(in_range && chase.exclamation.is_none()) {
            return;
        }

        if !chase.following {
            // Just noticed the player
            self.show_exclamation(entity);
        }

        let x = (player_rect.x - rect.x).signum();
        let y = (player_rect.y - rect.y).signum();
        let x_dir = match x {
            1 => Some(Direction::Right),
            -1 => Some(Direction::Left),
            _ => None,
        };
        let y_dir = match y {
            1 => Some(Direction::Down),
            -1 => Some(Direction::Up),
            _ => None,
        };

        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        if chase.following {
            sprite.velocity = Vec2i::new(x * sprite.speed, y * sprite.speed);
        }
        let facing = if distance_x > distance_y {
            x_dir
        } else if distance_y > distance_x {
            y_dir
        } else {
            None
        };
        if let Some(direction) = facing {
            sprite.direction = direction;
        }
        let state = if sprite.velocity.is_zero() {
            FrameState::Default
        } else {
            FrameState::Walking
        };
        self.set_frame_state(entity, state);
    }

    /// Pause the chaser and pop a marker above its head; following starts
    /// when the marker times out.
    fn show_exclamation(&mut self, entity: Entity) {
        self.stop_wandering(entity);
        self.stop_entity(entity);

        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let Some(layer) = sprite.layer else {
            return;
        };
        let (w, h) = tuning::MARKER_SIZE;
        let x = sprite.rect.center().x - w / 2;
        let y = sprite.rect.y - h;
        let marker = self.spawn(Sprite::marker("exclamation", x, y));
        self.add_to_layer(marker, layer);
        self.start_entity(marker);

        self.timers.schedule(
            tuning::CHASE_EXCLAMATION_MS,
            TimerAction::ExclamationDone { chaser: entity, marker },
            true,
        );
        if let Some(chase) = self.sprite_mut(entity).and_then(|s| s.behaviors.chase.as_mut()) {
            *chase = ChaseState {
                following: false,
                exclamation: Some(marker),
            };
        }
    }

    // =========================================================================
    // Attack Line
    // =========================================================================

    /// Returns true when the attack behavior consumed this frame.
    fn tick_attack_line(&mut self, entity: Entity) -> bool {
        let Some(sprite) = self.sprite(entity) else {
            return true;
        };
        if !sprite.started {
            return true;
        }
        let Some(attack) = sprite.behaviors.attack_line else {
            return false;
        };
        let rect = sprite.rect;

        if attack.attacking {
            if let Some(state) = self.sprite_mut(entity).and_then(|s| s.behaviors.attack_line.as_mut()) {
                state.ticks += 1;
            }
            self.update_attack_position(entity);
            self.finish_attack_if_spent(entity);
            return true;
        }

        let Some(player_rect) = self.player_rect() else {
            return false;
        };
        let distance_x = (player_rect.x - rect.x).abs();
        let distance_y = (player_rect.y - rect.y).abs();
        if !attack.can_attack || distance_x > tuning::ATTACK_DISTANCE || distance_y > tuning::ATTACK_DISTANCE {
            return false;
        }

        let start = rect.top_left();
        let target = player_rect.center();
        let delta_x = (target.x - start.x) as f32;
        let delta_y = (target.y - start.y) as f32;
        let dist = (delta_x * delta_x + delta_y * delta_y).sqrt();
        if dist < f32::EPSILON {
            return false;
        }

        self.stop_wandering(entity);
        let vx = delta_x / dist * tuning::ATTACK_SPEED;
        let vy = delta_y / dist * tuning::ATTACK_SPEED;
        let travel_ticks = if vx == 0.0 { delta_y / vy } else { delta_x / vx };
        let Some(sprite) = self.sprite_mut(entity) else {
            return true;
        };
        sprite.velocity = Vec2i::new(vx.round() as i32, vy.round() as i32);
        if let Some(state) = sprite.behaviors.attack_line.as_mut() {
            state.attacking = true;
            state.start = start;
            state.velocity = (vx, vy);
            state.ticks = 1;
            state.max_ticks = travel_ticks as i32 + tuning::ATTACK_TICKS_PAD;
        }
        log::debug!("{} attacking toward ({}, {})", entity, target.x, target.y);

        self.update_attack_position(entity);
        self.finish_attack_if_spent(entity);
        true
    }

    fn update_attack_position(&mut self, entity: Entity) {
        let Some(attack) = self.sprite(entity).and_then(|s| s.behaviors.attack_line) else {
            return;
        };
        let x = attack.start.x + (attack.ticks as f32 * attack.velocity.0) as i32;
        let y = attack.start.y + (attack.ticks as f32 * attack.velocity.1) as i32;
        self.move_to(entity, x, y, true);
        self.recompute_direction(entity);
    }

    /// The charge may already have been cut short by a collision hook.
    fn finish_attack_if_spent(&mut self, entity: Entity) {
        let spent = self
            .sprite(entity)
            .and_then(|s| s.behaviors.attack_line)
            .is_some_and(|a| a.attacking && a.ticks >= a.max_ticks);
        if spent {
            self.stop_attacking(entity);
        }
    }

    /// End a charge: stand still, go back to wandering, cool down.
    pub fn stop_attacking(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        let Some(attack) = sprite.behaviors.attack_line.as_mut() else {
            return;
        };
        attack.attacking = false;
        attack.can_attack = false;
        sprite.velocity = Vec2i::ZERO;

        self.wander(entity);
        self.timers
            .schedule(tuning::ATTACK_COOLDOWN_MS, TimerAction::AllowAttack(entity), true);
    }

    fn player_rect(&self) -> Option<Rect> {
        self.player().and_then(|p| self.sprite(p)).map(|s| s.rect)
    }
}

/// Set the velocity component along the facing axis, keeping the other.
fn update_velocity(sprite: &mut Sprite, speed: i32) {
    let unit = sprite.direction.unit();
    if sprite.direction.is_horizontal() {
        sprite.velocity.x = unit.x * speed;
    } else {
        sprite.velocity.y = unit.y * speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::{BehaviorTag, Behaviors, EntityKind, TileVisual};
    use crate::world::LayerId;

    const FRAME_MS: f32 = 1000.0 / 30.0;

    fn world() -> (World, LayerId) {
        let mut world = World::new(Rect::new(0, 0, 4096, 4096), 4, 42);
        let main = world.add_layer("main", 1, true);
        (world, main)
    }

    fn add_enemy(world: &mut World, layer: LayerId, x: i32, y: i32, tags: &[BehaviorTag]) -> Entity {
        let entity = world.spawn(Sprite::enemy("infected", x, y, Behaviors::with_tags(tags)));
        world.add_to_layer(entity, layer);
        entity
    }

    #[test]
    fn test_player_direction_controls() {
        let (mut world, _) = world();
        let player = world.spawn_player(Vec2i::new(500, 500));

        world.move_direction(player, Direction::Right);
        world.move_direction(player, Direction::Down);
        assert_eq!(world.sprite(player).unwrap().velocity, Vec2i::new(4, 4));

        world.set_running(player, true);
        assert_eq!(world.sprite(player).unwrap().velocity, Vec2i::new(8, 8));
        assert_eq!(world.sprite(player).unwrap().frame_state, FrameState::Running);

        world.stop_moving_direction(player, Direction::Down);
        let sprite = world.sprite(player).unwrap();
        assert_eq!(sprite.velocity, Vec2i::new(8, 0));
        assert_eq!(sprite.direction, Direction::Right);

        world.stop_moving_direction(player, Direction::Right);
        let sprite = world.sprite(player).unwrap();
        assert!(sprite.velocity.is_zero());
        assert_eq!(sprite.frame_state, FrameState::Default);
    }

    #[test]
    fn test_tick_moves_by_velocity() {
        let (mut world, main) = world();
        let player = world.spawn_player(Vec2i::new(500, 500));
        world.start();
        world.move_direction(player, Direction::Left);

        world.tick_layer(main);
        assert_eq!(world.sprite(player).unwrap().rect.x, 496);
    }

    #[test]
    fn test_walking_animation_advances_frames() {
        let (mut world, _) = world();
        let player = world.spawn_player(Vec2i::new(500, 500));
        world.move_direction(player, Direction::Up);

        for _ in 0..5 {
            world.advance_timers(FRAME_MS);
        }
        assert_eq!(world.sprite(player).unwrap().anim_frame, 1);

        world.stop_moving_direction(player, Direction::Up);
        assert_eq!(world.sprite(player).unwrap().anim_frame, 0);
        for _ in 0..10 {
            world.advance_timers(FRAME_MS);
        }
        assert_eq!(world.sprite(player).unwrap().anim_frame, 0);
    }

    #[test]
    fn test_wander_starts_with_level_and_stops() {
        let (mut world, main) = world();
        let enemy = add_enemy(&mut world, main, 1000, 1000, &[BehaviorTag::Wander]);
        world.start();

        let sprite = world.sprite(enemy).unwrap();
        assert!(sprite.behaviors.wander.unwrap().timer.is_some());
        assert_eq!(sprite.frame_state, FrameState::Wandering);

        world.stop();
        let sprite = world.sprite(enemy).unwrap();
        assert!(sprite.behaviors.wander.unwrap().timer.is_none());
        assert!(sprite.velocity.is_zero());
    }

    #[test]
    fn test_generated_direction_uses_move_speed() {
        let (mut world, main) = world();
        let enemy = add_enemy(&mut world, main, 1000, 1000, &[BehaviorTag::Wander]);
        for _ in 0..20 {
            world.generate_direction(enemy);
            let v = world.sprite(enemy).unwrap().velocity;
            assert!(!v.is_zero());
            assert!(v.x.abs() == tuning::MOVE_SPEED || v.x == 0);
            assert!(v.y.abs() == tuning::MOVE_SPEED || v.y == 0);
        }
    }

    #[test]
    fn test_chase_shows_marker_then_follows() {
        let (mut world, main) = world();
        world.spawn_player(Vec2i::new(1000, 1000));
        let chaser = add_enemy(&mut world, main, 1200, 1000, &[BehaviorTag::Chase]);
        world.start();

        world.tick_layer(main);
        let chase = world.sprite(chaser).unwrap().behaviors.chase.unwrap();
        let marker = chase.exclamation.expect("marker shown");
        assert!(!chase.following);
        assert_eq!(world.sprite(marker).unwrap().kind, EntityKind::Marker);
        assert!(!world.sprite(chaser).unwrap().is_started());

        for _ in 0..25 {
            world.advance_timers(FRAME_MS);
        }
        assert!(!world.is_alive(marker));
        let chase = world.sprite(chaser).unwrap().behaviors.chase.unwrap();
        assert!(chase.following);

        world.tick_layer(main);
        world.tick_layer(main);
        let sprite = world.sprite(chaser).unwrap();
        assert_eq!(sprite.velocity, Vec2i::new(-tuning::MOVE_SPEED, 0));
        assert_eq!(sprite.direction, Direction::Left);
        assert!(sprite.rect.x < 1200);
    }

    #[test]
    fn test_marker_goes_with_its_chaser() {
        let (mut world, main) = world();
        world.spawn_player(Vec2i::new(1000, 1000));
        let chaser = add_enemy(&mut world, main, 1200, 1000, &[BehaviorTag::Chase]);
        let other = add_enemy(&mut world, main, 1000, 1250, &[BehaviorTag::Chase]);
        world.start();

        world.tick_layer(main);
        let marker_of = |world: &World, e: Entity| world.sprite(e).unwrap().behaviors.chase.unwrap().exclamation;
        let marker = marker_of(&world, chaser).unwrap();
        let other_marker = marker_of(&world, other).unwrap();
        assert!(world.layer(main).index().contains(marker));

        world.despawn(chaser);
        world.flush_despawns();
        assert!(!world.is_alive(marker));
        assert!(!world.layer(main).index().contains(marker));
        assert!(world.is_alive(other_marker));

        // Detaching without despawning takes the marker down too
        world.remove(other);
        assert!(world.is_alive(other));
        assert!(!world.is_alive(other_marker));
        assert_eq!(marker_of(&world, other), None);

        for _ in 0..100 {
            world.advance_timers(FRAME_MS);
        }
        let markers = world.sprites().filter(|(_, s)| s.kind == EntityKind::Marker).count();
        assert_eq!(markers, 0);
    }

    #[test]
    fn test_attack_line_charges_then_cools_down() {
        let (mut world, main) = world();
        world.spawn_player(Vec2i::new(1000, 1000));
        let attacker = add_enemy(&mut world, main, 1300, 1000, &[BehaviorTag::AttackLine]);
        world.start();

        world.tick_layer(main);
        let attack = world.sprite(attacker).unwrap().behaviors.attack_line.unwrap();
        assert!(attack.attacking);
        assert!(world.sprite(attacker).unwrap().rect.x < 1300);

        // Runs until it hits the player or the tick budget runs out
        for _ in 0..100 {
            world.tick_layer(main);
        }
        let attack = world.sprite(attacker).unwrap().behaviors.attack_line.unwrap();
        assert!(!attack.attacking);
        assert!(!attack.can_attack);

        for _ in 0..61 {
            world.advance_timers(FRAME_MS);
        }
        assert!(world.sprite(attacker).unwrap().behaviors.attack_line.unwrap().can_attack);
    }

    #[test]
    fn test_attack_stops_on_collision() {
        let (mut world, main) = world();
        world.spawn_player(Vec2i::new(1000, 1000));
        let attacker = add_enemy(&mut world, main, 1300, 1000, &[BehaviorTag::AttackLine]);
        let wall = world.spawn(Sprite::tile(
            Rect::new(1250, 900, 32, 300),
            TileVisual { file: 0, offset: Vec2i::ZERO },
        ));
        world.add_to_layer(wall, main);
        world.start();

        for _ in 0..10 {
            world.tick_layer(main);
        }
        let attack = world.sprite(attacker).unwrap().behaviors.attack_line.unwrap();
        assert!(!attack.attacking);
        assert!(world.sprite(attacker).unwrap().collision_bounds().left() >= 1282);
    }
}
