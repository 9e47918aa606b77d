//! Game World
//!
//! The World is the container for everything in one loaded level:
//! - Entity allocation and sprite records
//! - The level's layers (each with its spatial index and tick list)
//! - Trigger zones, timers and the per-frame event queues
//! - Deferred despawn (so hooks can kill entities mid-iteration)
//!
//! Movement and collision live in `collision.rs`; per-kind ticking and the
//! input-facing movement methods live in `behavior.rs`. Both are further
//! `impl World` blocks.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::component::ComponentStorage;
use super::components::{tuning, Behaviors, EntityKind};
use super::entity::{Entity, EntityAllocator};
use super::event::{DamageEvent, DeathEvent, Events};
use super::sprite::Sprite;
use super::timer::{TimerAction, Timers};
use crate::config::EngineConfig;
use crate::world::{EventZone, Layer, LayerId, LevelDesc, Query, Rect, SpawnKind, Vec2i, ZoneRegistry};

pub struct World {
    /// Entity allocator for creating/destroying entities
    entities: EntityAllocator,

    /// Entities queued for despawn at end of frame
    despawn_queue: Vec<Entity>,

    sprites: ComponentStorage<Sprite>,

    /// In level order; `LayerId(i)` addresses `layers[i]`
    layers: Vec<Layer>,
    main_layer: Option<LayerId>,

    /// Pixel bounds of the level
    bounds: Rect,
    quadtree_depth: u32,

    player: Option<Entity>,
    started: bool,

    pub zones: ZoneRegistry,
    pub timers: Timers,
    pub events: Events,
    pub(crate) rng: StdRng,
}

impl World {
    /// An empty world with no layers.
    pub fn new(bounds: Rect, quadtree_depth: u32, seed: u64) -> Self {
        Self {
            entities: EntityAllocator::new(),
            despawn_queue: Vec::new(),
            sprites: ComponentStorage::new(),
            layers: Vec::new(),
            main_layer: None,
            bounds,
            quadtree_depth,
            player: None,
            started: false,
            zones: ZoneRegistry::new(),
            timers: Timers::new(),
            events: Events::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Layers and trigger zones for a level. Tiles are streamed in
    /// separately by the chunk loader.
    pub fn for_level(desc: &LevelDesc, config: &EngineConfig) -> Self {
        let bounds = desc.pixel_bounds(config.tile_width, config.tile_height);
        let mut world = Self::new(bounds, config.quadtree_depth, config.seed);
        for layer in &desc.layers {
            world.add_layer(layer.name.clone(), layer.index, layer.is_main);
        }
        for (name, rect) in desc.zone_rects(config.tile_width, config.tile_height) {
            world.zones.add(EventZone::new(name, vec![rect]));
        }
        world
    }

    // =========================================================================
    // Layers
    // =========================================================================

    pub fn add_layer(&mut self, name: impl Into<String>, z: usize, is_main: bool) -> LayerId {
        let id = LayerId(self.layers.len());
        self.layers
            .push(Layer::new(name, z, is_main, self.bounds, self.quadtree_depth));
        if is_main {
            self.main_layer = Some(id);
        }
        id
    }

    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.0]
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut Layer {
        &mut self.layers[id.0]
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().position(|l| l.name() == name).map(LayerId)
    }

    pub fn main_layer(&self) -> Option<LayerId> {
        self.main_layer
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer ids sorted back to front
    pub fn draw_order(&self) -> Vec<LayerId> {
        let mut ids: Vec<_> = (0..self.layers.len()).map(LayerId).collect();
        ids.sort_by_key(|id| self.layers[id.0].z());
        ids
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    // =========================================================================
    // Entity Management
    // =========================================================================

    /// Create an entity for a sprite. It is not on any layer yet.
    pub fn spawn(&mut self, mut sprite: Sprite) -> Entity {
        let entity = self.entities.allocate();
        sprite.layer = None;
        sprite.started = false;
        self.sprites.insert(entity, sprite);
        entity
    }

    /// Queue an entity for despawn at end of frame.
    pub fn despawn(&mut self, entity: Entity) {
        if self.is_alive(entity) && !self.despawn_queue.contains(&entity) {
            self.despawn_queue.push(entity);
        }
    }

    /// Detach from its layer, forget zone and timer state, free the handle.
    /// Despawning a dead handle is a no-op returning false.
    pub fn despawn_immediate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.remove_from_layer(entity);
        self.zones.forget(entity);
        self.timers.cancel_for(entity);
        if self.player == Some(entity) {
            self.player = None;
        }
        self.sprites.remove(entity);
        self.entities.free(entity)
    }

    /// Process all queued despawns. Call at end of frame.
    pub fn flush_despawns(&mut self) {
        let queue = std::mem::take(&mut self.despawn_queue);
        for entity in queue {
            self.despawn_immediate(entity);
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    pub fn sprite(&self, entity: Entity) -> Option<&Sprite> {
        self.sprites.get(entity)
    }

    pub fn sprite_mut(&mut self, entity: Entity) -> Option<&mut Sprite> {
        self.sprites.get_mut(entity)
    }

    pub fn sprites(&self) -> impl Iterator<Item = (Entity, &Sprite)> {
        self.sprites.iter()
    }

    pub(crate) fn expect_sprite(&self, entity: Entity) -> &Sprite {
        match self.sprites.get(entity) {
            Some(sprite) => sprite,
            None => panic!("{} is not a live entity", entity),
        }
    }

    pub(crate) fn expect_sprite_mut(&mut self, entity: Entity) -> &mut Sprite {
        match self.sprites.get_mut(entity) {
            Some(sprite) => sprite,
            None => panic!("{} is not a live entity", entity),
        }
    }

    pub fn player(&self) -> Option<Entity> {
        self.player
    }

    pub fn set_player(&mut self, entity: Option<Entity>) {
        self.player = entity;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // =========================================================================
    // Layer Membership
    // =========================================================================

    /// Attach a sprite to a layer: tick list (if it ticks and is visible),
    /// spatial index (if indexed), then its `on_added` setup. Panics if the
    /// entity is dead or already on a layer.
    pub fn add_to_layer(&mut self, entity: Entity, id: LayerId) {
        let sprite = self.expect_sprite_mut(entity);
        assert!(
            sprite.layer.is_none(),
            "{} already belongs to layer {:?}",
            entity,
            sprite.layer
        );
        sprite.layer = Some(id);
        let (ticks, indexed, movable, rect) = (sprite.ticks && sprite.visible, sprite.indexed, sprite.movable, sprite.rect);

        let layer = &mut self.layers[id.0];
        if ticks {
            layer.add_ticking(entity);
        }
        if indexed {
            layer.index_mut().insert(entity, rect, movable);
        }

        self.on_added(entity);
        if self.started {
            self.start_entity(entity);
        }
    }

    /// Symmetric teardown of `add_to_layer`. Returns false if the entity was
    /// not on a layer (or is dead).
    pub fn remove_from_layer(&mut self, entity: Entity) -> bool {
        let Some(sprite) = self.sprites.get(entity) else {
            return false;
        };
        let Some(id) = sprite.layer else {
            return false;
        };

        let layer = &mut self.layers[id.0];
        layer.remove_ticking(entity);
        if layer.index().contains(entity) {
            layer.index_mut().remove(entity);
        }

        self.on_removed(entity);
        if let Some(sprite) = self.sprites.get_mut(entity) {
            sprite.layer = None;
        }
        true
    }

    /// Post-attach setup: animated sprites get their (stopped) frame timer.
    fn on_added(&mut self, entity: Entity) {
        let sprite = self.expect_sprite(entity);
        if sprite.is_animated() && sprite.anim_timer.is_none() {
            let timer = self
                .timers
                .schedule_stopped(tuning::ANIM_MS, TimerAction::AnimFrame(entity));
            self.expect_sprite_mut(entity).anim_timer = Some(timer);
        }
    }

    /// Pre-detach teardown: every timer owned by the entity is dropped, so
    /// transient state driven by timers is reset too.
    fn on_removed(&mut self, entity: Entity) {
        self.timers.cancel_for(entity);
        let sprite = self.expect_sprite_mut(entity);
        sprite.started = false;
        sprite.anim_timer = None;
        sprite.flash_hidden = false;
        if let Some(health) = sprite.health.as_mut() {
            health.invulnerable = false;
        }
        if let Some(wander) = sprite.behaviors.wander.as_mut() {
            wander.timer = None;
        }
        if let Some(player) = sprite.behaviors.player.as_mut() {
            player.blink_timer = None;
        }
        // The marker's only cleanup was the chaser's timer, cancelled above
        let marker = sprite.behaviors.chase.as_mut().and_then(|chase| chase.exclamation.take());
        if let Some(marker) = marker {
            self.despawn_immediate(marker);
        }
    }

    /// Make a sprite visible again; it rejoins its layer's tick list.
    pub fn show(&mut self, entity: Entity) -> bool {
        self.set_visible(entity, true)
    }

    /// Hide a sprite; it leaves the tick list but stays indexed.
    pub fn hide(&mut self, entity: Entity) -> bool {
        self.set_visible(entity, false)
    }

    fn set_visible(&mut self, entity: Entity, visible: bool) -> bool {
        let Some(sprite) = self.sprites.get_mut(entity) else {
            return false;
        };
        if sprite.visible == visible {
            return false;
        }
        sprite.visible = visible;
        if let Some(id) = sprite.layer {
            let ticks = sprite.ticks;
            let layer = &mut self.layers[id.0];
            if visible && ticks {
                layer.add_ticking(entity);
            } else {
                layer.remove_ticking(entity);
            }
        }
        true
    }

    /// Hide and detach from the layer, keeping the entity alive.
    pub fn remove(&mut self, entity: Entity) -> bool {
        self.hide(entity);
        self.remove_from_layer(entity)
    }

    // =========================================================================
    // Frame Step
    // =========================================================================

    /// Tick every entity on the layer's tick list, in insertion order.
    /// Entities that leave the list mid-tick are skipped.
    pub fn tick_layer(&mut self, id: LayerId) {
        self.tick_layer_with(id, World::tick_entity);
    }

    /// Walk a snapshot of the tick list, running `step` for each entity
    /// still on it.
    pub(crate) fn tick_layer_with(&mut self, id: LayerId, mut step: impl FnMut(&mut World, Entity)) {
        for entity in self.layers[id.0].tick_snapshot() {
            if !self.layers[id.0].is_ticking(entity) || !self.is_alive(entity) {
                continue;
            }
            step(self, entity);
        }
    }

    /// Tick every layer in level order.
    pub fn tick(&mut self) {
        for i in 0..self.layers.len() {
            self.tick_layer(LayerId(i));
        }
    }

    /// Advance timers by one frame and run whatever came due.
    pub fn advance_timers(&mut self, dt_ms: f32) {
        for action in self.timers.advance(dt_ms) {
            if self.is_alive(action.owner()) {
                self.run_timer_action(action);
            }
        }
    }

    pub fn iterate_in_rect(&mut self, id: LayerId, rect: Rect) -> Query<'_> {
        self.layers[id.0].iterate_in_rect(rect)
    }

    /// Drawn entities of a layer inside `rect`, sorted by (top, left) for
    /// back-to-front painting.
    pub fn visible_in_rect(&mut self, id: LayerId, rect: Rect) -> Vec<Entity> {
        let found: Vec<Entity> = self.layers[id.0].iterate_in_rect(rect).collect();
        let mut drawn: Vec<(i32, i32, Entity)> = found
            .into_iter()
            .filter_map(|e| {
                let sprite = self.sprites.get(e)?;
                sprite.is_drawn().then_some((sprite.rect.top(), sprite.rect.left(), e))
            })
            .collect();
        drawn.sort_unstable();
        drawn.into_iter().map(|(_, _, e)| e).collect()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start every layer.
    pub fn start(&mut self) {
        self.started = true;
        for i in 0..self.layers.len() {
            self.start_layer(LayerId(i));
        }
    }

    pub fn stop(&mut self) {
        self.started = false;
        for i in 0..self.layers.len() {
            self.stop_layer(LayerId(i));
        }
    }

    /// Start every entity indexed on the layer.
    pub fn start_layer(&mut self, id: LayerId) {
        let members: Vec<Entity> = self.layers[id.0].iter_all().collect();
        for entity in members {
            self.start_entity(entity);
        }
    }

    pub fn stop_layer(&mut self, id: LayerId) {
        let members: Vec<Entity> = self.layers[id.0].iter_all().collect();
        for entity in members {
            self.stop_entity(entity);
        }
    }

    // =========================================================================
    // Combat
    // =========================================================================

    /// Hit an entity. Returns true if the hit defeated it.
    ///
    /// A defeated non-player is queued for despawn; player defeat is left
    /// to the runtime (lives / respawn). A surviving player becomes
    /// invulnerable for a while and blinks.
    pub fn apply_damage(&mut self, target: Entity, amount: u32, source: Option<Entity>) -> bool {
        let Some(sprite) = self.sprites.get_mut(target) else {
            return false;
        };
        let Some(health) = sprite.health.as_mut() else {
            return false;
        };
        if health.invulnerable || health.is_dead() {
            return false;
        }

        let defeated = health.damage(amount);
        let remaining = health.current;
        let kind = sprite.kind;
        let position = sprite.rect.top_left();
        let is_player = sprite.behaviors.player.is_some();

        self.events.damage.send(DamageEvent {
            target,
            source,
            amount,
            remaining,
        });

        if defeated {
            log::debug!("{} ({:?}) defeated", target, kind);
            self.events.death.send(DeathEvent {
                entity: target,
                kind,
                position,
            });
            if !is_player {
                self.despawn(target);
            }
        } else if is_player {
            self.begin_invulnerability(target);
        }
        defeated
    }

    fn begin_invulnerability(&mut self, entity: Entity) {
        let blink = self.timers.schedule(tuning::BLINK_MS, TimerAction::Blink(entity), false);
        self.timers
            .schedule(tuning::INVULNERABLE_MS, TimerAction::EndInvulnerable(entity), true);

        let sprite = self.expect_sprite_mut(entity);
        if let Some(health) = sprite.health.as_mut() {
            health.invulnerable = true;
        }
        let old = sprite
            .behaviors
            .player
            .as_mut()
            .and_then(|p| p.blink_timer.replace(blink));
        if let Some(old) = old {
            self.timers.cancel(old);
        }
    }

    pub(crate) fn end_invulnerability(&mut self, entity: Entity) {
        let sprite = self.expect_sprite_mut(entity);
        sprite.flash_hidden = false;
        if let Some(health) = sprite.health.as_mut() {
            health.invulnerable = false;
        }
        let blink = sprite.behaviors.player.as_mut().and_then(|p| p.blink_timer.take());
        if let Some(blink) = blink {
            self.timers.cancel(blink);
        }
    }

    // =========================================================================
    // Convenience Spawners
    // =========================================================================

    /// Spawn the player on the main layer at a pixel position.
    pub fn spawn_player(&mut self, position: Vec2i) -> Entity {
        let entity = self.spawn(Sprite::player(0, 0));
        self.move_to(entity, position.x, position.y, false);
        if let Some(main) = self.main_layer {
            self.add_to_layer(entity, main);
        }
        self.player = Some(entity);
        entity
    }

    /// Spawn the level's characters on the main layer.
    pub fn spawn_characters(&mut self, desc: &LevelDesc, tile_width: i32, tile_height: i32) -> Vec<Entity> {
        let Some(main) = self.main_layer else {
            return Vec::new();
        };
        let mut spawned = Vec::with_capacity(desc.spawns.len());
        for spawn in &desc.spawns {
            let behaviors = Behaviors::with_tags(&spawn.behaviors);
            let (x, y) = (spawn.x * tile_width, spawn.y * tile_height);
            let sprite = match spawn.kind {
                SpawnKind::Enemy => Sprite::enemy(spawn.name.clone(), x, y, behaviors),
                SpawnKind::Npc => Sprite::npc(spawn.name.clone(), x, y, behaviors),
            };
            let entity = self.spawn(sprite);
            self.add_to_layer(entity, main);
            spawned.push(entity);
        }
        log::debug!("Spawned {} characters", spawned.len());
        spawned
    }

    /// Count of live sprites of a kind
    pub fn count_kind(&self, kind: EntityKind) -> usize {
        self.sprites.iter().filter(|(_, s)| s.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::TileVisual;

    fn world() -> (World, LayerId) {
        let mut world = World::new(Rect::new(0, 0, 1024, 1024), 4, 1);
        let main = world.add_layer("main", 1, true);
        (world, main)
    }

    fn npc(x: i32, y: i32) -> Sprite {
        Sprite::new(EntityKind::Npc, "villager", Rect::new(x, y, 32, 32))
    }

    #[test]
    fn test_spawn_and_despawn() {
        let (mut world, main) = world();
        let a = world.spawn(npc(0, 0));
        let b = world.spawn(npc(100, 0));
        world.add_to_layer(a, main);
        world.add_to_layer(b, main);
        assert_eq!(world.entity_count(), 2);

        assert!(world.despawn_immediate(a));
        assert!(!world.despawn_immediate(a));
        assert_eq!(world.entity_count(), 1);
        assert!(!world.layer(main).index().contains(a));
        assert!(!world.layer(main).is_ticking(a));
    }

    #[test]
    fn test_add_sets_layer_and_index() {
        let (mut world, main) = world();
        let a = world.spawn(npc(10, 10));
        world.add_to_layer(a, main);

        assert_eq!(world.sprite(a).unwrap().layer, Some(main));
        assert!(world.layer(main).is_ticking(a));
        assert_eq!(world.iterate_in_rect(main, Rect::new(0, 0, 20, 20)).collect::<Vec<_>>(), vec![a]);
        // Animated sheet sprites get a frame timer on attach
        assert!(world.sprite(a).unwrap().anim_timer.is_some());
    }

    #[test]
    #[should_panic(expected = "already belongs to layer")]
    fn test_double_add_panics() {
        let (mut world, main) = world();
        let a = world.spawn(npc(0, 0));
        world.add_to_layer(a, main);
        world.add_to_layer(a, main);
    }

    #[test]
    fn test_remove_from_layer_twice_is_tolerated() {
        let (mut world, main) = world();
        let a = world.spawn(npc(0, 0));
        world.add_to_layer(a, main);
        assert!(world.remove_from_layer(a));
        assert!(!world.remove_from_layer(a));
        assert_eq!(world.sprite(a).unwrap().layer, None);
        assert_eq!(world.layer(main).index().len(), 0);
    }

    #[test]
    fn test_hidden_sprites_stop_ticking_but_stay_indexed() {
        let (mut world, main) = world();
        let a = world.spawn(npc(0, 0));
        world.add_to_layer(a, main);

        assert!(world.hide(a));
        assert!(!world.hide(a));
        assert!(!world.layer(main).is_ticking(a));
        assert!(world.layer(main).index().contains(a));
        assert!(world.visible_in_rect(main, Rect::new(0, 0, 64, 64)).is_empty());

        assert!(world.show(a));
        assert!(world.layer(main).is_ticking(a));
    }

    #[test]
    fn test_tiles_never_tick() {
        let (mut world, main) = world();
        let tile = world.spawn(Sprite::tile(
            Rect::new(64, 64, 64, 64),
            TileVisual { file: 0, offset: Vec2i::ZERO },
        ));
        world.add_to_layer(tile, main);
        assert!(!world.layer(main).is_ticking(tile));
        assert!(world.layer(main).index().contains(tile));
    }

    #[test]
    fn test_tick_list_changes_mid_tick() {
        let (mut world, main) = world();
        let [a, b, c, d] = [0, 100, 200, 300].map(|x| {
            let entity = world.spawn(npc(x, 0));
            world.add_to_layer(entity, main);
            entity
        });

        let mut late = None;
        let mut ticked = Vec::new();
        world.tick_layer_with(main, |world, entity| {
            ticked.push(entity);
            if entity == a {
                assert!(world.remove_from_layer(c));
            }
            if entity == b {
                world.despawn_immediate(d);
                let e = world.spawn(npc(400, 0));
                world.add_to_layer(e, main);
                late = Some(e);
            }
        });
        assert_eq!(ticked, vec![a, b]);
        assert!(world.is_alive(c));

        // Joiners tick from the next pass on
        let late = late.unwrap();
        let mut ticked = Vec::new();
        world.tick_layer_with(main, |_, entity| ticked.push(entity));
        assert_eq!(ticked, vec![a, b, late]);
    }

    #[test]
    fn test_visible_in_rect_sorted_by_top_then_left() {
        let (mut world, main) = world();
        let low = world.spawn(npc(0, 200));
        let right = world.spawn(npc(300, 100));
        let left = world.spawn(npc(100, 100));
        for e in [low, right, left] {
            world.add_to_layer(e, main);
        }
        assert_eq!(world.visible_in_rect(main, Rect::new(0, 0, 1024, 1024)), vec![left, right, low]);
    }

    #[test]
    fn test_deferred_despawn() {
        let (mut world, main) = world();
        let a = world.spawn(npc(0, 0));
        world.add_to_layer(a, main);

        world.despawn(a);
        world.despawn(a);
        assert!(world.is_alive(a));
        world.flush_despawns();
        assert!(!world.is_alive(a));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_damage_defeats_and_queues_despawn() {
        let (mut world, main) = world();
        let enemy = world.spawn(Sprite::enemy("infected", 0, 0, Behaviors::default()));
        world.add_to_layer(enemy, main);

        assert!(!world.apply_damage(enemy, 4, None));
        assert!(world.apply_damage(enemy, 6, None));
        assert_eq!(world.events.damage.len(), 2);
        assert_eq!(world.events.death.len(), 1);
        // No double defeat
        assert!(!world.apply_damage(enemy, 1, None));

        world.flush_despawns();
        assert!(!world.is_alive(enemy));
    }

    #[test]
    fn test_player_hit_grants_invulnerability() {
        let (mut world, _) = world();
        let player = world.spawn_player(Vec2i::new(100, 100));

        assert!(!world.apply_damage(player, 1, None));
        assert!(!world.apply_damage(player, 1, None));
        assert_eq!(world.sprite(player).unwrap().health.unwrap().current, 2);

        // Blink toggles while invulnerable, then everything resets
        world.advance_timers(tuning::BLINK_MS as f32);
        assert!(world.sprite(player).unwrap().flash_hidden);
        world.advance_timers(tuning::INVULNERABLE_MS as f32);
        let sprite = world.sprite(player).unwrap();
        assert!(!sprite.flash_hidden);
        assert!(!sprite.health.unwrap().invulnerable);

        assert!(!world.apply_damage(player, 1, None));
        assert_eq!(world.sprite(player).unwrap().health.unwrap().current, 1);
    }

    #[test]
    fn test_for_level_builds_layers_and_zones() {
        let desc = LevelDesc::demo(40, 30);
        let config = EngineConfig::default();
        let world = World::for_level(&desc, &config);

        assert_eq!(world.layer_count(), 2);
        assert_eq!(world.main_layer(), world.layer_by_name("main"));
        assert_eq!(world.bounds(), Rect::new(0, 0, 2560, 1920));
        assert!(world.zones.get("clearing").is_some());
        assert_eq!(world.draw_order(), vec![LayerId(0), LayerId(1)]);
    }
}
