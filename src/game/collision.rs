//! Collision System
//!
//! Every move of a sprite goes through `World::move_by`:
//!
//! 1. Unchecked moves (teleports, initial placement) translate directly.
//! 2. Checked moves run as two axis-aligned sub-moves, x first then y, so a
//!    sprite sliding diagonally into a wall is stopped on one axis and keeps
//!    sliding on the other.
//! 3. Each sub-move translates, clamps the moved axis to the level, updates
//!    the spatial index, then resolves against everything the layer's index
//!    reports. Both participants' hooks run for every overlapping pair; a
//!    veto from the mover's hook rolls the sub-move back (or snaps the
//!    mover flush against the obstacle) after all hooks have run.
//! 4. The finished move is published to the trigger zones and as a
//!    `MovedEvent` carrying the delta actually applied.

use super::components::{CollisionPolicy, EntityKind};
use super::entity::Entity;
use super::event::{CollisionEndedEvent, CollisionEvent, MovedEvent};
use super::sprite::{overlapping_rects, ContactSet};
use super::world::World;
use crate::world::{Rect, Vec2i};

/// Outcome of resolving one sub-move.
struct Resolution {
    contacts: ContactSet,
    /// Hitbox pair (mover, obstacle) of the first vetoed overlap
    veto: Option<(Rect, Rect)>,
}

/// Offset that puts `mover` flush against `obstacle`, picked from the sign
/// of the sub-move (vertical wins when both axes moved).
pub fn snap_offset(mover: Rect, obstacle: Rect, delta: Vec2i) -> Vec2i {
    if delta.y < 0 {
        Vec2i::new(0, obstacle.bottom() - mover.top())
    } else if delta.y > 0 {
        Vec2i::new(0, obstacle.top() - mover.bottom())
    } else if delta.x < 0 {
        Vec2i::new(obstacle.right() - mover.left(), 0)
    } else if delta.x > 0 {
        Vec2i::new(obstacle.left() - mover.right(), 0)
    } else {
        Vec2i::ZERO
    }
}

/// Keep `rect` inside `bounds` on the axes that moved.
fn clamp_moved_axis(mut rect: Rect, bounds: Rect, delta: Vec2i) -> Rect {
    if delta.x != 0 {
        rect.x = rect.x.max(bounds.left());
        if rect.right() > bounds.right() {
            rect.x = bounds.right() - rect.w;
        }
    }
    if delta.y != 0 {
        rect.y = rect.y.max(bounds.top());
        if rect.bottom() > bounds.bottom() {
            rect.y = bounds.bottom() - rect.h;
        }
    }
    rect
}

impl World {
    /// Move to an absolute position. See [`World::move_by`].
    pub fn move_to(&mut self, entity: Entity, x: i32, y: i32, check_collisions: bool) -> Vec2i {
        let Some(sprite) = self.sprite(entity) else {
            return Vec2i::ZERO;
        };
        let (dx, dy) = (x - sprite.rect.x, y - sprite.rect.y);
        self.move_by(entity, dx, dy, check_collisions)
    }

    /// Move a sprite by a delta, returning the delta actually applied.
    ///
    /// With `check_collisions` the sprite must be on a layer; moving a dead
    /// entity does nothing.
    pub fn move_by(&mut self, entity: Entity, dx: i32, dy: i32, check_collisions: bool) -> Vec2i {
        let Some(sprite) = self.sprite(entity) else {
            return Vec2i::ZERO;
        };
        let before = sprite.rect.top_left();

        if !check_collisions {
            if let Some(sprite) = self.sprite_mut(entity) {
                sprite.rect = sprite.rect.translate(dx, dy);
            }
            self.sync_index(entity);
        } else if dx != 0 || dy != 0 {
            let mut contacts = ContactSet::new();
            for delta in [Vec2i::new(dx, 0), Vec2i::new(0, dy)] {
                if delta.is_zero() || !self.is_alive(entity) {
                    continue;
                }
                for other in self.sub_move(entity, delta) {
                    if !contacts.contains(&other) {
                        contacts.push(other);
                    }
                }
            }
            self.update_contacts(entity, contacts);
        }

        let Some(sprite) = self.sprite(entity) else {
            return Vec2i::ZERO;
        };
        let applied = sprite.rect.top_left() - before;
        self.after_move(entity, applied);
        applied
    }

    /// Re-bucket a movable sprite after its rect changed.
    fn sync_index(&mut self, entity: Entity) {
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let (layer, rect) = match sprite.layer {
            Some(layer) if sprite.indexed => (layer, sprite.rect),
            _ => return,
        };
        let index = self.layer_mut(layer).index_mut();
        if index.contains(entity) {
            index.notify_moved(entity, rect);
        }
    }

    /// One axis-aligned step of a checked move. Returns the contacts made.
    fn sub_move(&mut self, entity: Entity, delta: Vec2i) -> ContactSet {
        let bounds = self.bounds();
        let sprite = self.expect_sprite_mut(entity);
        let pre = sprite.rect;
        sprite.rect = clamp_moved_axis(pre.translate(delta.x, delta.y), bounds, delta);
        self.sync_index(entity);

        let resolution = self.resolve_collisions(entity, delta);

        if let Some((mover_rect, obstacle_rect)) = resolution.veto {
            if let Some(sprite) = self.sprite_mut(entity) {
                sprite.rect = match sprite.policy {
                    CollisionPolicy::Rollback => pre,
                    CollisionPolicy::SnapBeside => {
                        let offset = snap_offset(mover_rect, obstacle_rect, delta);
                        sprite.rect.translate(offset.x, offset.y)
                    }
                };
            }
            self.sync_index(entity);
        }
        resolution.contacts
    }

    /// Run both hooks for every overlap the mover's layer reports.
    ///
    /// Panics if the mover has no layer.
    fn resolve_collisions(&mut self, entity: Entity, delta: Vec2i) -> Resolution {
        let sprite = self.expect_sprite(entity);
        let layer = match sprite.layer {
            Some(layer) => layer,
            None => panic!("{} has no layer to query for collisions", entity),
        };
        let query = sprite.collision_bounds();

        // Hooks may spawn or remove entities, so work from a snapshot
        let candidates: Vec<Entity> = self.iterate_in_rect(layer, query).collect();

        let mut resolution = Resolution {
            contacts: ContactSet::new(),
            veto: None,
        };
        for other in candidates {
            if other == entity {
                continue;
            }
            let (Some(me), Some(them)) = (self.sprite(entity), self.sprite(other)) else {
                continue;
            };
            if me.layer != Some(layer) {
                break;
            }
            if !me.collidable || !them.collidable || (!me.checks_collisions && !them.checks_collisions) {
                continue;
            }
            let Some((my_rect, their_rect)) = overlapping_rects(me, them) else {
                continue;
            };

            let their_ok = self.collision_hook(other, entity);
            self.events.collision.send(CollisionEvent {
                entity: other,
                other: entity,
                delta,
                permitted: their_ok,
            });
            let my_ok = self.collision_hook(entity, other);
            self.events.collision.send(CollisionEvent {
                entity,
                other,
                delta,
                permitted: my_ok,
            });

            resolution.contacts.push(other);
            if !my_ok && resolution.veto.is_none() {
                resolution.veto = Some((my_rect, their_rect));
            }
        }
        resolution
    }

    /// Per-kind collision response. Returns whether `owner` permits the
    /// move that caused the overlap.
    fn collision_hook(&mut self, owner: Entity, other: Entity) -> bool {
        let (Some(me), Some(them)) = (self.sprite(owner), self.sprite(other)) else {
            return true;
        };
        let (my_kind, their_kind) = (me.kind, them.kind);
        let attacking = me.behaviors.is_attacking();

        match my_kind {
            EntityKind::Tile | EntityKind::Marker => true,
            EntityKind::Player => {
                if their_kind == EntityKind::Enemy {
                    self.apply_damage(owner, 1, Some(other));
                }
                !their_kind.is_obstacle()
            }
            EntityKind::Enemy | EntityKind::Npc => {
                if attacking {
                    self.stop_attacking(owner);
                }
                !their_kind.is_obstacle()
            }
        }
    }

    /// Replace the mover's contact set, publishing the contacts it lost.
    fn update_contacts(&mut self, entity: Entity, contacts: ContactSet) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        let previous = std::mem::replace(&mut sprite.contacts, contacts.clone());
        for old in previous {
            if !contacts.contains(&old) && self.is_alive(old) {
                self.events.collision_ended.send(CollisionEndedEvent {
                    entity: old,
                    other: entity,
                });
            }
        }
    }

    /// Publish a finished move to the index, the zones and the event queue.
    fn after_move(&mut self, entity: Entity, delta: Vec2i) {
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        if sprite.layer.is_some() {
            let hitboxes = sprite.absolute_collision_rects();
            self.zones.observe_move(entity, &hitboxes, &mut self.events.zone);
        }
        self.events.moved.send(MovedEvent { entity, delta });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::{Behaviors, TileVisual};
    use crate::game::event::ZoneEventKind;
    use crate::game::sprite::Sprite;
    use crate::world::{EventZone, LayerId};

    fn world() -> (World, LayerId) {
        let mut world = World::new(Rect::new(0, 0, 1024, 1024), 4, 3);
        let main = world.add_layer("main", 1, true);
        (world, main)
    }

    fn add(world: &mut World, layer: LayerId, sprite: Sprite) -> Entity {
        let entity = world.spawn(sprite);
        world.add_to_layer(entity, layer);
        entity
    }

    fn npc(x: i32, y: i32) -> Sprite {
        Sprite::new(EntityKind::Npc, "villager", Rect::new(x, y, 32, 32))
    }

    fn wall(x: i32, y: i32, w: i32, h: i32) -> Sprite {
        Sprite::tile(Rect::new(x, y, w, h), TileVisual { file: 0, offset: Vec2i::ZERO })
    }

    fn rect_of(world: &World, entity: Entity) -> Rect {
        world.sprite(entity).unwrap().rect
    }

    #[test]
    fn test_diagonal_move_slides_along_wall() {
        let (mut world, main) = world();
        let mover = add(&mut world, main, npc(100, 100));
        add(&mut world, main, wall(134, 0, 32, 400));

        let applied = world.move_by(mover, 5, 5, true);

        assert_eq!(applied, Vec2i::new(0, 5));
        assert_eq!(rect_of(&world, mover), Rect::new(100, 105, 32, 32));
    }

    #[test]
    fn test_unchecked_move_ignores_obstacles() {
        let (mut world, main) = world();
        let mover = add(&mut world, main, npc(100, 100));
        add(&mut world, main, wall(134, 0, 32, 400));

        world.move_by(mover, 40, 0, false);
        assert_eq!(rect_of(&world, mover).x, 140);
        assert!(world.events.collision.is_empty());
    }

    #[test]
    fn test_symmetric_dispatch() {
        let (mut world, main) = world();
        let a = add(&mut world, main, npc(100, 100));
        let b = add(&mut world, main, npc(140, 100));

        world.move_by(a, 10, 0, true);

        let pairs: Vec<_> = world.events.collision.iter().map(|e| (e.entity, e.other)).collect();
        assert_eq!(pairs, vec![(b, a), (a, b)]);
        // Npcs block each other
        assert_eq!(rect_of(&world, a).x, 100);
    }

    #[test]
    fn test_rollback_keeps_hook_side_effects() {
        let (mut world, main) = world();
        let player = world.spawn_player(Vec2i::new(100, 100));
        let enemy = add(&mut world, main, Sprite::enemy("infected", 160, 100, Behaviors::default()));

        world.move_by(player, 20, 0, true);

        assert_eq!(rect_of(&world, player).x, 100);
        assert_eq!(world.sprite(player).unwrap().health.unwrap().current, 2);
        assert_eq!(world.events.damage.len(), 1);
        assert_eq!(world.events.damage.iter().next().unwrap().source, Some(enemy));
    }

    #[test]
    fn test_snap_beside_sits_flush() {
        let (mut world, main) = world();
        let mover = add(
            &mut world,
            main,
            npc(100, 100).with_policy(CollisionPolicy::SnapBeside),
        );
        add(&mut world, main, wall(140, 0, 32, 400));

        world.move_by(mover, 20, 0, true);
        assert_eq!(rect_of(&world, mover).right(), 140);
    }

    #[test]
    fn test_snap_offset_directions() {
        let obstacle = Rect::new(100, 100, 50, 50);
        let mover = Rect::new(90, 140, 20, 20);
        assert_eq!(snap_offset(mover, obstacle, Vec2i::new(0, -3)), Vec2i::new(0, 10));
        assert_eq!(snap_offset(mover, obstacle, Vec2i::new(0, 3)), Vec2i::new(0, -60));
        assert_eq!(snap_offset(mover, obstacle, Vec2i::new(3, 0)), Vec2i::new(-10, 0));
        assert_eq!(snap_offset(mover, obstacle, Vec2i::new(-3, 0)), Vec2i::new(60, 0));
    }

    #[test]
    fn test_moves_are_clamped_to_level() {
        let (mut world, main) = world();
        let mover = add(&mut world, main, npc(10, 10));
        world.move_by(mover, -50, -50, true);
        assert_eq!(rect_of(&world, mover).top_left(), Vec2i::new(0, 0));

        world.move_by(mover, 5000, 0, true);
        assert_eq!(rect_of(&world, mover).right(), 1024);
    }

    #[test]
    fn test_non_collidable_pairs_are_skipped() {
        let (mut world, main) = world();
        let mover = add(&mut world, main, npc(100, 100));
        let ghost = add(&mut world, main, npc(140, 100));
        world.sprite_mut(ghost).unwrap().collidable = false;

        world.move_by(mover, 20, 0, true);
        assert_eq!(rect_of(&world, mover).x, 120);
        assert!(world.events.collision.is_empty());
    }

    #[test]
    fn test_index_follows_moves() {
        let (mut world, main) = world();
        let mover = add(&mut world, main, npc(10, 10));
        world.move_by(mover, 700, 700, true);

        let found: Vec<_> = world.iterate_in_rect(main, Rect::new(700, 700, 50, 50)).collect();
        assert_eq!(found, vec![mover]);
        assert_eq!(world.iterate_in_rect(main, Rect::new(0, 0, 50, 50)).count(), 0);
    }

    #[test]
    fn test_contact_end_is_published() {
        let (mut world, main) = world();
        let mover = add(&mut world, main, npc(100, 100));
        let post = add(&mut world, main, wall(140, 100, 32, 32));

        world.move_by(mover, 10, 0, true);
        assert_eq!(world.sprite(mover).unwrap().contacts(), &[post]);

        world.move_by(mover, -10, 0, true);
        let ended: Vec<_> = world.events.collision_ended.iter().copied().collect();
        assert_eq!(ended, vec![CollisionEndedEvent { entity: post, other: mover }]);
    }

    #[test]
    fn test_moved_event_carries_applied_delta() {
        let (mut world, main) = world();
        let mover = add(&mut world, main, npc(100, 100));
        add(&mut world, main, wall(134, 0, 32, 400));

        world.move_by(mover, 5, 5, true);
        let moved: Vec<_> = world.events.moved.iter().copied().collect();
        assert_eq!(moved, vec![MovedEvent { entity: mover, delta: Vec2i::new(0, 5) }]);
    }

    #[test]
    fn test_zone_enter_and_exit_through_moves() {
        let (mut world, main) = world();
        world.zones.add(EventZone::new("pond", vec![Rect::new(200, 0, 100, 100)]));
        let mover = add(&mut world, main, npc(100, 10));
        world.zones.watch_all(mover);

        let mut kinds = Vec::new();
        for _ in 0..12 {
            world.move_by(mover, 20, 0, true);
            kinds.extend(world.events.zone.drain().map(|e| e.kind));
        }
        let entered = kinds.iter().filter(|k| **k == ZoneEventKind::Entered).count();
        let exited = kinds.iter().filter(|k| **k == ZoneEventKind::Exited).count();
        assert_eq!(entered, 1);
        assert_eq!(exited, 1);
        assert!(kinds.contains(&ZoneEventKind::MovedInside));
        assert_eq!(kinds.first(), Some(&ZoneEventKind::Entered));
        assert_eq!(kinds.last(), Some(&ZoneEventKind::Exited));
    }

    #[test]
    #[should_panic(expected = "has no layer")]
    fn test_checked_move_without_layer_panics() {
        let (mut world, _) = world();
        let loose = world.spawn(npc(0, 0));
        world.move_by(loose, 5, 0, true);
    }
}
