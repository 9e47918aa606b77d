//! Trigger Zones
//!
//! An `EventZone` is a named set of world-space rects that tracks which of
//! its watched entities currently overlap it. Membership is edge-triggered:
//! an entity produces `Entered` once when it starts overlapping, `Exited`
//! once when it stops, and `MovedInside` for moves in between.
//!
//! Zones belong to a [`ZoneRegistry`] owned by the loaded level. The
//! movement pipeline hands every finished move to the registry, which is
//! the only way a zone learns about movement.

use hashbrown::HashSet;

use super::rect::Rect;
use crate::game::event::{EventQueue, ZoneEvent, ZoneEventKind};
use crate::game::Entity;

#[derive(Debug, Clone)]
pub struct EventZone {
    name: String,
    rects: Vec<Rect>,
    inside: HashSet<Entity>,
    watched: HashSet<Entity>,
    connected: bool,
    /// Disconnect after the first entry
    one_shot: bool,
}

impl EventZone {
    pub fn new(name: impl Into<String>, rects: Vec<Rect>) -> Self {
        Self {
            name: name.into(),
            rects,
            inside: HashSet::new(),
            watched: HashSet::new(),
            connected: true,
            one_shot: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    /// Start observing an entity's moves. Ignored once disconnected.
    pub fn watch(&mut self, entity: Entity) {
        if self.connected {
            self.watched.insert(entity);
        }
    }

    pub fn is_watching(&self, entity: Entity) -> bool {
        self.watched.contains(&entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.inside.contains(&entity)
    }

    /// Does any of `hitboxes` overlap any zone rect?
    pub fn overlaps(&self, hitboxes: &[Rect]) -> bool {
        hitboxes.iter().any(|r| r.collide_index(&self.rects).is_some())
    }

    /// Feed a finished move. Returns the transition it caused, if any.
    pub fn observe(&mut self, entity: Entity, hitboxes: &[Rect]) -> Option<ZoneEventKind> {
        if !self.connected || !self.watched.contains(&entity) {
            return None;
        }

        let now_inside = self.overlaps(hitboxes);
        let was_inside = self.inside.contains(&entity);
        match (was_inside, now_inside) {
            (false, true) => {
                self.inside.insert(entity);
                Some(ZoneEventKind::Entered)
            }
            (true, true) => Some(ZoneEventKind::MovedInside),
            (true, false) => {
                self.inside.remove(&entity);
                Some(ZoneEventKind::Exited)
            }
            (false, false) => None,
        }
    }

    /// Stop observing everything. Returns false if already disconnected.
    ///
    /// Registered zones disconnect through [`ZoneRegistry::remove_zone`],
    /// which also drops them from the registry.
    pub(super) fn disconnect(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        self.connected = false;
        self.watched.clear();
        self.inside.clear();
        true
    }

    /// Drop all state about an entity that left the world.
    pub fn forget(&mut self, entity: Entity) {
        self.watched.remove(&entity);
        self.inside.remove(&entity);
    }
}

/// The zones of one loaded level, in declaration order.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<EventZone>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone, replacing any zone with the same name.
    pub fn add(&mut self, zone: EventZone) {
        if let Some(pos) = self.position(zone.name()) {
            log::warn!("Replacing duplicate event zone '{}'", zone.name());
            self.zones[pos].disconnect();
            self.zones[pos] = zone;
        } else {
            self.zones.push(zone);
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&EventZone> {
        self.zones.iter().find(|z| z.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EventZone> {
        self.zones.iter_mut().find(|z| z.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventZone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Have every zone watch `entity` (the player, typically).
    pub fn watch_all(&mut self, entity: Entity) {
        for zone in &mut self.zones {
            zone.watch(entity);
        }
    }

    /// Make a zone disconnect itself after its first entry.
    pub fn connect_enter_once(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(zone) => {
                zone.one_shot = true;
                true
            }
            None => false,
        }
    }

    /// Disconnect and drop a zone. Unknown names are a no-op.
    pub fn remove_zone(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(pos) => {
                let mut zone = self.zones.remove(pos);
                zone.disconnect();
                log::debug!("Removed event zone '{}'", name);
                true
            }
            None => false,
        }
    }

    /// Route a finished move through every zone, publishing transitions.
    pub fn observe_move(&mut self, entity: Entity, hitboxes: &[Rect], out: &mut EventQueue<ZoneEvent>) {
        let mut spent = Vec::new();
        for (pos, zone) in self.zones.iter_mut().enumerate() {
            let Some(kind) = zone.observe(entity, hitboxes) else {
                continue;
            };
            if kind != ZoneEventKind::MovedInside {
                log::debug!("{} {:?} zone '{}'", entity, kind, zone.name());
            }
            out.send(ZoneEvent {
                zone: zone.name().to_string(),
                entity,
                kind,
            });
            if kind == ZoneEventKind::Entered && zone.one_shot {
                spent.push(pos);
            }
        }
        for pos in spent.into_iter().rev() {
            let mut zone = self.zones.remove(pos);
            zone.disconnect();
            log::debug!("One-shot zone '{}' disconnected", zone.name());
        }
    }

    /// Fire `Activated` on every zone currently containing `entity`.
    pub fn activate(&self, entity: Entity, out: &mut EventQueue<ZoneEvent>) -> usize {
        let mut fired = 0;
        for zone in self.zones.iter().filter(|z| z.contains(entity)) {
            out.send(ZoneEvent {
                zone: zone.name().to_string(),
                entity,
                kind: ZoneEventKind::Activated,
            });
            fired += 1;
        }
        fired
    }

    pub fn forget(&mut self, entity: Entity) {
        for zone in &mut self.zones {
            zone.forget(entity);
        }
    }

    pub fn clear(&mut self) {
        for zone in &mut self.zones {
            zone.disconnect();
        }
        self.zones.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(queue: &mut EventQueue<ZoneEvent>) -> Vec<ZoneEventKind> {
        queue.drain().map(|e| e.kind).collect()
    }

    #[test]
    fn test_edge_triggered_membership() {
        let entity = Entity::new(0, 0);
        let mut zone = EventZone::new("cave", vec![Rect::new(100, 100, 50, 50)]);
        zone.watch(entity);

        assert_eq!(zone.observe(entity, &[Rect::new(0, 0, 10, 10)]), None);
        assert_eq!(zone.observe(entity, &[Rect::new(95, 95, 10, 10)]), Some(ZoneEventKind::Entered));
        assert_eq!(zone.observe(entity, &[Rect::new(110, 110, 10, 10)]), Some(ZoneEventKind::MovedInside));
        assert_eq!(zone.observe(entity, &[Rect::new(120, 120, 10, 10)]), Some(ZoneEventKind::MovedInside));
        assert_eq!(zone.observe(entity, &[Rect::new(150, 150, 10, 10)]), Some(ZoneEventKind::Exited));
        assert_eq!(zone.observe(entity, &[Rect::new(300, 300, 10, 10)]), None);
    }

    #[test]
    fn test_unwatched_entities_are_ignored() {
        let mut zone = EventZone::new("cave", vec![Rect::new(0, 0, 50, 50)]);
        assert_eq!(zone.observe(Entity::new(3, 0), &[Rect::new(0, 0, 10, 10)]), None);
    }

    #[test]
    fn test_any_hitbox_counts() {
        let entity = Entity::new(0, 0);
        let mut zone = EventZone::new("gate", vec![Rect::new(0, 0, 10, 10), Rect::new(100, 0, 10, 10)]);
        zone.watch(entity);
        let hitboxes = [Rect::new(50, 50, 5, 5), Rect::new(102, 2, 4, 4)];
        assert_eq!(zone.observe(entity, &hitboxes), Some(ZoneEventKind::Entered));
    }

    #[test]
    fn test_disconnect_stops_firing() {
        let entity = Entity::new(0, 0);
        let mut zone = EventZone::new("cave", vec![Rect::new(0, 0, 50, 50)]);
        zone.watch(entity);
        assert!(zone.disconnect());
        assert!(!zone.disconnect());
        assert_eq!(zone.observe(entity, &[Rect::new(0, 0, 10, 10)]), None);
        zone.watch(entity);
        assert!(!zone.is_watching(entity));
    }

    #[test]
    fn test_registry_one_shot_zone() {
        let entity = Entity::new(0, 0);
        let mut registry = ZoneRegistry::new();
        registry.add(EventZone::new("intro", vec![Rect::new(0, 0, 50, 50)]));
        registry.add(EventZone::new("cave", vec![Rect::new(0, 0, 50, 50)]));
        registry.watch_all(entity);
        assert!(registry.connect_enter_once("intro"));
        assert!(!registry.connect_enter_once("missing"));

        let mut out = EventQueue::new();
        registry.observe_move(entity, &[Rect::new(10, 10, 5, 5)], &mut out);
        assert_eq!(kinds(&mut out), vec![ZoneEventKind::Entered, ZoneEventKind::Entered]);
        assert!(registry.get("intro").is_none());

        registry.observe_move(entity, &[Rect::new(200, 200, 5, 5)], &mut out);
        let events: Vec<_> = out.drain().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].zone, "cave");
        assert_eq!(events[0].kind, ZoneEventKind::Exited);
    }

    #[test]
    fn test_activate_only_containing_zones() {
        let entity = Entity::new(0, 0);
        let mut registry = ZoneRegistry::new();
        registry.add(EventZone::new("door", vec![Rect::new(0, 0, 50, 50)]));
        registry.add(EventZone::new("well", vec![Rect::new(500, 500, 50, 50)]));
        registry.watch_all(entity);

        let mut out = EventQueue::new();
        registry.observe_move(entity, &[Rect::new(10, 10, 5, 5)], &mut out);
        out.clear();

        assert_eq!(registry.activate(entity, &mut out), 1);
        let events: Vec<_> = out.drain().collect();
        assert_eq!(events[0].zone, "door");
        assert_eq!(events[0].kind, ZoneEventKind::Activated);
    }

    #[test]
    fn test_remove_zone() {
        let entity = Entity::new(0, 0);
        let mut registry = ZoneRegistry::new();
        registry.add(EventZone::new("door", vec![Rect::new(0, 0, 50, 50)]));
        registry.add(EventZone::new("well", vec![Rect::new(0, 0, 50, 50)]));
        registry.watch_all(entity);

        assert!(registry.remove_zone("door"));
        assert!(!registry.remove_zone("door"));
        let names: Vec<_> = registry.iter().map(|z| z.name()).collect();
        assert_eq!(names, ["well"]);

        let mut out = EventQueue::new();
        registry.observe_move(entity, &[Rect::new(10, 10, 5, 5)], &mut out);
        let zones: Vec<_> = out.drain().map(|e| e.zone).collect();
        assert_eq!(zones, ["well"]);
    }
}
