//! Per-Entity Storage
//!
//! `ComponentStorage<T>` maps entity handles to values with a sparse vector
//! indexed by slot. Each occupied slot remembers the generation it was
//! written for, so a stale handle never reads the data of whichever entity
//! now owns the slot. Used for sprite records and for spatial-index
//! membership.

use super::entity::Entity;

pub struct ComponentStorage<T> {
    slots: Vec<Option<(u32, T)>>,
}

impl<T> ComponentStorage<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Insert or replace the value for an entity, returning the old one.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        let idx = entity.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx]
            .replace((entity.generation(), value))
            .and_then(|(gen, old)| (gen == entity.generation()).then_some(old))
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        if !self.contains(entity) {
            return None;
        }
        self.slots[entity.index() as usize].take().map(|(_, value)| value)
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        match self.slots.get(entity.index() as usize)? {
            Some((gen, value)) if *gen == entity.generation() => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        match self.slots.get_mut(entity.index() as usize)? {
            Some((gen, value)) if *gen == entity.generation() => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    /// Iterate over every stored (entity, value) pair in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref()
                .map(|(gen, value)| (Entity::new(idx as u32, *gen), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            slot.as_mut()
                .map(|(gen, value)| (Entity::new(idx as u32, *gen), value))
        })
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}
