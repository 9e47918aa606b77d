//! Simulation Timers
//!
//! Delayed and periodic actions (animation frames, wander steps, attack
//! cooldowns, hit blinks) driven by the fixed frame delta instead of a wall
//! clock. `advance` is called once per frame by the runtime; actions that
//! come due are returned and the caller runs them within the same frame.
//!
//! A timer that fires resets its accumulator to zero rather than carrying
//! the remainder over, so a 150 ms timer at 30 fps fires every 5 frames.

use super::entity::Entity;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    index: u32,
    generation: u32,
}

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Advance the sprite's animation frame
    AnimFrame(Entity),
    /// Periodic wander decision
    WanderStep(Entity),
    /// Attack cooldown over
    AllowAttack(Entity),
    /// Remove the marker and start following
    ExclamationDone { chaser: Entity, marker: Entity },
    /// Toggle visibility of a hit sprite
    Blink(Entity),
    EndInvulnerable(Entity),
}

impl TimerAction {
    /// The sprite this action belongs to
    pub fn owner(&self) -> Entity {
        match *self {
            TimerAction::AnimFrame(e)
            | TimerAction::WanderStep(e)
            | TimerAction::AllowAttack(e)
            | TimerAction::Blink(e)
            | TimerAction::EndInvulnerable(e) => e,
            TimerAction::ExclamationDone { chaser, .. } => chaser,
        }
    }
}

#[derive(Debug)]
struct TimerSlot {
    generation: u32,
    ms: u32,
    elapsed: f32,
    action: TimerAction,
    one_shot: bool,
    running: bool,
    /// Cancelled slots are free for reuse
    live: bool,
}

#[derive(Debug, Default)]
pub struct Timers {
    slots: Vec<TimerSlot>,
    free: Vec<u32>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action after `ms` milliseconds. The timer starts running
    /// immediately; repeating timers keep firing until stopped.
    pub fn schedule(&mut self, ms: u32, action: TimerAction, one_shot: bool) -> TimerId {
        let slot = TimerSlot {
            generation: 0,
            ms,
            elapsed: 0.0,
            action,
            one_shot,
            running: true,
            live: true,
        };
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.slots[index as usize];
                let generation = entry.generation.wrapping_add(1);
                *entry = TimerSlot { generation, ..slot };
                TimerId { index, generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(slot);
                TimerId { index, generation: 0 }
            }
        }
    }

    /// Schedule a repeating timer that waits for an explicit `start`.
    pub fn schedule_stopped(&mut self, ms: u32, action: TimerAction) -> TimerId {
        let id = self.schedule(ms, action, false);
        self.stop(id);
        id
    }

    fn slot_mut(&mut self, id: TimerId) -> Option<&mut TimerSlot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.live && slot.generation == id.generation)
    }

    /// Start a stopped timer from zero. Starting a running timer does nothing.
    pub fn start(&mut self, id: TimerId) -> bool {
        match self.slot_mut(id) {
            Some(slot) if !slot.running => {
                slot.running = true;
                slot.elapsed = 0.0;
                true
            }
            _ => false,
        }
    }

    /// Pause a timer, keeping it scheduled.
    pub fn stop(&mut self, id: TimerId) -> bool {
        match self.slot_mut(id) {
            Some(slot) if slot.running => {
                slot.running = false;
                true
            }
            _ => false,
        }
    }

    /// Restart the countdown (and the timer, if it was stopped).
    pub fn reset(&mut self, id: TimerId) -> bool {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.elapsed = 0.0;
                slot.running = true;
                true
            }
            None => false,
        }
    }

    /// Drop a timer. Cancelling a cancelled or finished timer is a no-op.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.live = false;
                slot.running = false;
                self.free.push(id.index);
                true
            }
            None => false,
        }
    }

    /// Cancel every timer whose action belongs to `entity`.
    pub fn cancel_for(&mut self, entity: Entity) -> usize {
        let mut cancelled = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.live && slot.action.owner() == entity {
                slot.live = false;
                slot.running = false;
                self.free.push(index as u32);
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn is_running(&self, id: TimerId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.live && slot.generation == id.generation && slot.running)
    }

    /// Live (running or stopped) timers
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance every running timer by `dt_ms` and return the actions that
    /// came due, in slot order. One-shot timers are released after firing.
    pub fn advance(&mut self, dt_ms: f32) -> Vec<TimerAction> {
        let mut fired = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.live || !slot.running || slot.ms == 0 {
                continue;
            }
            slot.elapsed += dt_ms;
            if slot.elapsed >= slot.ms as f32 {
                slot.elapsed = 0.0;
                fired.push(slot.action);
                if slot.one_shot {
                    slot.live = false;
                    slot.running = false;
                    self.free.push(index as u32);
                }
            }
        }
        fired
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f32 = 1000.0 / 30.0;

    fn owner() -> Entity {
        Entity::new(0, 0)
    }

    #[test]
    fn test_repeating_timer_fires_every_interval() {
        let mut timers = Timers::new();
        timers.schedule(150, TimerAction::AnimFrame(owner()), false);

        let mut fires = 0;
        for _ in 0..15 {
            fires += timers.advance(FRAME_MS).len();
        }
        // 150 ms at 30 fps: due on the 5th frame, accumulator resets
        assert_eq!(fires, 3);
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut timers = Timers::new();
        let id = timers.schedule(100, TimerAction::AllowAttack(owner()), true);

        let mut fired = Vec::new();
        for _ in 0..10 {
            fired.extend(timers.advance(FRAME_MS));
        }
        assert_eq!(fired, vec![TimerAction::AllowAttack(owner())]);
        assert!(!timers.is_running(id));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_stop_and_restart() {
        let mut timers = Timers::new();
        let id = timers.schedule_stopped(100, TimerAction::Blink(owner()));
        assert!(!timers.is_running(id));
        assert!(timers.advance(500.0).is_empty());

        assert!(timers.start(id));
        assert!(!timers.start(id));
        assert_eq!(timers.advance(100.0).len(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent_and_stale_ids_are_dead() {
        let mut timers = Timers::new();
        let id = timers.schedule(100, TimerAction::WanderStep(owner()), false);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));

        // Slot reuse must not revive the old handle
        let fresh = timers.schedule(100, TimerAction::WanderStep(owner()), false);
        assert!(timers.is_running(fresh));
        assert!(!timers.is_running(id));
        assert!(!timers.stop(id));
    }

    #[test]
    fn test_cancel_for_entity() {
        let mut timers = Timers::new();
        let a = Entity::new(1, 0);
        let b = Entity::new(2, 0);
        timers.schedule(100, TimerAction::AnimFrame(a), false);
        timers.schedule(100, TimerAction::WanderStep(a), false);
        timers.schedule(100, TimerAction::AnimFrame(b), false);

        assert_eq!(timers.cancel_for(a), 2);
        assert_eq!(timers.advance(100.0), vec![TimerAction::AnimFrame(b)]);
    }
}
