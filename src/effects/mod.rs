//! Timed status effects.
//!
//! The controller only keeps the clocks: what an effect actually does is up to
//! the host, which hears about it through `EffectTick` and `EffectExpired`.
//! Slots are reused so a long fight does not grow the list.

use bevy::prelude::Component;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::{HostOutbox, HostRequest};
use crate::timers::Accumulator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: String,
    pub intensity: f32,
    pub duration: f32,
    /// Ticks spread evenly over the duration
    pub ticks: u32,
    elapsed: Accumulator,
    ticks_done: u32,
    active: bool,
}

impl Effect {
    fn new(id: &str, intensity: f32, duration: f32, ticks: u32) -> Self {
        let mut effect = Self {
            id: id.to_string(),
            intensity,
            duration,
            ticks,
            elapsed: Accumulator::new(),
            ticks_done: 0,
            active: false,
        };
        effect.restart(intensity, duration, ticks);
        effect
    }

    fn restart(&mut self, intensity: f32, duration: f32, ticks: u32) {
        self.intensity = intensity;
        self.duration = duration.max(0.0);
        self.ticks = ticks;
        self.elapsed.reset();
        self.ticks_done = 0;
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> f32 {
        if self.active {
            (self.duration - self.elapsed.elapsed()).max(0.0)
        } else {
            0.0
        }
    }

    fn tick_interval(&self) -> Option<f32> {
        (self.ticks > 0).then(|| self.duration / self.ticks as f32)
    }

    fn advance(&mut self, dt: f32, outbox: &mut HostOutbox) {
        if !self.active {
            return;
        }
        let elapsed = self.elapsed.advance(dt);

        if let Some(interval) = self.tick_interval() {
            while self.ticks_done < self.ticks && elapsed >= interval * (self.ticks_done + 1) as f32 {
                self.ticks_done += 1;
                outbox.push(HostRequest::EffectTick {
                    effect: self.id.clone(),
                    intensity: self.intensity,
                });
            }
        }

        if elapsed >= self.duration {
            self.active = false;
            outbox.push(HostRequest::EffectExpired {
                effect: self.id.clone(),
            });
        }
    }
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ActiveEffects {
    slots: Vec<Effect>,
}

impl ActiveEffects {
    /// Start an effect. An effect with the same id is restarted in place;
    /// otherwise the first expired slot is reused.
    pub fn add_effect(&mut self, id: &str, intensity: f32, duration: f32, ticks: u32) -> &Effect {
        let index = match self.slots.iter().position(|e| e.id == id) {
            Some(i) => {
                self.slots[i].restart(intensity, duration, ticks);
                i
            }
            None => match self.slots.iter().position(|e| !e.active) {
                Some(i) => {
                    self.slots[i] = Effect::new(id, intensity, duration, ticks);
                    i
                }
                None => {
                    self.slots.push(Effect::new(id, intensity, duration, ticks));
                    self.slots.len() - 1
                }
            },
        };
        debug!(effect = id, duration, ticks, "effect added");
        &self.slots[index]
    }

    pub fn advance(&mut self, dt: f32, outbox: &mut HostOutbox) {
        for effect in &mut self.slots {
            effect.advance(dt, outbox);
        }
    }

    /// Deactivate everything without firing expiry events
    pub fn clear(&mut self) {
        for effect in &mut self.slots {
            effect.active = false;
        }
    }

    pub fn get(&self, id: &str) -> Option<&Effect> {
        self.slots.iter().find(|e| e.active && e.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|e| e.active).count()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(outbox: &HostOutbox) -> usize {
        outbox
            .requests()
            .iter()
            .filter(|r| matches!(r, HostRequest::EffectTick { .. }))
            .count()
    }

    #[test]
    fn test_ticks_and_expiry() {
        let mut effects = ActiveEffects::default();
        let mut outbox = HostOutbox::default();
        effects.add_effect("burn", 2.0, 1.0, 4);

        effects.advance(0.3, &mut outbox);
        assert_eq!(ticks(&outbox), 1);
        effects.advance(0.3, &mut outbox);
        assert_eq!(ticks(&outbox), 2);
        effects.advance(0.5, &mut outbox);
        assert_eq!(ticks(&outbox), 4);
        assert!(outbox.contains(&HostRequest::EffectExpired { effect: "burn".into() }));
        assert_eq!(effects.active_count(), 0);
    }

    #[test]
    fn test_same_id_refreshes() {
        let mut effects = ActiveEffects::default();
        let mut outbox = HostOutbox::default();
        effects.add_effect("slow", 1.0, 2.0, 0);
        effects.advance(1.5, &mut outbox);
        effects.add_effect("slow", 0.5, 2.0, 0);
        assert_eq!(effects.slot_count(), 1);
        assert!((effects.get("slow").unwrap().remaining() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_expired_slot_reused() {
        let mut effects = ActiveEffects::default();
        let mut outbox = HostOutbox::default();
        effects.add_effect("a", 1.0, 0.1, 0);
        effects.advance(0.2, &mut outbox);
        effects.add_effect("b", 1.0, 1.0, 0);
        assert_eq!(effects.slot_count(), 1);
        assert!(effects.get("b").is_some());
    }

    #[test]
    fn test_clear_is_silent() {
        let mut effects = ActiveEffects::default();
        let mut outbox = HostOutbox::default();
        effects.add_effect("a", 1.0, 5.0, 1);
        effects.add_effect("b", 1.0, 5.0, 1);
        effects.clear();
        effects.advance(10.0, &mut outbox);
        assert_eq!(effects.active_count(), 0);
        assert!(outbox.is_empty());
    }
}
