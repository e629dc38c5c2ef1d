//! Health with a one-way death transition, and the combo hit counter.

use bevy::prelude::Component;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{COMBO_NO_HIT_DURATION, MAX_HEALTH};
use crate::host::{HostOutbox, HostRequest};
use crate::timers::Accumulator;

/// Result of a health change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthUpdate {
    pub health: f32,
    /// This change is the one that killed the actor
    pub died: bool,
}

#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    current: f32,
    max: f32,
    dead: bool,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(MAX_HEALTH)
    }
}

impl Health {
    pub fn new(max: f32) -> Self {
        let max = if max > 0.0 { max } else { MAX_HEALTH };
        Self {
            current: max,
            max,
            dead: false,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn modify(&mut self, delta: f32) -> HealthUpdate {
        let delta = if delta.is_nan() { 0.0 } else { delta };
        self.set(self.current + delta)
    }

    /// Clamp into [0, max]. Reaching 0 kills the actor exactly once; a dead
    /// actor ignores further changes and reports 0.
    pub fn set(&mut self, value: f32) -> HealthUpdate {
        if self.dead {
            debug!("health change ignored, actor is dead");
            return HealthUpdate {
                health: 0.0,
                died: false,
            };
        }

        let value = if value.is_nan() { self.current } else { value };
        self.current = value.clamp(0.0, self.max);

        let died = self.current <= 0.0;
        if died {
            self.dead = true;
            info!("actor died");
        }
        HealthUpdate {
            health: self.current,
            died,
        }
    }
}

/// Consecutive landed hits, reset after a stretch without hitting anything
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ComboHitCounter {
    count: u32,
    no_hit_timer: Accumulator,
    pub no_hit_duration: f32,
}

impl Default for ComboHitCounter {
    fn default() -> Self {
        Self::new(COMBO_NO_HIT_DURATION)
    }
}

impl ComboHitCounter {
    pub fn new(no_hit_duration: f32) -> Self {
        Self {
            count: 0,
            no_hit_timer: Accumulator::new(),
            no_hit_duration,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn add_hit(&mut self, outbox: &mut HostOutbox) -> u32 {
        self.no_hit_timer.reset();
        self.count += 1;
        outbox.push(HostRequest::ComboCountIncreased { count: self.count });
        self.count
    }

    pub fn advance(&mut self, dt: f32, outbox: &mut HostOutbox) {
        if self.count == 0 {
            return;
        }
        self.no_hit_timer.advance(dt);
        if self.no_hit_timer.reached(self.no_hit_duration) {
            self.reset(outbox);
        }
    }

    pub fn reset(&mut self, outbox: &mut HostOutbox) {
        outbox.push(HostRequest::ComboCountReset { last: self.count });
        self.count = 0;
        self.no_hit_timer.reset();
    }
}
