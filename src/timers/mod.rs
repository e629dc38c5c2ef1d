//! Timer and counter primitives.
//!
//! Every timeout in the controller is "accumulate elapsed seconds, compare to a
//! threshold" - there are no wall-clock timers. Both primitives clamp to
//! non-negative values, so a bad `dt` from the host (negative or NaN) cannot
//! push a timer below zero.

use serde::{Deserialize, Serialize};

/// Counts elapsed seconds upward (combo timer, charge timer, dodge lock, no-hit timer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    elapsed: f32,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Add `dt` seconds and return the new elapsed value
    pub fn advance(&mut self, dt: f32) -> f32 {
        self.elapsed = (self.elapsed + sanitize(dt)).max(0.0);
        self.elapsed
    }

    /// Overwrite the elapsed value (clamped to >= 0)
    pub fn set(&mut self, seconds: f32) {
        self.elapsed = sanitize(seconds);
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// `elapsed >= threshold`
    pub fn reached(&self, threshold: f32) -> bool {
        self.elapsed >= threshold
    }

    /// `elapsed > threshold` (strict - used for the end-combo wait)
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.elapsed > threshold
    }
}

/// Counts remaining seconds downward (hit reactions)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    remaining: f32,
    duration: f32,
}

impl Countdown {
    pub fn new(duration: f32) -> Self {
        let duration = sanitize(duration);
        Self {
            remaining: duration,
            duration,
        }
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Tick down; returns true once the countdown has run out
    pub fn advance(&mut self, dt: f32) -> bool {
        self.remaining = (self.remaining - sanitize(dt)).max(0.0);
        self.is_finished()
    }

    pub fn restart(&mut self, duration: f32) {
        *self = Self::new(duration);
    }

    pub fn is_finished(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Remaining fraction in [0, 1] (1 = just started)
    pub fn fraction(&self) -> f32 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.remaining / self.duration).clamp(0.0, 1.0)
        }
    }
}

fn sanitize(seconds: f32) -> f32 {
    // f32::max ignores NaN, so NaN collapses to 0
    seconds.max(0.0)
}
