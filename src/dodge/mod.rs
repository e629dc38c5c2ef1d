//! Dodge controller.
//!
//! A dodge is a short movement override: direction captured at the start,
//! ground friction zeroed for its duration, and a lock-out that kicks in once
//! `max_count` dodges have been chained. The count only resets after
//! `lock_duration` seconds have passed without dodging since the last dodge
//! of the chain.

use bevy::math::Vec3;
use bevy::prelude::Component;
use tracing::debug;

use crate::angle::{direction_from_yaw, heading_deg, input_direction, right_from_yaw};
use crate::constants::{
    DODGE_LOCK_DURATION, DODGE_MOVE_CONTROL_FACTOR, DODGE_SPEED, LOCKED_ON_DODGE_THRESHOLD,
    MAX_DODGE_COUNT,
};
use crate::host::{AnimationLink, BodyPose, HostOutbox, YawTurn};
use crate::movement::Locomotion;
use crate::timers::Accumulator;

/// Input captured when the dodge button is pressed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DodgeInput {
    pub forward: f32,
    pub strafe: f32,
    pub camera_yaw: f32,
    pub locked_on: bool,
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct DodgeState {
    dodging: bool,
    direction: Vec3,
    count: u32,
    lock_timer: Accumulator,
    saved_friction: f32,
    pub lock_duration: f32,
    pub max_count: u32,
    /// Fraction of movement input honoured mid-dodge
    pub move_control_factor: f32,
    pub speed: f32,
    pub animation: String,
}

impl Default for DodgeState {
    fn default() -> Self {
        Self {
            dodging: false,
            direction: Vec3::X,
            count: 0,
            lock_timer: Accumulator::new(),
            saved_friction: 0.0,
            lock_duration: DODGE_LOCK_DURATION,
            max_count: MAX_DODGE_COUNT,
            move_control_factor: DODGE_MOVE_CONTROL_FACTOR,
            speed: DODGE_SPEED,
            animation: "Dodge".to_string(),
        }
    }
}

impl DodgeState {
    pub fn is_dodging(&self) -> bool {
        self.dodging
    }

    /// Unit ground-plane direction of the current (or last) dodge
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn lock_timer(&self) -> f32 {
        self.lock_timer.elapsed()
    }

    /// Recovering from a dodge chain: movement input is ignored
    pub fn is_locked_out(&self) -> bool {
        !self.dodging && self.count > 0 && !self.lock_timer.reached(self.lock_duration)
    }

    pub fn can_begin(&self, attacking: bool, grounded: bool) -> bool {
        !attacking && grounded && !self.dodging && self.count < self.max_count
    }

    /// Start a dodge. The caller resets the combo first; this only checks the
    /// preconditions and returns false without touching anything when they
    /// fail.
    pub fn begin(
        &mut self,
        input: DodgeInput,
        attacking: bool,
        locomotion: &mut Locomotion,
        anim: &mut AnimationLink,
        outbox: &mut HostOutbox,
    ) -> bool {
        if !self.can_begin(attacking, locomotion.grounded) {
            debug!(
                count = self.count,
                dodging = self.dodging,
                attacking,
                grounded = locomotion.grounded,
                "dodge rejected"
            );
            return false;
        }

        let mut direction = if input.forward == 0.0 && input.strafe == 0.0 {
            locomotion.facing()
        } else {
            input_direction(input.forward, input.strafe, input.camera_yaw).normalize_or_zero()
        };
        if direction == Vec3::ZERO {
            direction = locomotion.facing();
        }

        if input.locked_on {
            if input.strafe >= LOCKED_ON_DODGE_THRESHOLD {
                direction = right_from_yaw(locomotion.yaw);
            } else if input.strafe <= -LOCKED_ON_DODGE_THRESHOLD {
                direction = -right_from_yaw(locomotion.yaw);
            }
        }

        self.saved_friction = locomotion.ground_friction;
        locomotion.ground_friction = 0.0;
        self.direction = direction;
        self.dodging = true;
        self.count += 1;
        self.lock_timer.reset();

        anim.play(
            outbox,
            BodyPose::FullBody,
            &self.animation,
            1.0,
            false,
            Some(YawTurn {
                from: locomotion.yaw,
                to: heading_deg(direction),
            }),
        );
        debug!(count = self.count, ?direction, "dodge started");
        true
    }

    /// Animation finished: restore friction and stop overriding movement
    pub fn end(&mut self, locomotion: &mut Locomotion) {
        if !self.dodging {
            return;
        }
        locomotion.ground_friction = self.saved_friction;
        self.dodging = false;
    }

    /// Advance the lock-out; the count resets once the lock duration has
    /// passed without dodging
    pub fn advance(&mut self, dt: f32) {
        if self.dodging || self.count == 0 {
            return;
        }
        self.lock_timer.advance(dt);
        if self.lock_timer.reached(self.lock_duration) {
            debug!("dodge count reset");
            self.count = 0;
            self.lock_timer.reset();
        }
    }

    /// Death and respawn: drop everything, restoring friction if mid-dodge
    pub fn reset(&mut self, locomotion: &mut Locomotion) {
        self.end(locomotion);
        self.count = 0;
        self.lock_timer.reset();
        self.direction = direction_from_yaw(locomotion.yaw);
    }
}
