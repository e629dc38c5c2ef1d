//! Locomotion state the controller reads and adjusts.
//!
//! Physics belongs to the host: it reports position, velocity and ground
//! contact through [`Locomotion::sync`], and the controller writes back
//! velocity overrides (attack lunges, dodges), braking deceleration and the
//! occasional teleport back to solid ground.

use bevy::math::Vec3;
use bevy::prelude::Component;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::angle::{direction_from_yaw, heading_deg, input_direction};
use crate::combat::AttackEntry;
use crate::constants::{
    GROUND_FRICTION, MAX_AIR_TIME, MAX_DECELERATION, MAX_JUMP_COUNT, MIN_DECELERATION, RUN_SPEED,
    SPRINT_SPEED,
};
use crate::dodge::DodgeState;
use crate::host::{HostOutbox, HostRequest};
use crate::timers::Accumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementMode {
    Walking,
    Falling,
    /// Attacks that ignore gravity (air combos) switch to this
    Flying,
}

/// Locomotion tuning, usually taken from `ControllerConfig`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionTuning {
    pub run_speed: f32,
    pub sprint_speed: f32,
    pub min_deceleration: f32,
    pub max_deceleration: f32,
    pub max_air_time: f32,
    pub max_jump_count: u32,
    pub ground_friction: f32,
}

impl Default for LocomotionTuning {
    fn default() -> Self {
        Self {
            run_speed: RUN_SPEED,
            sprint_speed: SPRINT_SPEED,
            min_deceleration: MIN_DECELERATION,
            max_deceleration: MAX_DECELERATION,
            max_air_time: MAX_AIR_TIME,
            max_jump_count: MAX_JUMP_COUNT,
            ground_friction: GROUND_FRICTION,
        }
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct Locomotion {
    pub position: Vec3,
    /// Facing in degrees (see `angle` for the convention)
    pub yaw: f32,
    pub velocity: Vec3,
    pub grounded: bool,
    pub ground_friction: f32,
    pub mode: MovementMode,
    pub sprinting: bool,
    pub braking_deceleration: f32,
    pub tuning: LocomotionTuning,
    jump_count: u32,
    air_timer: Accumulator,
    last_ground_position: Vec3,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self::new(LocomotionTuning::default())
    }
}

impl Locomotion {
    pub fn new(tuning: LocomotionTuning) -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            grounded: true,
            ground_friction: tuning.ground_friction,
            mode: MovementMode::Walking,
            sprinting: false,
            braking_deceleration: tuning.min_deceleration,
            tuning,
            jump_count: 0,
            air_timer: Accumulator::new(),
            last_ground_position: Vec3::ZERO,
        }
    }

    pub fn at(mut self, position: Vec3, yaw: f32) -> Self {
        self.position = position;
        self.last_ground_position = position;
        self.yaw = yaw;
        self
    }

    pub fn facing(&self) -> Vec3 {
        direction_from_yaw(self.yaw)
    }

    pub fn jump_count(&self) -> u32 {
        self.jump_count
    }

    pub fn air_time(&self) -> f32 {
        self.air_timer.elapsed()
    }

    pub fn last_ground_position(&self) -> Vec3 {
        self.last_ground_position
    }

    /// Host-reported body state for this frame
    pub fn sync(&mut self, position: Vec3, velocity: Vec3, grounded: bool) {
        let landed = grounded && !self.grounded;
        self.position = position;
        self.velocity = velocity;
        self.grounded = grounded;
        if landed {
            self.landed();
        }
    }

    pub fn set_mode(&mut self, mode: MovementMode, outbox: &mut HostOutbox) {
        if self.mode != mode {
            self.mode = mode;
            outbox.push(HostRequest::SetMovementMode { mode });
        }
    }

    /// Jumping is allowed on the ground, or in the air while jumps remain,
    /// and never during an attack that forbids it
    pub fn can_jump(&self, attack: Option<&AttackEntry>) -> bool {
        let attack_allows = attack.map_or(true, |a| a.allow_jump);
        attack_allows && (self.grounded || self.jump_count < self.tuning.max_jump_count)
    }

    pub fn jump(&mut self, attack: Option<&AttackEntry>) -> bool {
        if !self.can_jump(attack) {
            debug!(jump_count = self.jump_count, "jump rejected");
            return false;
        }
        self.jump_count += 1;
        self.grounded = false;
        self.mode = MovementMode::Falling;
        true
    }

    pub fn landed(&mut self) {
        self.jump_count = 0;
        self.grounded = true;
        self.mode = MovementMode::Walking;
    }

    /// Sprinting can only start on the ground; releasing always stops it
    pub fn sprint(&mut self, pressed: bool) {
        if !pressed {
            self.sprinting = false;
        } else if self.grounded {
            self.sprinting = true;
        }
    }

    /// Steer horizontal velocity toward the scaled world input, braking when
    /// there is none. Facing follows movement.
    pub fn apply_input(&mut self, world_input: Vec3, dt: f32) {
        let input = Vec3::new(world_input.x, 0.0, world_input.z).clamp_length_max(1.0);
        let speed = if self.sprinting {
            self.tuning.sprint_speed
        } else {
            self.tuning.run_speed
        };

        if input.length_squared() > f32::EPSILON {
            let target = input * speed;
            self.velocity.x = target.x;
            self.velocity.z = target.z;
            self.yaw = heading_deg(input);
        } else {
            let horizontal = Vec3::new(self.velocity.x, 0.0, self.velocity.z);
            let speed = horizontal.length();
            let braked = (speed - self.braking_deceleration * dt.max(0.0)).max(0.0);
            let scaled = if speed > 0.0 {
                horizontal * (braked / speed)
            } else {
                Vec3::ZERO
            };
            self.velocity.x = scaled.x;
            self.velocity.z = scaled.z;
        }
    }

    /// Dodges move at a fixed horizontal speed plus whatever steering the
    /// dodge's move-control factor let through. Vertical velocity untouched.
    pub fn apply_dodge_velocity(&mut self, direction: Vec3, speed: f32, steer: Vec3) {
        let steer = Vec3::new(steer.x, 0.0, steer.z).clamp_length_max(1.0) * self.tuning.run_speed;
        self.velocity.x = direction.x * speed + steer.x;
        self.velocity.z = direction.z * speed + steer.z;
    }

    /// Brake hard at running speed, softly near sprinting speed
    pub fn update_braking(&mut self) -> f32 {
        let t = if self.tuning.sprint_speed > 0.0 {
            (self.velocity.length() / self.tuning.sprint_speed).min(1.0)
        } else {
            1.0
        };
        self.braking_deceleration =
            self.tuning.min_deceleration + (self.tuning.max_deceleration - self.tuning.min_deceleration) * t;
        self.braking_deceleration
    }

    /// Remember the last grounded spot; after too long in the air, go back to it
    pub fn track_air_time(&mut self, dt: f32, outbox: &mut HostOutbox) {
        if self.grounded {
            self.last_ground_position = self.position;
            self.air_timer.reset();
            return;
        }

        self.air_timer.advance(dt);
        if self.air_timer.reached(self.tuning.max_air_time) {
            info!(position = ?self.last_ground_position, "air time exceeded, resetting position");
            self.position = self.last_ground_position;
            self.air_timer.reset();
            outbox.push(HostRequest::ResetPosition {
                position: self.last_ground_position.to_array(),
            });
        }
    }

    /// Kinematic stand-in for host physics, used by headless runs
    pub fn integrate(&mut self, dt: f32) {
        self.position += self.velocity * dt.max(0.0);
    }
}

/// Fraction of movement input honoured this frame
pub fn move_control_factor(dodge: &DodgeState, attack: Option<&AttackEntry>) -> f32 {
    let factor = if dodge.is_dodging() {
        dodge.move_control_factor
    } else if dodge.is_locked_out() {
        0.0
    } else if let Some(attack) = attack {
        attack.move_control
    } else {
        1.0
    };
    factor.clamp(0.0, 1.0)
}

/// World-space movement request for forward/strafe input relative to the control yaw
pub fn movement_input(forward: f32, strafe: f32, control_yaw: f32, factor: f32) -> Vec3 {
    if factor <= 0.0 || (forward == 0.0 && strafe == 0.0) {
        return Vec3::ZERO;
    }
    input_direction(forward, strafe, control_yaw) * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attack(allow_jump: bool, move_control: f32) -> AttackEntry {
        AttackEntry {
            name: "test".into(),
            pose: crate::host::BodyPose::FullBody,
            animation: "Test".into(),
            play_rate: 1.0,
            max_charge: 0.0,
            move_control,
            turn_control: 0.5,
            end_combo_wait: 0.5,
            combo_window_start: 0.0,
            allow_jump,
            range_scales_movement: false,
            ai_successor: 0,
            follow_ups: Vec::new(),
        }
    }

    #[test]
    fn test_jump_gating() {
        let mut loco = Locomotion::default();
        assert!(loco.jump(None));
        assert!(loco.jump(None), "double jump");
        assert!(!loco.jump(None), "out of jumps");
        loco.landed();
        assert!(!loco.can_jump(Some(&attack(false, 0.0))));
        assert!(loco.can_jump(Some(&attack(true, 0.0))));
    }

    #[test]
    fn test_sprint_only_from_ground() {
        let mut loco = Locomotion::default();
        loco.grounded = false;
        loco.sprint(true);
        assert!(!loco.sprinting);
        loco.grounded = true;
        loco.sprint(true);
        assert!(loco.sprinting);
        loco.sprint(false);
        assert!(!loco.sprinting);
    }

    #[test]
    fn test_braking_lerp() {
        let mut loco = Locomotion::default();
        loco.velocity = Vec3::ZERO;
        assert_eq!(loco.update_braking(), MIN_DECELERATION);
        loco.velocity = Vec3::X * SPRINT_SPEED * 2.0;
        assert_eq!(loco.update_braking(), MAX_DECELERATION);
        loco.velocity = Vec3::X * SPRINT_SPEED * 0.5;
        let mid = (MIN_DECELERATION + MAX_DECELERATION) * 0.5;
        assert!((loco.update_braking() - mid).abs() < 1e-2);
    }

    #[test]
    fn test_ledge_recovery() {
        let mut loco = Locomotion::default().at(Vec3::new(1.0, 0.0, 2.0), 0.0);
        let mut outbox = HostOutbox::default();
        loco.track_air_time(0.1, &mut outbox);
        loco.grounded = false;
        loco.position = Vec3::new(50.0, -300.0, 2.0);
        for _ in 0..4 {
            loco.track_air_time(1.0, &mut outbox);
        }
        assert!(outbox.is_empty());
        loco.track_air_time(1.0, &mut outbox);
        assert_eq!(loco.position, Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(loco.air_time(), 0.0);
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_dodge_velocity_keeps_vertical() {
        let mut loco = Locomotion::default();
        loco.velocity = Vec3::new(3.0, -7.0, 3.0);
        loco.apply_dodge_velocity(Vec3::Z, 100.0, Vec3::ZERO);
        assert_eq!(loco.velocity, Vec3::new(0.0, -7.0, 100.0));

        loco.apply_dodge_velocity(Vec3::Z, 100.0, Vec3::X * 0.5);
        assert_eq!(loco.velocity, Vec3::new(RUN_SPEED * 0.5, -7.0, 100.0));
    }

    #[test]
    fn test_movement_input_scaled() {
        assert_eq!(movement_input(1.0, 0.0, 0.0, 0.0), Vec3::ZERO);
        let v = movement_input(1.0, 0.0, 90.0, 0.5);
        assert!(v.distance(Vec3::Z * 0.5) < 1e-5);
    }

    #[test]
    fn test_apply_input_brakes_without_input() {
        let mut loco = Locomotion::default();
        loco.velocity = Vec3::X * 100.0;
        loco.braking_deceleration = 1000.0;
        loco.apply_input(Vec3::ZERO, 0.05);
        assert!((loco.velocity.x - 50.0).abs() < 1e-3);
        loco.apply_input(Vec3::ZERO, 1.0);
        assert_eq!(loco.velocity.x, 0.0);
    }
}
