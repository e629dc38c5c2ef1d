//! Camera-follow heuristic.
//!
//! While the player moves, the control yaw drifts toward the movement
//! direction. The drift is weak when the camera already looks along the
//! movement and strong when moving sideways to it, shaped by a power curve.

use bevy::math::Vec3;
use bevy::prelude::Component;

use crate::angle::{angle_diff_deg, direction_from_yaw, heading_deg, input_direction, wrap_degrees};
use crate::constants::{BASE_LOOK_UP_RATE, BASE_TURN_RATE, CAMERA_ANGLE_INFLUENCE, CAMERA_ROTATION_RATE};

const MAX_PITCH: f32 = 89.0;

#[derive(Component, Debug, Clone, PartialEq)]
pub struct CameraRig {
    /// Control yaw in degrees
    pub yaw: f32,
    pub pitch: f32,
    /// Hard lock-on: follow is suspended and locked-on dodges go sideways
    pub locked_on: bool,
    pub auto_follow_disabled: bool,
    pub angle_influence: f32,
    pub rotation_rate: f32,
    pub base_turn_rate: f32,
    pub base_look_up_rate: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            locked_on: false,
            auto_follow_disabled: false,
            angle_influence: CAMERA_ANGLE_INFLUENCE,
            rotation_rate: CAMERA_ROTATION_RATE,
            base_turn_rate: BASE_TURN_RATE,
            base_look_up_rate: BASE_LOOK_UP_RATE,
        }
    }
}

impl CameraRig {
    pub fn forward(&self) -> Vec3 {
        direction_from_yaw(self.yaw)
    }

    /// Fraction of the yaw gap closed this frame, in [0, 1]
    pub fn follow_blend(&self, forward: f32, strafe: f32, dt: f32) -> f32 {
        let move_dir = input_direction(forward, strafe, self.yaw).normalize_or_zero();
        if move_dir == Vec3::ZERO {
            return 0.0;
        }
        let input_len = (forward.abs() + strafe.abs()).clamp(0.0, 1.0);
        let off_axis = 1.0 - self.forward().dot(move_dir).abs();
        let blend = input_len * dt * off_axis.max(0.0).powf(self.angle_influence) * self.rotation_rate;
        blend.clamp(0.0, 1.0)
    }

    /// Drift the yaw toward the movement direction. Returns the yaw change.
    pub fn follow(&mut self, forward: f32, strafe: f32, dt: f32) -> f32 {
        if self.locked_on || self.auto_follow_disabled {
            return 0.0;
        }
        let move_dir = input_direction(forward, strafe, self.yaw).normalize_or_zero();
        if move_dir == Vec3::ZERO {
            return 0.0;
        }

        let delta = angle_diff_deg(heading_deg(move_dir), self.yaw);
        let step = self.follow_blend(forward, strafe, dt) * delta;
        self.yaw = wrap_degrees(self.yaw + step);
        step
    }

    /// Stick turning, damped by the running attack's turn control
    pub fn turn_at_rate(&mut self, rate: f32, dt: f32, turn_control: Option<f32>) {
        let factor = turn_control.unwrap_or(1.0).clamp(0.0, 1.0);
        self.yaw = wrap_degrees(self.yaw + rate * self.base_turn_rate * dt * factor);
    }

    pub fn look_up_at_rate(&mut self, rate: f32, dt: f32) {
        self.pitch = (self.pitch + rate * self.base_look_up_rate * dt).clamp(-MAX_PITCH, MAX_PITCH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_follow_when_moving_straight() {
        let mut rig = CameraRig::default();
        assert_eq!(rig.follow(1.0, 0.0, 0.016), 0.0);
        assert_eq!(rig.yaw, 0.0);
    }

    #[test]
    fn test_sideways_turns_toward_movement() {
        let mut rig = CameraRig::default();
        let step = rig.follow(0.0, 1.0, 0.5);
        // off-axis 1.0, so blend = 0.5 * 0.6 = 0.3 of a 90 degree gap
        assert!((step - 27.0).abs() < 1e-3);
        assert!((rig.yaw - 27.0).abs() < 1e-3);
    }

    #[test]
    fn test_blend_clamped() {
        let rig = CameraRig::default();
        assert_eq!(rig.follow_blend(0.0, 1.0, 100.0), 1.0);
        assert_eq!(rig.follow_blend(0.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_locked_on_suspends_follow() {
        let mut rig = CameraRig {
            locked_on: true,
            ..CameraRig::default()
        };
        assert_eq!(rig.follow(0.0, 1.0, 0.5), 0.0);
        rig.locked_on = false;
        rig.auto_follow_disabled = true;
        assert_eq!(rig.follow(0.0, 1.0, 0.5), 0.0);
    }

    #[test]
    fn test_turn_at_rate_respects_turn_control() {
        let mut rig = CameraRig::default();
        rig.turn_at_rate(1.0, 1.0, None);
        assert!((rig.yaw - 45.0).abs() < 1e-4);
        rig.turn_at_rate(1.0, 1.0, Some(0.5));
        assert!((rig.yaw - 67.5).abs() < 1e-4);
        rig.turn_at_rate(1.0, 1.0, Some(0.0));
        assert!((rig.yaw - 67.5).abs() < 1e-4);
    }

    #[test]
    fn test_look_up_clamped() {
        let mut rig = CameraRig::default();
        rig.look_up_at_rate(10.0, 1.0);
        assert_eq!(rig.pitch, 89.0);
    }
}
