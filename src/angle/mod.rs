//! Angle math on the ground plane.
//!
//! Convention: Y is up, the ground is the XZ plane and a heading (yaw) is
//! `atan2(z, x)` in degrees. Yaw 0 faces +X, yaw 90 faces +Z, and "right" of a
//! facing is always `yaw + 90`.
//!
//! All signed differences land in (-180, 180] so comparisons across the
//! ±180 seam behave.

use bevy::math::{Quat, Vec3};

/// Wrap any angle in degrees into (-180, 180]
pub fn wrap_degrees(deg: f32) -> f32 {
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Signed difference `a - b` in degrees, normalized into (-180, 180].
///
/// Inputs are wrapped first, so the raw difference is within one turn and a
/// single ±360 correction is enough.
pub fn angle_diff_deg(a: f32, b: f32) -> f32 {
    let mut diff = wrap_degrees(a) - wrap_degrees(b);
    if diff <= -180.0 {
        diff += 360.0;
    } else if diff > 180.0 {
        diff -= 360.0;
    }
    diff
}

/// Heading of a direction on the ground plane, in degrees
pub fn heading_deg(dir: Vec3) -> f32 {
    heading_rad(dir).to_degrees()
}

/// Heading of a direction on the ground plane, in radians
pub fn heading_rad(dir: Vec3) -> f32 {
    dir.z.atan2(dir.x)
}

/// Unit ground-plane direction for a yaw in degrees
pub fn direction_from_yaw(yaw_deg: f32) -> Vec3 {
    let rad = yaw_deg.to_radians();
    Vec3::new(rad.cos(), 0.0, rad.sin())
}

/// Unit ground-plane direction to the right of a yaw
pub fn right_from_yaw(yaw_deg: f32) -> Vec3 {
    direction_from_yaw(yaw_deg + 90.0)
}

/// Rotation taking local space (X forward, Z right) to world space for a yaw
pub fn yaw_rotation(yaw_deg: f32) -> Quat {
    Quat::from_rotation_y(-yaw_deg.to_radians())
}

/// Local (X forward, Z right) to world
pub fn rotate_by_yaw(local: Vec3, yaw_deg: f32) -> Vec3 {
    yaw_rotation(yaw_deg) * local
}

/// World to local (X forward, Z right)
pub fn unrotate_by_yaw(world: Vec3, yaw_deg: f32) -> Vec3 {
    yaw_rotation(yaw_deg).inverse() * world
}

/// Drop the vertical component
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// World-space ground direction for forward/strafe input relative to a yaw
pub fn input_direction(forward: f32, strafe: f32, yaw_deg: f32) -> Vec3 {
    rotate_by_yaw(Vec3::new(forward, 0.0, strafe), yaw_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_wrap_degrees_range() {
        assert!(approx(wrap_degrees(190.0), -170.0));
        assert!(approx(wrap_degrees(-190.0), 170.0));
        assert!(approx(wrap_degrees(180.0), 180.0));
        assert!(approx(wrap_degrees(-180.0), 180.0));
        assert!(approx(wrap_degrees(720.0 + 45.0), 45.0));
    }

    #[test]
    fn test_diff_across_seam() {
        // 170 and -170 are 20 degrees apart, not 340
        assert!(approx(angle_diff_deg(170.0, -170.0), -20.0));
        assert!(approx(angle_diff_deg(-170.0, 170.0), 20.0));
    }

    #[test]
    fn test_heading_convention() {
        assert!(approx(heading_deg(Vec3::X), 0.0));
        assert!(approx(heading_deg(Vec3::Z), 90.0));
        assert!(approx(heading_deg(-Vec3::X), 180.0));
    }

    #[test]
    fn test_rotate_roundtrip_and_axes() {
        let fwd = rotate_by_yaw(Vec3::X, 90.0);
        assert!(fwd.distance(Vec3::Z) < 1e-5);
        let right = rotate_by_yaw(Vec3::Z, 0.0);
        assert!(right.distance(right_from_yaw(0.0)) < 1e-5);

        let v = Vec3::new(3.0, 1.0, -2.0);
        let back = unrotate_by_yaw(rotate_by_yaw(v, 37.0), 37.0);
        assert!(back.distance(v) < 1e-4);
    }

    #[test]
    fn test_input_direction_strafe_is_right() {
        let dir = input_direction(0.0, 1.0, 30.0);
        assert!(dir.distance(right_from_yaw(30.0)) < 1e-5);
    }
}
