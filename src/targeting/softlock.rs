//! Directional soft-lock: pick the live enemy whose bearing is closest to the
//! requested attack direction and snap the attack toward it when it is within
//! the allowed deviation.

use bevy::math::Vec3;
use bevy::prelude::{Component, Entity};
use tracing::{debug, trace};

use super::CandidateList;
use crate::angle::{angle_diff_deg, heading_deg};
use crate::constants::MAX_DIRECTIONAL_DEVIATION;
use crate::host::ActorLookup;

#[derive(Component, Debug, Clone, PartialEq)]
pub struct SoftLock {
    locked: Option<Entity>,
    closest_by_angle: Option<Entity>,
    /// Degrees between the requested direction and an enemy beyond which no lock happens
    pub max_deviation: f32,
}

impl Default for SoftLock {
    fn default() -> Self {
        Self::new(MAX_DIRECTIONAL_DEVIATION)
    }
}

impl SoftLock {
    pub fn new(max_deviation: f32) -> Self {
        Self {
            locked: None,
            closest_by_angle: None,
            max_deviation: max_deviation.max(0.0),
        }
    }

    pub fn locked(&self) -> Option<Entity> {
        self.locked
    }

    pub fn closest_by_angle(&self) -> Option<Entity> {
        self.closest_by_angle
    }

    pub fn clear(&mut self) {
        self.locked = None;
        self.closest_by_angle = None;
    }

    /// Recompute the enemy whose bearing from `origin` deviates least from
    /// `target_dir`. Dead or vanished enemies are removed from `enemies` on
    /// the way. Equal deviations keep the earlier entry.
    pub fn refresh_closest(
        &mut self,
        target_dir: Vec3,
        origin: Vec3,
        enemies: &mut CandidateList,
        lookup: &dyn ActorLookup,
    ) -> Option<Entity> {
        let pruned = enemies.retain(|enemy| lookup.snapshot(enemy).is_some_and(|s| s.is_alive()));
        if pruned > 0 {
            trace!(pruned, "pruned invalid soft-lock candidates");
        }

        let target_heading = heading_deg(target_dir);
        let mut best: Option<(Entity, f32)> = None;
        for enemy in enemies.iter() {
            let Some(snapshot) = lookup.snapshot(enemy) else {
                continue;
            };
            let bearing = heading_deg(snapshot.position - origin);
            let deviation = angle_diff_deg(bearing, target_heading).abs();
            if best.map_or(true, |(_, d)| deviation < d) {
                best = Some((enemy, deviation));
            }
        }

        self.closest_by_angle = best.map(|(e, _)| e);
        self.closest_by_angle
    }

    /// Heading in degrees to attack toward.
    ///
    /// A zero `target_dir` falls back to `camera_forward`. With soft-lock off
    /// the heading of the direction is returned and the current lock is left
    /// alone. With soft-lock on, the lock is recomputed from scratch: it is
    /// set only when the closest-by-angle enemy deviates by at most
    /// `max_deviation`, in which case the heading toward that enemy wins.
    pub fn select_attack_angle(
        &mut self,
        target_dir: Vec3,
        allow_soft_lock: bool,
        origin: Vec3,
        camera_forward: Vec3,
        enemies: &mut CandidateList,
        lookup: &dyn ActorLookup,
    ) -> f32 {
        let dir = if target_dir.length_squared() <= f32::EPSILON {
            camera_forward
        } else {
            target_dir
        };
        let requested = heading_deg(dir);

        if !allow_soft_lock {
            return requested;
        }

        self.refresh_closest(dir, origin, enemies, lookup);
        self.locked = None;

        let Some(candidate) = self.closest_by_angle else {
            return requested;
        };
        let Some(snapshot) = lookup.snapshot(candidate) else {
            return requested;
        };

        let toward = heading_deg(snapshot.position - origin);
        let diff = angle_diff_deg(requested, toward);
        if diff.abs() <= self.max_deviation {
            debug!(?candidate, diff, "soft-locked");
            self.locked = Some(candidate);
            toward
        } else {
            requested
        }
    }

    /// Drop the lock and the cached candidate if their actors are gone or dead
    pub fn validate(&mut self, lookup: &dyn ActorLookup) {
        let valid = |e: Option<Entity>| e.filter(|e| lookup.snapshot(*e).is_some_and(|s| s.is_alive()));
        self.locked = valid(self.locked);
        self.closest_by_angle = valid(self.closest_by_angle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ActorSnapshot;
    use std::collections::HashMap;

    fn e(i: u32) -> Entity {
        Entity::from_raw(i)
    }

    fn enemy_at(world: &mut HashMap<Entity, ActorSnapshot>, list: &mut CandidateList, i: u32, pos: Vec3) {
        world.insert(e(i), ActorSnapshot::at(pos).with_health(50.0));
        list.add(e(i));
    }

    #[test]
    fn test_zero_direction_uses_camera_forward() {
        let mut lock = SoftLock::default();
        let mut list = CandidateList::default();
        let world: HashMap<Entity, ActorSnapshot> = HashMap::new();
        let angle = lock.select_attack_angle(Vec3::ZERO, false, Vec3::ZERO, Vec3::Z, &mut list, &world);
        assert!((angle - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_locks_within_deviation() {
        let mut world = HashMap::new();
        let mut list = CandidateList::default();
        enemy_at(&mut world, &mut list, 1, Vec3::new(10.0, 0.0, 3.0));

        let mut lock = SoftLock::default();
        let angle = lock.select_attack_angle(Vec3::X, true, Vec3::ZERO, Vec3::X, &mut list, &world);
        assert_eq!(lock.locked(), Some(e(1)));
        assert!((angle - 3.0_f32.atan2(10.0).to_degrees()).abs() < 1e-3);
    }

    #[test]
    fn test_no_lock_beyond_deviation_clears_previous() {
        let mut world = HashMap::new();
        let mut list = CandidateList::default();
        enemy_at(&mut world, &mut list, 1, Vec3::new(0.0, 0.0, 10.0));

        let mut lock = SoftLock::default();
        lock.select_attack_angle(Vec3::Z, true, Vec3::ZERO, Vec3::X, &mut list, &world);
        assert_eq!(lock.locked(), Some(e(1)));

        let angle = lock.select_attack_angle(Vec3::X, true, Vec3::ZERO, Vec3::X, &mut list, &world);
        assert_eq!(lock.locked(), None);
        assert!(angle.abs() < 1e-4);
    }

    #[test]
    fn test_tie_prefers_enter_order() {
        let mut world = HashMap::new();
        let mut list = CandidateList::default();
        enemy_at(&mut world, &mut list, 7, Vec3::new(10.0, 0.0, 5.0));
        enemy_at(&mut world, &mut list, 3, Vec3::new(10.0, 0.0, -5.0));

        let mut lock = SoftLock::default();
        lock.select_attack_angle(Vec3::X, true, Vec3::ZERO, Vec3::X, &mut list, &world);
        assert_eq!(lock.locked(), Some(e(7)));
    }

    #[test]
    fn test_dead_candidates_pruned() {
        let mut world = HashMap::new();
        let mut list = CandidateList::default();
        enemy_at(&mut world, &mut list, 1, Vec3::new(10.0, 0.0, 0.0));
        enemy_at(&mut world, &mut list, 2, Vec3::new(10.0, 0.0, 2.0));
        world.insert(e(1), ActorSnapshot::at(Vec3::new(10.0, 0.0, 0.0)).with_health(0.0));

        let mut lock = SoftLock::default();
        lock.select_attack_angle(Vec3::X, true, Vec3::ZERO, Vec3::X, &mut list, &world);
        assert_eq!(lock.locked(), Some(e(2)));
        assert!(!list.contains(e(1)));
    }

    #[test]
    fn test_wraparound_bearing() {
        let mut world = HashMap::new();
        let mut list = CandidateList::default();
        // bearing just under -180 from a request just under +180
        enemy_at(&mut world, &mut list, 1, Vec3::new(-10.0, 0.0, -0.5));

        let mut lock = SoftLock::new(10.0);
        lock.select_attack_angle(Vec3::new(-1.0, 0.0, 0.05), true, Vec3::ZERO, Vec3::X, &mut list, &world);
        assert_eq!(lock.locked(), Some(e(1)));
    }

    #[test]
    fn test_validate_clears_vanished_lock() {
        let mut world = HashMap::new();
        let mut list = CandidateList::default();
        enemy_at(&mut world, &mut list, 1, Vec3::new(10.0, 0.0, 0.0));

        let mut lock = SoftLock::default();
        lock.select_attack_angle(Vec3::X, true, Vec3::ZERO, Vec3::X, &mut list, &world);
        world.remove(&e(1));
        lock.validate(&world);
        assert_eq!(lock.locked(), None);
        assert_eq!(lock.closest_by_angle(), None);
    }
}
