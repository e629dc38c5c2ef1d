//! Physical hit reactions.
//!
//! A hit pushes one bone with a physics impulse and lets it simulate for a
//! short while; the host blends it back into the animation using the weight
//! reported here, and stops simulating it when its timer runs out.

use bevy::math::Vec3;
use bevy::prelude::Component;
use tracing::trace;

use crate::host::{HostOutbox, HostRequest};
use crate::timers::Countdown;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatingBody {
    pub bone: String,
    timer: Countdown,
}

impl SimulatingBody {
    /// Physics blend weight: 1 right after the hit, 0 when done
    pub fn blend_weight(&self) -> f32 {
        self.timer.fraction()
    }
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct HitReactions {
    bodies: Vec<SimulatingBody>,
    /// Hits on this bone would ragdoll the whole skeleton, so they are ignored
    pub root_bone: String,
}

impl Default for HitReactions {
    fn default() -> Self {
        Self::new("root")
    }
}

impl HitReactions {
    pub fn new(root_bone: &str) -> Self {
        Self {
            bodies: Vec::new(),
            root_bone: root_bone.to_string(),
        }
    }

    /// Register a hit on `bone` coming from `direction`. Returns false for
    /// hits that are ignored (no bone, or the root bone).
    pub fn add_hit(&mut self, bone: &str, duration: f32, direction: Vec3, force: f32, outbox: &mut HostOutbox) -> bool {
        if bone.is_empty() || bone == self.root_bone {
            trace!(bone, "hit reaction ignored");
            return false;
        }

        let impulse = direction.normalize_or_zero() * force;
        outbox.push(HostRequest::ApplyBoneImpulse {
            bone: bone.to_string(),
            impulse: impulse.to_array(),
        });

        match self.bodies.iter_mut().find(|b| b.bone == bone) {
            Some(body) => body.timer.restart(duration),
            None => self.bodies.push(SimulatingBody {
                bone: bone.to_string(),
                timer: Countdown::new(duration),
            }),
        }
        true
    }

    /// Run the timers down and report each bone's blend weight; finished
    /// bones stop simulating
    pub fn advance(&mut self, dt: f32, outbox: &mut HostOutbox) {
        self.bodies.retain_mut(|body| {
            if body.timer.advance(dt) {
                outbox.push(HostRequest::StopSimulatingBone {
                    bone: body.bone.clone(),
                });
                false
            } else {
                outbox.push(HostRequest::BoneBlendWeight {
                    bone: body.bone.clone(),
                    weight: body.blend_weight(),
                });
                true
            }
        });
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_bone_ignored() {
        let mut reactions = HitReactions::new("pelvis");
        let mut outbox = HostOutbox::default();
        assert!(!reactions.add_hit("pelvis", 1.0, Vec3::X, 10.0, &mut outbox));
        assert!(!reactions.add_hit("", 1.0, Vec3::X, 10.0, &mut outbox));
        assert!(reactions.is_empty());
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_hit_blends_out_and_stops() {
        let mut reactions = HitReactions::default();
        let mut outbox = HostOutbox::default();
        reactions.add_hit("spine_02", 0.4, Vec3::new(0.0, 0.0, 3.0), 50.0, &mut outbox);
        assert_eq!(
            outbox.requests()[0],
            HostRequest::ApplyBoneImpulse {
                bone: "spine_02".into(),
                impulse: [0.0, 0.0, 50.0]
            }
        );

        reactions.advance(0.2, &mut outbox);
        let weight = outbox.requests().iter().find_map(|r| match r {
            HostRequest::BoneBlendWeight { bone, weight } if bone == "spine_02" => Some(*weight),
            _ => None,
        });
        assert!(weight.is_some_and(|w| (w - 0.5).abs() < 1e-5), "{weight:?}");

        reactions.advance(0.3, &mut outbox);
        assert!(reactions.is_empty());
        assert!(outbox.contains(&HostRequest::StopSimulatingBone { bone: "spine_02".into() }));
    }

    #[test]
    fn test_same_bone_refreshes() {
        let mut reactions = HitReactions::default();
        let mut outbox = HostOutbox::default();
        reactions.add_hit("head", 0.5, Vec3::X, 1.0, &mut outbox);
        reactions.advance(0.4, &mut outbox);
        reactions.add_hit("head", 0.5, Vec3::X, 1.0, &mut outbox);
        reactions.advance(0.4, &mut outbox);
        assert_eq!(reactions.len(), 1);
    }
}
