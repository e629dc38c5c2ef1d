//! Per-actor weapon state: the charge recorded for the last released attack
//! and which hit colliders are live.

use bevy::prelude::Component;
use serde::{Deserialize, Serialize};

use crate::host::{HostOutbox, HostRequest};

/// Body parts that carry an attack collider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    RightHand,
    LeftHand,
    RightFoot,
    LeftFoot,
}

impl BodyPart {
    pub const COUNT: usize = 4;

    pub const ALL: [BodyPart; Self::COUNT] = [
        BodyPart::RightHand,
        BodyPart::LeftHand,
        BodyPart::RightFoot,
        BodyPart::LeftFoot,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct WeaponState {
    /// Seconds the last charge attack was held
    pub charge: f32,
    colliders: [bool; BodyPart::COUNT],
}

impl WeaponState {
    /// Animation notifies switch colliders on during an attack's active frames
    pub fn set_collider(&mut self, part: BodyPart, active: bool) {
        self.colliders[part.index()] = active;
    }

    pub fn collider_active(&self, part: BodyPart) -> bool {
        self.colliders[part.index()]
    }

    pub fn any_collider_active(&self) -> bool {
        self.colliders.iter().any(|c| *c)
    }

    pub fn deactivate_all(&mut self, outbox: &mut HostOutbox) {
        self.colliders = [false; BodyPart::COUNT];
        outbox.push(HostRequest::DeactivateHitColliders);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deactivate_all() {
        let mut weapon = WeaponState::default();
        let mut outbox = HostOutbox::default();
        weapon.set_collider(BodyPart::LeftFoot, true);
        assert!(weapon.collider_active(BodyPart::LeftFoot));
        assert!(!weapon.collider_active(BodyPart::RightHand));

        weapon.deactivate_all(&mut outbox);
        assert!(!weapon.any_collider_active());
        assert!(outbox.contains(&HostRequest::DeactivateHitColliders));
    }
}
