//! Host engine boundary.
//!
//! The controller never owns scene actors, animation playback or physics. It
//! reads what it needs through [`ActorLookup`] and [`AnimationLink`], and
//! writes everything it wants the host to do into a [`HostOutbox`] that the
//! host drains once per frame.

use bevy::math::{BVec3, Vec3};
use bevy::prelude::{Component, Entity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::movement::MovementMode;

/// Kind tag carried by proximity enter/exit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Enemy,
    Item,
    Chest,
}

impl ActorKind {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(ActorKind::Enemy),
            1 => Some(ActorKind::Item),
            2 => Some(ActorKind::Chest),
            _ => None,
        }
    }
}

/// What the controller is allowed to know about another actor this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSnapshot {
    pub position: Vec3,
    /// `None` for actors without health (items, chests)
    pub health: Option<f32>,
    /// Chests only: can it still be opened
    pub openable: bool,
}

impl ActorSnapshot {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            health: None,
            openable: false,
        }
    }

    pub fn with_health(mut self, health: f32) -> Self {
        self.health = Some(health);
        self
    }

    pub fn openable(mut self, openable: bool) -> Self {
        self.openable = openable;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.health.map_or(true, |hp| hp > 0.0)
    }
}

/// Weak-reference resolution: `None` means the actor is gone
pub trait ActorLookup {
    fn snapshot(&self, actor: Entity) -> Option<ActorSnapshot>;
}

impl ActorLookup for HashMap<Entity, ActorSnapshot> {
    fn snapshot(&self, actor: Entity) -> Option<ActorSnapshot> {
        self.get(&actor).copied()
    }
}

/// Lookup that knows no actors (every reference is stale)
pub struct EmptyLookup;

impl ActorLookup for EmptyLookup {
    fn snapshot(&self, _actor: Entity) -> Option<ActorSnapshot> {
        None
    }
}

/// Serializable form of an actor the host reports for a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    #[serde(with = "entity_bits")]
    pub actor: Entity,
    pub position: [f32; 3],
    #[serde(default)]
    pub health: Option<f32>,
    #[serde(default)]
    pub openable: bool,
}

impl ActorRecord {
    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            position: Vec3::from_array(self.position),
            health: self.health,
            openable: self.openable,
        }
    }
}

/// Index a frame's actor records for lookup; later duplicates win
pub fn lookup_from_records(records: &[ActorRecord]) -> HashMap<Entity, ActorSnapshot> {
    records.iter().map(|r| (r.actor, r.snapshot())).collect()
}

/// Body state the host's physics reports at the start of a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySync {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub yaw: f32,
    pub grounded: bool,
}

/// Animation slot an animation is played on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyPose {
    FullBody,
    UpperBody,
    LowerBody,
}

/// Turn the character from one yaw to another over the animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YawTurn {
    pub from: f32,
    pub to: f32,
}

/// Animation-driven velocity sample: axes flagged in `axes` are driven by the
/// animation curve, the others keep the character's current local velocity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimVelocity {
    pub sample: Vec3,
    pub axes: BVec3,
}

impl Default for AnimVelocity {
    fn default() -> Self {
        Self {
            sample: Vec3::ZERO,
            axes: BVec3::FALSE,
        }
    }
}

impl AnimVelocity {
    pub fn driven(sample: Vec3) -> Self {
        Self {
            sample,
            axes: BVec3::new(true, false, true),
        }
    }

    /// Local-space velocity after applying the animation curve
    pub fn apply(&self, local: Vec3) -> Vec3 {
        Vec3::select(self.axes, self.sample, local)
    }
}

/// What the host's animation instance reports for the playing attack each
/// frame. `velocity` is the local root-motion sample (X forward, Z right);
/// only the flagged `axes` override the character's velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimSync {
    #[serde(default)]
    pub play_rate: Option<f32>,
    #[serde(default)]
    pub velocity: [f32; 3],
    #[serde(default = "ground_axes")]
    pub axes: [bool; 3],
}

fn ground_axes() -> [bool; 3] {
    [true, false, true]
}

impl Default for AnimSync {
    fn default() -> Self {
        Self {
            play_rate: None,
            velocity: [0.0; 3],
            axes: ground_axes(),
        }
    }
}

impl AnimSync {
    /// Ground-plane root motion at a known play rate
    pub fn driven(play_rate: f32, velocity: Vec3) -> Self {
        Self {
            play_rate: Some(play_rate),
            velocity: velocity.to_array(),
            axes: ground_axes(),
        }
    }
}

/// Feed from the host's animation instance for the current attack
#[derive(Component, Debug, Clone)]
pub struct AnimationLink {
    /// Play rate of the currently playing attack animation
    pub play_rate: f32,
    pub velocity: AnimVelocity,
    /// A turn-to-angle animation is in flight
    pub has_target_angle: bool,
}

impl Default for AnimationLink {
    fn default() -> Self {
        Self {
            play_rate: 1.0,
            velocity: AnimVelocity::default(),
            has_target_angle: false,
        }
    }
}

impl AnimationLink {
    /// Request an animation; the play rate is tracked optimistically until the
    /// host reports the real one
    pub fn play(
        &mut self,
        outbox: &mut HostOutbox,
        pose: BodyPose,
        animation: &str,
        play_rate: f32,
        is_attack: bool,
        turn: Option<YawTurn>,
    ) {
        if is_attack {
            self.play_rate = play_rate;
        }
        self.has_target_angle = turn.is_some();
        outbox.push(HostRequest::PlayAnimation {
            pose,
            animation: animation.to_string(),
            play_rate,
            is_attack,
            turn,
        });
    }

    pub fn set_play_rate(&mut self, outbox: &mut HostOutbox, play_rate: f32) {
        self.play_rate = play_rate;
        outbox.push(HostRequest::SetPlayRate { play_rate });
    }

    /// Take the host's report. A missing or invalid play rate keeps the
    /// optimistic one; a non-finite sample drives nothing.
    pub fn sync(&mut self, report: &AnimSync) {
        if let Some(rate) = report.play_rate.filter(|r| r.is_finite() && *r >= 0.0) {
            self.play_rate = rate;
        }
        let sample = Vec3::from_array(report.velocity);
        self.velocity = if sample.is_finite() {
            AnimVelocity {
                sample,
                axes: BVec3::new(report.axes[0], report.axes[1], report.axes[2]),
            }
        } else {
            AnimVelocity::default()
        };
    }

    pub fn stop_attack(&mut self, outbox: &mut HostOutbox) {
        self.velocity = AnimVelocity::default();
        outbox.push(HostRequest::StopAttackAnimation);
    }
}

/// Everything the controller asks of the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostRequest {
    PlayAnimation {
        pose: BodyPose,
        animation: String,
        play_rate: f32,
        is_attack: bool,
        turn: Option<YawTurn>,
    },
    SetPlayRate {
        play_rate: f32,
    },
    StopAttackAnimation,
    /// Re-aim a charging attack
    SetTargetYaw {
        yaw: f32,
    },
    DeactivateHitColliders,
    /// Launch a jump; the host applies the impulse
    Jump,
    SetMovementMode {
        mode: MovementMode,
    },
    /// Teleport back to solid ground after too long in the air
    ResetPosition {
        position: [f32; 3],
    },
    ApplyBoneImpulse {
        bone: String,
        impulse: [f32; 3],
    },
    /// Physics blend weight of a simulating bone, 1 right after the hit
    BoneBlendWeight {
        bone: String,
        weight: f32,
    },
    StopSimulatingBone {
        bone: String,
    },
    AttackTriggered {
        attack: String,
        charge: f32,
    },
    OpenChest {
        #[serde(with = "entity_bits")]
        chest: Entity,
    },
    PickUpItem {
        #[serde(with = "entity_bits")]
        item: Entity,
    },
    ComboCountIncreased {
        count: u32,
    },
    ComboCountReset {
        last: u32,
    },
    EffectTick {
        effect: String,
        intensity: f32,
    },
    EffectExpired {
        effect: String,
    },
    Died,
}

/// Requests queued during a frame, drained by the host
#[derive(Component, Debug, Default, Clone)]
pub struct HostOutbox {
    requests: Vec<HostRequest>,
}

impl HostOutbox {
    pub fn push(&mut self, request: HostRequest) {
        self.requests.push(request);
    }

    pub fn drain(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn requests(&self) -> &[HostRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn contains(&self, request: &HostRequest) -> bool {
        self.requests.contains(request)
    }
}

/// Entity handles cross the host boundary as their u64 bit pattern
pub mod entity_bits {
    use bevy::prelude::Entity;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(entity: &Entity, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(entity.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Entity, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        Entity::try_from_bits(bits).map_err(|e| D::Error::custom(format!("{e:?}")))
    }
}
