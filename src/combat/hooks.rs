//! Per-actor-kind attack behaviour.
//!
//! The state machine calls into a [`CombatActor`] at four points. Enemies use
//! [`BaseCombat`]; the player uses [`PlayerCombat`], which aims attacks with
//! soft-lock and keeps lunges from overshooting a locked target.

use bevy::prelude::Component;

use super::attacks::AttackEntry;
use super::combo::AttackFrame;
use crate::angle::{rotate_by_yaw, unrotate_by_yaw};
use crate::host::{HostRequest, YawTurn};

pub trait CombatActor: Send + Sync + 'static {
    /// Drive velocity from the attack animation. Runs when a non-charge
    /// attack starts and on every resolving frame.
    fn attack_move(&self, attack: &AttackEntry, frame: &mut AttackFrame<'_>) {
        let yaw = frame.locomotion.yaw;
        let local = unrotate_by_yaw(frame.locomotion.velocity, yaw);
        let local = frame.anim.velocity.apply(local);
        frame.locomotion.velocity = rotate_by_yaw(local, yaw);
    }

    /// Every frame while charging
    fn update_charge(&self, _attack: &AttackEntry, _frame: &mut AttackFrame<'_>) {}

    /// When a charge is released
    fn on_end_charge(&self, _attack: &AttackEntry, _frame: &mut AttackFrame<'_>) {}

    /// Start the attack animation
    fn perform_attack(&self, attack: &AttackEntry, play_rate: f32, frame: &mut AttackFrame<'_>) {
        frame
            .anim
            .play(frame.outbox, attack.pose, &attack.animation, play_rate, true, None);
    }
}

/// Plain animation-driven attacks
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseCombat;

impl CombatActor for BaseCombat {}

/// Soft-lock aimed attacks, when the frame allows soft-lock
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerCombat;

impl PlayerCombat {
    fn attack_angle(&self, frame: &mut AttackFrame<'_>) -> f32 {
        let facing = frame.locomotion.facing();
        let target_dir = frame.aim.direction_or(facing);
        frame.soft_lock.select_attack_angle(
            target_dir,
            frame.allow_soft_lock,
            frame.locomotion.position,
            facing,
            frame.enemies,
            frame.lookup,
        )
    }
}

impl CombatActor for PlayerCombat {
    fn attack_move(&self, attack: &AttackEntry, frame: &mut AttackFrame<'_>) {
        BaseCombat.attack_move(attack, frame);

        if !attack.range_scales_movement {
            return;
        }
        let Some(target) = frame.soft_lock.locked() else {
            return;
        };
        let Some(snapshot) = frame.lookup.snapshot(target) else {
            return;
        };

        let range = (snapshot.position - frame.locomotion.position).length();
        let speed = frame.locomotion.velocity.length();
        if speed > 0.0 {
            frame.locomotion.velocity *= (range / speed).min(1.0);
        }
    }

    /// Keep re-aiming while the charge is held
    fn update_charge(&self, _attack: &AttackEntry, frame: &mut AttackFrame<'_>) {
        let yaw = self.attack_angle(frame);
        frame.outbox.push(HostRequest::SetTargetYaw { yaw });
    }

    /// Play the attack turned toward the soft-locked target or the input direction
    fn perform_attack(&self, attack: &AttackEntry, play_rate: f32, frame: &mut AttackFrame<'_>) {
        let to = self.attack_angle(frame);
        let turn = YawTurn {
            from: frame.locomotion.yaw,
            to,
        };
        frame
            .anim
            .play(frame.outbox, attack.pose, &attack.animation, play_rate, true, Some(turn));
    }
}

/// Attack behaviour injected per actor
#[derive(Component)]
pub struct CombatHooks(pub Box<dyn CombatActor>);

impl CombatHooks {
    pub fn new(hooks: impl CombatActor) -> Self {
        Self(Box::new(hooks))
    }

    pub fn get(&self) -> &dyn CombatActor {
        self.0.as_ref()
    }
}

impl Default for CombatHooks {
    fn default() -> Self {
        Self::new(BaseCombat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::combo::AimInput;
    use crate::combat::WeaponState;
    use crate::host::{ActorSnapshot, AnimVelocity, AnimationLink, BodyPose, HostOutbox};
    use crate::movement::Locomotion;
    use crate::targeting::{CandidateList, SoftLock};
    use bevy::math::Vec3;
    use bevy::prelude::Entity;
    use std::collections::HashMap;

    fn lunge(range_scales_movement: bool) -> AttackEntry {
        AttackEntry {
            name: "lunge".into(),
            pose: BodyPose::FullBody,
            animation: "Lunge".into(),
            play_rate: 1.0,
            max_charge: 0.0,
            move_control: 0.0,
            turn_control: 0.0,
            end_combo_wait: 1.0,
            combo_window_start: 0.0,
            allow_jump: false,
            range_scales_movement,
            ai_successor: 0,
            follow_ups: Vec::new(),
        }
    }

    #[test]
    fn test_player_lunge_stops_at_target() {
        let target = Entity::from_raw(5);
        let mut world = HashMap::new();
        world.insert(target, ActorSnapshot::at(Vec3::new(3.0, 0.0, 0.0)).with_health(10.0));

        let mut loco = Locomotion::default();
        let mut anim = AnimationLink::default();
        anim.velocity = AnimVelocity::driven(Vec3::new(12.0, 0.0, 0.0));
        let mut weapon = WeaponState::default();
        let mut outbox = HostOutbox::default();
        let mut soft_lock = SoftLock::default();
        let mut enemies = CandidateList::default();
        enemies.add(target);

        let mut frame = AttackFrame {
            locomotion: &mut loco,
            anim: &mut anim,
            weapon: &mut weapon,
            outbox: &mut outbox,
            soft_lock: &mut soft_lock,
            enemies: &mut enemies,
            lookup: &world,
            aim: AimInput {
                forward: 1.0,
                strafe: 0.0,
                camera_yaw: 0.0,
            },
            allow_soft_lock: true,
        };

        let player = PlayerCombat;
        player.perform_attack(&lunge(true), 1.0, &mut frame);
        assert_eq!(frame.soft_lock.locked(), Some(target));

        player.attack_move(&lunge(true), &mut frame);
        assert!((frame.locomotion.velocity.length() - 3.0).abs() < 1e-4);

        player.attack_move(&lunge(false), &mut frame);
        assert!((frame.locomotion.velocity.length() - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_base_attack_plays_without_turn() {
        let mut loco = Locomotion::default();
        let mut anim = AnimationLink::default();
        let mut weapon = WeaponState::default();
        let mut outbox = HostOutbox::default();
        let mut soft_lock = SoftLock::default();
        let mut enemies = CandidateList::default();
        let world: HashMap<Entity, ActorSnapshot> = HashMap::new();
        let mut frame = AttackFrame {
            locomotion: &mut loco,
            anim: &mut anim,
            weapon: &mut weapon,
            outbox: &mut outbox,
            soft_lock: &mut soft_lock,
            enemies: &mut enemies,
            lookup: &world,
            aim: AimInput::default(),
            allow_soft_lock: true,
        };
        BaseCombat.perform_attack(&lunge(false), 0.5, &mut frame);
        assert!(matches!(
            outbox.requests(),
            [HostRequest::PlayAnimation { turn: None, is_attack: true, .. }]
        ));
        assert!((anim.play_rate - 0.5).abs() < f32::EPSILON);
    }
}
