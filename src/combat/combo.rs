//! Attack/combo state machine.
//!
//! `ComboState` is the only writer of the current attack and the combo timer.
//! The phase is derived from the stored fields rather than stored:
//!
//! - no current attack: `Idle`
//! - charging: `Charging`
//! - combo timer below the attack's `combo_window_start`: `Resolving`
//! - otherwise: `ComboWindow`, until the timer passes `end_combo_wait`

use bevy::math::Vec3;
use bevy::prelude::Component;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::attacks::{AttackDictionary, AttackEntry, AttackId, AttackInput, Stance};
use super::hooks::CombatActor;
use super::weapon::WeaponState;
use crate::angle::input_direction;
use crate::constants::CHARGE_PLAYRATE_SCALE;
use crate::host::{ActorLookup, AnimationLink, HostOutbox, HostRequest};
use crate::movement::{Locomotion, MovementMode};
use crate::targeting::{CandidateList, SoftLock};
use crate::timers::Accumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComboPhase {
    Idle,
    Resolving,
    Charging,
    ComboWindow,
}

/// Movement/look input for this frame, used to aim attacks
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AimInput {
    pub forward: f32,
    pub strafe: f32,
    pub camera_yaw: f32,
}

impl AimInput {
    pub fn is_zero(&self) -> bool {
        self.forward == 0.0 && self.strafe == 0.0
    }

    /// Input direction rotated by the camera yaw, or `fallback` without input
    pub fn direction_or(&self, fallback: Vec3) -> Vec3 {
        if self.is_zero() {
            fallback
        } else {
            input_direction(self.forward, self.strafe, self.camera_yaw).normalize_or(fallback)
        }
    }
}

/// Everything an attack step may read or write besides the combo state
pub struct AttackFrame<'a> {
    pub locomotion: &'a mut Locomotion,
    pub anim: &'a mut AnimationLink,
    pub weapon: &'a mut WeaponState,
    pub outbox: &'a mut HostOutbox,
    pub soft_lock: &'a mut SoftLock,
    pub enemies: &'a mut CandidateList,
    pub lookup: &'a dyn ActorLookup,
    pub aim: AimInput,
    /// Soft-lock aiming is enabled for this character
    pub allow_soft_lock: bool,
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ComboState {
    current: Option<AttackId>,
    combo_timer: Accumulator,
    charge_timer: Accumulator,
    charging: bool,
    ai_response: u32,
}

impl ComboState {
    pub fn current(&self) -> Option<AttackId> {
        self.current
    }

    pub fn current_entry<'d>(&self, dict: &'d AttackDictionary) -> Option<&'d AttackEntry> {
        self.current.and_then(|id| dict.get(id))
    }

    pub fn is_attacking(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn combo_timer(&self) -> f32 {
        self.combo_timer.elapsed()
    }

    pub fn charge_timer(&self) -> f32 {
        self.charge_timer.elapsed()
    }

    /// Successor index of the last attack started through an input
    pub fn ai_response(&self) -> u32 {
        self.ai_response
    }

    pub fn reset_ai_response(&mut self) {
        self.ai_response = 0;
    }

    pub fn phase(&self, dict: &AttackDictionary) -> ComboPhase {
        match self.current_entry(dict) {
            None => ComboPhase::Idle,
            Some(_) if self.charging => ComboPhase::Charging,
            Some(entry) if self.combo_timer.elapsed() < entry.combo_window_start => ComboPhase::Resolving,
            Some(_) => ComboPhase::ComboWindow,
        }
    }

    /// Resolve an attack button press into the next combo step and start it.
    /// Idle starts the opener for the stance; the combo window continues into
    /// the current attack's follow-up. Anything else is ignored.
    pub fn perform_attack_input(
        &mut self,
        input: AttackInput,
        dodging: bool,
        dict: &AttackDictionary,
        hooks: &dyn CombatActor,
        frame: &mut AttackFrame<'_>,
    ) -> Option<AttackId> {
        if dodging {
            debug!(?input, "attack ignored while dodging");
            return None;
        }

        let next = match (self.phase(dict), self.current) {
            (ComboPhase::Idle, _) => {
                let stance = Stance::from_state(frame.locomotion.grounded, frame.locomotion.sprinting);
                dict.opener(input, stance)
            }
            (ComboPhase::ComboWindow, Some(current)) => dict.follow_up(current, input),
            (phase, _) => {
                trace!(?phase, ?input, "attack input outside combo window");
                None
            }
        };

        let id = next?;
        self.do_attack(Some(id), dict, hooks, frame);
        if let Some(entry) = dict.get(id) {
            self.ai_response = entry.ai_successor;
        }
        Some(id)
    }

    /// Begin an attack step. `None` or an id the dictionary does not know is a
    /// silent no-op.
    pub fn do_attack(
        &mut self,
        attack: Option<AttackId>,
        dict: &AttackDictionary,
        hooks: &dyn CombatActor,
        frame: &mut AttackFrame<'_>,
    ) {
        let Some(id) = attack else {
            debug!("do_attack without an attack entry");
            return;
        };
        let Some(entry) = dict.get(id) else {
            debug!(?id, "do_attack with unknown attack");
            return;
        };

        self.combo_timer.reset();
        self.charge_timer.reset();
        self.current = Some(id);
        frame.weapon.charge = 0.0;
        frame.weapon.deactivate_all(frame.outbox);

        self.charging = entry.is_chargeable();
        let play_rate = if self.charging {
            entry.play_rate * CHARGE_PLAYRATE_SCALE / entry.max_charge
        } else {
            hooks.attack_move(entry, frame);
            frame.outbox.push(HostRequest::AttackTriggered {
                attack: entry.name.clone(),
                charge: 0.0,
            });
            entry.play_rate
        };

        debug!(attack = %entry.name, charging = self.charging, play_rate, "attack started");
        hooks.perform_attack(entry, play_rate, frame);
    }

    /// Release a charge. Does nothing unless charging.
    pub fn end_charge(&mut self, dict: &AttackDictionary, hooks: &dyn CombatActor, frame: &mut AttackFrame<'_>) {
        if !self.charging {
            return;
        }
        self.charging = false;

        let charge = self.charge_timer.elapsed();
        frame.weapon.charge = charge;

        if let Some(entry) = self.current_entry(dict) {
            // line the combo timer up with how far the slowed animation got
            if charge > 0.0 {
                self.combo_timer.set(charge * frame.anim.play_rate);
            }
            frame.anim.set_play_rate(frame.outbox, entry.play_rate);
            hooks.on_end_charge(entry, frame);
            frame.outbox.push(HostRequest::AttackTriggered {
                attack: entry.name.clone(),
                charge,
            });
            debug!(attack = %entry.name, charge, "charge released");
        }

        self.charge_timer.reset();
    }

    /// Per-frame attack update
    pub fn advance(&mut self, dt: f32, dict: &AttackDictionary, hooks: &dyn CombatActor, frame: &mut AttackFrame<'_>) {
        if self.current.is_none() {
            return;
        }
        let Some(entry) = self.current_entry(dict) else {
            self.reset(frame.locomotion, frame.anim, frame.weapon, frame.outbox);
            return;
        };

        if self.charging {
            self.charge_timer.advance(dt);
            hooks.update_charge(entry, frame);
            if self.charge_timer.reached(entry.max_charge) {
                self.end_charge(dict, hooks, frame);
            }
            return;
        }

        self.combo_timer.advance(dt);
        if self.combo_timer.exceeds(entry.end_combo_wait) {
            debug!(attack = %entry.name, "combo ended");
            self.reset(frame.locomotion, frame.anim, frame.weapon, frame.outbox);
        } else {
            hooks.attack_move(entry, frame);
        }
    }

    /// Back to idle. Always legal and idempotent.
    pub fn reset(
        &mut self,
        locomotion: &mut Locomotion,
        anim: &mut AnimationLink,
        weapon: &mut WeaponState,
        outbox: &mut HostOutbox,
    ) {
        locomotion.set_mode(MovementMode::Walking, outbox);
        self.combo_timer.reset();
        self.charge_timer.reset();
        self.charging = false;
        self.current = None;
        anim.stop_attack(outbox);
        weapon.deactivate_all(outbox);
    }
}
