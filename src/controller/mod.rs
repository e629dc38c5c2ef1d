//! One character's combat and locomotion state behind a single per-frame
//! entry point.
//!
//! [`CharacterController::tick`] consumes a [`FrameInput`] and runs the update
//! in a fixed order:
//!
//! 1. host events (proximity, hits, damage, landing, dodge finished)
//! 2. look input and button actions
//! 3. movement input scaled by the move-control factor
//! 4. hit reactions, effects, camera follow, attack/combo, dodge lock-out,
//!    soft-lock and closest-item caches
//! 5. dodge velocity, braking, air-time recovery, combo hit counter
//!
//! Everything the host has to do is left in the outbox for
//! [`CharacterController::drain_requests`].

use bevy::math::Vec3;
use bevy::prelude::Entity;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::camera::CameraRig;
use crate::combat::{
    AimInput, AttackDictionary, AttackEntry, AttackFrame, AttackId, AttackInput, ComboHitCounter,
    ComboPhase, ComboState, CombatHooks, Health, HealthUpdate, PlayerCombat, WeaponState,
};
use crate::config::ControllerConfig;
use crate::dodge::{DodgeInput, DodgeState};
use crate::effects::ActiveEffects;
use crate::host::{
    lookup_from_records, ActorKind, ActorLookup, AnimSync, AnimationLink, BodySync, HostOutbox,
    HostRequest,
};
use crate::input::{ControlInput, FrameInput, HostEvent, HostFrame, InputAction};
use crate::movement::{move_control_factor, movement_input, Locomotion};
use crate::reaction::HitReactions;
use crate::targeting::{NearbyActors, SoftLock};

macro_rules! attack_frame {
    ($this:ident, $lookup:expr, $aim:expr) => {
        AttackFrame {
            aim: $aim,
            locomotion: &mut $this.locomotion,
            anim: &mut $this.anim,
            weapon: &mut $this.weapon,
            outbox: &mut $this.outbox,
            soft_lock: &mut $this.soft_lock,
            enemies: &mut $this.nearby.enemies,
            lookup: $lookup,
            allow_soft_lock: $this.allow_soft_lock,
        }
    };
}

pub struct CharacterController {
    dictionary: Arc<AttackDictionary>,
    hooks: CombatHooks,
    allow_soft_lock: bool,
    pub combo: ComboState,
    pub dodge: DodgeState,
    pub locomotion: Locomotion,
    pub camera: CameraRig,
    pub soft_lock: SoftLock,
    pub nearby: NearbyActors,
    pub health: Health,
    pub combo_hits: ComboHitCounter,
    pub weapon: WeaponState,
    pub effects: ActiveEffects,
    pub reactions: HitReactions,
    pub anim: AnimationLink,
    input: ControlInput,
    /// World-space movement request after the control factor
    move_request: Vec3,
    outbox: HostOutbox,
}

impl CharacterController {
    pub fn new(dictionary: Arc<AttackDictionary>, config: &ControllerConfig, hooks: CombatHooks) -> Self {
        let mut this = Self {
            dictionary,
            hooks,
            allow_soft_lock: config.allow_soft_lock,
            combo: ComboState::default(),
            dodge: DodgeState::default(),
            locomotion: Locomotion::new(config.locomotion),
            camera: CameraRig::default(),
            soft_lock: SoftLock::default(),
            nearby: NearbyActors::default(),
            health: Health::new(config.max_health),
            combo_hits: ComboHitCounter::default(),
            weapon: WeaponState::default(),
            effects: ActiveEffects::default(),
            reactions: HitReactions::default(),
            anim: AnimationLink::default(),
            input: ControlInput::default(),
            move_request: Vec3::ZERO,
            outbox: HostOutbox::default(),
        };
        this.apply_config(config);
        this
    }

    /// Player-controlled character: soft-lock aimed attacks
    pub fn player(dictionary: Arc<AttackDictionary>, config: &ControllerConfig) -> Self {
        Self::new(dictionary, config, CombatHooks::new(PlayerCombat))
    }

    /// Swap in new tuning without touching runtime state. Max health only
    /// applies to controllers created afterwards.
    pub fn apply_config(&mut self, config: &ControllerConfig) {
        self.allow_soft_lock = config.allow_soft_lock;
        self.soft_lock.max_deviation = config.max_directional_deviation.max(0.0);
        self.combo_hits.no_hit_duration = config.combo_no_hit_duration;
        self.reactions.root_bone = config.root_bone.clone();

        self.dodge.max_count = config.dodge.max_count;
        self.dodge.lock_duration = config.dodge.lock_duration;
        self.dodge.move_control_factor = config.dodge.move_control_factor;
        self.dodge.speed = config.dodge.speed;
        self.dodge.animation = config.dodge.animation.clone();

        self.camera.angle_influence = config.camera.angle_influence;
        self.camera.rotation_rate = config.camera.rotation_rate;
        self.camera.base_turn_rate = config.camera.base_turn_rate;
        self.camera.base_look_up_rate = config.camera.base_look_up_rate;

        self.locomotion.tuning = config.locomotion;
    }

    pub fn dictionary(&self) -> &AttackDictionary {
        &self.dictionary
    }

    pub fn input(&self) -> ControlInput {
        self.input
    }

    pub fn requests(&self) -> &[HostRequest] {
        self.outbox.requests()
    }

    pub fn drain_requests(&mut self) -> Vec<HostRequest> {
        self.outbox.drain()
    }

    fn aim(&self) -> AimInput {
        AimInput {
            forward: self.input.forward,
            strafe: self.input.strafe,
            camera_yaw: self.camera.yaw,
        }
    }

    /// Requested attack/soft-lock direction: input relative to the camera, or
    /// the camera's forward without input
    fn target_dir(&self) -> Vec3 {
        self.aim().direction_or(self.camera.forward())
    }

    // =====================================================
    // Frame
    // =====================================================

    pub fn tick(&mut self, frame: &FrameInput, lookup: &dyn ActorLookup) {
        let dt = if frame.dt.is_finite() { frame.dt.max(0.0) } else { 0.0 };
        self.input = frame.axes.sanitized();
        self.move_request = Vec3::ZERO;

        for event in &frame.events {
            self.handle_event(event, lookup);
        }

        if !self.health.is_dead() {
            self.apply_look(dt);
            for action in &frame.actions {
                self.handle_action(*action, lookup);
            }
            self.apply_movement_input(dt);
        }

        self.update(dt, lookup);
        self.post_update(dt);
    }

    /// Take the host's physics state for this frame
    pub fn sync_body(&mut self, body: &BodySync) {
        self.locomotion.sync(
            Vec3::from_array(body.position),
            Vec3::from_array(body.velocity),
            body.grounded,
        );
        self.locomotion.yaw = body.yaw;
    }

    /// Take the animation instance's play rate and root-motion sample
    pub fn sync_animation(&mut self, report: &AnimSync) {
        self.anim.sync(report);
    }

    /// Full host frame: body and animation sync, then
    /// [`CharacterController::tick`] against the reported actors
    pub fn step(&mut self, frame: &HostFrame) {
        if let Some(body) = &frame.body {
            self.sync_body(body);
        }
        if let Some(anim) = &frame.anim {
            self.sync_animation(anim);
        }
        let lookup = lookup_from_records(&frame.actors);
        self.tick(&frame.input, &lookup);
    }

    /// Host-side notifications for this frame
    pub fn handle_event(&mut self, event: &HostEvent, lookup: &dyn ActorLookup) {
        match event {
            HostEvent::DodgeFinished => self.end_dodge(),
            HostEvent::Landed => self.landed(),
            HostEvent::Proximity { actor, kind, entered } => {
                if *entered {
                    self.proximity_enter(*actor, *kind, lookup);
                } else {
                    self.proximity_exit(*actor, *kind);
                }
            }
            HostEvent::Hit {
                bone,
                duration,
                direction,
                force,
            } => {
                self.add_hit(bone, *duration, Vec3::from_array(*direction), *force);
            }
            HostEvent::ComboHit => {
                self.add_combo_hit();
            }
            HostEvent::Damage { amount } => {
                self.modify_health(-amount);
            }
            HostEvent::Effect {
                effect,
                intensity,
                duration,
                ticks,
            } => self.add_effect(effect, *intensity, *duration, *ticks),
        }
    }

    pub fn handle_action(&mut self, action: InputAction, lookup: &dyn ActorLookup) {
        trace!(?action, "input action");
        match action {
            InputAction::LightAttack | InputAction::HeavyAttack => {
                if let Some(input) = action.attack_input() {
                    self.perform_attack_input(input, lookup);
                }
            }
            InputAction::AttackReleased => self.end_charge(lookup),
            InputAction::Dodge => {
                self.begin_dodge();
            }
            InputAction::Jump => {
                self.jump();
            }
            InputAction::SprintPressed => self.sprint(true),
            InputAction::SprintReleased => self.sprint(false),
            InputAction::Interact => {
                self.interact(lookup);
            }
            InputAction::ToggleLockOn => {
                self.camera.locked_on = !self.camera.locked_on;
                debug!(locked_on = self.camera.locked_on, "lock-on toggled");
            }
        }
    }

    fn apply_look(&mut self, dt: f32) {
        let turn_control = self.current_attack().map(|a| a.turn_control);
        self.camera.yaw = crate::angle::wrap_degrees(self.camera.yaw + self.input.turn);
        self.camera.turn_at_rate(self.input.turn_rate, dt, turn_control);
        self.camera.pitch = (self.camera.pitch + self.input.look_up).clamp(-89.0, 89.0);
        self.camera.look_up_at_rate(self.input.look_up_rate, dt);
    }

    /// Dodges keep the scaled request for steering in `post_update`
    fn apply_movement_input(&mut self, dt: f32) {
        let factor = move_control_factor(&self.dodge, self.current_attack());
        self.move_request = movement_input(self.input.forward, self.input.strafe, self.camera.yaw, factor);
        if !self.dodge.is_dodging() {
            self.locomotion.apply_input(self.move_request, dt);
        }
    }

    /// Timer-driven part of the frame, in its fixed order
    pub fn update(&mut self, dt: f32, lookup: &dyn ActorLookup) {
        self.reactions.advance(dt, &mut self.outbox);
        self.effects.advance(dt, &mut self.outbox);
        self.camera.follow(self.input.forward, self.input.strafe, dt);

        let aim = self.aim();
        self.combo.advance(
            dt,
            &self.dictionary,
            self.hooks.get(),
            &mut attack_frame!(self, lookup, aim),
        );

        self.dodge.advance(dt);

        if !self.dodge.is_dodging() && !self.combo.is_attacking() {
            self.anim.has_target_angle = false;
        }
        self.refresh_targets(lookup);
    }

    fn refresh_targets(&mut self, lookup: &dyn ActorLookup) {
        self.soft_lock.validate(lookup);
        if !self.combo.is_attacking() {
            let target_dir = self.target_dir();
            self.soft_lock.select_attack_angle(
                target_dir,
                self.allow_soft_lock,
                self.locomotion.position,
                self.camera.forward(),
                &mut self.nearby.enemies,
                lookup,
            );
        }
        self.nearby
            .refresh_closest_item(self.locomotion.position, lookup);
    }

    fn post_update(&mut self, dt: f32) {
        if self.dodge.is_dodging() {
            self.locomotion
                .apply_dodge_velocity(self.dodge.direction(), self.dodge.speed, self.move_request);
        }
        self.locomotion.update_braking();
        self.locomotion.track_air_time(dt, &mut self.outbox);
        self.combo_hits.advance(dt, &mut self.outbox);
    }

    // =====================================================
    // Attacks
    // =====================================================

    pub fn current_attack(&self) -> Option<&AttackEntry> {
        self.combo.current_entry(&self.dictionary)
    }

    pub fn phase(&self) -> ComboPhase {
        self.combo.phase(&self.dictionary)
    }

    /// Start an attack step directly, bypassing combo resolution
    pub fn perform_attack(&mut self, attack: Option<AttackId>, lookup: &dyn ActorLookup) {
        let aim = self.aim();
        self.combo.do_attack(
            attack,
            &self.dictionary,
            self.hooks.get(),
            &mut attack_frame!(self, lookup, aim),
        );
    }

    pub fn perform_attack_by_name(&mut self, name: &str, lookup: &dyn ActorLookup) {
        let id = self.dictionary.id_of(name);
        if id.is_none() {
            debug!(name, "unknown attack name");
        }
        self.perform_attack(id, lookup);
    }

    /// Resolve a button press through the combo chain
    pub fn perform_attack_input(&mut self, input: AttackInput, lookup: &dyn ActorLookup) -> Option<AttackId> {
        if self.health.is_dead() {
            return None;
        }
        let aim = self.aim();
        let dodging = self.dodge.is_dodging();
        self.combo.perform_attack_input(
            input,
            dodging,
            &self.dictionary,
            self.hooks.get(),
            &mut attack_frame!(self, lookup, aim),
        )
    }

    pub fn end_charge(&mut self, lookup: &dyn ActorLookup) {
        let aim = self.aim();
        self.combo.end_charge(
            &self.dictionary,
            self.hooks.get(),
            &mut attack_frame!(self, lookup, aim),
        );
    }

    pub fn reset_combo(&mut self) {
        self.combo.reset(
            &mut self.locomotion,
            &mut self.anim,
            &mut self.weapon,
            &mut self.outbox,
        );
    }

    pub fn ai_response(&self) -> u32 {
        self.combo.ai_response()
    }

    pub fn reset_ai_response(&mut self) {
        self.combo.reset_ai_response();
    }

    // =====================================================
    // Dodge & locomotion
    // =====================================================

    pub fn begin_dodge(&mut self) -> bool {
        if self.health.is_dead()
            || !self
                .dodge
                .can_begin(self.combo.is_attacking(), self.locomotion.grounded)
        {
            debug!(count = self.dodge.count(), "dodge rejected");
            return false;
        }

        self.reset_combo();
        let input = DodgeInput {
            forward: self.input.forward,
            strafe: self.input.strafe,
            camera_yaw: self.camera.yaw,
            locked_on: self.camera.locked_on,
        };
        self.dodge.begin(
            input,
            false,
            &mut self.locomotion,
            &mut self.anim,
            &mut self.outbox,
        )
    }

    pub fn end_dodge(&mut self) {
        self.dodge.end(&mut self.locomotion);
    }

    pub fn jump(&mut self) -> bool {
        let attack = self.combo.current_entry(&self.dictionary);
        if !self.locomotion.jump(attack) {
            return false;
        }
        self.outbox.push(HostRequest::Jump);
        true
    }

    pub fn landed(&mut self) {
        self.locomotion.landed();
    }

    pub fn sprint(&mut self, pressed: bool) {
        self.locomotion.sprint(pressed);
    }

    // =====================================================
    // Proximity & interaction
    // =====================================================

    pub fn proximity_enter(&mut self, actor: Entity, kind: ActorKind, lookup: &dyn ActorLookup) {
        self.nearby.on_enter(actor, kind, lookup);
    }

    pub fn proximity_exit(&mut self, actor: Entity, kind: ActorKind) {
        self.nearby.on_exit(actor, kind);
        if kind == ActorKind::Enemy && self.soft_lock.locked() == Some(actor) {
            self.soft_lock.clear();
        }
    }

    /// Open the closest openable chest, or else pick up the closest item
    pub fn interact(&mut self, lookup: &dyn ActorLookup) -> Option<HostRequest> {
        let position = self.locomotion.position;
        let request = if let Some(chest) = self.nearby.closest_openable_chest(position, lookup) {
            HostRequest::OpenChest { chest }
        } else if let Some(item) = self.nearby.closest_item() {
            self.reset_combo();
            HostRequest::PickUpItem { item }
        } else {
            trace!("nothing to interact with");
            return None;
        };
        self.outbox.push(request.clone());
        Some(request)
    }

    // =====================================================
    // Health, hits, effects
    // =====================================================

    pub fn modify_health(&mut self, delta: f32) -> f32 {
        let update = self.health.modify(delta);
        self.after_health_change(update)
    }

    pub fn set_health(&mut self, value: f32) -> f32 {
        let update = self.health.set(value);
        self.after_health_change(update)
    }

    fn after_health_change(&mut self, update: HealthUpdate) -> f32 {
        if update.died {
            self.on_death();
        }
        update.health
    }

    fn on_death(&mut self) {
        info!("character died");
        self.effects.clear();
        self.reset_combo();
        self.dodge.reset(&mut self.locomotion);
        self.soft_lock.clear();
        self.locomotion.sprinting = false;
        self.outbox.push(HostRequest::Died);
    }

    pub fn add_hit(&mut self, bone: &str, duration: f32, direction: Vec3, force: f32) -> bool {
        self.reactions
            .add_hit(bone, duration, direction, force, &mut self.outbox)
    }

    pub fn add_combo_hit(&mut self) -> u32 {
        self.combo_hits.add_hit(&mut self.outbox)
    }

    pub fn add_effect(&mut self, id: &str, intensity: f32, duration: f32, ticks: u32) {
        if self.health.is_dead() {
            debug!(id, "effect ignored, character is dead");
            return;
        }
        self.effects.add_effect(id, intensity, duration, ticks);
    }

    // =====================================================
    // Snapshot
    // =====================================================

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            position: self.locomotion.position.to_array(),
            velocity: self.locomotion.velocity.to_array(),
            yaw: self.locomotion.yaw,
            grounded: self.locomotion.grounded,
            sprinting: self.locomotion.sprinting,
            jump_count: self.locomotion.jump_count(),
            camera_yaw: self.camera.yaw,
            camera_pitch: self.camera.pitch,
            attack: self.current_attack().map(|a| a.name.clone()),
            phase: self.phase(),
            combo_timer: self.combo.combo_timer(),
            charge_timer: self.combo.charge_timer(),
            weapon_charge: self.weapon.charge,
            dodging: self.dodge.is_dodging(),
            dodge_count: self.dodge.count(),
            health: self.health.current(),
            dead: self.health.is_dead(),
            combo_hits: self.combo_hits.count(),
            soft_locked: self.soft_lock.locked().map(Entity::to_bits),
            closest_item: self.nearby.closest_item().map(Entity::to_bits),
            active_effects: self.effects.active_count(),
            simulating_bodies: self.reactions.len(),
        }
    }

    /// SHA3-256 over the JSON snapshot, hex encoded
    pub fn state_digest(&self) -> String {
        self.snapshot().digest()
    }
}

/// Observable state of one controller, used for replay checks and the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub yaw: f32,
    pub grounded: bool,
    pub sprinting: bool,
    pub jump_count: u32,
    pub camera_yaw: f32,
    pub camera_pitch: f32,
    pub attack: Option<String>,
    pub phase: ComboPhase,
    pub combo_timer: f32,
    pub charge_timer: f32,
    pub weapon_charge: f32,
    pub dodging: bool,
    pub dodge_count: u32,
    pub health: f32,
    pub dead: bool,
    pub combo_hits: u32,
    pub soft_locked: Option<u64>,
    pub closest_item: Option<u64>,
    pub active_effects: usize,
    pub simulating_bodies: usize,
}

impl ControllerSnapshot {
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        Sha3_256::digest(&bytes)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
