//! Headless stand-in for the host engine.
//!
//! [`InputScript`] produces seeded pseudo-random player input and
//! [`HeadlessWorld`] plays the host's part: kinematic body physics, proximity
//! triggers, dodge animation length, a flat root-motion curve for attack
//! animations, and crude hit detection for triggered attacks. Used by the demo binary, the benches and the soak tests, and as
//! the source of replay recordings.

use bevy::math::Vec3;
use bevy::prelude::Entity;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::angle::{direction_from_yaw, heading_deg};
use crate::controller::CharacterController;
use crate::host::{ActorKind, ActorRecord, AnimSync, BodySync, HostRequest};
use crate::input::{ControlInput, FrameInput, HostEvent, HostFrame, InputAction};

/// Seeded scripted input: axes are held for a random stretch of frames, and
/// each frame has a small chance of pressing a button
pub struct InputScript {
    rng: Xoshiro256PlusPlus,
    dt: f32,
    axes: ControlInput,
    hold_frames: u32,
    charging: bool,
}

impl InputScript {
    pub fn new(seed: u64, dt: f32) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            dt,
            axes: ControlInput::default(),
            hold_frames: 0,
            charging: false,
        }
    }

    pub fn next_frame(&mut self) -> FrameInput {
        if self.hold_frames == 0 {
            self.hold_frames = self.rng.gen_range(10..90);
            self.axes = if self.rng.gen_bool(0.25) {
                ControlInput::default()
            } else {
                ControlInput {
                    forward: self.rng.gen_range(-1.0..=1.0),
                    strafe: self.rng.gen_range(-1.0..=1.0),
                    turn_rate: self.rng.gen_range(-0.5..=0.5),
                    ..ControlInput::default()
                }
            };
        }
        self.hold_frames -= 1;

        let mut frame = FrameInput::idle(self.dt).with_axes(self.axes);
        if self.charging && self.rng.gen_bool(0.05) {
            self.charging = false;
            frame = frame.with_action(InputAction::AttackReleased);
        }
        if self.rng.gen_bool(0.08) {
            let action = match self.rng.gen_range(0..10) {
                0..=3 => InputAction::LightAttack,
                4 => {
                    self.charging = true;
                    InputAction::HeavyAttack
                }
                5 => InputAction::Dodge,
                6 => InputAction::Jump,
                7 => InputAction::SprintPressed,
                8 => InputAction::SprintReleased,
                _ => InputAction::Interact,
            };
            frame = frame.with_action(action);
        }
        frame
    }
}

impl Iterator for InputScript {
    type Item = FrameInput;

    fn next(&mut self) -> Option<FrameInput> {
        Some(self.next_frame())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldTuning {
    pub gravity: f32,
    pub jump_speed: f32,
    pub dodge_duration: f32,
    pub proximity_radius: f32,
    /// Reach and half-angle (degrees) of a triggered attack
    pub attack_reach: f32,
    pub attack_arc: f32,
    pub attack_damage: f32,
    /// Forward root-motion speed of every attack animation
    pub attack_root_speed: f32,
}

impl Default for WorldTuning {
    fn default() -> Self {
        Self {
            gravity: 980.0,
            jump_speed: 420.0,
            dodge_duration: 0.45,
            proximity_radius: 800.0,
            attack_reach: 250.0,
            attack_arc: 60.0,
            attack_damage: 10.0,
            attack_root_speed: 180.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimStats {
    pub frames: u64,
    pub attacks: u32,
    pub dodges: u32,
    pub jumps: u32,
    pub hits: u32,
    pub pickups: u32,
    pub chests_opened: u32,
    pub requests: u64,
}

struct SimActor {
    record: ActorRecord,
    kind: ActorKind,
    inside: bool,
}

pub struct HeadlessWorld {
    pub controller: CharacterController,
    pub tuning: WorldTuning,
    body: BodySync,
    anim: Option<AnimSync>,
    actors: Vec<SimActor>,
    pending: Vec<HostEvent>,
    dodge_timer: Option<f32>,
    next_index: u32,
    tick: u64,
    stats: SimStats,
}

impl HeadlessWorld {
    pub fn new(controller: CharacterController) -> Self {
        let body = BodySync {
            position: controller.locomotion.position.to_array(),
            velocity: [0.0; 3],
            yaw: controller.locomotion.yaw,
            grounded: true,
        };
        Self {
            controller,
            tuning: WorldTuning::default(),
            body,
            anim: None,
            actors: Vec::new(),
            pending: Vec::new(),
            dodge_timer: None,
            next_index: 1,
            tick: 0,
            stats: SimStats::default(),
        }
    }

    pub fn spawn(&mut self, kind: ActorKind, position: Vec3) -> Entity {
        let actor = Entity::from_raw(self.next_index);
        self.next_index += 1;
        let (health, openable) = match kind {
            ActorKind::Enemy => (Some(30.0), false),
            ActorKind::Item => (None, false),
            ActorKind::Chest => (None, true),
        };
        self.actors.push(SimActor {
            record: ActorRecord {
                actor,
                position: position.to_array(),
                health,
                openable,
            },
            kind,
            inside: false,
        });
        actor
    }

    /// A ring of enemies with a few items and chests in between
    pub fn populate(&mut self, enemies: u32, seed: u64) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for i in 0..enemies {
            let yaw = 360.0 * i as f32 / enemies.max(1) as f32;
            let dist = rng.gen_range(200.0..700.0);
            self.spawn(ActorKind::Enemy, direction_from_yaw(yaw) * dist);
        }
        for _ in 0..enemies.div_ceil(2) {
            let pos = Vec3::new(rng.gen_range(-600.0..600.0), 0.0, rng.gen_range(-600.0..600.0));
            self.spawn(ActorKind::Item, pos);
        }
        self.spawn(ActorKind::Chest, Vec3::new(300.0, 0.0, 300.0));
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn actors(&self) -> Vec<ActorRecord> {
        self.actors.iter().map(|a| a.record).collect()
    }

    /// Run one frame. Returns the host frame that was fed to the controller so
    /// it can be recorded.
    pub fn step(&mut self, mut input: FrameInput) -> HostFrame {
        self.update_proximity();
        self.advance_dodge_timer(input.dt);
        input.events.append(&mut self.pending);

        let frame = HostFrame {
            tick: self.tick,
            input,
            body: Some(self.body),
            anim: self.anim,
            actors: self.actors(),
        };
        self.controller.step(&frame);

        self.body.yaw = self.controller.locomotion.yaw;
        let requests = self.controller.drain_requests();
        self.stats.requests += requests.len() as u64;
        for request in &requests {
            self.apply_request(request);
        }
        self.integrate(frame.input.dt);

        self.tick += 1;
        self.stats.frames += 1;
        frame
    }

    fn update_proximity(&mut self) {
        let origin = Vec3::from_array(self.body.position);
        let radius_sq = self.tuning.proximity_radius * self.tuning.proximity_radius;
        for actor in &mut self.actors {
            let inside = Vec3::from_array(actor.record.position).distance_squared(origin) <= radius_sq;
            if inside != actor.inside {
                actor.inside = inside;
                self.pending.push(HostEvent::Proximity {
                    actor: actor.record.actor,
                    kind: actor.kind,
                    entered: inside,
                });
            }
        }
    }

    fn advance_dodge_timer(&mut self, dt: f32) {
        let Some(remaining) = self.dodge_timer.as_mut() else {
            return;
        };
        *remaining -= dt.max(0.0);
        if *remaining <= 0.0 {
            self.dodge_timer = None;
            self.pending.push(HostEvent::DodgeFinished);
        }
    }

    fn apply_request(&mut self, request: &HostRequest) {
        match request {
            HostRequest::PlayAnimation {
                animation,
                turn,
                play_rate,
                is_attack,
                ..
            } => {
                if let Some(turn) = turn {
                    self.body.yaw = turn.to;
                }
                if *is_attack {
                    self.anim = Some(AnimSync::driven(*play_rate, Vec3::X * self.tuning.attack_root_speed));
                }
                if *animation == self.controller.dodge.animation {
                    self.stats.dodges += 1;
                    self.dodge_timer = Some(self.tuning.dodge_duration);
                }
            }
            HostRequest::SetTargetYaw { yaw } => self.body.yaw = *yaw,
            HostRequest::SetPlayRate { play_rate } => {
                if let Some(anim) = self.anim.as_mut() {
                    anim.play_rate = Some(*play_rate);
                }
            }
            HostRequest::StopAttackAnimation => self.anim = None,
            HostRequest::Jump => {
                self.stats.jumps += 1;
                self.body.velocity[1] = self.tuning.jump_speed;
                self.body.grounded = false;
            }
            HostRequest::ResetPosition { position } => {
                self.body.position = *position;
                self.body.velocity = [0.0; 3];
            }
            HostRequest::AttackTriggered { attack, charge } => {
                self.stats.attacks += 1;
                self.resolve_attack(attack, *charge);
            }
            HostRequest::PickUpItem { item } => {
                self.stats.pickups += 1;
                self.remove_actor(*item);
            }
            HostRequest::OpenChest { chest } => {
                self.stats.chests_opened += 1;
                if let Some(actor) = self.actors.iter_mut().find(|a| a.record.actor == *chest) {
                    actor.record.openable = false;
                }
            }
            other => trace!(?other, "request not simulated"),
        }
    }

    fn remove_actor(&mut self, actor: Entity) {
        if let Some(index) = self.actors.iter().position(|a| a.record.actor == actor) {
            let removed = self.actors.remove(index);
            if removed.inside {
                self.pending.push(HostEvent::Proximity {
                    actor,
                    kind: removed.kind,
                    entered: false,
                });
            }
        }
    }

    /// Damage live enemies in an arc in front of the body
    fn resolve_attack(&mut self, attack: &str, charge: f32) {
        let origin = Vec3::from_array(self.body.position);
        let damage = self.tuning.attack_damage * (1.0 + charge);
        let mut hit_any = false;
        for actor in &mut self.actors {
            if actor.kind != ActorKind::Enemy {
                continue;
            }
            let Some(health) = actor.record.health.filter(|h| *h > 0.0) else {
                continue;
            };
            let offset = Vec3::from_array(actor.record.position) - origin;
            if offset.length() > self.tuning.attack_reach {
                continue;
            }
            let deviation = crate::angle::angle_diff_deg(heading_deg(offset), self.body.yaw).abs();
            if deviation > self.tuning.attack_arc {
                continue;
            }
            actor.record.health = Some((health - damage).max(0.0));
            hit_any = true;
            self.stats.hits += 1;
            debug!(attack, target = ?actor.record.actor, damage, "simulated hit");
        }
        if hit_any {
            self.pending.push(HostEvent::ComboHit);
        }
    }

    /// Kinematic body: horizontal velocity comes from the controller,
    /// vertical from jumps and gravity, ground at y = 0
    fn integrate(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        let loco = &self.controller.locomotion;
        let mut velocity = Vec3::new(loco.velocity.x, self.body.velocity[1], loco.velocity.z);
        let mut position = Vec3::from_array(self.body.position);

        if !self.body.grounded {
            velocity.y -= self.tuning.gravity * dt;
        }
        position += velocity * dt;
        if position.y <= 0.0 && velocity.y <= 0.0 {
            position.y = 0.0;
            velocity.y = 0.0;
            self.body.grounded = true;
        }

        self.body.position = position.to_array();
        self.body.velocity = velocity.to_array();
    }
}
