//! End-to-end controller behaviour against the shipped config and attack
//! dictionary, driven the way a host drives it: one frame at a time.

use bevy::math::Vec3;
use bevy::prelude::Entity;
use std::sync::Arc;
use tempfile::TempDir;

use melee_core::combat::{AttackDictionary, ComboPhase};
use melee_core::config::{ControllerConfig, DEFAULT_CONFIG_PATH};
use melee_core::controller::CharacterController;
use melee_core::host::{ActorKind, AnimSync, BodySync, EmptyLookup, HostRequest};
use melee_core::input::{FrameInput, HostEvent, HostFrame, InputAction};
use melee_core::replay::{self, ReplayRecorder, ReplayRecording};
use melee_core::sim::{HeadlessWorld, InputScript};

const DT: f32 = 1.0 / 60.0;

fn shipped() -> (ControllerConfig, Arc<AttackDictionary>) {
    let config = ControllerConfig::load(DEFAULT_CONFIG_PATH).expect("shipped config");
    let dict = AttackDictionary::load(&config.attack_dictionary).expect("shipped dictionary");
    (config, Arc::new(dict))
}

fn player() -> CharacterController {
    let (config, dict) = shipped();
    CharacterController::player(dict, &config)
}

fn triggered(requests: &[HostRequest]) -> Vec<(String, f32)> {
    requests
        .iter()
        .filter_map(|r| match r {
            HostRequest::AttackTriggered { attack, charge } => Some((attack.clone(), *charge)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_shipped_data_is_consistent() {
    let (config, dict) = shipped();
    assert_eq!(config, ControllerConfig::default());
    assert!(dict.unreachable().is_empty());
    assert!(dict.by_name("overhead").is_some_and(|a| a.is_chargeable()));
}

#[test]
fn test_stance_picks_opener() {
    let mut ctl = player();
    ctl.tick(
        &FrameInput::idle(DT)
            .with_action(InputAction::SprintPressed)
            .with_action(InputAction::LightAttack),
        &EmptyLookup,
    );
    assert_eq!(ctl.current_attack().map(|a| a.name.as_str()), Some("sprint_lunge"));

    let mut ctl = player();
    ctl.tick(
        &FrameInput::idle(DT)
            .with_action(InputAction::Jump)
            .with_action(InputAction::LightAttack),
        &EmptyLookup,
    );
    assert_eq!(ctl.current_attack().map(|a| a.name.as_str()), Some("air_slash"));
    assert!(ctl.requests().contains(&HostRequest::Jump));
}

#[test]
fn test_sprint_without_sprint_opener_uses_ground() {
    let dict = AttackDictionary::from_ron(
        r#"(attacks: [(name: "cut", animation: "Cut", end_combo_wait: 0.3)],
            openers: [(input: Light, stance: Ground, attack: "cut")])"#,
    )
    .unwrap();
    let mut ctl = CharacterController::player(Arc::new(dict), &ControllerConfig::default());
    ctl.sprint(true);
    ctl.tick(&FrameInput::idle(DT).with_action(InputAction::LightAttack), &EmptyLookup);
    assert_eq!(ctl.current_attack().map(|a| a.name.as_str()), Some("cut"));
}

#[test]
fn test_full_light_chain() {
    let mut ctl = player();
    for expected in ["slash_1", "slash_2", "slash_3"] {
        ctl.tick(&FrameInput::idle(DT).with_action(InputAction::LightAttack), &EmptyLookup);
        let names: Vec<String> = triggered(&ctl.drain_requests()).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, [expected]);

        for _ in 0..60 {
            if ctl.phase() == ComboPhase::ComboWindow {
                break;
            }
            ctl.tick(&FrameInput::idle(DT), &EmptyLookup);
        }
    }

    // the last step has no follow-ups and times out
    for _ in 0..120 {
        ctl.tick(&FrameInput::idle(DT), &EmptyLookup);
    }
    assert_eq!(ctl.phase(), ComboPhase::Idle);
}

#[test]
fn test_host_frame_json_soft_locks_attack() {
    let mut ctl = player();
    // Entity::from_raw(1) is index 1, generation 1
    let json = r#"{
        "tick": 1,
        "input": {
            "dt": 0.016,
            "actions": ["LightAttack"],
            "events": [{"type": "Proximity", "actor": 4294967297, "kind": "Enemy", "entered": true}]
        },
        "body": {"position": [0.0, 0.0, 0.0], "velocity": [0.0, 0.0, 0.0], "yaw": 0.0, "grounded": true},
        "actors": [{"actor": 4294967297, "position": [100.0, 0.0, 50.0], "health": 30.0}]
    }"#;
    let frame: HostFrame = serde_json::from_str(json).unwrap();
    ctl.step(&frame);

    let enemy = Entity::from_raw(1);
    assert_eq!(ctl.soft_lock.locked(), Some(enemy));
    let turn = ctl.requests().iter().find_map(|r| match r {
        HostRequest::PlayAnimation { is_attack: true, turn, .. } => *turn,
        _ => None,
    });
    let expected = 50.0f32.atan2(100.0).to_degrees();
    assert!(turn.is_some_and(|t| (t.to - expected).abs() < 1e-3), "turn {turn:?}");

    // leaving the trigger drops the lock
    let leave = HostFrame {
        tick: 2,
        input: FrameInput::idle(DT).with_event(HostEvent::Proximity {
            actor: enemy,
            kind: ActorKind::Enemy,
            entered: false,
        }),
        body: frame.body,
        anim: None,
        actors: frame.actors.clone(),
    };
    ctl.step(&leave);
    assert_eq!(ctl.soft_lock.locked(), None);
    assert!(ctl.nearby.enemies.is_empty());
}

fn lunge_controller() -> CharacterController {
    let dict = AttackDictionary::from_ron(
        r#"(attacks: [
                (name: "lunge", animation: "Lunge", end_combo_wait: 0.8),
                (name: "windup", animation: "Windup", max_charge: 2.0, end_combo_wait: 0.8),
            ],
            openers: [
                (input: Light, stance: Ground, attack: "lunge"),
                (input: Heavy, stance: Ground, attack: "windup"),
            ])"#,
    )
    .unwrap();
    CharacterController::player(Arc::new(dict), &ControllerConfig::default())
}

fn facing_body(yaw: f32) -> BodySync {
    BodySync {
        position: [0.0; 3],
        velocity: [0.0; 3],
        yaw,
        grounded: true,
    }
}

#[test]
fn test_host_animation_sample_drives_lunge() {
    let mut ctl = lunge_controller();
    let sample = AnimSync::driven(1.0, Vec3::new(400.0, 0.0, 0.0));
    let frame = |input: FrameInput| HostFrame {
        tick: 0,
        input,
        body: Some(facing_body(90.0)),
        anim: Some(sample),
        actors: Vec::new(),
    };

    ctl.step(&frame(FrameInput::idle(DT).with_action(InputAction::LightAttack)));
    assert_eq!(ctl.current_attack().map(|a| a.name.as_str()), Some("lunge"));
    // local forward at yaw 90 is world +Z
    let velocity = ctl.locomotion.velocity;
    assert!((velocity - Vec3::new(0.0, 0.0, 400.0)).length() < 1e-2, "{velocity:?}");

    for _ in 0..10 {
        ctl.step(&frame(FrameInput::idle(DT)));
        let velocity = ctl.locomotion.velocity;
        assert!((velocity - Vec3::new(0.0, 0.0, 400.0)).length() < 1e-2, "{velocity:?}");
    }
}

#[test]
fn test_host_play_rate_sets_charge_combo_timer() {
    let mut ctl = lunge_controller();
    // the host reports a different rate than the one requested at start
    let slowed = AnimSync {
        play_rate: Some(0.2),
        ..AnimSync::default()
    };
    let frame = |input: FrameInput| HostFrame {
        tick: 0,
        input,
        body: Some(facing_body(0.0)),
        anim: Some(slowed),
        actors: Vec::new(),
    };

    ctl.step(&frame(FrameInput::idle(0.0).with_action(InputAction::HeavyAttack)));
    assert_eq!(ctl.phase(), ComboPhase::Charging);
    ctl.step(&frame(FrameInput::idle(0.25)));
    ctl.step(&frame(FrameInput::idle(0.25)));
    ctl.step(&frame(FrameInput::idle(0.0).with_action(InputAction::AttackReleased)));

    assert!(!ctl.combo.is_charging());
    assert!((ctl.combo.combo_timer() - 0.5 * 0.2).abs() < 1e-4, "{}", ctl.combo.combo_timer());
}

#[test]
fn test_effect_ticks_then_expires() {
    let mut ctl = player();
    let burn = HostEvent::Effect {
        effect: "burn".into(),
        intensity: 2.0,
        duration: 1.0,
        ticks: 4,
    };
    ctl.tick(&FrameInput::idle(0.0).with_event(burn), &EmptyLookup);
    for _ in 0..4 {
        ctl.tick(&FrameInput::idle(0.25), &EmptyLookup);
    }
    let requests = ctl.drain_requests();
    let ticks = requests
        .iter()
        .filter(|r| matches!(r, HostRequest::EffectTick { effect, .. } if effect == "burn"))
        .count();
    assert_eq!(ticks, 4);
    assert!(requests.contains(&HostRequest::EffectExpired { effect: "burn".into() }));
    assert_eq!(ctl.effects.active_count(), 0);
}

#[test]
fn test_dead_controller_ignores_input() {
    let mut ctl = player();
    ctl.add_effect("poison", 1.0, 5.0, 5);
    ctl.tick(&FrameInput::idle(DT).with_event(HostEvent::Damage { amount: 500.0 }), &EmptyLookup);
    assert!(ctl.health.is_dead());
    assert_eq!(ctl.effects.active_count(), 0);
    let requests = ctl.drain_requests();
    assert_eq!(requests.iter().filter(|r| **r == HostRequest::Died).count(), 1);
    assert!(!requests.iter().any(|r| matches!(r, HostRequest::EffectExpired { .. })));

    ctl.tick(
        &FrameInput::idle(DT)
            .with_action(InputAction::LightAttack)
            .with_action(InputAction::Dodge),
        &EmptyLookup,
    );
    assert_eq!(ctl.phase(), ComboPhase::Idle);
    assert!(!ctl.dodge.is_dodging());
    ctl.add_effect("poison", 1.0, 5.0, 5);
    assert_eq!(ctl.effects.active_count(), 0);
}

#[test]
fn test_recorded_sim_replays_from_disk() {
    let (config, dict) = shipped();
    let mut world = HeadlessWorld::new(CharacterController::player(dict.clone(), &config));
    world.populate(5, 11);

    let mut recorder = ReplayRecorder::new("integration", &config, true);
    for input in InputScript::new(11, DT).take(900) {
        let frame = world.step(input);
        recorder.record(frame, &world.controller);
    }
    assert!(world.stats().attacks > 0);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("integration.replay.json");
    recorder.finish().save(&path).unwrap();

    let recording = ReplayRecording::load(&path).unwrap();
    let report = replay::play_back(&recording, dict).unwrap();
    assert!(report.is_deterministic(), "diverged at {:?}", report.first_divergence);
    assert_eq!(report.frames, 900);
}
