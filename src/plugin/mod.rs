//! Bevy integration: each controlled character is an entity with a
//! [`Controlled`] component, scene actors carry [`Targetable`], and rapier
//! sensor colliders tagged with [`ProximitySensor`] feed the proximity lists.
//!
//! Per frame, in order: collision events become proximity notices, notices
//! and config changes reach the controllers, host physics and
//! [`AnimationSample`]s are synced in, the controllers tick, and results are
//! written back to transforms, rapier velocities and [`ControllerRequest`]
//! events.

use bevy::prelude::*;
use bevy_rapier3d::prelude::{CollisionEvent, Velocity};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::combat::{AttackDictionary, CombatHooks};
use crate::config::ControllerConfig;
use crate::controller::CharacterController;
use crate::host::{ActorKind, ActorSnapshot, AnimSync, BodySync, HostRequest};
use crate::input::{FrameInput, HostEvent};
use crate::targeting::ProximityEvent;

/// Shared attack dictionary for every controller in the app
#[derive(Resource, Clone)]
pub struct ControllerDictionary(pub Arc<AttackDictionary>);

pub struct ControllerPlugin {
    pub dictionary: Arc<AttackDictionary>,
    /// Used unless a `ControllerConfig` resource already exists (for example
    /// from `HotReloadPlugin`)
    pub config: ControllerConfig,
}

impl ControllerPlugin {
    pub fn new(dictionary: Arc<AttackDictionary>) -> Self {
        Self {
            dictionary,
            config: ControllerConfig::default(),
        }
    }
}

impl Plugin for ControllerPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<ControllerConfig>() {
            app.insert_resource(self.config.clone());
        }

        info!(attacks = self.dictionary.len(), "controller plugin ready");

        app.insert_resource(ControllerDictionary(self.dictionary.clone()))
            .add_event::<CollisionEvent>()
            .add_event::<ProximityNotice>()
            .add_event::<ControllerRequest>()
            .add_systems(
                Update,
                (
                    sensor_collisions_to_proximity,
                    queue_proximity_events,
                    apply_config_changes,
                    sync_host_bodies,
                    tick_controllers,
                    write_back_bodies,
                )
                    .chain(),
            );
    }
}

// ========================
// Components & events
// ========================

#[derive(Component)]
pub struct Controlled(pub CharacterController);

impl Controlled {
    pub fn player(dictionary: &ControllerDictionary, config: &ControllerConfig) -> Self {
        Self(CharacterController::player(dictionary.0.clone(), config))
    }

    pub fn with_hooks(dictionary: &ControllerDictionary, config: &ControllerConfig, hooks: CombatHooks) -> Self {
        Self(CharacterController::new(dictionary.0.clone(), config, hooks))
    }
}

/// Input gathered for the next tick. Actions and events are consumed by the
/// tick; axes persist until overwritten.
#[derive(Component, Debug, Clone, Default)]
pub struct PendingInput(pub FrameInput);

#[derive(Bundle)]
pub struct ControllerBundle {
    pub controlled: Controlled,
    pub input: PendingInput,
    pub transform: Transform,
}

impl ControllerBundle {
    pub fn player(dictionary: &ControllerDictionary, config: &ControllerConfig, transform: Transform) -> Self {
        Self {
            controlled: Controlled::player(dictionary, config),
            input: PendingInput::default(),
            transform,
        }
    }
}

/// Latest report from the character's attack animation, written by whatever
/// drives the skeleton
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct AnimationSample(pub AnimSync);

/// Scene actor the controller can target, pick up or open
#[derive(Component, Debug, Clone, Copy)]
pub struct Targetable {
    pub kind: ActorKind,
    pub health: Option<f32>,
    pub openable: bool,
}

impl Targetable {
    pub fn enemy(health: f32) -> Self {
        Self {
            kind: ActorKind::Enemy,
            health: Some(health),
            openable: false,
        }
    }

    pub fn item() -> Self {
        Self {
            kind: ActorKind::Item,
            health: None,
            openable: false,
        }
    }

    pub fn chest() -> Self {
        Self {
            kind: ActorKind::Chest,
            health: None,
            openable: true,
        }
    }
}

/// Sensor collider belonging to a controlled entity
#[derive(Component, Debug, Clone, Copy)]
pub struct ProximitySensor {
    pub owner: Entity,
}

/// A proximity change for one controller
#[derive(Event, Debug, Clone, Copy)]
pub struct ProximityNotice {
    pub controller: Entity,
    pub proximity: ProximityEvent,
}

/// A request drained from a controller this frame
#[derive(Event, Debug, Clone)]
pub struct ControllerRequest {
    pub controller: Entity,
    pub request: HostRequest,
}

// ========================
// Systems
// ========================

fn sensor_collisions_to_proximity(
    mut collisions: EventReader<CollisionEvent>,
    sensors: Query<&ProximitySensor>,
    targets: Query<&Targetable>,
    mut notices: EventWriter<ProximityNotice>,
) {
    for collision in collisions.read() {
        let (a, b, entered) = match *collision {
            CollisionEvent::Started(a, b, _) => (a, b, true),
            CollisionEvent::Stopped(a, b, _) => (a, b, false),
        };
        for (sensor, other) in [(a, b), (b, a)] {
            let (Ok(sensor), Ok(target)) = (sensors.get(sensor), targets.get(other)) else {
                continue;
            };
            notices.send(ProximityNotice {
                controller: sensor.owner,
                proximity: ProximityEvent {
                    actor: other,
                    kind: target.kind,
                    entered,
                },
            });
        }
    }
}

fn queue_proximity_events(mut notices: EventReader<ProximityNotice>, mut inputs: Query<&mut PendingInput>) {
    for notice in notices.read() {
        let Ok(mut input) = inputs.get_mut(notice.controller) else {
            debug!(controller = ?notice.controller, "proximity notice for unknown controller");
            continue;
        };
        let ProximityEvent { actor, kind, entered } = notice.proximity;
        input.0.events.push(HostEvent::Proximity { actor, kind, entered });
    }
}

fn apply_config_changes(config: Res<ControllerConfig>, mut controllers: Query<&mut Controlled>) {
    if !config.is_changed() || config.is_added() {
        return;
    }
    for mut controlled in &mut controllers {
        controlled.0.apply_config(&config);
    }
    info!("controller config applied");
}

fn sync_host_bodies(
    mut controllers: Query<(&mut Controlled, &Transform, Option<&Velocity>, Option<&AnimationSample>)>,
) {
    for (mut controlled, transform, velocity, sample) in &mut controllers {
        let loco = &controlled.0.locomotion;
        let body = BodySync {
            position: transform.translation.to_array(),
            velocity: velocity.map_or(loco.velocity, |v| v.linvel).to_array(),
            yaw: loco.yaw,
            grounded: loco.grounded,
        };
        controlled.0.sync_body(&body);
        if let Some(sample) = sample {
            controlled.0.sync_animation(&sample.0);
        }
    }
}

fn tick_controllers(
    time: Res<Time>,
    targets: Query<(Entity, &Transform, &Targetable)>,
    mut controllers: Query<(Entity, &mut Controlled, &mut PendingInput)>,
    mut requests: EventWriter<ControllerRequest>,
) {
    let lookup: HashMap<Entity, ActorSnapshot> = targets
        .iter()
        .map(|(entity, transform, target)| {
            let snapshot = ActorSnapshot {
                position: transform.translation,
                health: target.health,
                openable: target.openable,
            };
            (entity, snapshot)
        })
        .collect();

    let dt = time.delta_secs();
    for (entity, mut controlled, mut pending) in &mut controllers {
        let mut frame = FrameInput {
            dt,
            axes: pending.0.axes,
            ..default()
        };
        std::mem::swap(&mut frame.actions, &mut pending.0.actions);
        std::mem::swap(&mut frame.events, &mut pending.0.events);

        controlled.0.tick(&frame, &lookup);
        requests.send_batch(
            controlled
                .0
                .drain_requests()
                .into_iter()
                .map(|request| ControllerRequest {
                    controller: entity,
                    request,
                }),
        );
    }
}

/// Facing goes to the transform (yaw 0 faces +X), velocity to rapier
fn write_back_bodies(mut controllers: Query<(&Controlled, &mut Transform, Option<&mut Velocity>)>) {
    for (controlled, mut transform, velocity) in &mut controllers {
        let loco = &controlled.0.locomotion;
        transform.rotation = Quat::from_rotation_y(-loco.yaw.to_radians());
        if let Some(mut velocity) = velocity {
            velocity.linvel = loco.velocity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputAction;
    use bevy_rapier3d::rapier::geometry::CollisionEventFlags;

    const DICT: &str = r#"(
        attacks: [(name: "swipe", animation: "Swipe", end_combo_wait: 0.5)],
        openers: [(input: Light, stance: Ground, attack: "swipe")],
    )"#;

    fn app() -> (App, Entity, Entity) {
        let dictionary = Arc::new(AttackDictionary::from_ron(DICT).unwrap());
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(ControllerPlugin::new(dictionary));

        let dict = app.world().resource::<ControllerDictionary>().clone();
        let config = app.world().resource::<ControllerConfig>().clone();
        let player = app
            .world_mut()
            .spawn(ControllerBundle::player(&dict, &config, Transform::default()))
            .id();
        let sensor = app.world_mut().spawn(ProximitySensor { owner: player }).id();
        (app, player, sensor)
    }

    fn requests(app: &App) -> Vec<HostRequest> {
        app.world()
            .resource::<Events<ControllerRequest>>()
            .iter_current_update_events()
            .map(|e| e.request.clone())
            .collect()
    }

    #[test]
    fn test_sensor_collision_tracks_enemy() {
        let (mut app, player, sensor) = app();
        let enemy = app
            .world_mut()
            .spawn((Targetable::enemy(50.0), Transform::from_xyz(100.0, 0.0, 0.0)))
            .id();

        app.world_mut()
            .send_event(CollisionEvent::Started(sensor, enemy, CollisionEventFlags::SENSOR));
        app.update();
        let controlled = app.world().get::<Controlled>(player).unwrap();
        assert!(controlled.0.nearby.enemies.contains(enemy));

        app.world_mut()
            .send_event(CollisionEvent::Stopped(enemy, sensor, CollisionEventFlags::SENSOR));
        app.update();
        let controlled = app.world().get::<Controlled>(player).unwrap();
        assert!(controlled.0.nearby.enemies.is_empty());
    }

    #[test]
    fn test_attack_input_emits_requests() {
        let (mut app, player, _) = app();
        app.world_mut()
            .get_mut::<PendingInput>(player)
            .unwrap()
            .0
            .actions
            .push(InputAction::LightAttack);
        app.update();

        assert!(requests(&app).contains(&HostRequest::AttackTriggered {
            attack: "swipe".into(),
            charge: 0.0
        }));
        assert!(app.world().get::<PendingInput>(player).unwrap().0.actions.is_empty());
    }

    #[test]
    fn test_animation_sample_drives_attack_velocity() {
        let (mut app, player, _) = app();
        app.world_mut()
            .entity_mut(player)
            .insert(AnimationSample(AnimSync::driven(1.0, Vec3::new(300.0, 0.0, 0.0))));
        app.world_mut()
            .get_mut::<PendingInput>(player)
            .unwrap()
            .0
            .actions
            .push(InputAction::LightAttack);
        app.update();

        let controlled = app.world().get::<Controlled>(player).unwrap();
        assert!(controlled.0.combo.is_attacking());
        assert!((controlled.0.locomotion.velocity - Vec3::new(300.0, 0.0, 0.0)).length() < 1e-2);
    }

    #[test]
    fn test_config_change_reaches_controllers() {
        let (mut app, player, _) = app();
        app.update();
        app.world_mut().resource_mut::<ControllerConfig>().max_directional_deviation = 20.0;
        app.update();
        let controlled = app.world().get::<Controlled>(player).unwrap();
        assert_eq!(controlled.0.soft_lock.max_deviation, 20.0);
    }

    #[test]
    fn test_transform_follows_yaw() {
        let (mut app, player, _) = app();
        app.world_mut().get_mut::<Controlled>(player).unwrap().0.locomotion.yaw = 90.0;
        app.update();
        let transform = app.world().get::<Transform>(player).unwrap();
        let facing = transform.rotation * Vec3::X;
        assert!((facing - Vec3::Z).length() < 1e-4);
    }
}
