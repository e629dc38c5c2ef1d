//! Per-frame input: continuous axes from the input collaborator, discrete
//! button actions, and host-side notifications that arrive alongside them.

use bevy::prelude::{Component, Entity};
use serde::{Deserialize, Serialize};

use crate::combat::AttackInput;
use crate::host::{entity_bits, ActorKind, ActorRecord, AnimSync, BodySync};

/// Axis values for this frame
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    #[serde(default)]
    pub forward: f32,
    #[serde(default)]
    pub strafe: f32,
    /// Absolute yaw delta (mouse)
    #[serde(default)]
    pub turn: f32,
    /// Yaw rate in [-1, 1] (stick)
    #[serde(default)]
    pub turn_rate: f32,
    #[serde(default)]
    pub look_up: f32,
    #[serde(default)]
    pub look_up_rate: f32,
}

impl ControlInput {
    pub fn moving(forward: f32, strafe: f32) -> Self {
        Self {
            forward,
            strafe,
            ..Self::default()
        }
    }

    /// Clamp every axis into [-1, 1]; NaN reads as no input
    pub fn sanitized(self) -> Self {
        let axis = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        Self {
            forward: axis(self.forward),
            strafe: axis(self.strafe),
            turn: if self.turn.is_nan() { 0.0 } else { self.turn },
            turn_rate: axis(self.turn_rate),
            look_up: if self.look_up.is_nan() { 0.0 } else { self.look_up },
            look_up_rate: axis(self.look_up_rate),
        }
    }
}

/// Button presses and releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputAction {
    LightAttack,
    HeavyAttack,
    /// Either attack button released (ends a charge)
    AttackReleased,
    Dodge,
    Jump,
    SprintPressed,
    SprintReleased,
    Interact,
    ToggleLockOn,
}

impl InputAction {
    pub fn attack_input(self) -> Option<AttackInput> {
        match self {
            InputAction::LightAttack => Some(AttackInput::Light),
            InputAction::HeavyAttack => Some(AttackInput::Heavy),
            _ => None,
        }
    }
}

/// Notifications from the host that are not player input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    /// Dodge animation finished
    DodgeFinished,
    Landed,
    Proximity {
        #[serde(with = "entity_bits")]
        actor: Entity,
        kind: ActorKind,
        entered: bool,
    },
    Hit {
        bone: String,
        duration: f32,
        direction: [f32; 3],
        force: f32,
    },
    /// One of our attacks connected
    ComboHit,
    Damage {
        amount: f32,
    },
    Effect {
        effect: String,
        intensity: f32,
        duration: f32,
        ticks: u32,
    },
}

/// Everything the controller consumes for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub dt: f32,
    #[serde(default)]
    pub axes: ControlInput,
    #[serde(default)]
    pub actions: Vec<InputAction>,
    #[serde(default)]
    pub events: Vec<HostEvent>,
}

impl FrameInput {
    pub fn idle(dt: f32) -> Self {
        Self {
            dt,
            ..Self::default()
        }
    }

    pub fn with_axes(mut self, axes: ControlInput) -> Self {
        self.axes = axes;
        self
    }

    pub fn with_action(mut self, action: InputAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_event(mut self, event: HostEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// One host frame as it crosses the bridge and as replays store it: the
/// player's input plus what the host's physics and scene reported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostFrame {
    #[serde(default)]
    pub tick: u64,
    pub input: FrameInput,
    #[serde(default)]
    pub body: Option<BodySync>,
    /// Attack animation play rate and root-motion sample
    #[serde(default)]
    pub anim: Option<AnimSync>,
    #[serde(default)]
    pub actors: Vec<ActorRecord>,
}
