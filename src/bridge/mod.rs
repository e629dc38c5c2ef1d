//! C ABI for host engines that load the core as a DLL.
//!
//! A controller lives behind an opaque pointer from
//! [`melee_controller_create`] and must be released with
//! [`melee_controller_destroy`]. Structured data crosses the boundary as JSON:
//! a host frame goes in, the host requests queued during it come out.
//! Every returned string is heap-allocated by Rust and must be released with
//! [`melee_free_string`].
//!
//! Nothing here panics across the boundary. Null or dangling-looking input
//! (null pointers, invalid UTF-8, malformed JSON) is logged with `warn!` and
//! answered with null, `false`, or a negative sentinel.

use bevy::math::Vec3;
use bevy::prelude::Entity;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::combat::{AttackDictionary, AttackInput, CombatHooks};
use crate::config::ControllerConfig;
use crate::controller::CharacterController;
use crate::host::{lookup_from_records, ActorKind, ActorRecord, ActorSnapshot, AnimSync};
use crate::input::HostFrame;
use crate::logging::{self, LogLevel, TracingConfig};
use crate::replay::{self, ReplayRecording};

/// Returned by float-valued calls on a null handle
pub const INVALID_HANDLE_F32: f32 = -1.0;

/// Opaque handle; layout is private to Rust
pub struct MeleeController {
    controller: CharacterController,
    /// Actors reported with the last frame, for calls made between frames
    world: HashMap<Entity, ActorSnapshot>,
}

// ========================
// Helpers
// ========================

fn json_to_cstring<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => CString::new(json).unwrap_or_default().into_raw(),
        Err(e) => {
            warn!(error = %e, "failed to serialize bridge response");
            std::ptr::null_mut()
        }
    }
}

fn parse_cstr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_owned()) }
}

fn with_controller<R>(
    handle: *mut MeleeController,
    call: &str,
    fallback: R,
    f: impl FnOnce(&mut MeleeController) -> R,
) -> R {
    match unsafe { handle.as_mut() } {
        Some(handle) => f(handle),
        None => {
            warn!(call, "null controller handle");
            fallback
        }
    }
}

fn build_controller(
    config: &ControllerConfig,
    dictionary_ron: &str,
    player: bool,
) -> Option<Box<MeleeController>> {
    let dictionary = match AttackDictionary::from_ron(dictionary_ron) {
        Ok(dict) => Arc::new(dict),
        Err(e) => {
            warn!(error = %e, "invalid attack dictionary");
            return None;
        }
    };
    let controller = if player {
        CharacterController::player(dictionary, config)
    } else {
        CharacterController::new(dictionary, config, CombatHooks::default())
    };
    Some(Box::new(MeleeController {
        controller,
        world: HashMap::new(),
    }))
}

// ========================
// C-ABI: Core
// ========================

#[no_mangle]
pub extern "C" fn melee_version() -> *mut c_char {
    CString::new(env!("CARGO_PKG_VERSION"))
        .unwrap_or_default()
        .into_raw()
}

/// Free a string allocated by Rust. `ptr` must come from this library or be null.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            drop(CString::from_raw(ptr));
        }
    }
}

/// Initialise logging once; `level` is 0 trace .. 4 error
#[no_mangle]
pub extern "C" fn melee_init_logging(level: u32) {
    logging::init_tracing(&TracingConfig::default().with_level(LogLevel::from_id(level)));
}

// ========================
// C-ABI: Lifecycle
// ========================

/// Create a controller. `config_json` may be null for defaults;
/// `dictionary_ron` is required. Returns null on invalid input.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_controller_create(
    config_json: *const c_char,
    dictionary_ron: *const c_char,
    player: bool,
) -> *mut MeleeController {
    let config = if config_json.is_null() {
        ControllerConfig::default()
    } else {
        let parsed = parse_cstr(config_json).map(|json| ControllerConfig::from_json(&json));
        match parsed {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                warn!(error = %e, "invalid controller config");
                return std::ptr::null_mut();
            }
            None => {
                warn!("controller config is not UTF-8");
                return std::ptr::null_mut();
            }
        }
    };

    let Some(ron) = parse_cstr(dictionary_ron) else {
        warn!("missing attack dictionary");
        return std::ptr::null_mut();
    };

    match build_controller(&config, &ron, player) {
        Some(handle) => Box::into_raw(handle),
        None => std::ptr::null_mut(),
    }
}

/// Create a player controller from a config file; the attack dictionary is
/// read from the path the config names
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_controller_load(config_path: *const c_char) -> *mut MeleeController {
    let Some(path) = parse_cstr(config_path) else {
        warn!("missing config path");
        return std::ptr::null_mut();
    };
    let config = match ControllerConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path, error = %e, "failed to load controller config");
            return std::ptr::null_mut();
        }
    };
    let ron = match std::fs::read_to_string(&config.attack_dictionary) {
        Ok(ron) => ron,
        Err(e) => {
            warn!(path = %config.attack_dictionary, error = %e, "failed to read attack dictionary");
            return std::ptr::null_mut();
        }
    };
    match build_controller(&config, &ron, true) {
        Some(handle) => Box::into_raw(handle),
        None => std::ptr::null_mut(),
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_controller_destroy(handle: *mut MeleeController) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
    }
}

/// Replace tuning on a live controller
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_controller_apply_config(handle: *mut MeleeController, config_json: *const c_char) -> bool {
    with_controller(handle, "apply_config", false, |h| {
        let Some(json) = parse_cstr(config_json) else {
            warn!("missing config json");
            return false;
        };
        match ControllerConfig::from_json(&json) {
            Ok(config) => {
                h.controller.apply_config(&config);
                true
            }
            Err(e) => {
                warn!(error = %e, "config rejected");
                false
            }
        }
    })
}

// ========================
// C-ABI: Frame
// ========================

/// Run one host frame (`HostFrame` JSON) and return the queued host requests
/// as a JSON array
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_controller_step(handle: *mut MeleeController, frame_json: *const c_char) -> *mut c_char {
    with_controller(handle, "step", std::ptr::null_mut(), |h| {
        let Some(json) = parse_cstr(frame_json) else {
            warn!("missing frame json");
            return std::ptr::null_mut();
        };
        let frame: HostFrame = match serde_json::from_str(&json) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "malformed frame json");
                return std::ptr::null_mut();
            }
        };
        h.world = lookup_from_records(&frame.actors);
        h.controller.step(&frame);
        json_to_cstring(&h.controller.drain_requests())
    })
}

/// Report the attack animation's play rate and local root-motion velocity
/// for calls made between frames. A negative play rate means unknown.
#[no_mangle]
pub extern "C" fn melee_controller_sync_animation(
    handle: *mut MeleeController,
    play_rate: f32,
    vel_x: f32,
    vel_y: f32,
    vel_z: f32,
) -> bool {
    with_controller(handle, "sync_animation", false, |h| {
        let mut report = AnimSync::driven(play_rate, Vec3::new(vel_x, vel_y, vel_z));
        if play_rate < 0.0 {
            report.play_rate = None;
        }
        h.controller.sync_animation(&report);
        true
    })
}

/// Replace the known actors (`ActorRecord` JSON array) for calls made
/// between frames
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_controller_set_actors(handle: *mut MeleeController, actors_json: *const c_char) -> bool {
    with_controller(handle, "set_actors", false, |h| {
        let records: Option<Vec<ActorRecord>> =
            parse_cstr(actors_json).and_then(|json| serde_json::from_str(&json).ok());
        match records {
            Some(records) => {
                h.world = lookup_from_records(&records);
                true
            }
            None => {
                warn!("malformed actors json");
                false
            }
        }
    })
}

/// Host requests queued since the last drain, as a JSON array
#[no_mangle]
pub extern "C" fn melee_controller_drain_requests(handle: *mut MeleeController) -> *mut c_char {
    with_controller(handle, "drain_requests", std::ptr::null_mut(), |h| {
        json_to_cstring(&h.controller.drain_requests())
    })
}

#[no_mangle]
pub extern "C" fn melee_controller_snapshot(handle: *mut MeleeController) -> *mut c_char {
    with_controller(handle, "snapshot", std::ptr::null_mut(), |h| {
        json_to_cstring(&h.controller.snapshot())
    })
}

/// Hex SHA3-256 of the controller state
#[no_mangle]
pub extern "C" fn melee_controller_state_digest(handle: *mut MeleeController) -> *mut c_char {
    with_controller(handle, "state_digest", std::ptr::null_mut(), |h| {
        CString::new(h.controller.state_digest())
            .unwrap_or_default()
            .into_raw()
    })
}

// ========================
// C-ABI: Health
// ========================

#[no_mangle]
pub extern "C" fn melee_modify_health(handle: *mut MeleeController, delta: f32) -> f32 {
    with_controller(handle, "modify_health", INVALID_HANDLE_F32, |h| {
        h.controller.modify_health(delta)
    })
}

#[no_mangle]
pub extern "C" fn melee_set_health(handle: *mut MeleeController, value: f32) -> f32 {
    with_controller(handle, "set_health", INVALID_HANDLE_F32, |h| {
        h.controller.set_health(value)
    })
}

// ========================
// C-ABI: Attacks
// ========================

/// Start the named attack directly. Unknown names are a no-op.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_perform_attack(handle: *mut MeleeController, attack_name: *const c_char) -> bool {
    with_controller(handle, "perform_attack", false, |h| {
        let Some(name) = parse_cstr(attack_name) else {
            warn!("missing attack name");
            return false;
        };
        let MeleeController { controller, world } = h;
        controller.perform_attack_by_name(&name, &*world);
        controller.current_attack().is_some_and(|a| a.name == name)
    })
}

/// Attack button press: 0 light, 1 heavy. Returns the started attack's id or -1.
#[no_mangle]
pub extern "C" fn melee_perform_attack_input(handle: *mut MeleeController, input: u32) -> i64 {
    with_controller(handle, "perform_attack_input", -1, |h| {
        let input = match input {
            0 => AttackInput::Light,
            1 => AttackInput::Heavy,
            other => {
                debug!(other, "unknown attack input");
                return -1;
            }
        };
        let MeleeController { controller, world } = h;
        controller
            .perform_attack_input(input, &*world)
            .map_or(-1, |id| i64::from(id.0))
    })
}

#[no_mangle]
pub extern "C" fn melee_end_charge(handle: *mut MeleeController) {
    with_controller(handle, "end_charge", (), |h| {
        let MeleeController { controller, world } = h;
        controller.end_charge(&*world);
    })
}

/// Current attack entry as JSON, or null when idle
#[no_mangle]
pub extern "C" fn melee_current_attack(handle: *mut MeleeController) -> *mut c_char {
    with_controller(handle, "current_attack", std::ptr::null_mut(), |h| {
        match h.controller.current_attack() {
            Some(entry) => json_to_cstring(entry),
            None => std::ptr::null_mut(),
        }
    })
}

#[no_mangle]
pub extern "C" fn melee_reset_combo(handle: *mut MeleeController) {
    with_controller(handle, "reset_combo", (), |h| h.controller.reset_combo());
}

#[no_mangle]
pub extern "C" fn melee_add_combo_hit(handle: *mut MeleeController) -> u32 {
    with_controller(handle, "add_combo_hit", 0, |h| h.controller.add_combo_hit())
}

// ========================
// C-ABI: Movement
// ========================

#[no_mangle]
pub extern "C" fn melee_begin_dodge(handle: *mut MeleeController) -> bool {
    with_controller(handle, "begin_dodge", false, |h| h.controller.begin_dodge())
}

#[no_mangle]
pub extern "C" fn melee_end_dodge(handle: *mut MeleeController) {
    with_controller(handle, "end_dodge", (), |h| h.controller.end_dodge());
}

#[no_mangle]
pub extern "C" fn melee_jump(handle: *mut MeleeController) -> bool {
    with_controller(handle, "jump", false, |h| h.controller.jump())
}

#[no_mangle]
pub extern "C" fn melee_landed(handle: *mut MeleeController) {
    with_controller(handle, "landed", (), |h| h.controller.landed());
}

#[no_mangle]
pub extern "C" fn melee_sprint(handle: *mut MeleeController, pressed: bool) {
    with_controller(handle, "sprint", (), |h| h.controller.sprint(pressed));
}

// ========================
// C-ABI: Proximity & interaction
// ========================

/// Proximity trigger enter/exit. `kind` is 0 enemy, 1 item, 2 chest;
/// `actor_bits` is the entity's u64 bit pattern.
#[no_mangle]
pub extern "C" fn melee_proximity(handle: *mut MeleeController, actor_bits: u64, kind: u32, entered: bool) -> bool {
    with_controller(handle, "proximity", false, |h| {
        let Some(kind) = ActorKind::from_id(kind) else {
            warn!(kind, "unknown actor kind");
            return false;
        };
        let Ok(actor) = Entity::try_from_bits(actor_bits) else {
            warn!(actor_bits, "invalid entity bits");
            return false;
        };
        let MeleeController { controller, world } = h;
        if entered {
            controller.proximity_enter(actor, kind, &*world);
        } else {
            controller.proximity_exit(actor, kind);
        }
        true
    })
}

/// Open a chest or pick up an item; true if either was requested
#[no_mangle]
pub extern "C" fn melee_interact(handle: *mut MeleeController) -> bool {
    with_controller(handle, "interact", false, |h| {
        let MeleeController { controller, world } = h;
        controller.interact(&*world).is_some()
    })
}

// ========================
// C-ABI: Hits & effects
// ========================

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_add_hit(
    handle: *mut MeleeController,
    bone: *const c_char,
    duration: f32,
    dir_x: f32,
    dir_y: f32,
    dir_z: f32,
    force: f32,
) -> bool {
    with_controller(handle, "add_hit", false, |h| {
        let Some(bone) = parse_cstr(bone) else {
            warn!("missing bone name");
            return false;
        };
        h.controller
            .add_hit(&bone, duration, Vec3::new(dir_x, dir_y, dir_z), force)
    })
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_add_effect(
    handle: *mut MeleeController,
    effect_id: *const c_char,
    intensity: f32,
    duration: f32,
    ticks: u32,
) -> bool {
    with_controller(handle, "add_effect", false, |h| {
        let Some(id) = parse_cstr(effect_id) else {
            warn!("missing effect id");
            return false;
        };
        h.controller.add_effect(&id, intensity, duration, ticks);
        h.controller.effects.get(&id).is_some_and(|e| e.is_active())
    })
}

// ========================
// C-ABI: Replay
// ========================

/// Play a recording back and return a `PlaybackReport` as JSON, or null if
/// the recording or dictionary is invalid
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn melee_replay_verify(recording_json: *const c_char, dictionary_ron: *const c_char) -> *mut c_char {
    let (Some(json), Some(ron)) = (parse_cstr(recording_json), parse_cstr(dictionary_ron)) else {
        warn!("missing replay or dictionary");
        return std::ptr::null_mut();
    };
    let recording = match ReplayRecording::from_json(&json) {
        Ok(recording) => recording,
        Err(e) => {
            warn!(error = %e, "invalid replay");
            return std::ptr::null_mut();
        }
    };
    let dictionary = match AttackDictionary::from_ron(&ron) {
        Ok(dict) => Arc::new(dict),
        Err(e) => {
            warn!(error = %e, "invalid attack dictionary");
            return std::ptr::null_mut();
        }
    };
    match replay::play_back(&recording, dictionary) {
        Ok(report) => json_to_cstring(&report),
        Err(e) => {
            warn!(error = %e, "replay failed");
            std::ptr::null_mut()
        }
    }
}
