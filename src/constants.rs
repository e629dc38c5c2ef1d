//! Centralized tuning constants for the melee controller core.
//!
//! Eliminates magic numbers duplicated across the controller, the Bevy plugin
//! and the FFI bridge. `ControllerConfig::default()` is built from these.

// =====================================================
// Attack / Combo
// =====================================================

/// Charge animations play at `play_rate * CHARGE_PLAYRATE_SCALE / max_charge`
/// so holding the input reads as winding up.
pub const CHARGE_PLAYRATE_SCALE: f32 = 0.1;

/// Seconds without landing a hit before the combo hit counter resets
pub const COMBO_NO_HIT_DURATION: f32 = 2.5;

// =====================================================
// Targeting
// =====================================================

/// Maximum deviation (degrees) between input direction and enemy for soft-lock
pub const MAX_DIRECTIONAL_DEVIATION: f32 = 45.0;

// =====================================================
// Dodge
// =====================================================

/// Consecutive dodges allowed before the dodge lock kicks in
pub const MAX_DODGE_COUNT: u32 = 2;

/// Seconds of not dodging after which the dodge count resets
pub const DODGE_LOCK_DURATION: f32 = 0.6;

/// Movement control while dodging (0 = fully locked)
pub const DODGE_MOVE_CONTROL_FACTOR: f32 = 0.0;

/// Horizontal dodge speed in world units per second
pub const DODGE_SPEED: f32 = 1200.0;

/// Sideways input needed to snap a locked-on dodge to strictly left/right
pub const LOCKED_ON_DODGE_THRESHOLD: f32 = 0.2;

// =====================================================
// Camera
// =====================================================

/// Exponent of the off-axis camera follow power curve
pub const CAMERA_ANGLE_INFLUENCE: f32 = 5.0;

/// Camera follow rotation rate multiplier
pub const CAMERA_ROTATION_RATE: f32 = 0.6;

/// Base turn rate, degrees per second
pub const BASE_TURN_RATE: f32 = 45.0;

/// Base look up/down rate, degrees per second
pub const BASE_LOOK_UP_RATE: f32 = 45.0;

// =====================================================
// Locomotion
// =====================================================

/// Running speed in world units per second
pub const RUN_SPEED: f32 = 600.0;

/// Sprinting speed in world units per second
pub const SPRINT_SPEED: f32 = 900.0;

/// Braking deceleration at running speed or slower
pub const MIN_DECELERATION: f32 = 2048.0;

/// Braking deceleration at sprinting speed or faster
pub const MAX_DECELERATION: f32 = 512.0;

/// Seconds airborne before snapping back to the last grounded position
pub const MAX_AIR_TIME: f32 = 5.0;

/// Jumps allowed before touching the ground again
pub const MAX_JUMP_COUNT: u32 = 2;

/// Default ground friction restored after a dodge
pub const GROUND_FRICTION: f32 = 8.0;

// =====================================================
// Health
// =====================================================

/// Default maximum health
pub const MAX_HEALTH: f32 = 100.0;

// =====================================================
// Frame timing
// =====================================================

/// Host frame rate assumed by the headless simulation
pub const SIM_TICK_RATE: u32 = 60;
