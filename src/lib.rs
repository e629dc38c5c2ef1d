//! Melee Controller - Combat & Locomotion Core
//!
//! Engine-agnostic logic for a third-person action character:
//! - Attack dictionary and combo state machine (openers, follow-ups, charge)
//! - Soft-lock targeting and proximity tracking
//! - Dodge with lock-out, sprint/jump locomotion, air-time recovery
//! - Health, combo hit counter, timed effects, hit reactions
//! - Camera follow and look input
//! - Headless host stand-in and deterministic replay
//! - Bevy plugin and C bridge for host engines

pub mod angle;
pub mod bridge;
pub mod camera;
pub mod combat;
pub mod config;
pub mod constants;
pub mod controller;
pub mod dodge;
pub mod effects;
pub mod host;
pub mod hotreload;
pub mod input;
pub mod logging;
pub mod movement;
pub mod plugin;
pub mod reaction;
pub mod replay;
pub mod sim;
pub mod targeting;
pub mod timers;

pub use controller::CharacterController;
