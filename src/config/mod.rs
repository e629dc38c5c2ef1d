//! Controller tuning loaded from `config/controller.json`.
//!
//! Every field has a default from `constants`, so a config file only needs the
//! values it changes.

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::constants::{
    BASE_LOOK_UP_RATE, BASE_TURN_RATE, CAMERA_ANGLE_INFLUENCE, CAMERA_ROTATION_RATE,
    COMBO_NO_HIT_DURATION, DODGE_LOCK_DURATION, DODGE_MOVE_CONTROL_FACTOR, DODGE_SPEED,
    MAX_DIRECTIONAL_DEVIATION, MAX_DODGE_COUNT, MAX_HEALTH, SIM_TICK_RATE,
};
use crate::movement::LocomotionTuning;

pub const DEFAULT_CONFIG_PATH: &str = "config/controller.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to watch config: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DodgeConfig {
    pub max_count: u32,
    pub lock_duration: f32,
    pub move_control_factor: f32,
    pub speed: f32,
    pub animation: String,
}

impl Default for DodgeConfig {
    fn default() -> Self {
        Self {
            max_count: MAX_DODGE_COUNT,
            lock_duration: DODGE_LOCK_DURATION,
            move_control_factor: DODGE_MOVE_CONTROL_FACTOR,
            speed: DODGE_SPEED,
            animation: "Dodge".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub angle_influence: f32,
    pub rotation_rate: f32,
    pub base_turn_rate: f32,
    pub base_look_up_rate: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            angle_influence: CAMERA_ANGLE_INFLUENCE,
            rotation_rate: CAMERA_ROTATION_RATE,
            base_turn_rate: BASE_TURN_RATE,
            base_look_up_rate: BASE_LOOK_UP_RATE,
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub max_health: f32,
    pub max_directional_deviation: f32,
    pub allow_soft_lock: bool,
    pub combo_no_hit_duration: f32,
    pub root_bone: String,
    /// RON attack dictionary, relative to the working directory
    pub attack_dictionary: String,
    pub tick_rate: u32,
    pub dodge: DodgeConfig,
    pub camera: CameraConfig,
    pub locomotion: LocomotionTuning,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_health: MAX_HEALTH,
            max_directional_deviation: MAX_DIRECTIONAL_DEVIATION,
            allow_soft_lock: true,
            combo_no_hit_duration: COMBO_NO_HIT_DURATION,
            root_bone: "root".into(),
            attack_dictionary: "assets/attacks.ron".into(),
            tick_rate: SIM_TICK_RATE,
            dodge: DodgeConfig::default(),
            camera: CameraConfig::default(),
            locomotion: LocomotionTuning::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        field,
        reason: reason.into(),
    })
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_nan() || value < 0.0 {
        return invalid(field, format!("must be >= 0, got {value}"));
    }
    Ok(())
}

fn unit_range(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return invalid(field, format!("must be within [0, 1], got {value}"));
    }
    Ok(())
}

impl ControllerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_health.is_nan() || self.max_health <= 0.0 {
            return invalid("max_health", format!("must be > 0, got {}", self.max_health));
        }
        if !(0.0..=180.0).contains(&self.max_directional_deviation) {
            return invalid(
                "max_directional_deviation",
                format!("must be within [0, 180], got {}", self.max_directional_deviation),
            );
        }
        non_negative("combo_no_hit_duration", self.combo_no_hit_duration)?;
        if self.tick_rate == 0 {
            return invalid("tick_rate", "must be > 0");
        }

        non_negative("dodge.lock_duration", self.dodge.lock_duration)?;
        unit_range("dodge.move_control_factor", self.dodge.move_control_factor)?;
        non_negative("dodge.speed", self.dodge.speed)?;

        non_negative("camera.angle_influence", self.camera.angle_influence)?;
        non_negative("camera.rotation_rate", self.camera.rotation_rate)?;

        let loco = &self.locomotion;
        non_negative("locomotion.run_speed", loco.run_speed)?;
        if loco.sprint_speed.is_nan() || loco.sprint_speed <= 0.0 {
            return invalid("locomotion.sprint_speed", "must be > 0");
        }
        non_negative("locomotion.min_deceleration", loco.min_deceleration)?;
        non_negative("locomotion.max_deceleration", loco.max_deceleration)?;
        non_negative("locomotion.max_air_time", loco.max_air_time)?;
        non_negative("locomotion.ground_friction", loco.ground_friction)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ControllerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ControllerConfig::from_json(r#"{"max_health": 250.0, "dodge": {"max_count": 3}}"#).unwrap();
        assert_eq!(config.max_health, 250.0);
        assert_eq!(config.dodge.max_count, 3);
        assert_eq!(config.dodge.lock_duration, DODGE_LOCK_DURATION);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ControllerConfig::from_json(r#"{"dodge": {"move_control_factor": 1.5}}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "dodge.move_control_factor",
                ..
            }
        ));
        assert!(ControllerConfig::from_json(r#"{"max_health": 0}"#).is_err());
        assert!(matches!(
            ControllerConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = ControllerConfig::default();
        config.allow_soft_lock = false;
        let back = ControllerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
