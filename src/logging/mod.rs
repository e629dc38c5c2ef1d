//! `tracing` initialisation shared by the headless binary, the Bevy plugin and
//! the C bridge. Initialisation is idempotent: the first call wins and later
//! calls are ignored, so a host may call it from every entry point.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub struct LoggingPlugin {
    pub config: TracingConfig,
}

impl Default for LoggingPlugin {
    fn default() -> Self {
        Self {
            config: TracingConfig::default(),
        }
    }
}

impl Plugin for LoggingPlugin {
    fn build(&self, _app: &mut App) {
        init_tracing(&self.config);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Numeric level used across the C boundary; unknown ids read as `Info`
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_targets: bool,
    pub show_thread_ids: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("melee_core::combat".to_string(), LogLevel::Info),
                ("melee_core::targeting".to_string(), LogLevel::Info),
                ("melee_core::bridge".to_string(), LogLevel::Warn),
            ],
            show_targets: true,
            show_thread_ids: false,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    /// Same config with every filter lowered to `level` (debug sessions)
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        for (_, module_level) in &mut self.module_filters {
            *module_level = level;
        }
        self
    }

    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{}={}", module, level.as_str()));
        }
        parts.join(",")
    }
}

static TRACING_INIT: Once = Once::new();

pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// `RUST_LOG` overrides the configured filters when set
pub fn init_tracing(config: &TracingConfig) {
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.to_env_filter_string()));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        // Bevy's LogPlugin may already own the global subscriber
        let _ = subscriber.try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ids() {
        assert_eq!(LogLevel::from_id(0), LogLevel::Trace);
        assert_eq!(LogLevel::from_id(4), LogLevel::Error);
        assert_eq!(LogLevel::from_id(42), LogLevel::Info);
    }

    #[test]
    fn test_default_filter_covers_core_modules() {
        let filter = TracingConfig::default().to_env_filter_string();
        assert!(filter.starts_with("info"));
        assert!(filter.contains("melee_core::combat=info"));
        assert!(filter.contains("melee_core::targeting=info"));
        assert!(filter.contains("melee_core::bridge=warn"));
    }

    #[test]
    fn test_with_level_lowers_everything() {
        let filter = TracingConfig::default()
            .with_level(LogLevel::Trace)
            .to_env_filter_string();
        assert!(!filter.contains("info"));
        assert!(!filter.contains("warn"));
        assert!(filter.contains("melee_core::combat=trace"));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = TracingConfig::default().with_level(LogLevel::Debug);
        let json = serde_json::to_string(&config).unwrap();
        let back: TracingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing_default();
        init_tracing(&TracingConfig::default().with_level(LogLevel::Debug));
        tracing::debug!("still fine");
    }
}
