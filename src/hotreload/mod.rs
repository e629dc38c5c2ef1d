//! Hot reload of `config/controller.json`.
//!
//! [`ConfigWatcher`] does the work and has no Bevy dependency so the C bridge
//! and the headless binary can poll it directly. Editors tend to fire several
//! events per save; a SHA3 digest of the file contents turns the repeats into
//! [`ReloadOutcome::Unchanged`]. A file that fails to parse or validate is
//! rejected and the last good config stays in effect.

use bevy::prelude::*;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Mutex;

use crate::config::{ConfigError, ControllerConfig, DEFAULT_CONFIG_PATH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReloadOutcome {
    /// Same bytes as the config in effect
    Unchanged,
    Applied,
    /// Kept the previous config
    Rejected(String),
}

pub struct ConfigWatcher {
    path: PathBuf,
    current: ControllerConfig,
    digest: [u8; 32],
    reload_count: u32,
    last_error: Option<String>,
    receiver: Option<Mutex<Receiver<notify::Result<Event>>>>,
    _watcher: Option<RecommendedWatcher>,
}

fn digest_of(bytes: &[u8]) -> [u8; 32] {
    Sha3_256::digest(bytes).into()
}

impl ConfigWatcher {
    /// Load the config at `path` without watching it; call [`ConfigWatcher::reload`]
    /// to pick up changes
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        let current = ControllerConfig::from_json(&text)?;
        Ok(Self {
            path,
            current,
            digest: digest_of(text.as_bytes()),
            reload_count: 0,
            last_error: None,
            receiver: None,
            _watcher: None,
        })
    }

    /// Load the config and watch its directory for changes
    pub fn watch(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut this = Self::open(path)?;
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;

        let dir = match this.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(path = %this.path.display(), "hot reload enabled");

        this.receiver = Some(Mutex::new(rx));
        this._watcher = Some(watcher);
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> &ControllerConfig {
        &self.current
    }

    pub fn reload_count(&self) -> u32 {
        self.reload_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_watching(&self) -> bool {
        self.receiver.is_some()
    }

    /// Re-read the file now
    pub fn reload(&mut self) -> ReloadOutcome {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => return self.reject(ConfigError::Io(e)),
        };
        let digest = digest_of(text.as_bytes());
        if digest == self.digest {
            return ReloadOutcome::Unchanged;
        }

        match ControllerConfig::from_json(&text) {
            Ok(config) => {
                self.current = config;
                self.digest = digest;
                self.reload_count += 1;
                self.last_error = None;
                info!(count = self.reload_count, "controller config reloaded");
                ReloadOutcome::Applied
            }
            Err(e) => self.reject(e),
        }
    }

    fn reject(&mut self, error: ConfigError) -> ReloadOutcome {
        let message = error.to_string();
        error!(error = %message, "config reload rejected, keeping previous config");
        self.last_error = Some(message.clone());
        ReloadOutcome::Rejected(message)
    }

    /// Drain pending file events; reloads at most once per call
    pub fn poll(&mut self) -> Option<ReloadOutcome> {
        let touched = {
            let receiver = self.receiver.as_ref()?;
            let Ok(receiver) = receiver.lock() else {
                warn!("config watcher channel poisoned");
                return None;
            };
            let mut touched = false;
            while let Ok(result) = receiver.try_recv() {
                match result {
                    Ok(event) => touched |= is_change_to(&event, &self.path),
                    Err(e) => warn!(error = %e, "file watcher error"),
                }
            }
            touched
        };
        touched.then(|| self.reload())
    }
}

fn is_change_to(event: &Event, path: &Path) -> bool {
    let relevant_kind = event.kind.is_modify() || event.kind.is_create();
    let name = path.file_name();
    relevant_kind && event.paths.iter().any(|p| name.is_some() && p.file_name() == name)
}

pub struct HotReloadPlugin {
    pub path: PathBuf,
}

impl Default for HotReloadPlugin {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}

impl Plugin for HotReloadPlugin {
    fn build(&self, app: &mut App) {
        let mut state = HotReloadState {
            watched_file: Some(self.path.clone()),
            ..default()
        };

        match ConfigWatcher::watch(&self.path) {
            Ok(watcher) => {
                state.enabled = true;
                app.insert_resource(watcher.current().clone())
                    .insert_resource(ConfigWatcherResource(watcher));
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "hot reload disabled");
                state.last_error = Some(e.to_string());
                app.init_resource::<ControllerConfig>();
            }
        }

        app.insert_resource(state)
            .add_event::<ConfigReloadEvent>()
            .add_systems(PreUpdate, process_config_changes);
    }
}

#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotReloadState {
    pub enabled: bool,
    pub watched_file: Option<PathBuf>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_reload_time: f64,
    pub last_error: Option<String>,
}

#[derive(Event, Debug, Clone)]
pub struct ConfigReloadEvent {
    pub path: PathBuf,
    pub outcome: ReloadOutcome,
}

#[derive(Resource)]
struct ConfigWatcherResource(ConfigWatcher);

fn process_config_changes(
    watcher: Option<ResMut<ConfigWatcherResource>>,
    mut config: ResMut<ControllerConfig>,
    mut state: ResMut<HotReloadState>,
    mut events: EventWriter<ConfigReloadEvent>,
    time: Res<Time>,
) {
    let Some(mut watcher) = watcher else {
        return;
    };
    let Some(outcome) = watcher.0.poll() else {
        return;
    };

    match &outcome {
        ReloadOutcome::Unchanged => return,
        ReloadOutcome::Applied => {
            *config = watcher.0.current().clone();
            state.reload_count = watcher.0.reload_count();
            state.last_reload_success = true;
            state.last_error = None;
        }
        ReloadOutcome::Rejected(message) => {
            state.last_reload_success = false;
            state.last_error = Some(message.clone());
        }
    }
    state.last_reload_time = time.elapsed_secs_f64();
    events.send(ConfigReloadEvent {
        path: watcher.0.path().to_path_buf(),
        outcome,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use tempfile::TempDir;

    fn write(dir: &TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("controller.json");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_reload_applies_and_skips_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"max_health": 120.0}"#);
        let mut watcher = ConfigWatcher::open(&path).unwrap();
        assert_eq!(watcher.current().max_health, 120.0);

        assert_eq!(watcher.reload(), ReloadOutcome::Unchanged);

        write(&dir, r#"{"max_health": 80.0}"#);
        assert_eq!(watcher.reload(), ReloadOutcome::Applied);
        assert_eq!(watcher.current().max_health, 80.0);
        assert_eq!(watcher.reload_count(), 1);
        assert_eq!(watcher.reload(), ReloadOutcome::Unchanged);
    }

    #[test]
    fn test_invalid_config_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"max_health": 120.0}"#);
        let mut watcher = ConfigWatcher::open(&path).unwrap();

        write(&dir, r#"{"max_health": -5.0}"#);
        assert!(matches!(watcher.reload(), ReloadOutcome::Rejected(_)));
        assert_eq!(watcher.current().max_health, 120.0);
        assert!(watcher.last_error().is_some());

        write(&dir, "{broken");
        assert!(matches!(watcher.reload(), ReloadOutcome::Rejected(_)));
        assert_eq!(watcher.reload_count(), 0);

        write(&dir, r#"{"max_health": 90.0}"#);
        assert_eq!(watcher.reload(), ReloadOutcome::Applied);
        assert!(watcher.last_error().is_none());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = ConfigWatcher::open(dir.path().join("nope.json")).err();
        assert!(matches!(err, Some(ConfigError::Io(_))));
    }

    #[test]
    fn test_unwatched_poll_is_none() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "{}");
        let mut watcher = ConfigWatcher::open(&path).unwrap();
        assert!(!watcher.is_watching());
        assert_eq!(watcher.poll(), None);
    }

    #[test]
    fn test_event_filter_matches_file_name() {
        let path = PathBuf::from("config/controller.json");
        let modify = Event::new(notify::EventKind::Modify(ModifyKind::Data(DataChange::Any)))
            .add_path(PathBuf::from("/abs/config/controller.json"));
        assert!(is_change_to(&modify, &path));

        let create = Event::new(notify::EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("config/controller.json"));
        assert!(is_change_to(&create, &path));

        let other = Event::new(notify::EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("config/other.json"));
        assert!(!is_change_to(&other, &path));
    }
}
