//! Input recording and deterministic playback.
//!
//! A recording stores every [`HostFrame`] fed to a controller together with the
//! SHA3 digest of the controller state after that frame. Playback feeds the
//! same frames into a fresh controller built from the recorded config and
//! reports the first frame whose digest differs.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::combat::AttackDictionary;
use crate::config::ControllerConfig;
use crate::controller::CharacterController;
use crate::input::HostFrame;

pub const REPLAY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read replay: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse replay: {0}")]
    Json(#[from] serde_json::Error),

    #[error("replay format version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("replay content hash mismatch")]
    Integrity,

    #[error("replay is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayHeader {
    pub replay_id: String,
    pub version: u32,
    pub config: ControllerConfig,
    /// Player hooks (soft-lock aiming) rather than plain animation-driven attacks
    pub player: bool,
    pub total_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame: HostFrame,
    /// State digest after the frame ran
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecording {
    pub header: ReplayHeader,
    pub frames: Vec<RecordedFrame>,
    pub content_hash: String,
}

impl ReplayRecording {
    fn compute_hash(header: &ReplayHeader, frames: &[RecordedFrame]) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(serde_json::to_vec(header).unwrap_or_default());
        for frame in frames {
            hasher.update(frame.frame.tick.to_le_bytes());
            hasher.update(frame.digest.as_bytes());
        }
        hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn verify(&self) -> bool {
        Self::compute_hash(&self.header, &self.frames) == self.content_hash
    }

    pub fn final_digest(&self) -> Option<&str> {
        self.frames.last().map(|f| f.digest.as_str())
    }

    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and check version and content hash
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let recording: Self = serde_json::from_str(json)?;
        if recording.header.version != REPLAY_FORMAT_VERSION {
            return Err(ReplayError::Version {
                found: recording.header.version,
                expected: REPLAY_FORMAT_VERSION,
            });
        }
        if !recording.verify() {
            return Err(ReplayError::Integrity);
        }
        Ok(recording)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Collects frames as they are played
pub struct ReplayRecorder {
    header: ReplayHeader,
    frames: Vec<RecordedFrame>,
}

impl ReplayRecorder {
    pub fn new(replay_id: &str, config: &ControllerConfig, player: bool) -> Self {
        Self {
            header: ReplayHeader {
                replay_id: replay_id.to_string(),
                version: REPLAY_FORMAT_VERSION,
                config: config.clone(),
                player,
                total_frames: 0,
            },
            frames: Vec::new(),
        }
    }

    /// Record a frame after `controller` has run it
    pub fn record(&mut self, frame: HostFrame, controller: &CharacterController) {
        self.frames.push(RecordedFrame {
            frame,
            digest: controller.state_digest(),
        });
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn finish(mut self) -> ReplayRecording {
        self.header.total_frames = self.frames.len();
        let content_hash = ReplayRecording::compute_hash(&self.header, &self.frames);
        info!(id = %self.header.replay_id, frames = self.frames.len(), "replay recorded");
        ReplayRecording {
            header: self.header,
            frames: self.frames,
            content_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub frames: usize,
    pub final_digest: String,
    /// Tick of the first frame whose state differs from the recording
    pub first_divergence: Option<u64>,
}

impl PlaybackReport {
    pub fn is_deterministic(&self) -> bool {
        self.first_divergence.is_none()
    }
}

/// Replay `recording` into a fresh controller
pub fn play_back(
    recording: &ReplayRecording,
    dictionary: Arc<AttackDictionary>,
) -> Result<PlaybackReport, ReplayError> {
    if recording.frames.is_empty() {
        return Err(ReplayError::Empty);
    }

    let config = &recording.header.config;
    let mut controller = if recording.header.player {
        CharacterController::player(dictionary, config)
    } else {
        CharacterController::new(dictionary, config, Default::default())
    };

    let mut first_divergence = None;
    let mut final_digest = String::new();
    for recorded in &recording.frames {
        controller.step(&recorded.frame);
        controller.drain_requests();

        final_digest = controller.state_digest();
        if first_divergence.is_none() && final_digest != recorded.digest {
            warn!(tick = recorded.frame.tick, "replay diverged");
            first_divergence = Some(recorded.frame.tick);
        }
    }

    Ok(PlaybackReport {
        frames: recording.frames.len(),
        final_digest,
        first_divergence,
    })
}
