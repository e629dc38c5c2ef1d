//! Attack definitions and the attack dictionary.
//!
//! A dictionary is authored in RON as a flat list of attacks plus the
//! "opener" table saying which attack starts a combo for each input and
//! stance. Combos chain through each attack's `follow_ups`. Names are
//! resolved to dense [`AttackId`]s once at load time, so the per-frame state
//! machine never touches strings.

use bevy::prelude::Resource;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::host::BodyPose;

/// Dense index of an attack inside its dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttackId(pub u32);

impl AttackId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Attack buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackInput {
    Light,
    Heavy,
}

/// What the character is doing when a combo starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    Ground,
    Sprint,
    Air,
}

impl Stance {
    pub fn from_state(grounded: bool, sprinting: bool) -> Self {
        if !grounded {
            Stance::Air
        } else if sprinting {
            Stance::Sprint
        } else {
            Stance::Ground
        }
    }
}

/// Follow-up link: pressing `input` during the combo window continues into `attack`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub input: AttackInput,
    pub attack: String,
}

/// Which attack starts a combo for an input in a stance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opener {
    pub input: AttackInput,
    pub stance: Stance,
    pub attack: String,
}

fn default_pose() -> BodyPose {
    BodyPose::FullBody
}

fn one() -> f32 {
    1.0
}

/// One combo step. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackEntry {
    pub name: String,
    #[serde(default = "default_pose")]
    pub pose: BodyPose,
    pub animation: String,
    #[serde(default = "one")]
    pub play_rate: f32,
    /// Seconds the attack can be held; 0 means not chargeable
    #[serde(default)]
    pub max_charge: f32,
    /// Fraction of movement input honoured while this attack runs
    #[serde(default)]
    pub move_control: f32,
    /// Fraction of turn input honoured while this attack runs
    #[serde(default)]
    pub turn_control: f32,
    /// Combo timer value past which the combo ends
    pub end_combo_wait: f32,
    /// Combo timer value at which follow-ups are accepted
    #[serde(default)]
    pub combo_window_start: f32,
    #[serde(default)]
    pub allow_jump: bool,
    /// Shorten the attack lunge so it stops at a soft-locked target
    #[serde(default)]
    pub range_scales_movement: bool,
    /// Index handed to AI that decides how to respond to this attack
    #[serde(default)]
    pub ai_successor: u32,
    #[serde(default)]
    pub follow_ups: Vec<FollowUp>,
}

impl AttackEntry {
    pub fn is_chargeable(&self) -> bool {
        self.max_charge > 0.0
    }
}

/// On-disk dictionary layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttackDictionaryDef {
    pub attacks: Vec<AttackEntry>,
    #[serde(default)]
    pub openers: Vec<Opener>,
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("failed to read attack dictionary: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse attack dictionary: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("duplicate attack name: {0}")]
    DuplicateName(String),

    #[error("{from} links to unknown attack {target}")]
    UnknownAttack { from: String, target: String },

    #[error("attack {name}: {reason}")]
    InvalidEntry { name: String, reason: String },
}

/// Shared, immutable attack table
#[derive(Resource, Debug, Clone, Default)]
pub struct AttackDictionary {
    entries: Vec<AttackEntry>,
    by_name: HashMap<String, AttackId>,
    follow_ups: Vec<Vec<(AttackInput, AttackId)>>,
    openers: Vec<(AttackInput, Stance, AttackId)>,
}

impl AttackDictionary {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let dict = Self::from_ron(&text)?;
        info!(
            "Loaded {} attacks from {:?}",
            dict.len(),
            path.as_ref()
        );
        Ok(dict)
    }

    pub fn from_ron(text: &str) -> Result<Self, DictionaryError> {
        let def: AttackDictionaryDef = ron::from_str(text)?;
        Self::from_def(def)
    }

    pub fn from_def(def: AttackDictionaryDef) -> Result<Self, DictionaryError> {
        let mut by_name = HashMap::with_capacity(def.attacks.len());
        for (i, entry) in def.attacks.iter().enumerate() {
            validate_entry(entry)?;
            if by_name.insert(entry.name.clone(), AttackId(i as u32)).is_some() {
                return Err(DictionaryError::DuplicateName(entry.name.clone()));
            }
        }

        let resolve = |from: &str, target: &str| {
            by_name
                .get(target)
                .copied()
                .ok_or_else(|| DictionaryError::UnknownAttack {
                    from: from.to_string(),
                    target: target.to_string(),
                })
        };

        let mut follow_ups = Vec::with_capacity(def.attacks.len());
        for entry in &def.attacks {
            let links = entry
                .follow_ups
                .iter()
                .map(|f| Ok((f.input, resolve(&entry.name, &f.attack)?)))
                .collect::<Result<Vec<_>, DictionaryError>>()?;
            follow_ups.push(links);
        }

        let openers = def
            .openers
            .iter()
            .map(|o| Ok((o.input, o.stance, resolve("openers", &o.attack)?)))
            .collect::<Result<Vec<_>, DictionaryError>>()?;

        let dict = Self {
            entries: def.attacks,
            by_name,
            follow_ups,
            openers,
        };

        for id in dict.unreachable() {
            if let Some(entry) = dict.get(id) {
                warn!("Attack {} cannot be reached from any opener", entry.name);
            }
        }

        Ok(dict)
    }

    pub fn get(&self, id: AttackId) -> Option<&AttackEntry> {
        self.entries.get(id.index())
    }

    pub fn id_of(&self, name: &str) -> Option<AttackId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&AttackEntry> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttackId, &AttackEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (AttackId(i as u32), e))
    }

    /// Attack that starts a combo. Sprint falls back to the ground opener.
    pub fn opener(&self, input: AttackInput, stance: Stance) -> Option<AttackId> {
        let find = |stance: Stance| {
            self.openers
                .iter()
                .find(|(i, s, _)| *i == input && *s == stance)
                .map(|(_, _, id)| *id)
        };
        find(stance).or_else(|| match stance {
            Stance::Sprint => find(Stance::Ground),
            _ => None,
        })
    }

    pub fn follow_up(&self, from: AttackId, input: AttackInput) -> Option<AttackId> {
        self.follow_ups
            .get(from.index())?
            .iter()
            .find(|(i, _)| *i == input)
            .map(|(_, id)| *id)
    }

    /// Attacks no opener can chain into
    pub fn unreachable(&self) -> Vec<AttackId> {
        let mut graph: DiGraph<AttackId, AttackInput> = DiGraph::with_capacity(self.len(), 0);
        let nodes: Vec<NodeIndex> = (0..self.len())
            .map(|i| graph.add_node(AttackId(i as u32)))
            .collect();
        for (from, links) in self.follow_ups.iter().enumerate() {
            for (input, to) in links {
                graph.add_edge(nodes[from], nodes[to.index()], *input);
            }
        }

        let mut reached = vec![false; self.len()];
        for (_, _, start) in &self.openers {
            let mut dfs = Dfs::new(&graph, nodes[start.index()]);
            while let Some(node) = dfs.next(&graph) {
                reached[graph[node].index()] = true;
            }
        }

        reached
            .iter()
            .enumerate()
            .filter(|(_, r)| !**r)
            .map(|(i, _)| AttackId(i as u32))
            .collect()
    }
}

fn validate_entry(entry: &AttackEntry) -> Result<(), DictionaryError> {
    let invalid = |reason: &str| {
        Err(DictionaryError::InvalidEntry {
            name: entry.name.clone(),
            reason: reason.to_string(),
        })
    };
    if entry.play_rate.is_nan() || entry.play_rate <= 0.0 {
        return invalid("play_rate must be positive");
    }
    if entry.max_charge.is_nan() || entry.max_charge < 0.0 {
        return invalid("max_charge must be non-negative");
    }
    if entry.end_combo_wait.is_nan() || entry.end_combo_wait < 0.0 {
        return invalid("end_combo_wait must be non-negative");
    }
    if !(0.0..=1.0).contains(&entry.move_control) || !(0.0..=1.0).contains(&entry.turn_control) {
        return invalid("control factors must be within [0, 1]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"(
        attacks: [
            (name: "slash_1", animation: "Slash1", end_combo_wait: 0.6, combo_window_start: 0.3,
             move_control: 0.2, follow_ups: [(input: Light, attack: "slash_2"), (input: Heavy, attack: "smash")]),
            (name: "slash_2", animation: "Slash2", end_combo_wait: 0.7, allow_jump: true),
            (name: "smash", animation: "Smash", max_charge: 1.5, end_combo_wait: 0.9, pose: UpperBody),
            (name: "air_kick", animation: "AirKick", end_combo_wait: 0.4),
            (name: "orphan", animation: "Unused", end_combo_wait: 0.4),
        ],
        openers: [
            (input: Light, stance: Ground, attack: "slash_1"),
            (input: Light, stance: Air, attack: "air_kick"),
        ],
    )"#;

    #[test]
    fn test_load_and_resolve() {
        let dict = AttackDictionary::from_ron(SAMPLE).unwrap();
        assert_eq!(dict.len(), 5);

        let slash = dict.id_of("slash_1").unwrap();
        assert_eq!(dict.opener(AttackInput::Light, Stance::Ground), Some(slash));
        assert_eq!(dict.opener(AttackInput::Light, Stance::Sprint), Some(slash));
        assert_eq!(dict.opener(AttackInput::Heavy, Stance::Ground), None);

        let smash = dict.follow_up(slash, AttackInput::Heavy).unwrap();
        let entry = dict.get(smash).unwrap();
        assert!(entry.is_chargeable());
        assert_eq!(entry.pose, BodyPose::UpperBody);
        assert!((entry.play_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unreachable_reported() {
        let dict = AttackDictionary::from_ron(SAMPLE).unwrap();
        let orphan = dict.id_of("orphan").unwrap();
        assert_eq!(dict.unreachable(), vec![orphan]);
    }

    #[test]
    fn test_unknown_link_rejected() {
        let text = r#"(attacks: [(name: "a", animation: "A", end_combo_wait: 0.5,
            follow_ups: [(input: Light, attack: "missing")])])"#;
        match AttackDictionary::from_ron(text) {
            Err(DictionaryError::UnknownAttack { from, target }) => {
                assert_eq!(from, "a");
                assert_eq!(target, "missing");
            }
            other => panic!("expected UnknownAttack, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_and_invalid_rejected() {
        let dup = r#"(attacks: [(name: "a", animation: "A", end_combo_wait: 0.5),
                                (name: "a", animation: "B", end_combo_wait: 0.5)])"#;
        assert!(matches!(
            AttackDictionary::from_ron(dup),
            Err(DictionaryError::DuplicateName(_))
        ));

        let bad = r#"(attacks: [(name: "a", animation: "A", end_combo_wait: 0.5, play_rate: 0.0)])"#;
        assert!(matches!(
            AttackDictionary::from_ron(bad),
            Err(DictionaryError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_parse_error_is_typed() {
        assert!(matches!(
            AttackDictionary::from_ron("(attacks: [oops"),
            Err(DictionaryError::Parse(_))
        ));
    }
}
