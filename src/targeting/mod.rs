//! Nearby-actor tracking for soft-lock, item pickup and chest interaction.
//!
//! Lists hold `Entity` handles only; the actors themselves belong to the host.
//! Entries are appended on proximity enter, removed by identity on exit and
//! pruned lazily whenever a scan finds that the handle no longer resolves.

use bevy::math::Vec3;
use bevy::prelude::{Component, Entity, Event};
use tracing::trace;

use crate::host::{ActorKind, ActorLookup};

pub mod softlock;

pub use softlock::SoftLock;

/// Proximity trigger enter/exit raised by the physics collaborator
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityEvent {
    pub actor: Entity,
    pub kind: ActorKind,
    pub entered: bool,
}

/// Ordered candidate handles. Order is trigger-enter order and decides ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    entries: Vec<Entity>,
}

impl CandidateList {
    /// Append unless already present; returns whether it was added
    pub fn add(&mut self, actor: Entity) -> bool {
        if self.entries.contains(&actor) {
            return false;
        }
        self.entries.push(actor);
        true
    }

    /// Remove by identity keeping the remaining order
    pub fn remove(&mut self, actor: Entity) -> bool {
        match self.entries.iter().position(|e| *e == actor) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, actor: Entity) -> bool {
        self.entries.contains(&actor)
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop every entry `keep` rejects; returns how many were dropped
    pub fn retain(&mut self, mut keep: impl FnMut(Entity) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| keep(*e));
        before - self.entries.len()
    }
}

/// Enemies, items and chests currently inside the actor's proximity triggers
#[derive(Component, Debug, Clone, Default)]
pub struct NearbyActors {
    pub enemies: CandidateList,
    pub items: CandidateList,
    pub chests: CandidateList,
    closest_item: Option<Entity>,
}

impl NearbyActors {
    /// Enemies that are already dead are not tracked
    pub fn on_enter(&mut self, actor: Entity, kind: ActorKind, lookup: &dyn ActorLookup) {
        match kind {
            ActorKind::Enemy => {
                let alive = lookup.snapshot(actor).is_some_and(|s| s.is_alive());
                if alive {
                    self.enemies.add(actor);
                } else {
                    trace!(?actor, "ignoring dead or unknown enemy");
                }
            }
            ActorKind::Item => {
                self.items.add(actor);
            }
            ActorKind::Chest => {
                self.chests.add(actor);
            }
        }
    }

    pub fn on_exit(&mut self, actor: Entity, kind: ActorKind) {
        match kind {
            ActorKind::Enemy => {
                self.enemies.remove(actor);
            }
            ActorKind::Item => {
                self.items.remove(actor);
                if self.closest_item == Some(actor) {
                    self.closest_item = None;
                }
            }
            ActorKind::Chest => {
                self.chests.remove(actor);
            }
        }
    }

    /// Cached result of the last [`NearbyActors::refresh_closest_item`]
    pub fn closest_item(&self) -> Option<Entity> {
        self.closest_item
    }

    /// Recompute the closest item by squared distance. Stale handles are pruned
    /// and the first of equally distant items wins.
    pub fn refresh_closest_item(&mut self, origin: Vec3, lookup: &dyn ActorLookup) -> Option<Entity> {
        let pruned = self.items.retain(|item| lookup.snapshot(item).is_some());
        if pruned > 0 {
            trace!(pruned, "pruned stale items");
        }

        let mut best: Option<(Entity, f32)> = None;
        for item in self.items.iter() {
            let Some(snapshot) = lookup.snapshot(item) else {
                continue;
            };
            let dist_sq = snapshot.position.distance_squared(origin);
            if best.map_or(true, |(_, d)| dist_sq < d) {
                best = Some((item, dist_sq));
            }
        }

        self.closest_item = best.map(|(e, _)| e);
        self.closest_item
    }

    /// Closest chest that can still be opened, if any
    pub fn closest_openable_chest(&mut self, origin: Vec3, lookup: &dyn ActorLookup) -> Option<Entity> {
        self.chests.retain(|chest| lookup.snapshot(chest).is_some());

        let mut best: Option<(Entity, f32)> = None;
        for chest in self.chests.iter() {
            let Some(snapshot) = lookup.snapshot(chest) else {
                continue;
            };
            if !snapshot.openable {
                continue;
            }
            let dist_sq = snapshot.position.distance_squared(origin);
            if best.map_or(true, |(_, d)| dist_sq < d) {
                best = Some((chest, dist_sq));
            }
        }
        best.map(|(e, _)| e)
    }

    pub fn clear(&mut self) {
        self.enemies.clear();
        self.items.clear();
        self.chests.clear();
        self.closest_item = None;
    }
}
