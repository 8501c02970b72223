//! Read-only view of the entity map for behavior code.
//!
//! During an entity's update the engine removes it from the map and hands its
//! behavior a [`WorldView`] over the remaining siblings. The view is the only
//! way behavior code can observe other entities: it is immutable, scoped to
//! the single update call, and never stored. Mutations of siblings flow back
//! to the engine as [`Effect`](crate::entity::Effect)s instead.
//!
//! Iteration follows ascending entity id (the map is a `BTreeMap`), so query
//! results are deterministic.

use std::collections::BTreeMap;

use glam::Vec2;

use crate::entity::{Entity, EntityId, EntityKind};

/// Immutable view over the sibling entities of the entity being updated.
#[derive(Debug)]
pub struct WorldView<'a> {
    entities: &'a BTreeMap<EntityId, Entity>,
}

impl<'a> WorldView<'a> {
    /// Wraps the sibling map for one update call.
    #[must_use]
    pub fn new(entities: &'a BTreeMap<EntityId, Entity>) -> Self {
        Self { entities }
    }

    /// Looks up a sibling by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&'a Entity> {
        self.entities.get(&id)
    }

    /// Iterates all siblings in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Entity> {
        self.entities.values()
    }

    /// Iterates non-destroyed siblings in ascending id order.
    pub fn live(&self) -> impl Iterator<Item = &'a Entity> {
        self.entities.values().filter(|e| !e.is_destroyed())
    }

    /// Iterates non-destroyed siblings of one kind in ascending id order.
    pub fn live_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &'a Entity> {
        self.live().filter(move |e| e.kind() == kind)
    }

    /// The lowest-id live sibling of `kind` within `radius` of `from`.
    #[must_use]
    pub fn first_within(&self, kind: EntityKind, from: Vec2, radius: f32) -> Option<&'a Entity> {
        self.live_of_kind(kind)
            .find(|e| e.body().position.distance(from) <= radius)
    }

    /// The closest live sibling of `kind` to `from`, with its distance.
    ///
    /// Ties resolve to the lower id.
    #[must_use]
    pub fn nearest_of_kind(&self, kind: EntityKind, from: Vec2) -> Option<(&'a Entity, f32)> {
        let mut best: Option<(&Entity, f32)> = None;
        for entity in self.live_of_kind(kind) {
            let distance = entity.body().position.distance(from);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((entity, distance));
            }
        }
        best
    }

    /// Number of siblings visible through the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true when no siblings are visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
