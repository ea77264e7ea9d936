//! Id-keyed overlay lanes.

use serde::{Deserialize, Serialize};

use crate::overlay::Schedule;
use crate::trim::TrimPolicy;

/// An entity that lives in a lane and is placed by a [`Schedule`].
pub trait LaneEntity: Clone {
    type Id: Copy + Eq + std::fmt::Debug;

    fn id(&self) -> Self::Id;
    fn schedule(&self) -> &Schedule;
    fn schedule_mut(&mut self) -> &mut Schedule;
    /// How the trim engine may move this entity's edges.
    fn trim_policy(&self) -> TrimPolicy;
    /// Copy every field except identity.
    fn with_id(&self, id: Self::Id) -> Self;
}

/// Entities of one kind, in stacking order (later entries draw on top).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane<T> {
    items: Vec<T>,
}

impl<T> Default for Lane<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: LaneEntity> Lane<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_mut(&mut self, id: T::Id) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Insert directly above the entity with id `above`, or on top if absent.
    pub(crate) fn insert_above(&mut self, above: T::Id, item: T) {
        match self.items.iter().position(|existing| existing.id() == above) {
            Some(index) => self.items.insert(index + 1, item),
            None => self.items.push(item),
        }
    }

    pub(crate) fn remove(&mut self, id: T::Id) -> Option<T> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    /// Ids currently in the lane.
    pub fn ids(&self) -> Vec<T::Id> {
        self.items.iter().map(LaneEntity::id).collect()
    }
}
