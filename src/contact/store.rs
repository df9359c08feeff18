//! Persistent bilateral constraint storage
//!
//! Constraints live in insertion order with a side index from [`FeatureKey`]
//! to position, so iteration order is deterministic and lookups are O(1).
//! Each step is bracketed by [`ConstraintStore::begin_step`] and
//! [`ConstraintStore::commit`]: constraints not matched in between are
//! removed at commit.

use crate::contact::types::{ContactConstraint, ContactPoint, FeatureKey};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ConstraintStore {
    constraints: Vec<ContactConstraint>,
    index: HashMap<FeatureKey, usize>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContactConstraint> {
        self.constraints.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ContactConstraint> {
        self.constraints.iter_mut()
    }

    pub fn get(&self, key: &FeatureKey) -> Option<&ContactConstraint> {
        self.index.get(key).map(|&i| &self.constraints[i])
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
        self.index.clear();
    }

    /// Mark every constraint inactive with zero distance
    pub fn begin_step(&mut self) {
        for cons in &mut self.constraints {
            cons.set_active(false);
            cons.set_distance(0.0);
        }
    }

    /// Find or create the constraint for a contact candidate
    ///
    /// The candidate is keyed by `pnt1` when `hash_using_face` is set and by
    /// `pnt0` otherwise. An existing constraint is rejected if it is
    /// separating (negative impulse) or was already matched this step by a
    /// candidate at least `depth` deep. Otherwise its points are replaced.
    pub fn match_candidate(
        &mut self,
        pnt0: ContactPoint,
        pnt1: ContactPoint,
        hash_using_face: bool,
        depth: f64,
    ) -> Option<&mut ContactConstraint> {
        let key = if hash_using_face { *pnt1.key() } else { *pnt0.key() };

        match self.index.get(&key) {
            None => {
                let idx = self.constraints.len();
                self.constraints
                    .push(ContactConstraint::new(pnt0, pnt1, hash_using_face));
                self.index.insert(key, idx);
                Some(&mut self.constraints[idx])
            }
            Some(&idx) => {
                let cons = &mut self.constraints[idx];
                if cons.impulse() < 0.0 {
                    None
                } else if cons.is_active() && -cons.distance() >= depth {
                    None
                } else {
                    cons.set_contact_points(pnt0, pnt1);
                    Some(cons)
                }
            }
        }
    }

    /// Insert a fully formed constraint, replacing any with the same key
    pub fn insert(&mut self, cons: ContactConstraint) {
        let key = *cons.key();
        match self.index.get(&key) {
            Some(&idx) => self.constraints[idx] = cons,
            None => {
                self.index.insert(key, self.constraints.len());
                self.constraints.push(cons);
            }
        }
    }

    /// Remove inactive constraints; returns how many were removed
    pub fn commit(&mut self) -> usize {
        let before = self.constraints.len();
        self.constraints.retain(|c| c.is_active());
        let removed = before - self.constraints.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    fn reindex(&mut self) {
        self.index = self
            .constraints
            .iter()
            .enumerate()
            .map(|(i, c)| (*c.key(), i))
            .collect();
    }
}

impl<'a> IntoIterator for &'a ConstraintStore {
    type Item = &'a ContactConstraint;
    type IntoIter = std::slice::Iter<'a, ContactConstraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.constraints.iter()
    }
}
