//! Declarative-state reconciliation.
//!
//! Diffs a previously recorded snapshot against a freshly desired one and
//! partitions the result by key:
//!
//! - keys only in `new` are **created**
//! - keys only in `old` are **deleted**
//! - keys in both whose values differ are **updated**, with the identity
//!   fields of the old value copied onto the new one
//!
//! Keys in both with equal values produce nothing.

use crate::keyed_set::{difference, intersection, KeyedSet};

/// Types whose persistent identity can be carried from one value to another.
///
/// Implementations copy only identity fields (primary/foreign keys), never
/// configuration attributes.
pub trait Identified {
    fn adopt_identity(&mut self, from: &Self);
}

/// Entities with a natural reconciliation key and equality rule.
pub trait Reconcilable: Identified + Clone + 'static {
    /// Key identifying the same logical entity across snapshots.
    fn reconcile_key(&self) -> String;

    /// True when `self` and `other` need no write to converge.
    fn same_config(&self, other: &Self) -> bool;
}

/// An entity present in both snapshots whose attributes changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<T> {
    pub old: T,
    pub new: T,
}

/// Outcome of [`compare`], each list ordered by key.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T> {
    pub created: Vec<T>,
    pub deleted: Vec<T>,
    pub updated: Vec<Updated<T>>,
}

impl<T> Reconciliation<T> {
    /// True when nothing needs to be written.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Total number of writes the delta implies.
    pub fn change_count(&self) -> usize {
        self.created.len() + self.deleted.len() + self.updated.len()
    }
}

impl<T> Default for Reconciliation<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            deleted: Vec::new(),
            updated: Vec::new(),
        }
    }
}

/// Computes the create/delete/update delta between `old` and `new`.
///
/// `key` decides which values describe the same entity and `equal` decides
/// whether two such values differ. Duplicate keys within one input collapse
/// to the last value.
pub fn compare<T, K, E>(key: K, equal: E, old: Vec<T>, new: Vec<T>) -> Reconciliation<T>
where
    T: Identified + Clone,
    K: Fn(&T) -> String + Send + Sync + 'static,
    E: Fn(&T, &T) -> bool,
{
    let old_set = KeyedSet::from_items(key, old);
    let mut new_set = KeyedSet::with_key_fn(old_set.key_fn().clone());
    new_set.extend(new);

    let created = difference(&new_set, &[&old_set]).into_sorted_values();
    let deleted = difference(&old_set, &[&new_set]).into_sorted_values();
    let common = intersection(&new_set, &[&old_set]);

    let mut updated = Vec::new();
    for key in common.sorted_keys() {
        let (Some(old_value), Some(new_value)) = (old_set.get(key), new_set.get(key)) else {
            continue;
        };
        if equal(old_value, new_value) {
            continue;
        }
        let mut new_value = new_value.clone();
        new_value.adopt_identity(old_value);
        updated.push(Updated {
            old: old_value.clone(),
            new: new_value,
        });
    }

    tracing::trace!(
        created = created.len(),
        deleted = deleted.len(),
        updated = updated.len(),
        "Reconciled snapshots"
    );

    Reconciliation {
        created,
        deleted,
        updated,
    }
}

/// [`compare`] using the entity's own key and equality rule.
pub fn reconcile<T: Reconcilable>(old: Vec<T>, new: Vec<T>) -> Reconciliation<T> {
    compare(T::reconcile_key, T::same_config, old, new)
}
