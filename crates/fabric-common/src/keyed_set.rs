//! Keyed set with caller-supplied key extraction.
//!
//! `KeyedSet<T>` holds at most one `T` per key, where the key is computed by
//! a function handed in at construction time. Equality and subset checks
//! look only at key membership, never at the values themselves. This is what
//! lets the reconciler find "same entity, different attributes" pairs.
//!
//! The free functions [`union`], [`difference`] and [`intersection`] take a
//! first operand plus any number of further operands, mirroring variadic
//! set algebra.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Shared key-extraction function.
pub type KeyFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// An unordered collection keyed by an external key function.
///
/// # Example
///
/// ```
/// use fabric_common::KeyedSet;
///
/// let mut set = KeyedSet::new(|s: &(String, u32)| s.0.clone());
/// set.insert(("Ethernet0".to_string(), 1));
/// set.insert(("Ethernet0".to_string(), 2));
///
/// // Same key, so the second insert replaced the first
/// assert_eq!(set.len(), 1);
/// assert_eq!(set.get("Ethernet0").map(|v| v.1), Some(2));
/// ```
#[derive(Clone)]
pub struct KeyedSet<T> {
    key_fn: KeyFn<T>,
    inner: HashMap<String, T>,
}

impl<T> KeyedSet<T> {
    /// Creates an empty set using `key_fn` to derive keys.
    pub fn new<F>(key_fn: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self::with_key_fn(Arc::new(key_fn))
    }

    /// Creates an empty set sharing an existing key function.
    pub fn with_key_fn(key_fn: KeyFn<T>) -> Self {
        Self {
            key_fn,
            inner: HashMap::new(),
        }
    }

    /// Builds a set from `items`. Later items replace earlier ones with the same key.
    pub fn from_items<F, I>(key_fn: F, items: I) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let mut set = Self::new(key_fn);
        set.extend(items);
        set
    }

    /// Returns an empty set with the same key function.
    pub fn empty_like(&self) -> Self {
        Self::with_key_fn(Arc::clone(&self.key_fn))
    }

    /// Returns the key function.
    pub fn key_fn(&self) -> &KeyFn<T> {
        &self.key_fn
    }

    /// Computes the key this set would use for `item`.
    pub fn key_of(&self, item: &T) -> String {
        (self.key_fn)(item)
    }

    /// Adds an item, returning the value previously stored under its key.
    pub fn insert(&mut self, item: T) -> Option<T> {
        let key = self.key_of(&item);
        self.inner.insert(key, item)
    }

    /// Removes the entry sharing `item`'s key.
    pub fn remove(&mut self, item: &T) -> Option<T> {
        let key = self.key_of(item);
        self.inner.remove(&key)
    }

    /// Removes the entry stored under `key`.
    pub fn remove_key(&mut self, key: &str) -> Option<T> {
        self.inner.remove(key)
    }

    /// Returns true if an entry with `item`'s key is present.
    pub fn contains(&self, item: &T) -> bool {
        self.inner.contains_key(&self.key_of(item))
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.inner.get(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Iterates over keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// Iterates over values in arbitrary order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.inner.values()
    }

    /// Iterates over `(key, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the keys sorted, for stable output.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        keys
    }

    /// True when both sets hold exactly the same keys.
    pub fn is_equal(&self, other: &KeyedSet<T>) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }

    /// True when every key of `self` is also in `other`.
    pub fn is_subset(&self, other: &KeyedSet<T>) -> bool {
        self.inner.keys().all(|k| other.inner.contains_key(k))
    }

    /// True when every key of `other` is also in `self`.
    pub fn is_superset(&self, other: &KeyedSet<T>) -> bool {
        other.is_subset(self)
    }

    /// Removes every key present in `other`.
    pub fn separate(&mut self, other: &KeyedSet<T>) {
        self.inner.retain(|k, _| !other.inner.contains_key(k));
    }

    /// Consumes the set, returning its values in key order.
    pub fn into_sorted_values(self) -> Vec<T> {
        let mut entries: Vec<(String, T)> = self.inner.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, v)| v).collect()
    }
}

impl<T: Clone> KeyedSet<T> {
    /// Returns clones of all values in key order.
    pub fn list(&self) -> Vec<T> {
        self.sorted_keys()
            .into_iter()
            .filter_map(|k| self.inner.get(k).cloned())
            .collect()
    }

    /// Adds every entry of `other`, replacing values on shared keys.
    pub fn merge(&mut self, other: &KeyedSet<T>) {
        for (k, v) in &other.inner {
            self.inner.insert(k.clone(), v.clone());
        }
    }
}

impl<T> Extend<T> for KeyedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for KeyedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.iter()).finish()
    }
}

impl<T> fmt::Display for KeyedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyedSet[{}]", self.sorted_keys().join(", "))
    }
}

/// Union of `first` and every set in `rest`.
///
/// For keys held by several operands the value from the last operand wins.
pub fn union<T: Clone>(first: &KeyedSet<T>, rest: &[&KeyedSet<T>]) -> KeyedSet<T> {
    let mut result = first.clone();
    for set in rest {
        result.merge(set);
    }
    result
}

/// Items of `first` whose key is absent from every set in `rest`.
pub fn difference<T: Clone>(first: &KeyedSet<T>, rest: &[&KeyedSet<T>]) -> KeyedSet<T> {
    let mut result = first.clone();
    for set in rest {
        result.separate(set);
    }
    result
}

/// Keys present in `first` and in every set of `rest`.
///
/// Built as the union of all operands, minus any key that some operand lacks.
pub fn intersection<T: Clone>(first: &KeyedSet<T>, rest: &[&KeyedSet<T>]) -> KeyedSet<T> {
    let mut result = union(first, rest);
    result
        .inner
        .retain(|k, _| first.contains_key(k) && rest.iter().all(|s| s.contains_key(k)));
    result
}
