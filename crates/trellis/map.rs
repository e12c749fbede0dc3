//! Persistent unordered mapping backed by a hash array mapped trie.
//!
//! A frozen [`TrieMap`] pairs a HAMT root with the comparer pair fixed at
//! construction. Updates return new instances that share every untouched
//! node; bulk operations run through a
//! [`TrieMapBuilder`](builder::TrieMapBuilder) and freeze at the end.
//! Iteration order follows the trie shape and is not defined across
//! structurally different versions.

pub mod builder;
pub mod iter;
pub(crate) mod node;

use std::fmt;
use std::hash::Hash;
use std::ops::Index;
use std::sync::Arc;

use crate::comparer::{Comparers, KeyComparer, ValueComparer};
use crate::error::TrellisError;
use self::node::{DuplicatePolicy, MapNode, RemoveOutcome, UpdateOutcome, ValueNode};

pub struct TrieMap<K, V> {
    len: usize,
    root: Option<Arc<MapNode<K, V>>>,
    comparers: Comparers<K, V>,
}

impl<K, V> TrieMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    /// An empty map under the default comparer pair.
    pub fn new() -> Self {
        Self::with_comparers(Comparers::default())
    }
}

impl<K: Clone, V: Clone> TrieMap<K, V> {
    /// An empty map under an explicit comparer pair.
    pub fn with_comparers(comparers: Comparers<K, V>) -> Self {
        TrieMap { len: 0, root: None, comparers }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn entry(&self, key: &K) -> Option<(&K, &V)> {
        let root = self.root.as_deref()?;
        node::node_find(root, 0, self.comparers.key_hash(key), key, &self.comparers)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entry(key).map(|(_, value)| value)
    }

    /// The key instance actually stored; under a comparer that considers
    /// distinct keys equal (case folding, say), the canonical spelling.
    pub fn get_key(&self, key: &K) -> Option<&K> {
        self.entry(key).map(|(stored, _)| stored)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.entry(key)
    }

    /// Like [`TrieMap::get`], but a missing key is an error naming it.
    pub fn fetch(&self, key: &K) -> Result<&V, TrellisError>
    where
        K: fmt::Debug,
    {
        self.get(key)
            .ok_or_else(|| TrellisError::NotFound(format!("{key:?}")))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entry(key).is_some()
    }

    /// Scans for a value equal under the value comparer. O(n).
    pub fn contains_value(&self, value: &V) -> bool {
        self.iter().any(|(_, stored)| self.comparers.value_eq(stored, value))
    }

    fn updated(
        &self,
        key: K,
        value: V,
        policy: DuplicatePolicy,
    ) -> Result<Self, node::UpdateConflict<K, V>> {
        let hash = self.comparers.key_hash(&key);
        let Some(current) = &self.root else {
            return Ok(TrieMap {
                len: 1,
                root: Some(Arc::new(MapNode::Value(ValueNode { hash, key, value }))),
                comparers: self.comparers.clone(),
            });
        };
        let mut root = current.clone();
        let outcome =
            node::node_update(&mut root, None, 0, hash, key, value, policy, &self.comparers)?;
        Ok(match outcome {
            UpdateOutcome::NoChange => self.clone(),
            UpdateOutcome::Replaced => TrieMap {
                len: self.len,
                root: Some(root),
                comparers: self.comparers.clone(),
            },
            UpdateOutcome::Added => TrieMap {
                len: self.len + 1,
                root: Some(root),
                comparers: self.comparers.clone(),
            },
        })
    }

    /// Adds a new entry. An existing key with an equal value is a no-op; an
    /// existing key with a different value is a [`TrellisError::DuplicateKey`].
    pub fn add(&self, key: K, value: V) -> Result<Self, TrellisError>
    where
        K: fmt::Debug,
    {
        self.updated(key, value, DuplicatePolicy::RejectIfDiffers)
            .map_err(|conflict| TrellisError::DuplicateKey(format!("{:?}", conflict.key)))
    }

    /// Sets `key` to `value`, replacing any previous value. Setting a value
    /// the value comparer considers already present returns a root-sharing
    /// clone, so repeated identical sets are structurally idempotent.
    pub fn set(&self, key: K, value: V) -> Self {
        self.updated(key, value, DuplicatePolicy::OverwriteIfDiffers)
            .unwrap_or_else(|_| self.clone())
    }

    /// Removes `key`; absent keys return a root-sharing clone.
    pub fn remove(&self, key: &K) -> Self {
        let Some(current) = &self.root else {
            return self.clone();
        };
        let hash = self.comparers.key_hash(key);
        let mut root = current.clone();
        match node::node_remove(&mut root, None, 0, hash, key, &self.comparers) {
            RemoveOutcome::NotFound => self.clone(),
            RemoveOutcome::Removed => TrieMap {
                len: self.len - 1,
                root: Some(root),
                comparers: self.comparers.clone(),
            },
            RemoveOutcome::RemovedEmpty => TrieMap {
                len: self.len - 1,
                root: None,
                comparers: self.comparers.clone(),
            },
        }
    }

    pub fn add_all<I>(&self, pairs: I) -> Result<Self, TrellisError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: fmt::Debug,
    {
        let mut builder = self.to_builder();
        for (key, value) in pairs {
            builder
                .apply_policy(key, value, DuplicatePolicy::RejectIfDiffers)
                .map_err(|conflict| {
                    TrellisError::DuplicateKey(format!("{:?}", conflict.key))
                })?;
        }
        Ok(builder.freeze())
    }

    pub fn set_all<I>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut builder = self.to_builder();
        for (key, value) in pairs {
            let _ = builder.apply_policy(key, value, DuplicatePolicy::OverwriteIfDiffers);
        }
        builder.freeze()
    }

    pub fn remove_all<I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        let mut builder = self.to_builder();
        for key in keys {
            let _ = builder.remove(&key);
        }
        builder.freeze()
    }

    /// Rebinds the key comparer. Hashes change, so the whole trie is rebuilt;
    /// two keys collapsing into one with values the value comparer tells
    /// apart is a [`TrellisError::DuplicateKey`].
    pub fn with_key_comparer(
        &self,
        comparer: Arc<dyn KeyComparer<K>>,
    ) -> Result<Self, TrellisError>
    where
        K: fmt::Debug,
    {
        if self.comparers.same_key_comparer(&comparer) {
            return Ok(self.clone());
        }
        let mut builder = builder::TrieMapBuilder::with_comparers(self.comparers.with_key(comparer));
        for (key, value) in self.iter() {
            builder
                .apply_policy(key.clone(), value.clone(), DuplicatePolicy::RejectIfDiffers)
                .map_err(|conflict| {
                    TrellisError::DuplicateKey(format!("{:?}", conflict.key))
                })?;
        }
        Ok(builder.freeze())
    }

    /// Rebinds the value comparer. Hashes are untouched, so the result is a
    /// new wrapper over the very same root.
    pub fn with_value_comparer(&self, comparer: Arc<dyn ValueComparer<V>>) -> Self {
        if self.comparers.same_value_comparer(&comparer) {
            return self.clone();
        }
        TrieMap {
            len: self.len,
            root: self.root.clone(),
            comparers: self.comparers.with_value(comparer),
        }
    }

    pub fn key_comparer(&self) -> Arc<dyn KeyComparer<K>> {
        self.comparers.key_comparer().clone()
    }

    pub fn value_comparer(&self) -> Arc<dyn ValueComparer<V>> {
        self.comparers.value_comparer().clone()
    }

    pub fn iter(&self) -> iter::Iter<'_, K, V> {
        iter::Iter::new(self.root.as_deref(), self.len)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    pub fn to_builder(&self) -> builder::TrieMapBuilder<K, V> {
        builder::TrieMapBuilder::from_frozen(self)
    }

    /// An empty map keeping this map's comparer pair.
    pub fn clear(&self) -> Self {
        TrieMap { len: 0, root: None, comparers: self.comparers.clone() }
    }

    /// True when both maps are views over the same root node. Structural
    /// sharing probe; equal contents do not imply `ptr_eq`.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

}

impl<K: Clone, V: Clone> Clone for TrieMap<K, V> {
    fn clone(&self) -> Self {
        TrieMap {
            len: self.len,
            root: self.root.clone(),
            comparers: self.comparers.clone(),
        }
    }
}

impl<K, V> Default for TrieMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        TrieMap::new()
    }
}

impl<K: Clone, V: Clone> PartialEq for TrieMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .iter()
                .all(|(key, value)| {
                    other.get(key).is_some_and(|found| self.comparers.value_eq(value, found))
                })
    }
}

impl<K: Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for TrieMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for TrieMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = builder::TrieMapBuilder::new();
        for (key, value) in iter {
            builder.set(key, value);
        }
        builder.freeze()
    }
}

impl<K: Clone, V: Clone> Index<&K> for TrieMap<K, V> {
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<'a, K: Clone, V: Clone> IntoIterator for &'a TrieMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = iter::Iter<'a, K, V>;

    fn into_iter(self) -> iter::Iter<'a, K, V> {
        self.iter()
    }
}
