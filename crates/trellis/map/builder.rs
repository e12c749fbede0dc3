//! Transient counterpart of [`TrieMap`]: in-place add/set/remove under an
//! owner token, with O(1) freeze back to a frozen map.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::comparer::{Comparers, KeyComparer, ValueComparer};
use crate::error::TrellisError;
use crate::owner::{Generation, OwnerToken};

use super::iter::BuilderIter;
use super::node::{
    self, DuplicatePolicy, MapNode, RemoveOutcome, UpdateConflict, UpdateOutcome, ValueNode,
};
use super::TrieMap;

pub struct TrieMapBuilder<K, V> {
    len: usize,
    root: Option<Arc<MapNode<K, V>>>,
    comparers: Comparers<K, V>,
    owner: Option<OwnerToken>,
    generation: Generation,
    cached: Option<TrieMap<K, V>>,
}

impl<K, V> TrieMapBuilder<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    pub fn new() -> Self {
        Self::with_comparers(Comparers::default())
    }
}

impl<K: Clone, V: Clone> TrieMapBuilder<K, V> {
    pub fn with_comparers(comparers: Comparers<K, V>) -> Self {
        TrieMapBuilder {
            len: 0,
            root: None,
            comparers,
            owner: None,
            generation: Generation::new(),
            cached: None,
        }
    }

    pub(crate) fn from_frozen(frozen: &TrieMap<K, V>) -> Self {
        TrieMapBuilder {
            len: frozen.len,
            root: frozen.root.clone(),
            comparers: frozen.comparers.clone(),
            owner: None,
            generation: Generation::new(),
            cached: Some(frozen.clone()),
        }
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

    pub fn get_key(&self, key: &K) -> Option<&K> {
        self.entry(key).map(|(stored, _)| stored)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.entry(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entry(key).is_some()
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.iter_snapshot_values(value)
    }

    fn iter_snapshot_values(&self, value: &V) -> bool {
        let mut iter = self.iter();
        loop {
            match iter.next() {
                Some(Ok((_, stored))) => {
                    if self.comparers.value_eq(&stored, value) {
                        return true;
                    }
                }
                Some(Err(_)) | None => return false,
            }
        }
    }

    /// Registers a successful mutation: invalidates the cached snapshot and
    /// advances the version iterators fence against.
    fn touch(&mut self) {
        self.cached = None;
        self.generation.bump();
    }

    fn ensure_owner(&mut self) {
        if self.owner.is_none() {
            self.owner = Some(OwnerToken::new());
        }
    }

    /// Runs one update against the root. On failure nothing is changed:
    /// not the root, not the count, not the version.
    pub(crate) fn apply_policy(
        &mut self,
        key: K,
        value: V,
        policy: DuplicatePolicy,
    ) -> Result<UpdateOutcome, UpdateConflict<K, V>> {
        self.ensure_owner();
        let hash = self.comparers.key_hash(&key);
        let outcome = if let Some(root) = self.root.as_mut() {
            node::node_update(
                root,
                self.owner.as_ref(),
                0,
                hash,
                key,
                value,
                policy,
                &self.comparers,
            )?
        } else {
            self.root = Some(Arc::new(MapNode::Value(ValueNode { hash, key, value })));
            UpdateOutcome::Added
        };
        match outcome {
            UpdateOutcome::NoChange => {}
            UpdateOutcome::Replaced => self.touch(),
            UpdateOutcome::Added => {
                self.len += 1;
                self.touch();
            }
        }
        Ok(outcome)
    }

    /// Adds a new entry; any existing entry under `key` is an error, the
    /// mutable-dictionary contract.
    pub fn add(&mut self, key: K, value: V) -> Result<(), TrellisError>
    where
        K: fmt::Debug,
    {
        self.apply_policy(key, value, DuplicatePolicy::Reject)
            .map(|_| ())
            .map_err(|conflict| TrellisError::DuplicateKey(format!("{:?}", conflict.key)))
    }

    pub fn set(&mut self, key: K, value: V) {
        let _ = self.apply_policy(key, value, DuplicatePolicy::Overwrite);
    }

    /// Inserts only when the key is absent; returns whether it inserted.
    pub fn add_if_absent(&mut self, key: K, value: V) -> bool {
        matches!(
            self.apply_policy(key, value, DuplicatePolicy::Keep),
            Ok(UpdateOutcome::Added)
        )
    }

    /// Removes `key`, reporting whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        self.owner.get_or_insert_with(OwnerToken::new);
        let hash = self.comparers.key_hash(key);
        match node::node_remove(root, self.owner.as_ref(), 0, hash, key, &self.comparers) {
            RemoveOutcome::NotFound => false,
            RemoveOutcome::Removed => {
                self.len -= 1;
                self.touch();
                true
            }
            RemoveOutcome::RemovedEmpty => {
                self.root = None;
                self.len -= 1;
                self.touch();
                true
            }
        }
    }

    pub fn add_all<I>(&mut self, pairs: I) -> Result<(), TrellisError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: fmt::Debug,
    {
        for (key, value) in pairs {
            self.add(key, value)?;
        }
        Ok(())
    }

    pub fn set_all<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }

    pub fn remove_all<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
    {
        for key in keys {
            let _ = self.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
        self.touch();
    }

    /// Rebinds the key comparer and rebuilds the trie under the new hashes.
    /// On a collapse with differing values nothing is changed and a
    /// [`TrellisError::DuplicateKey`] is returned.
    pub fn set_key_comparer(&mut self, comparer: Arc<dyn KeyComparer<K>>) -> Result<(), TrellisError>
    where
        K: fmt::Debug,
    {
        if self.comparers.same_key_comparer(&comparer) {
            return Ok(());
        }
        let entries: Vec<(K, V)> = {
            let mut collected = Vec::with_capacity(self.len);
            let mut iter = self.iter();
            loop {
                match iter.next() {
                    Some(Ok(pair)) => collected.push(pair),
                    Some(Err(_)) | None => break,
                }
            }
            collected
        };
        let mut rebuilt = TrieMapBuilder::with_comparers(self.comparers.with_key(comparer));
        for (key, value) in entries {
            rebuilt
                .apply_policy(key, value, DuplicatePolicy::RejectIfDiffers)
                .map_err(|conflict| {
                    TrellisError::DuplicateKey(format!("{:?}", conflict.key))
                })?;
        }
        self.len = rebuilt.len;
        self.root = rebuilt.root;
        self.comparers = rebuilt.comparers;
        self.owner = rebuilt.owner;
        self.touch();
        Ok(())
    }

    pub fn set_value_comparer(&mut self, comparer: Arc<dyn ValueComparer<V>>) {
        if self.comparers.same_value_comparer(&comparer) {
            return;
        }
        self.comparers = self.comparers.with_value(comparer);
        self.touch();
    }

    pub fn key_comparer(&self) -> Arc<dyn KeyComparer<K>> {
        self.comparers.key_comparer().clone()
    }

    pub fn value_comparer(&self) -> Arc<dyn ValueComparer<V>> {
        self.comparers.value_comparer().clone()
    }

    /// Hands the current contents back as a frozen map in O(1). Freezing
    /// twice without an intervening mutation returns the same instance.
    pub fn freeze(&mut self) -> TrieMap<K, V> {
        if let Some(cached) = &self.cached {
            return cached.clone();
        }
        self.owner = None;
        let frozen = TrieMap {
            len: self.len,
            root: self.root.clone(),
            comparers: self.comparers.clone(),
        };
        self.cached = Some(frozen.clone());
        frozen
    }

    /// Iterator over a snapshot of the current entries, fenced against
    /// further builder mutation.
    pub fn iter(&self) -> BuilderIter<K, V> {
        BuilderIter::new(self.root.clone(), self.len, self.generation.clone())
    }
}

impl<K, V> Default for TrieMapBuilder<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        TrieMapBuilder::new()
    }
}

impl<K: Clone, V: Clone> Extend<(K, V)> for TrieMapBuilder<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.set_all(iter);
    }
}

impl<K: Clone, V: Clone> fmt::Debug for TrieMapBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrieMapBuilder")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
