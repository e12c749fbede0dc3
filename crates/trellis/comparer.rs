//! Key and value comparer pairs for the mapping.
//!
//! A map fixes its comparer pair at construction. Swapping the value comparer
//! reuses the existing node graph; swapping the key comparer changes every
//! hash and therefore forces a rebuild.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

/// Key equality plus the 32-bit hash the trie consumes in 5-bit slices.
///
/// Implementations must keep the two consistent: keys that compare equal must
/// hash equally.
pub trait KeyComparer<K>: Send + Sync {
    fn eq(&self, a: &K, b: &K) -> bool;
    fn hash(&self, key: &K) -> u32;
}

/// Value equality, used by conditional updates and `contains_value`.
pub trait ValueComparer<V>: Send + Sync {
    fn eq(&self, a: &V, b: &V) -> bool;
}

/// The standard comparer: `Eq`/`PartialEq` semantics with an `FxHasher`
/// digest truncated to the trie's 32-bit hash space.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComparer;

impl<K: Hash + Eq> KeyComparer<K> for DefaultComparer {
    fn eq(&self, a: &K, b: &K) -> bool {
        a == b
    }

    fn hash(&self, key: &K) -> u32 {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        hasher.finish() as u32
    }
}

impl<V: PartialEq> ValueComparer<V> for DefaultComparer {
    fn eq(&self, a: &V, b: &V) -> bool {
        a == b
    }
}

/// The comparer pair carried by a map and its builders.
pub struct Comparers<K, V> {
    key: Arc<dyn KeyComparer<K>>,
    value: Arc<dyn ValueComparer<V>>,
}

impl<K, V> Comparers<K, V> {
    pub fn new(key: Arc<dyn KeyComparer<K>>, value: Arc<dyn ValueComparer<V>>) -> Self {
        Comparers { key, value }
    }

    pub(crate) fn key_eq(&self, a: &K, b: &K) -> bool {
        self.key.eq(a, b)
    }

    pub(crate) fn key_hash(&self, key: &K) -> u32 {
        self.key.hash(key)
    }

    pub(crate) fn value_eq(&self, a: &V, b: &V) -> bool {
        self.value.eq(a, b)
    }

    pub(crate) fn key_comparer(&self) -> &Arc<dyn KeyComparer<K>> {
        &self.key
    }

    pub(crate) fn value_comparer(&self) -> &Arc<dyn ValueComparer<V>> {
        &self.value
    }

    pub(crate) fn with_key(&self, key: Arc<dyn KeyComparer<K>>) -> Self {
        Comparers { key, value: self.value.clone() }
    }

    pub(crate) fn with_value(&self, value: Arc<dyn ValueComparer<V>>) -> Self {
        Comparers { key: self.key.clone(), value }
    }

    /// Identity comparison; comparer instances have no content equality.
    pub(crate) fn same_key_comparer(&self, other: &Arc<dyn KeyComparer<K>>) -> bool {
        Arc::ptr_eq(&self.key, other)
    }

    pub(crate) fn same_value_comparer(&self, other: &Arc<dyn ValueComparer<V>>) -> bool {
        Arc::ptr_eq(&self.value, other)
    }
}

impl<K, V> Default for Comparers<K, V>
where
    K: Hash + Eq + 'static,
    V: PartialEq + 'static,
{
    fn default() -> Self {
        Comparers {
            key: Arc::new(DefaultComparer),
            value: Arc::new(DefaultComparer),
        }
    }
}

impl<K, V> Clone for Comparers<K, V> {
    fn clone(&self) -> Self {
        Comparers {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

impl<K, V> fmt::Debug for Comparers<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparers").finish_non_exhaustive()
    }
}
