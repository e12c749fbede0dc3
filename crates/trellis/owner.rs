use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity stamped on trie nodes created or cloned by a builder.
///
/// The only meaningful operation is identity comparison: a builder may mutate
/// a node in place exactly when the node carries the builder's current token.
/// Freezing a builder forgets its token without walking the tree, so every
/// node it stamped becomes effectively immutable in O(1).
#[derive(Clone)]
pub(crate) struct OwnerToken(Arc<()>);

impl OwnerToken {
    pub(crate) fn new() -> Self {
        OwnerToken(Arc::new(()))
    }

    pub(crate) fn same(&self, other: &OwnerToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for OwnerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OwnerToken({:p})", Arc::as_ptr(&self.0))
    }
}

/// Monotonic mutation counter shared between a builder and its iterators.
///
/// Builders bump it on every successful mutation; an iterator records the
/// value at creation and refuses to continue once they disagree.
#[derive(Debug, Clone)]
pub(crate) struct Generation(Arc<AtomicU64>);

impl Generation {
    pub(crate) fn new() -> Self {
        Generation(Arc::new(AtomicU64::new(0)))
    }

    pub(crate) fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
