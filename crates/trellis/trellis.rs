//! Persistent trie collections with transient builders.
//!
//! Two structures built on wide, shallow 32-way tries:
//!
//! * [`TrieVector`]: an indexed sequence backed by a bit-partitioned vector
//!   trie with a tail chunk, giving O(log₃₂ n) indexed access and amortized
//!   O(1) append, plus O(log n) slicing through an index window.
//! * [`TrieMap`]: an unordered mapping backed by a hash array mapped trie
//!   with bitmap-compressed branches and collision lists.
//!
//! Both are frozen value types: every update returns a new instance sharing
//! all untouched nodes with its ancestor. Each has a companion builder
//! ([`TrieVectorBuilder`], [`TrieMapBuilder`]) that mutates the same trie
//! shape in place under a disposable ownership token and hands back a frozen
//! snapshot in O(1) via `freeze`.

pub mod comparer;
pub mod error;
pub mod map;
mod owner;
pub mod vector;

pub use self::comparer::{Comparers, DefaultComparer, KeyComparer, ValueComparer};
pub use self::error::TrellisError;
pub use self::map::builder::TrieMapBuilder;
pub use self::map::TrieMap;
pub use self::vector::builder::TrieVectorBuilder;
pub use self::vector::TrieVector;

/// Bits consumed per trie level.
pub(crate) const BITS: u32 = 5;
/// Fan-out of every trie node.
pub(crate) const WIDTH: usize = 1 << BITS;
/// Mask extracting one level's slot index.
pub(crate) const MASK: usize = WIDTH - 1;

/// A bitmap branch growing past this expands into a dense array.
pub(crate) const PACKED_MAX: usize = WIDTH / 2;
/// A dense branch shrinking to this packs back into a bitmap branch.
pub(crate) const ARRAY_MIN: usize = WIDTH / 4;

/// Creates a [`TrieVector`] containing the given elements:
///
/// ```
/// # use trellis::trie_vector;
/// let v = trie_vector![1, 2, 3];
/// assert_eq!(v.len(), 3);
/// assert_eq!(v.get(1), Some(&2));
/// ```
#[macro_export]
macro_rules! trie_vector {
    () => {
        $crate::TrieVector::new()
    };
    ($($element:expr),+ $(,)?) => {{
        let mut builder = $crate::TrieVectorBuilder::new();
        $(
            builder.push($element);
        )+
        builder.freeze()
    }};
}

/// Creates a [`TrieMap`] containing the given entries:
///
/// ```
/// # use trellis::trie_map;
/// let m = trie_map!["one" => 1, "two" => 2];
/// assert_eq!(m.get(&"two"), Some(&2));
/// ```
#[macro_export]
macro_rules! trie_map {
    () => {
        $crate::TrieMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut builder = $crate::TrieMapBuilder::new();
        $(
            builder.set($key, $value);
        )+
        builder.freeze()
    }};
}
