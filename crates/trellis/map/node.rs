//! HAMT node algebra: the four node shapes and the update/remove/find
//! operations over them.
//!
//! Every operation consumes the key's 32-bit hash five bits at a time; at
//! `shift = 30` only two significant bits remain, and keys whose hashes are
//! fully equal end up together in a `Collision` node. Branches are either
//! bitmap-compressed (`Bitmap`: a 32-bit occupancy map over a dense child
//! vector) or dense (`Array`: 32 nullable slots plus a live count). A
//! `Bitmap` that would grow past 16 children expands into an `Array`; an
//! `Array` whose population drops to 8 packs back.
//!
//! Mutations run against `&mut Arc` handles: a recursion first produces the
//! new child on a detached handle and only then installs it in an editable
//! copy of the parent, so a failing update leaves every ancestor and every
//! owner stamp untouched.

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use crate::comparer::Comparers;
use crate::owner::OwnerToken;
use crate::{ARRAY_MIN, BITS, MASK, PACKED_MAX, WIDTH};

/// Largest shift at which a branch may still discriminate hashes.
pub(crate) const MAX_SHIFT: u32 = 30;

#[derive(Debug, Clone)]
pub(crate) enum MapNode<K, V> {
    Value(ValueNode<K, V>),
    Bitmap(BitmapNode<K, V>),
    Array(ArrayNode<K, V>),
    Collision(CollisionNode<K, V>),
}

/// A single entry. Carries no owner: it is cheaper to replace than to track.
#[derive(Debug, Clone)]
pub(crate) struct ValueNode<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
}

/// Sparse branch: bit `i` of `bitmap` set means slot `i` is present, stored
/// at dense position `popcount(bitmap & ((1 << i) - 1))`.
#[derive(Debug, Clone)]
pub(crate) struct BitmapNode<K, V> {
    pub(crate) owner: Option<OwnerToken>,
    pub(crate) bitmap: u32,
    pub(crate) children: Vec<Arc<MapNode<K, V>>>,
}

/// Dense branch with a live-slot count.
#[derive(Debug, Clone)]
pub(crate) struct ArrayNode<K, V> {
    pub(crate) owner: Option<OwnerToken>,
    pub(crate) len: usize,
    pub(crate) children: Box<[Option<Arc<MapNode<K, V>>>; 32]>,
}

/// Entries whose keys share one full 32-bit hash. Always holds at least two;
/// removal down to one entry dissolves it into a plain `Value`.
#[derive(Debug, Clone)]
pub(crate) struct CollisionNode<K, V> {
    pub(crate) owner: Option<OwnerToken>,
    pub(crate) hash: u32,
    pub(crate) entries: SmallVec<[(K, V); 2]>,
}

/// What to do when an update meets an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DuplicatePolicy {
    /// Replace the value unconditionally.
    Overwrite,
    /// Replace only when the value comparer says the values differ.
    OverwriteIfDiffers,
    /// Leave the existing entry alone.
    Keep,
    /// Fail when the values differ; no-op when they are equal.
    RejectIfDiffers,
    /// Fail whenever the key is already present.
    Reject,
}

/// How an update changed the trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateOutcome {
    /// Nothing needed to change; the node graph is untouched.
    NoChange,
    /// A value was replaced; the entry count is unchanged.
    Replaced,
    /// A new entry was inserted.
    Added,
}

/// A rejected duplicate key. Hands the arguments back so the caller can
/// report the key without imposing bounds on the node algebra.
pub(crate) struct UpdateConflict<K, V> {
    pub(crate) key: K,
    #[allow(dead_code)]
    pub(crate) value: V,
}

/// How a removal changed the node it ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoveOutcome {
    /// Key absent; nothing changed.
    NotFound,
    /// Entry removed; the node (possibly restructured) remains.
    Removed,
    /// Entry removed and this node is now empty; the caller drops its slot.
    RemovedEmpty,
}

pub(crate) fn index_at(hash: u32, shift: u32) -> usize {
    debug_assert!(shift <= MAX_SHIFT);
    ((hash >> shift) as usize) & MASK
}

fn dense_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

impl<K, V> MapNode<K, V> {
    fn owner(&self) -> Option<&OwnerToken> {
        match self {
            MapNode::Value(_) => None,
            MapNode::Bitmap(node) => node.owner.as_ref(),
            MapNode::Array(node) => node.owner.as_ref(),
            MapNode::Collision(node) => node.owner.as_ref(),
        }
    }

    fn set_owner(&mut self, new_owner: Option<OwnerToken>) {
        match self {
            MapNode::Value(_) => {}
            MapNode::Bitmap(node) => node.owner = new_owner,
            MapNode::Array(node) => node.owner = new_owner,
            MapNode::Collision(node) => node.owner = new_owner,
        }
    }
}

/// See `vector::node::make_editable`; identical contract for map nodes.
fn make_editable<'a, K: Clone, V: Clone>(
    arc: &'a mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
) -> &'a mut MapNode<K, V> {
    let owned = match (edit, arc.owner()) {
        (Some(token), Some(owner)) => owner.same(token),
        _ => false,
    };
    if !owned {
        let mut copy = (**arc).clone();
        copy.set_owner(edit.cloned());
        *arc = Arc::new(copy);
    }
    Arc::make_mut(arc)
}

/// Looks `key` up under `node`, returning the stored key and value.
pub(crate) fn node_find<'a, K, V>(
    mut node: &'a MapNode<K, V>,
    mut shift: u32,
    hash: u32,
    key: &K,
    cmp: &Comparers<K, V>,
) -> Option<(&'a K, &'a V)> {
    loop {
        match node {
            MapNode::Value(entry) => {
                return (entry.hash == hash && cmp.key_eq(&entry.key, key))
                    .then(|| (&entry.key, &entry.value));
            }
            MapNode::Bitmap(branch) => {
                let bit = 1u32 << index_at(hash, shift);
                if branch.bitmap & bit == 0 {
                    return None;
                }
                node = &branch.children[dense_index(branch.bitmap, bit)];
                shift += BITS;
            }
            MapNode::Array(branch) => {
                node = branch.children[index_at(hash, shift)].as_deref()?;
                shift += BITS;
            }
            MapNode::Collision(bucket) => {
                if bucket.hash != hash {
                    return None;
                }
                return bucket
                    .entries
                    .iter()
                    .find(|(k, _)| cmp.key_eq(k, key))
                    .map(|(k, v)| (k, v));
            }
        }
    }
}

/// Inserts or updates `key` under `arc` according to `policy`.
pub(crate) fn node_update<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: K,
    value: V,
    policy: DuplicatePolicy,
    cmp: &Comparers<K, V>,
) -> Result<UpdateOutcome, UpdateConflict<K, V>> {
    match &**arc {
        MapNode::Value(_) => update_value(arc, edit, shift, hash, key, value, policy, cmp),
        MapNode::Bitmap(_) => update_bitmap(arc, edit, shift, hash, key, value, policy, cmp),
        MapNode::Array(_) => update_array(arc, edit, shift, hash, key, value, policy, cmp),
        MapNode::Collision(_) => update_collision(arc, edit, shift, hash, key, value, policy, cmp),
    }
}

#[allow(clippy::too_many_arguments)]
fn update_value<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: K,
    value: V,
    policy: DuplicatePolicy,
    cmp: &Comparers<K, V>,
) -> Result<UpdateOutcome, UpdateConflict<K, V>> {
    let (existing_hash, same_key, same_value) = match &**arc {
        MapNode::Value(entry) => (
            entry.hash,
            entry.hash == hash && cmp.key_eq(&entry.key, &key),
            entry.hash == hash && cmp.value_eq(&entry.value, &value),
        ),
        _ => return Ok(UpdateOutcome::NoChange),
    };
    if same_key {
        let replace = match policy {
            DuplicatePolicy::Overwrite => true,
            DuplicatePolicy::OverwriteIfDiffers => !same_value,
            DuplicatePolicy::Keep => false,
            DuplicatePolicy::RejectIfDiffers => {
                if same_value {
                    false
                } else {
                    return Err(UpdateConflict { key, value });
                }
            }
            DuplicatePolicy::Reject => return Err(UpdateConflict { key, value }),
        };
        if replace {
            *arc = Arc::new(MapNode::Value(ValueNode { hash, key, value }));
            return Ok(UpdateOutcome::Replaced);
        }
        return Ok(UpdateOutcome::NoChange);
    }
    if existing_hash == hash {
        // Distinct keys, one hash: a collision bucket.
        let (old_key, old_value) = match &**arc {
            MapNode::Value(entry) => (entry.key.clone(), entry.value.clone()),
            _ => return Ok(UpdateOutcome::NoChange),
        };
        *arc = Arc::new(MapNode::Collision(CollisionNode {
            owner: edit.cloned(),
            hash,
            entries: smallvec![(old_key, old_value), (key, value)],
        }));
        return Ok(UpdateOutcome::Added);
    }
    // Distinct hashes: branch at the first level where the slices diverge.
    let newcomer = Arc::new(MapNode::Value(ValueNode { hash, key, value }));
    let merged = merge_subtrees(edit, shift, arc.clone(), existing_hash, newcomer, hash);
    *arc = Arc::new(merged);
    Ok(UpdateOutcome::Added)
}

#[allow(clippy::too_many_arguments)]
fn update_bitmap<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: K,
    value: V,
    policy: DuplicatePolicy,
    cmp: &Comparers<K, V>,
) -> Result<UpdateOutcome, UpdateConflict<K, V>> {
    let index = index_at(hash, shift);
    let bit = 1u32 << index;
    let (present, position, population) = match &**arc {
        MapNode::Bitmap(branch) => (
            branch.bitmap & bit != 0,
            dense_index(branch.bitmap, bit),
            branch.children.len(),
        ),
        _ => return Ok(UpdateOutcome::NoChange),
    };
    if !present {
        if population >= PACKED_MAX {
            // Too crowded for bitmap compression: expand to a dense array.
            let expanded = match &**arc {
                MapNode::Bitmap(branch) => {
                    expand(branch, edit, index, ValueNode { hash, key, value })
                }
                _ => return Ok(UpdateOutcome::NoChange),
            };
            *arc = Arc::new(MapNode::Array(expanded));
        } else {
            let node = make_editable(arc, edit);
            if let MapNode::Bitmap(branch) = node {
                branch.bitmap |= bit;
                branch
                    .children
                    .insert(position, Arc::new(MapNode::Value(ValueNode { hash, key, value })));
            }
        }
        return Ok(UpdateOutcome::Added);
    }
    // Recurse on a detached handle; install only once it succeeded.
    let mut child = match &**arc {
        MapNode::Bitmap(branch) => branch.children[position].clone(),
        _ => return Ok(UpdateOutcome::NoChange),
    };
    let outcome = node_update(&mut child, edit, shift + BITS, hash, key, value, policy, cmp)?;
    if outcome != UpdateOutcome::NoChange {
        let node = make_editable(arc, edit);
        if let MapNode::Bitmap(branch) = node {
            branch.children[position] = child;
        }
    }
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn update_array<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: K,
    value: V,
    policy: DuplicatePolicy,
    cmp: &Comparers<K, V>,
) -> Result<UpdateOutcome, UpdateConflict<K, V>> {
    let index = index_at(hash, shift);
    let existing = match &**arc {
        MapNode::Array(branch) => branch.children[index].clone(),
        _ => return Ok(UpdateOutcome::NoChange),
    };
    match existing {
        None => {
            let node = make_editable(arc, edit);
            if let MapNode::Array(branch) = node {
                branch.children[index] =
                    Some(Arc::new(MapNode::Value(ValueNode { hash, key, value })));
                branch.len += 1;
            }
            Ok(UpdateOutcome::Added)
        }
        Some(mut child) => {
            let outcome =
                node_update(&mut child, edit, shift + BITS, hash, key, value, policy, cmp)?;
            if outcome != UpdateOutcome::NoChange {
                let node = make_editable(arc, edit);
                if let MapNode::Array(branch) = node {
                    branch.children[index] = Some(child);
                }
            }
            Ok(outcome)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update_collision<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: K,
    value: V,
    policy: DuplicatePolicy,
    cmp: &Comparers<K, V>,
) -> Result<UpdateOutcome, UpdateConflict<K, V>> {
    let (bucket_hash, found) = match &**arc {
        MapNode::Collision(bucket) => {
            let found = if bucket.hash == hash {
                bucket.entries.iter().position(|(k, _)| cmp.key_eq(k, &key))
            } else {
                None
            };
            (bucket.hash, found)
        }
        _ => return Ok(UpdateOutcome::NoChange),
    };
    if bucket_hash != hash {
        // This bucket sits where the new entry's hash also leads; push both
        // one branch down.
        let newcomer = Arc::new(MapNode::Value(ValueNode { hash, key, value }));
        let merged = merge_subtrees(edit, shift, arc.clone(), bucket_hash, newcomer, hash);
        *arc = Arc::new(merged);
        return Ok(UpdateOutcome::Added);
    }
    match found {
        None => {
            let node = make_editable(arc, edit);
            if let MapNode::Collision(bucket) = node {
                bucket.entries.push((key, value));
            }
            Ok(UpdateOutcome::Added)
        }
        Some(position) => {
            let same_value = match &**arc {
                MapNode::Collision(bucket) => cmp.value_eq(&bucket.entries[position].1, &value),
                _ => return Ok(UpdateOutcome::NoChange),
            };
            let replace = match policy {
                DuplicatePolicy::Overwrite => true,
                DuplicatePolicy::OverwriteIfDiffers => !same_value,
                DuplicatePolicy::Keep => false,
                DuplicatePolicy::RejectIfDiffers => {
                    if same_value {
                        false
                    } else {
                        return Err(UpdateConflict { key, value });
                    }
                }
                DuplicatePolicy::Reject => return Err(UpdateConflict { key, value }),
            };
            if replace {
                let node = make_editable(arc, edit);
                if let MapNode::Collision(bucket) = node {
                    bucket.entries[position] = (key, value);
                }
                return Ok(UpdateOutcome::Replaced);
            }
            Ok(UpdateOutcome::NoChange)
        }
    }
}

/// Wraps two subtrees whose hashes differ into bitmap branches, descending
/// until their 5-bit slices diverge. Terminates because distinct 32-bit
/// hashes must part ways by `shift = 30`.
fn merge_subtrees<K, V>(
    edit: Option<&OwnerToken>,
    shift: u32,
    first: Arc<MapNode<K, V>>,
    first_hash: u32,
    second: Arc<MapNode<K, V>>,
    second_hash: u32,
) -> MapNode<K, V> {
    debug_assert_ne!(first_hash, second_hash);
    let first_index = index_at(first_hash, shift);
    let second_index = index_at(second_hash, shift);
    if first_index == second_index {
        let inner = merge_subtrees(edit, shift + BITS, first, first_hash, second, second_hash);
        return MapNode::Bitmap(BitmapNode {
            owner: edit.cloned(),
            bitmap: 1 << first_index,
            children: vec![Arc::new(inner)],
        });
    }
    let (bitmap, children) = if first_index < second_index {
        ((1u32 << first_index) | (1u32 << second_index), vec![first, second])
    } else {
        ((1u32 << first_index) | (1u32 << second_index), vec![second, first])
    };
    MapNode::Bitmap(BitmapNode { owner: edit.cloned(), bitmap, children })
}

fn expand<K: Clone, V: Clone>(
    branch: &BitmapNode<K, V>,
    edit: Option<&OwnerToken>,
    index: usize,
    newcomer: ValueNode<K, V>,
) -> ArrayNode<K, V> {
    let mut children: Box<[Option<Arc<MapNode<K, V>>>; 32]> =
        Box::new(std::array::from_fn(|_| None));
    let mut position = 0;
    for slot in 0..WIDTH {
        if branch.bitmap & (1u32 << slot) != 0 {
            children[slot] = Some(branch.children[position].clone());
            position += 1;
        }
    }
    children[index] = Some(Arc::new(MapNode::Value(newcomer)));
    ArrayNode { owner: edit.cloned(), len: position + 1, children }
}

/// Removes `key` from under `arc`.
pub(crate) fn node_remove<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    cmp: &Comparers<K, V>,
) -> RemoveOutcome {
    match &**arc {
        MapNode::Value(_) => remove_value(arc, hash, key, cmp),
        MapNode::Bitmap(_) => remove_bitmap(arc, edit, shift, hash, key, cmp),
        MapNode::Array(_) => remove_array(arc, edit, shift, hash, key, cmp),
        MapNode::Collision(_) => remove_collision(arc, edit, hash, key, cmp),
    }
}

fn remove_value<K: Clone, V: Clone>(
    arc: &Arc<MapNode<K, V>>,
    hash: u32,
    key: &K,
    cmp: &Comparers<K, V>,
) -> RemoveOutcome {
    match &**arc {
        MapNode::Value(entry) if entry.hash == hash && cmp.key_eq(&entry.key, key) => {
            RemoveOutcome::RemovedEmpty
        }
        _ => RemoveOutcome::NotFound,
    }
}

fn remove_bitmap<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    cmp: &Comparers<K, V>,
) -> RemoveOutcome {
    let index = index_at(hash, shift);
    let bit = 1u32 << index;
    let (present, position, population) = match &**arc {
        MapNode::Bitmap(branch) => (
            branch.bitmap & bit != 0,
            dense_index(branch.bitmap, bit),
            branch.children.len(),
        ),
        _ => return RemoveOutcome::NotFound,
    };
    if !present {
        return RemoveOutcome::NotFound;
    }
    let mut child = match &**arc {
        MapNode::Bitmap(branch) => branch.children[position].clone(),
        _ => return RemoveOutcome::NotFound,
    };
    match node_remove(&mut child, edit, shift + BITS, hash, key, cmp) {
        RemoveOutcome::NotFound => RemoveOutcome::NotFound,
        RemoveOutcome::Removed => {
            let node = make_editable(arc, edit);
            if let MapNode::Bitmap(branch) = node {
                branch.children[position] = child;
            }
            RemoveOutcome::Removed
        }
        RemoveOutcome::RemovedEmpty => {
            if population == 1 {
                // Last slot gone; this branch disappears with it.
                return RemoveOutcome::RemovedEmpty;
            }
            let node = make_editable(arc, edit);
            if let MapNode::Bitmap(branch) = node {
                branch.bitmap &= !bit;
                branch.children.remove(position);
            }
            RemoveOutcome::Removed
        }
    }
}

fn remove_array<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    shift: u32,
    hash: u32,
    key: &K,
    cmp: &Comparers<K, V>,
) -> RemoveOutcome {
    let index = index_at(hash, shift);
    let existing = match &**arc {
        MapNode::Array(branch) => branch.children[index].clone(),
        _ => return RemoveOutcome::NotFound,
    };
    let Some(mut child) = existing else {
        return RemoveOutcome::NotFound;
    };
    match node_remove(&mut child, edit, shift + BITS, hash, key, cmp) {
        RemoveOutcome::NotFound => RemoveOutcome::NotFound,
        RemoveOutcome::Removed => {
            let node = make_editable(arc, edit);
            if let MapNode::Array(branch) = node {
                branch.children[index] = Some(child);
            }
            RemoveOutcome::Removed
        }
        RemoveOutcome::RemovedEmpty => {
            let population = match &**arc {
                MapNode::Array(branch) => branch.len,
                _ => return RemoveOutcome::NotFound,
            };
            if population - 1 <= ARRAY_MIN {
                // Sparse enough again for bitmap compression.
                let packed = match &**arc {
                    MapNode::Array(branch) => pack(branch, edit, index),
                    _ => return RemoveOutcome::NotFound,
                };
                *arc = Arc::new(MapNode::Bitmap(packed));
            } else {
                let node = make_editable(arc, edit);
                if let MapNode::Array(branch) = node {
                    branch.children[index] = None;
                    branch.len -= 1;
                }
            }
            RemoveOutcome::Removed
        }
    }
}

fn pack<K: Clone, V: Clone>(
    branch: &ArrayNode<K, V>,
    edit: Option<&OwnerToken>,
    skip: usize,
) -> BitmapNode<K, V> {
    let mut bitmap = 0u32;
    let mut children = Vec::with_capacity(branch.len.saturating_sub(1));
    for slot in 0..WIDTH {
        if slot == skip {
            continue;
        }
        if let Some(child) = &branch.children[slot] {
            bitmap |= 1u32 << slot;
            children.push(child.clone());
        }
    }
    BitmapNode { owner: edit.cloned(), bitmap, children }
}

fn remove_collision<K: Clone, V: Clone>(
    arc: &mut Arc<MapNode<K, V>>,
    edit: Option<&OwnerToken>,
    hash: u32,
    key: &K,
    cmp: &Comparers<K, V>,
) -> RemoveOutcome {
    let found = match &**arc {
        MapNode::Collision(bucket) if bucket.hash == hash => {
            bucket.entries.iter().position(|(k, _)| cmp.key_eq(k, key))
        }
        _ => None,
    };
    let Some(position) = found else {
        return RemoveOutcome::NotFound;
    };
    let population = match &**arc {
        MapNode::Collision(bucket) => bucket.entries.len(),
        _ => return RemoveOutcome::NotFound,
    };
    match population {
        0 | 1 => RemoveOutcome::RemovedEmpty,
        2 => {
            // One survivor: a collision bucket of one is just a value.
            let survivor = match &**arc {
                MapNode::Collision(bucket) => bucket.entries[1 - position].clone(),
                _ => return RemoveOutcome::NotFound,
            };
            *arc = Arc::new(MapNode::Value(ValueNode {
                hash,
                key: survivor.0,
                value: survivor.1,
            }));
            RemoveOutcome::Removed
        }
        _ => {
            let node = make_editable(arc, edit);
            if let MapNode::Collision(bucket) = node {
                let last = bucket.entries.len() - 1;
                bucket.entries.swap(position, last);
                let _ = bucket.entries.pop();
            }
            RemoveOutcome::Removed
        }
    }
}
