use proptest::{collection::vec, prelude::any, prop_assert, prop_assert_eq, proptest};
use trellis::{trie_vector, TrellisError, TrieVector};

#[test]
fn append_then_pop_exhaustively() {
    // 1025 elements crosses the tail/trie boundary and one root growth.
    let mut vector = TrieVector::new();
    for i in 0..=1024i64 {
        vector = vector.push(i);
    }
    assert_eq!(vector.len(), 1025);

    for remaining in (0..=1024usize).rev() {
        vector = vector.drop_last().expect("still non-empty");
        assert_eq!(vector.len(), remaining);
        if remaining > 0 {
            assert_eq!(vector.last(), Some(&(remaining as i64 - 1)));
        }
        // Full prefix checks at the structural boundaries.
        if matches!(remaining, 1024 | 1023 | 33 | 32 | 31 | 1) {
            let prefix: TrieVector<i64> = (0..remaining as i64).collect();
            assert_eq!(vector, prefix);
        }
    }
    assert!(vector.is_empty());
    assert!(vector.drop_last().is_none());
}

#[test]
fn slice_preserves_values() {
    let vector: TrieVector<i64> = (0..100).collect();
    let slice = vector.range(10, 50).unwrap();
    assert_eq!(slice.len(), 50);
    assert_eq!(slice.get(0), Some(&10));
    assert_eq!(slice.get(49), Some(&59));
}

#[test]
fn full_range_is_the_same_sequence() {
    let vector: TrieVector<i64> = (0..500).collect();
    assert!(vector.range(0, 500).unwrap().ptr_eq(&vector));
    assert_eq!(vector.range(0, 0).unwrap().len(), 0);
    assert!(matches!(
        vector.range(400, 200),
        Err(TrellisError::OutOfRange { .. })
    ));
}

#[test]
fn persistent_push_leaves_ancestor_alone() {
    let vector: TrieVector<i64> = (0..1025).collect();
    let longer = vector.push(-1);
    assert_eq!(vector.len(), 1025);
    assert_eq!(longer.len(), 1026);
    assert_eq!(vector.get(1024), Some(&1024));
    assert_eq!(longer.get(1025), Some(&-1));
    assert_eq!(vector.get(1025), None);
}

#[test]
fn macro_builds_in_order() {
    let vector = trie_vector![10, 20, 30];
    assert_eq!(vector.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
    let empty: TrieVector<i32> = trie_vector![];
    assert!(empty.is_empty());
}

#[test]
fn nested_slices_compose() {
    let vector: TrieVector<i64> = (0..1000).collect();
    let outer = vector.range(100, 800).unwrap();
    let inner = outer.range(200, 300).unwrap();
    assert_eq!(inner.len(), 300);
    for k in [0usize, 1, 150, 298, 299] {
        assert_eq!(inner.get(k), Some(&((300 + k) as i64)));
    }
}

proptest! {
    #[test]
    fn round_trips_any_input(xs in vec(any::<i32>(), 0..600)) {
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        prop_assert_eq!(vector.len(), xs.len());
        let collected: Vec<i32> = vector.iter().copied().collect();
        prop_assert_eq!(collected, xs);
    }

    #[test]
    fn set_changes_one_index_only(xs in vec(any::<i32>(), 1..300), replacement in any::<i32>()) {
        let index = xs.len() / 2;
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        let updated = vector.set(index, replacement).unwrap();
        prop_assert_eq!(updated.get(index), Some(&replacement));
        for j in 0..xs.len() {
            if j != index {
                prop_assert_eq!(updated.get(j), vector.get(j));
            }
        }
        prop_assert_eq!(vector.get(index), Some(&xs[index]));
    }

    #[test]
    fn pop_then_push_restores(xs in vec(any::<i32>(), 1..300)) {
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        let last = *xs.last().unwrap();
        let rebuilt = vector.drop_last().unwrap().push(last);
        prop_assert_eq!(rebuilt, vector);
    }

    #[test]
    fn slices_agree_with_direct_indexing(xs in vec(any::<i32>(), 1..400), start_frac in 0usize..100, len_frac in 0usize..100) {
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        let start = start_frac * xs.len() / 100;
        let count = (len_frac * (xs.len() - start) / 100).min(xs.len() - start);
        let slice = vector.range(start, count).unwrap();
        prop_assert_eq!(slice.len(), count);
        for k in 0..count {
            prop_assert_eq!(slice.get(k), vector.get(start + k));
        }
    }

    #[test]
    fn insert_matches_vec_model(xs in vec(any::<i32>(), 0..200), value in any::<i32>(), at_frac in 0usize..=100) {
        let at = at_frac * xs.len() / 100;
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        let mut model = xs.clone();
        model.insert(at, value);
        let inserted = vector.insert(at, value).unwrap();
        prop_assert_eq!(inserted.iter().copied().collect::<Vec<_>>(), model);
    }

    #[test]
    fn remove_matches_vec_model(xs in vec(any::<i32>(), 1..200), at_frac in 0usize..100) {
        let at = at_frac * xs.len() / 100;
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        let mut model = xs.clone();
        model.remove(at);
        let removed = vector.remove(at).unwrap();
        prop_assert_eq!(removed.iter().copied().collect::<Vec<_>>(), model);
    }

    #[test]
    fn sort_agrees_with_slice_sort(xs in vec(any::<i32>(), 0..200)) {
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        let mut model = xs.clone();
        model.sort();
        let sorted = vector.sort();
        prop_assert_eq!(sorted.iter().copied().collect::<Vec<_>>(), model.clone());
        if let Some(probe) = model.first() {
            prop_assert!(sorted.binary_search(probe).is_ok());
        }
    }

    #[test]
    fn reverse_twice_is_identity(xs in vec(any::<i32>(), 0..200)) {
        let vector: TrieVector<i32> = xs.iter().copied().collect();
        prop_assert_eq!(vector.reverse().reverse(), vector);
    }
}
