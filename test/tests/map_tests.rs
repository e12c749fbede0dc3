use std::collections::HashMap;
use std::sync::Arc;

use proptest::{collection::vec, prelude::any, prop_assert, prop_assert_eq, proptest};
use trellis::{trie_map, DefaultComparer, TrellisError, TrieMap};
use trellis_test::{CaseInsensitive, ConstantHash};

#[test]
fn grow_then_shrink_by_half() {
    let mut map = TrieMap::new();
    for i in 0..2000i64 {
        map = map.set(i, i * 10);
    }
    assert_eq!(map.len(), 2000);
    for i in 0..2000i64 {
        assert_eq!(map.get(&i), Some(&(i * 10)));
    }
    let map = map.remove_all((0..2000i64).filter(|i| i % 2 == 0));
    assert_eq!(map.len(), 1000);
    for i in 0..2000i64 {
        if i % 2 == 0 {
            assert!(!map.contains_key(&i));
        } else {
            assert_eq!(map.get(&i), Some(&(i * 10)));
        }
    }
}

#[test]
fn case_insensitive_rebinding_collapses_equal_values() {
    let map = TrieMap::new()
        .set("Johnny".to_string(), "Appleseed".to_string())
        .set("JOHNNY".to_string(), "Appleseed".to_string());
    assert_eq!(map.len(), 2);

    let folded = map
        .with_key_comparer(Arc::new(CaseInsensitive))
        .expect("equal values merge");
    assert_eq!(folded.len(), 1);
    assert_eq!(folded.get(&"Johnny".to_string()), Some(&"Appleseed".to_string()));
    assert_eq!(folded.get(&"JOHNNY".to_string()), Some(&"Appleseed".to_string()));
    assert_eq!(folded.get(&"johnny".to_string()), Some(&"Appleseed".to_string()));
}

#[test]
fn case_insensitive_rebinding_rejects_differing_values() {
    let map = TrieMap::new()
        .set("Johnny".to_string(), "1".to_string())
        .set("JOHNNY".to_string(), "2".to_string());
    let err = map.with_key_comparer(Arc::new(CaseInsensitive)).unwrap_err();
    let TrellisError::DuplicateKey(message) = err else {
        panic!("expected a duplicate key error");
    };
    assert!(message.to_ascii_lowercase().contains("johnny"));
    // The failed rebinding left the original untouched.
    assert_eq!(map.len(), 2);
}

#[test]
fn collision_buckets_hold_100_distinct_keys() {
    let comparers = trellis::Comparers::new(Arc::new(ConstantHash), Arc::new(DefaultComparer));
    let mut map = TrieMap::with_comparers(comparers);
    for i in 0..100u32 {
        map = map.set(format!("key-{i}"), i);
    }
    assert_eq!(map.len(), 100);
    for i in 0..100u32 {
        assert_eq!(map.get(&format!("key-{i}")), Some(&i));
    }
    for i in 0..99u32 {
        map = map.remove(&format!("key-{i}"));
        assert_eq!(map.len() as u32, 99 - i);
    }
    assert_eq!(map.get(&"key-99".to_string()), Some(&99));
}

#[test]
fn add_is_strict_set_is_not() {
    let map = TrieMap::new().set("k", 1);
    assert!(map.add("k", 1).is_ok());
    assert_eq!(
        map.add("k", 2).unwrap_err(),
        TrellisError::DuplicateKey("\"k\"".to_string())
    );
    assert_eq!(map.set("k", 2).get(&"k"), Some(&2));
}

#[test]
fn canonical_key_is_the_stored_spelling() {
    let map = TrieMap::with_comparers(trellis::Comparers::new(
        Arc::new(CaseInsensitive),
        Arc::new(DefaultComparer),
    ))
    .set("Johnny".to_string(), 1u32);
    assert_eq!(map.get_key(&"JOHNNY".to_string()), Some(&"Johnny".to_string()));
    assert_eq!(map.get_key_value(&"johnny".to_string()), Some((&"Johnny".to_string(), &1u32)));
}

#[test]
fn value_comparer_rebinding_shares_the_root() {
    let map: TrieMap<u32, u32> = (0..100u32).map(|i| (i, i)).collect();
    let rebound = map.with_value_comparer(Arc::new(DefaultComparer));
    assert!(map.ptr_eq(&rebound));
}

#[test]
fn bulk_operations() {
    let map = TrieMap::new().add_all((0..10u32).map(|i| (i, i))).unwrap();
    assert_eq!(map.len(), 10);
    assert!(map.add_all([(0u32, 99u32)]).is_err());
    let overwritten = map.set_all((0..10u32).map(|i| (i, i + 1)));
    assert_eq!(overwritten.get(&3), Some(&4));
    let pruned = map.remove_all(0..5u32);
    assert_eq!(pruned.len(), 5);
    let cleared = map.clear();
    assert!(cleared.is_empty());
}

#[test]
fn macro_and_debug() {
    let map = trie_map!["a" => 1, "b" => 2];
    assert_eq!(map.len(), 2);
    assert_eq!(map[&"b"], 2);
    let rendered = format!("{map:?}");
    assert!(rendered.contains("\"a\": 1"));
}

proptest! {
    #[test]
    fn behaves_like_hashmap(ops in vec((any::<u16>(), any::<i32>(), any::<bool>()), 0..400)) {
        let mut model: HashMap<u16, i32> = HashMap::new();
        let mut map: TrieMap<u16, i32> = TrieMap::new();
        for (key, value, is_insert) in ops {
            if is_insert {
                model.insert(key, value);
                map = map.set(key, value);
            } else {
                model.remove(&key);
                map = map.remove(&key);
            }
            prop_assert_eq!(map.len(), model.len());
        }
        for (key, value) in &model {
            prop_assert_eq!(map.get(key), Some(value));
        }
        let mut pairs: Vec<(u16, i32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.sort_unstable();
        let mut expected: Vec<(u16, i32)> = model.into_iter().collect();
        expected.sort_unstable();
        prop_assert_eq!(pairs, expected);
    }

    #[test]
    fn add_then_remove_is_identity(keys in vec(any::<u32>(), 0..200), probe in any::<u32>()) {
        let map: TrieMap<u32, u32> = keys.iter().map(|&k| (k, k)).collect();
        if !map.contains_key(&probe) {
            let round_trip = map.add(probe, 7).unwrap().remove(&probe);
            prop_assert_eq!(&round_trip, &map);
        }
        prop_assert!(!map.remove(&probe).contains_key(&probe));
    }

    #[test]
    fn set_is_idempotent(keys in vec(any::<u32>(), 1..200)) {
        let map: TrieMap<u32, u32> = keys.iter().map(|&k| (k, k)).collect();
        let key = keys[0];
        let once = map.set(key, 1);
        let twice = once.set(key, 1);
        prop_assert!(once.ptr_eq(&twice));
    }
}
