use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::thread;
use kvnode::store::{ConcurrentStore, Entity, Write};

fn string(s: &str) -> Entity {
    Entity::String(s.as_bytes().to_vec())
}

#[test]
fn put_if_absent_keeps_the_first_value() {
    let store = ConcurrentStore::new();
    assert_eq!(store.put_if_absent(b"k".to_vec(), string("first")), 1);
    assert_eq!(store.put_if_absent(b"k".to_vec(), string("second")), 0);
    assert_eq!(store.get(b"k"), Some(string("first")));
}

#[test]
fn put_if_exists_never_creates() {
    let store = ConcurrentStore::new();
    assert_eq!(store.put_if_exists(b"k".to_vec(), string("v")), 0);
    assert!(!store.contains(b"k"));

    store.put(b"k".to_vec(), string("v"));
    assert_eq!(store.put_if_exists(b"k".to_vec(), string("w")), 1);
    assert_eq!(store.get(b"k"), Some(string("w")));
}

#[test]
fn put_reports_whether_the_key_was_new() {
    let store = ConcurrentStore::new();
    assert_eq!(store.put(b"k".to_vec(), string("v")), 1);
    assert_eq!(store.put(b"k".to_vec(), string("w")), 0);
    assert_eq!(store.len(), 1);
    assert_eq!(store.remove(b"k"), 1);
    assert_eq!(store.remove(b"k"), 0);
    assert!(store.is_empty());
}

#[test]
fn compute_removes_drained_collections() {
    let store = ConcurrentStore::new();
    let list: VecDeque<Vec<u8>> = vec![b"a".to_vec()].into();
    store.put(b"list".to_vec(), Entity::List(list));

    let popped = store.compute(b"list", |entity| match entity {
        Some(Entity::List(list)) => (Write::Keep, list.pop_front()),
        _ => (Write::Keep, None),
    });
    assert_eq!(popped, Some(b"a".to_vec()));
    assert!(!store.contains(b"list"));
}

#[test]
fn compute_on_a_missing_key_only_writes_on_put() {
    let store = ConcurrentStore::new();
    store.compute(b"k", |entity| {
        assert!(entity.is_none());
        (Write::Keep, ())
    });
    assert!(!store.contains(b"k"));

    store.compute(b"k", |_| (Write::Put(string("v")), ()));
    assert_eq!(store.get(b"k"), Some(string("v")));

    store.compute(b"k", |_| (Write::Remove, ()));
    assert!(!store.contains(b"k"));
}

#[test]
fn concurrent_put_if_absent_has_one_winner() {
    let store = ConcurrentStore::new();
    let winners = AtomicU32::new(0);
    thread::scope(|s| {
        for i in 0..16 {
            let store = &store;
            let winners = &winners;
            s.spawn(move |_| {
                let won = store.put_if_absent(b"contended".to_vec(), string(&i.to_string()));
                winners.fetch_add(won, Ordering::SeqCst);
            });
        }
    })
    .unwrap();
    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn concurrent_writers_of_distinct_keys() {
    let store = ConcurrentStore::new();
    thread::scope(|s| {
        for t in 0..8 {
            let store = &store;
            s.spawn(move |_| {
                for i in 0..500 {
                    store.put(format!("{}:{}", t, i).into_bytes(), string("v"));
                }
            });
        }
    })
    .unwrap();
    assert_eq!(store.len(), 8 * 500);
    assert_eq!(store.keys().len(), 8 * 500);
}

#[test]
fn random_distinct_keys_are_unique() {
    let store = ConcurrentStore::new();
    for i in 0..10 {
        store.put(format!("k{}", i).into_bytes(), string("v"));
    }
    let keys = store.random_distinct_keys(4);
    assert_eq!(keys.len(), 4);
    assert_eq!(keys.iter().collect::<HashSet<_>>().len(), 4);

    // asking for more than there are returns every key once
    assert_eq!(store.random_distinct_keys(100).len(), 10);
    assert_eq!(store.random_distinct_keys(usize::MAX).len(), 10);
    // duplicates allowed
    assert_eq!(store.random_keys(100).len(), 100);
    assert!(ConcurrentStore::new().random_keys(3).is_empty());
}

#[test]
fn snapshot_is_a_copy() {
    let store = ConcurrentStore::new();
    store.put(b"a".to_vec(), string("1"));
    let snapshot = store.snapshot();
    store.clear();
    assert!(store.is_empty());
    assert_eq!(snapshot.get(&b"a"[..]), Some(&string("1")));
}

#[test]
fn entity_type_names() {
    assert_eq!(string("x").type_name(), "string");
    assert_eq!(Entity::List(VecDeque::new()).type_name(), "list");
    assert_eq!(Entity::Set(HashSet::new()).type_name(), "set");
}
