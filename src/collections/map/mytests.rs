use crate::alloc::{CountingAllocator, Global};
use crate::collections::map::*;
use crate::collections::Less;
use crate::print_memory;

use proptest::prelude::*;
use rand::Rng;
use std::cell::Cell;

const N: usize = if cfg!(miri) { 100 } else { 100000 };

#[test]
fn exp_scenario_a_test() {
    let mut map = Map::new();
    for k in [3, 21, 32, 17, 7] {
        assert!(map.insert(k, ()));
    }
    assert!(map.keys().copied().eq([3, 7, 17, 21, 32]));
    assert_eq!(map.count(), 5);
    assert!(map.tree().black_height() >= 1);
    assert_eq!(map.tree().black_height(), 2);
    assert_eq!(map.tree().validate(), Ok(2));
}

#[test]
fn exp_scenario_b_test() {
    let mut map = Map::new();
    for k in [40, 55, 65, 60, 75, 57] {
        map.insert(k, k * 10);
    }
    assert_eq!(map.remove(&60), Some(600));
    assert_eq!(map.count(), 5);
    assert!(map.keys().copied().eq([40, 55, 57, 65, 75]));
    assert!(map.tree().validate().is_ok());
}

#[test]
fn exp_insert_test() {
    let mut map = Map::new();
    assert!(map.insert("a", 1));
    assert!(!map.insert("a", 2));
    assert_eq!(map[&"a"], 1);
    assert_eq!(map.insert_or_update("a", 3), Some(1));
    assert_eq!(map.insert_or_update("b", 4), None);
    assert_eq!(map[&"a"], 3);
    assert_eq!(map.get(&"b"), Some(&4));
    assert_eq!(map.get(&"c"), None);
    assert!(map.contains_key(&"b"));
    assert!(!map.contains_key(&"c"));
    assert_eq!(map.get_key_value(&"b"), Some((&"b", &4)));
}

#[test]
fn exp_get_or_insert_default_test() {
    let mut map = Map::<u32, Vec<u32>>::new();
    map.get_or_insert_default(5).push(1);
    map.get_or_insert_default(5).push(2);
    map.get_or_insert_default(3).push(3);
    assert_eq!(map.count(), 2);
    assert_eq!(map[&5], [1, 2]);
    assert_eq!(map[&3], [3]);

    map[&3].push(4);
    *map.get_mut(&5).unwrap() = Vec::new();
    assert_eq!(map.get(&3).map(|v| v.len()), Some(2));
    assert!(map[&5].is_empty());
}

#[test]
#[should_panic(expected = "no entry found for key")]
fn exp_index_missing_test() {
    let map = Map::<u32, u32>::new();
    let _v: u32 = map[&1];
}

#[test]
fn exp_rev_test() {
    let mut map = Map::new();
    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        map.insert(rng.gen::<u32>(), ());
    }
    let forward: Vec<_> = map.keys().collect();
    let mut backward: Vec<_> = map.iter().rev().map(|(k, _)| k).collect();
    backward.reverse();
    assert_eq!(forward, backward);
    assert_eq!(map.first_key_value().map(|(k, _)| k), forward.first().copied());
    assert_eq!(map.last_key_value().map(|(k, _)| k), forward.last().copied());
}

#[test]
fn exp_iter_mut_test() {
    let mut map: Map<u32, u32> = (0..100).map(|i| (i, i)).collect();
    for (k, v) in map.iter_mut() {
        *v += k;
    }
    for (_, v) in &mut map {
        *v += 1;
    }
    assert!(map.values().copied().eq((0..100).map(|i| 2 * i + 1)));
    assert!(map.values().rev().copied().eq((0..100).rev().map(|i| 2 * i + 1)));
}

#[test]
fn exp_custom_compare_test() {
    // Case insensitive keys.
    let ci = |a: &String, b: &String| a.to_lowercase() < b.to_lowercase();
    let mut map = Map::with_compare_in(ci, Global::new());
    map.insert("Paris".to_string(), 1);
    assert!(!map.insert("PARIS".to_string(), 2));
    assert_eq!(map.get(&"paris".to_string()), Some(&1));
    assert_eq!(map.insert_or_update("paRIS".to_string(), 3), Some(1));
    assert_eq!(map.keys().next().map(|k| k.as_str()), Some("paRIS"));
    assert_eq!(map.remove_entry(&"PaRiS".to_string()), Some(("paRIS".to_string(), 3)));
    assert!(map.is_empty());
}

#[test]
fn exp_clear_test() {
    let mut map = Map::new();
    for i in 0..N {
        map.insert(i as u32, 1u8);
    }
    print_memory();
    map.clear();
    assert!(map.is_empty());
    assert_eq!(map.count(), 0);
    map.clear();
    assert!(map.is_empty());
}

#[test]
fn exp_allocator_test() {
    let mut map = Map::<u32, u32, Less, _>::new_in(CountingAllocator::<Global>::default());
    for i in 0..100 {
        map.insert(i, i);
    }
    assert_eq!(map.tree().allocator().allocations(), 100);
    for i in 0..50 {
        map.remove(&i);
    }
    assert_eq!(map.tree().allocator().frees(), 50);
    drop(map);
}

#[test]
fn exp_clone_eq_debug_test() {
    let map = Map::from([(2, "two"), (1, "one")]);
    let c = map.clone();
    assert_eq!(map, c);
    assert_eq!(format!("{:?}", c), r#"{1: "one", 2: "two"}"#);
    let mut d = Map::default();
    d.extend([(1, "one"), (2, "zwei")]);
    assert_ne!(map, d);
    d.extend([(2, "two")]);
    assert_eq!(map, d);
}

#[derive(Debug, PartialEq, PartialOrd)]
struct NoClone(u32);

#[test]
fn exp_iter_clone_test() {
    let mut map = Map::new();
    for i in 0..10 {
        map.insert(NoClone(i), NoClone(i * 2));
    }
    let mut it = map.values();
    it.next();
    let rest: Vec<_> = it.clone().map(|v| v.0).collect();
    assert_eq!(rest, (1..10).map(|i| i * 2).collect::<Vec<_>>());
    assert_eq!(it.count(), 9);

    let keys = map.keys();
    assert_eq!(keys.clone().next(), Some(&NoClone(0)));
    assert_eq!(keys.count(), 10);
    let all = map.iter();
    assert_eq!(all.clone().next_back().map(|(k, _)| k.0), Some(9));
    assert_eq!(all.count(), 10);
}

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

fn live() -> isize {
    LIVE.with(Cell::get)
}

/// Counts live instances on the current thread.
struct Counted;

impl Counted {
    fn new() -> Self {
        LIVE.with(|c| c.set(c.get() + 1));
        Counted
    }
}

impl Default for Counted {
    fn default() -> Self {
        Counted::new()
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        LIVE.with(|c| c.set(c.get() - 1));
    }
}

#[test]
fn exp_value_lifetime_test() {
    {
        let mut map = Map::new();
        for i in 0..100 {
            map.insert(i, Counted::new());
        }
        assert_eq!(live(), 100);
        // Rejected duplicate is dropped.
        assert!(!map.insert(5, Counted::new()));
        assert_eq!(live(), 100);
        // Replaced value is dropped.
        drop(map.insert_or_update(6, Counted::new()));
        assert_eq!(live(), 100);
        map.get_or_insert_default(1000);
        assert_eq!(live(), 101);
        drop(map.remove(&0));
        assert_eq!(live(), 100);
        assert_eq!(map.values().count(), 100);
    }
    assert_eq!(live(), 0);
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u8),
    Update(u8),
    Remove(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..32).prop_map(Op::Insert),
        (0u8..32).prop_map(Op::Update),
        (0u8..32).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_count_model(ops in prop::collection::vec(op(), 0..100)) {
        let mut map = Map::new();
        let mut expected = 0usize;
        for (i, op) in ops.into_iter().enumerate() {
            match op {
                Op::Insert(k) => {
                    if map.insert(k, i) {
                        expected += 1;
                    }
                }
                Op::Update(k) => {
                    if map.insert_or_update(k, i).is_none() {
                        expected += 1;
                    }
                }
                Op::Remove(k) => {
                    if map.remove(&k).is_some() {
                        expected -= 1;
                    }
                }
            }
            prop_assert_eq!(map.count(), expected);
            prop_assert!(map.tree().validate().is_ok());
        }
        let forward: Vec<_> = map.iter().collect();
        let mut backward: Vec<_> = map.iter().rev().collect();
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }
}
