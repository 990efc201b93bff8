use crate::alloc::{AllocError, Allocator, CountingAllocator, Global};
use crate::collections::rb_tree::*;
use crate::collections::Less;
use crate::print_memory;

use proptest::prelude::*;
use rand::Rng;

const N: usize = if cfg!(miri) { 100 } else { 100000 };

fn keys<T: Clone, C, A: Allocator>(t: &Tree<T, C, A>) -> Vec<T> {
    t.iter().cloned().collect()
}

#[test]
fn exp_scenario_b_test() {
    let mut t = Tree::new();
    for x in [40, 55, 65, 60, 75, 57] {
        assert!(t.insert(x).inserted);
    }
    assert!(t.validate().is_ok());
    assert_eq!(t.remove(&60), Some(60));
    assert_eq!(t.node_count(), 5);
    assert_eq!(keys(&t), [40, 55, 57, 65, 75]);
    assert!(t.validate().is_ok());
}

#[test]
fn exp_insert_duplicate_test() {
    let mut t = Tree::new();
    t.insert(1);
    let r = t.insert(1);
    assert!(!r.inserted);
    assert_eq!(*r.data, 1);
    assert_eq!(r.displaced, Some(1));
    assert_eq!(t.node_count(), 1);
}

#[test]
fn exp_insert_or_update_test() {
    // Ordered by the first field only.
    let by_key = |a: &(u32, &str), b: &(u32, &str)| a.0 < b.0;
    let mut t = Tree::with_compare_in(by_key, Global::new());
    assert!(t.insert_or_update((1, "one")).inserted);
    assert!(!t.insert((1, "uno")).inserted);
    assert_eq!(t.find_node(&(1, "")).map(|n| n.data().1), Some("one"));

    let r = t.insert_or_update((1, "eins"));
    assert!(!r.inserted);
    assert_eq!(r.data.1, "eins");
    assert_eq!(r.displaced, Some((1, "one")));
    assert_eq!(t.node_count(), 1);
}

#[test]
fn exp_clear_test() {
    let mut t = Tree::new();
    for i in 0..N {
        t.insert(i as u32);
    }
    print_memory();
    t.clear();
    assert!(t.is_empty());
    assert_eq!(t.node_count(), 0);
    t.clear();
    assert!(t.is_empty());
    assert_eq!(t.black_height(), 0);
    assert_eq!(t.validate(), Ok(0));
}

#[test]
fn exp_ascending_test() {
    // Degenerate insertion order for an unbalanced tree.
    let mut t = Tree::new();
    for i in 0..N {
        t.insert(i);
    }
    let h = t.validate().unwrap();
    assert_eq!(h, t.black_height());
    assert!(t.iter().copied().eq(0..N));
    for i in (0..N).step_by(2) {
        assert_eq!(t.remove(&i), Some(i));
    }
    assert!(t.validate().is_ok());
    assert!(t.iter().copied().eq((1..N).step_by(2)));
}

#[test]
fn exp_rev_test() {
    let mut t = Tree::new();
    for i in (0..1000).rev() {
        t.insert(i * 3);
    }
    let forward = keys(&t);
    let mut backward: Vec<_> = t.iter().rev().copied().collect();
    backward.reverse();
    assert_eq!(forward, backward);

    // Meeting in the middle.
    let mut it = t.iter();
    let mut n = 0;
    while let (Some(a), Some(b)) = (it.next(), it.next_back()) {
        assert!(a < b);
        n += 2;
    }
    assert_eq!(n, 1000);
    assert_eq!(it.next(), None);
    assert_eq!(it.next_back(), None);
}

#[test]
fn exp_iter_mut_test() {
    let mut t = Tree::new();
    for i in 0..100 {
        t.insert(i);
    }
    for x in t.iter_mut() {
        *x *= 2;
    }
    assert!(t.iter().copied().eq((0..100).map(|x| x * 2)));
    assert!(t.validate().is_ok());
}

#[test]
fn exp_node_navigation_test() {
    let mut t = Tree::new();
    for x in [8, 3, 10, 1, 6, 14, 4, 7, 13] {
        t.insert(x);
    }
    let root = t.root().unwrap();
    assert!(root.parent().is_none());
    assert!(!root.is_red());
    assert_eq!(root.min_node().data(), t.first().unwrap().data());
    assert_eq!(root.max_node().data(), t.last().unwrap().data());

    let mut n = t.first();
    let mut seen = Vec::new();
    while let Some(node) = n {
        seen.push(*node.data());
        n = node.successor();
    }
    assert_eq!(seen, keys(&t));

    let mut n = t.last();
    seen.clear();
    while let Some(node) = n {
        seen.push(*node.data());
        n = node.predecessor();
    }
    seen.reverse();
    assert_eq!(seen, keys(&t));

    let leaf = t.first().unwrap();
    assert!(leaf.is_leaf());
    assert!(leaf.left().is_none());
}

#[test]
fn exp_find_and_entry_test() {
    let mut t = Tree::new();
    for i in 0..50 {
        t.insert(i * 2);
    }
    assert!(t.find_node(&7).is_none());
    assert_eq!(t.find_node(&8).map(|n| *n.data()), Some(8));
    assert_eq!(
        t.find_node_by(|x| x.cmp(&20)).map(|n| *n.data()),
        Some(20)
    );

    *t.find_node_mut(&10).unwrap() = 11;
    assert!(t.validate().is_ok());

    let mut e = t.entry(&12).unwrap();
    assert_eq!(*e.get(), 12);
    *e.get_mut() = 13;
    assert_eq!(*e.node().data(), 13);
    assert_eq!(e.delete_node(), 13);
    assert!(t.find_node(&12).is_none());
    assert!(t.validate().is_ok());

    assert_eq!(t.remove_by(|x| x.cmp(&98)), Some(98));
    assert_eq!(t.remove_by(|x| x.cmp(&99)), None);
    assert_eq!(t.remove(&1000), None);
    assert!(t.entry_by(|x| x.cmp(&0)).is_some());
    assert_eq!(t.node_count(), 48);
}

#[test]
fn exp_remove_all_test() {
    let mut t = Tree::new();
    let mut rng = rand::thread_rng();
    let mut v: Vec<u32> = (0..1000).collect();
    for i in (1..v.len()).rev() {
        v.swap(i, rng.gen_range(0..=i));
    }
    for x in &v {
        t.insert(*x);
    }
    for i in (1..v.len()).rev() {
        v.swap(i, rng.gen_range(0..=i));
    }
    for x in &v {
        assert_eq!(t.remove(x), Some(*x));
        assert!(t.validate().is_ok());
    }
    assert!(t.is_empty());
    assert!(t.root().is_none());
}

#[test]
fn exp_allocator_test() {
    let mut t = Tree::<u64, Less, _>::new_in(CountingAllocator::<Global>::default());
    for i in 0..10 {
        t.insert(i);
    }
    t.insert(5);
    assert_eq!(t.allocator().allocations(), 10);
    assert_eq!(t.allocator().reallocations(), 0);
    t.remove(&3);
    assert_eq!(t.allocator().frees(), 1);
    t.clear();
    assert_eq!(t.allocator().frees(), 10);
    t.clear();
    assert_eq!(t.allocator().total(), 20);
}

/// Hands out single nodes only.
struct OneAtATime(Global);

unsafe impl Allocator for OneAtATime {
    const CAN_ALLOCATE_MANY: bool = false;

    fn allocate(&self, layout: std::alloc::Layout) -> Result<std::ptr::NonNull<[u8]>, AllocError> {
        self.0.allocate(layout)
    }
    unsafe fn deallocate(&self, ptr: std::ptr::NonNull<u8>, layout: std::alloc::Layout) {
        self.0.deallocate(ptr, layout);
    }
}

#[test]
fn exp_single_node_allocator_test() {
    let mut t = Tree::<u32, Less, _>::new_in(CountingAllocator::new(OneAtATime(Global::new())));
    for i in 0..100 {
        t.insert(i);
    }
    for i in 0..50 {
        t.remove(&(i * 2));
    }
    assert!(t.validate().is_ok());
    assert_eq!(t.allocator().allocations(), 100);
    assert_eq!(t.allocator().reallocations(), 0);
    assert_eq!(t.allocator().frees(), 50);
}

#[test]
fn exp_clone_test() {
    let mut t = Tree::new();
    for i in 0..1000 {
        t.insert(i.to_string());
    }
    let c = t.clone();
    assert!(c.validate().is_ok());
    assert_eq!(keys(&t), keys(&c));
    assert_eq!(t.black_height(), c.black_height());
    let colors = |t: &Tree<String>| {
        let mut v = Vec::new();
        let mut n = t.first();
        while let Some(node) = n {
            v.push(node.color());
            n = node.successor();
        }
        v
    };
    assert_eq!(colors(&t), colors(&c));
    drop(t);
    assert_eq!(c.node_count(), 1000);
}

#[derive(PartialEq, PartialOrd)]
struct BadClone {
    x: usize,
}
impl Clone for BadClone {
    fn clone(&self) -> Self {
        if self.x == 50 {
            panic!();
        }
        Self { x: self.x }
    }
}

#[test]
fn exp_bad_clone_test() {
    let mut t = Tree::new();
    for x in 0..100 {
        t.insert(BadClone { x });
    }
    let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = t.clone();
    }));
    assert!(r.is_err());
    assert_eq!(t.node_count(), 100);
}

#[test]
fn exp_validate_detects_test() {
    let mut t = Tree::new();
    for i in 0..10 {
        t.insert(i);
    }
    assert!(t.validate().is_ok());
    // Break the order through find_node_mut.
    *t.find_node_mut(&9).unwrap() = 0;
    assert_eq!(t.validate(), Err(Violation::OutOfOrder));
    assert_eq!(Violation::OutOfOrder.to_string(), "elements out of order");
}

#[test]
fn exp_swap_between_trees_test() {
    let mut t1 = Tree::new();
    let mut t2 = Tree::new();
    for x in [1, 5, 9] {
        t1.insert(x);
    }
    for x in [4, 6, 8] {
        t2.insert(x);
    }
    // Only the elements move, the links stay with their trees.
    std::mem::swap(t1.find_node_mut(&5).unwrap(), t2.find_node_mut(&6).unwrap());
    assert_eq!(keys(&t1), [1, 6, 9]);
    assert_eq!(keys(&t2), [4, 5, 8]);
    assert!(t1.validate().is_ok());
    assert!(t2.validate().is_ok());
    assert_eq!(t1.remove(&6), Some(6));
    assert_eq!(t2.remove(&5), Some(5));
    assert_eq!(t1.node_count() + t2.node_count(), 4);
}

#[test]
fn exp_insert_result_data_test() {
    let mut t = Tree::new();
    let r = t.insert(vec![1]);
    assert!(r.inserted);
    r.data.clear();
    assert_eq!(t.find_node(&vec![]).map(|n| n.data().len()), Some(0));
}

#[cfg(feature = "check-invariants")]
#[test]
#[should_panic(expected = "red-black tree invariant violated")]
fn exp_check_invariants_test() {
    let mut t = Tree::new();
    for i in 0..10 {
        t.insert(i);
    }
    *t.find_node_mut(&9).unwrap() = 0;
    // Mutations re-validate the whole tree.
    t.insert(100);
}

#[test]
fn exp_debug_test() {
    let mut t = Tree::new();
    t.insert(2);
    t.insert(1);
    assert_eq!(format!("{:?}", t), "[1, 2]");
    assert_eq!(
        format!("{:?}", t.root().unwrap()),
        "Node { data: 2, color: Black }"
    );
}

#[test]
fn exp_random_test() {
    let mut t = Tree::new();
    let mut m = std::collections::BTreeMap::new();
    let mut rng = rand::thread_rng();
    for _ in 0..N {
        let k: u16 = rng.gen_range(0..2000);
        if rng.gen::<bool>() {
            assert_eq!(t.insert(k).inserted, m.insert(k, ()).is_none());
        } else {
            assert_eq!(t.remove(&k), m.remove(&k).map(|_| k));
        }
    }
    assert!(t.validate().is_ok());
    assert!(t.iter().eq(m.keys()));
}

proptest! {
    #[test]
    fn prop_invariants(ops in prop::collection::vec((any::<bool>(), 0u8..64), 0..200)) {
        let mut t = Tree::new();
        let mut m = std::collections::BTreeSet::new();
        for (ins, k) in ops {
            if ins {
                prop_assert_eq!(t.insert(k).inserted, m.insert(k));
            } else {
                prop_assert_eq!(t.remove(&k).is_some(), m.remove(&k));
            }
            let h = t.validate();
            prop_assert!(h.is_ok(), "{:?}", h);
            prop_assert_eq!(h.unwrap_or(0), t.black_height());
            prop_assert!(t.iter().eq(m.iter()));
            prop_assert_eq!(t.node_count(), m.len());
        }
    }
}
