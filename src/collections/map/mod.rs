//! [`Map`], an ordered map stored in a red-black [`Tree`] of [`Pair`]s.
//!
//! # Example
//!
//! ```
//!     use proef_core::collections::Map;
//!     let mut mymap = Map::new();
//!     mymap.insert("England", "London");
//!     mymap.insert("France", "Paris");
//!     println!("The capital of France is {}", mymap[&"France"]);
//! ```

use std::{
    cmp::Ordering,
    fmt,
    fmt::Debug,
    iter::FusedIterator,
    ops::{Index, IndexMut},
};

use crate::alloc::{Allocator, Global};
use crate::collections::rb_tree::{self, Link, Tree};
use crate::collections::{Compare, Less};

/// Key and value stored together in a [`Map`] node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair<K, V> {
    /// Key.
    pub first: K,
    /// Value.
    pub second: V,
}

impl<K, V> Pair<K, V> {
    /// Construct a pair.
    pub const fn new(first: K, second: V) -> Self {
        Self { first, second }
    }
}

impl<K, V> From<(K, V)> for Pair<K, V> {
    fn from((first, second): (K, V)) -> Self {
        Self { first, second }
    }
}

/// Orders [`Pair`]s by their `first` field using `C`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairFirst<C = Less>(pub C);

impl<C> PairFirst<C> {
    /// The key comparator.
    pub fn key_compare(&self) -> &C {
        &self.0
    }
}

impl<K, V, C: Compare<K>> Compare<Pair<K, V>> for PairFirst<C> {
    #[inline]
    fn less(&self, a: &Pair<K, V>, b: &Pair<K, V>) -> bool {
        self.0.less(&a.first, &b.first)
    }
}

/// Ordering of `first` relative to `key`, as needed by [`Tree::find_node_by`].
fn key_order<K, C: Compare<K>>(compare: &C, first: &K, key: &K) -> Ordering {
    if compare.less(first, key) {
        Ordering::Less
    } else if compare.less(key, first) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Ordered map.
///
/// Each entry is a separately allocated tree node, so references to values stay valid while other entries are
/// inserted or removed (the borrow checker still requires them to be dropped before the map is mutated).
///
/// The number of entries is not stored, [`Map::count`] traverses the tree.
pub struct Map<K, V, C = Less, A: Allocator = Global> {
    tree: Tree<Pair<K, V>, PairFirst<C>, A>,
}

impl<K, V> Map<K, V> {
    /// Returns a new, empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_compare_in(Less, Global::new())
    }
}

impl<K, V, C: Default, A: Allocator> Map<K, V, C, A> {
    /// Returns a new, empty map in the specified allocator.
    pub fn new_in(alloc: A) -> Self {
        Self::with_compare_in(C::default(), alloc)
    }
}

impl<K, V, C, A: Allocator> Map<K, V, C, A> {
    /// Returns a new, empty map with the specified key comparator and allocator.
    pub const fn with_compare_in(compare: C, alloc: A) -> Self {
        Self {
            tree: Tree::with_compare_in(PairFirst(compare), alloc),
        }
    }

    /// The underlying tree, for inspection.
    pub fn tree(&self) -> &Tree<Pair<K, V>, PairFirst<C>, A> {
        &self.tree
    }

    /// Number of entries. This traverses the whole map.
    pub fn count(&self) -> usize {
        self.tree.node_count()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Entry with the smallest key.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|n| {
            let p = n.data();
            (&p.first, &p.second)
        })
    }

    /// Entry with the largest key.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|n| {
            let p = n.data();
            (&p.first, &p.second)
        })
    }

    /// Iterate over entries in key order. Use `.rev()` for descending order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// Iterate over entries in key order with mutable access to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.tree.iter_mut(),
        }
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    /// Iterate over values in key order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }
}

impl<K, V, C: Compare<K>, A: Allocator> Map<K, V, C, A> {
    fn locate(&self, key: &K) -> Link<Pair<K, V>> {
        let compare = self.tree.comparator().key_compare();
        self.tree.locate_by(|p| key_order(compare, &p.first, key))
    }

    /// Insert a key-value pair if the key is not present.
    ///
    /// Returns `false` (and drops `key` and `value`) if the key was already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.tree.insert(Pair::new(key, value)).inserted
    }

    /// Insert a key-value pair, replacing the value of an existing entry.
    ///
    /// Returns the old value if the key was present. The stored key is also replaced.
    pub fn insert_or_update(&mut self, key: K, value: V) -> Option<V> {
        self.tree
            .insert_or_update(Pair::new(key, value))
            .displaced
            .map(|p| p.second)
    }

    /// Get a mutable reference to the value for `key`, inserting a default value if absent.
    ///
    /// # Example
    ///
    /// ```
    /// use proef_core::collections::Map;
    /// let mut counts: Map<&str, u32> = Map::new();
    /// for w in ["a", "b", "a"] {
    ///     *counts.get_or_insert_default(w) += 1;
    /// }
    /// assert_eq!(counts[&"a"], 2);
    /// ```
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        if let Some(n) = self.locate(&key) {
            return &mut unsafe { self.tree.occupied(n) }.into_mut().second;
        }
        let data = self.tree.insert(Pair::new(key, V::default())).data;
        &mut data.second
    }

    /// Returns a reference to the value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns references to the stored key and the value for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let n = self.locate(key)?;
        let p = unsafe { n.as_ref() }.data();
        Some((&p.first, &p.second))
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let n = self.locate(key)?;
        Some(&mut unsafe { self.tree.occupied(n) }.into_mut().second)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }

    /// Remove the entry for `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Remove the entry for `key`, returning the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let n = self.locate(key)?;
        let p = unsafe { self.tree.occupied(n) }.delete_node();
        Some((p.first, p.second))
    }
}

impl<K, V> Default for Map<K, V> {
    /// Creates an empty map.
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone, C: Clone, A: Allocator + Clone> Clone for Map<K, V, C, A> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: Debug, V: Debug, C, A: Allocator> Debug for Map<K, V, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq, C, A: Allocator> PartialEq for Map<K, V, C, A> {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, C, A: Allocator> Eq for Map<K, V, C, A> {}

impl<K, V, C: Compare<K>, A: Allocator> Index<&K> for Map<K, V, C, A> {
    type Output = V;

    /// Returns a reference to the value for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the map.
    #[inline]
    fn index(&self, key: &K) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, C: Compare<K>, A: Allocator> IndexMut<&K> for Map<K, V, C, A> {
    /// Returns a mutable reference to the value for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the map.
    #[inline]
    fn index_mut(&mut self, key: &K) -> &mut V {
        self.get_mut(key).expect("no entry found for key")
    }
}

impl<K, V, C: Compare<K>, A: Allocator> Extend<(K, V)> for Map<K, V, C, A> {
    /// Entries with keys already present replace the stored value.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert_or_update(k, v);
        }
    }
}

impl<K: PartialOrd, V> FromIterator<(K, V)> for Map<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Map<K, V> {
        let mut map = Map::new();
        map.extend(iter);
        map
    }
}

impl<K: PartialOrd, V, const N: usize> From<[(K, V); N]> for Map<K, V> {
    fn from(arr: [(K, V); N]) -> Map<K, V> {
        arr.into_iter().collect()
    }
}

impl<'a, K, V, C, A: Allocator> IntoIterator for &'a Map<K, V, C, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, C, A: Allocator> IntoIterator for &'a mut Map<K, V, C, A> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

/// Iterator returned by [`Map::iter`].
#[derive(Debug)]
pub struct Iter<'a, K, V> {
    inner: rb_tree::Iter<'a, Pair<K, V>>,
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|p| (&p.first, &p.second))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|p| (&p.first, &p.second))
    }
}

impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// Iterator returned by [`Map::iter_mut`].
#[derive(Debug)]
pub struct IterMut<'a, K, V> {
    inner: rb_tree::IterMut<'a, Pair<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|p| (&p.first, &mut p.second))
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|p| (&p.first, &mut p.second))
    }
}

impl<'a, K, V> FusedIterator for IterMut<'a, K, V> {}

/// Iterator returned by [`Map::keys`].
#[derive(Debug)]
pub struct Keys<'a, K, V>(Iter<'a, K, V>);

impl<'a, K, V> Clone for Keys<'a, K, V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    fn next(&mut self) -> Option<&'a K> {
        self.0.next().map(|(k, _)| k)
    }
}

impl<'a, K, V> DoubleEndedIterator for Keys<'a, K, V> {
    fn next_back(&mut self) -> Option<&'a K> {
        self.0.next_back().map(|(k, _)| k)
    }
}

impl<'a, K, V> FusedIterator for Keys<'a, K, V> {}

/// Iterator returned by [`Map::values`].
#[derive(Debug)]
pub struct Values<'a, K, V>(Iter<'a, K, V>);

impl<'a, K, V> Clone for Values<'a, K, V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    fn next(&mut self) -> Option<&'a V> {
        self.0.next().map(|(_, v)| v)
    }
}

impl<'a, K, V> DoubleEndedIterator for Values<'a, K, V> {
    fn next_back(&mut self) -> Option<&'a V> {
        self.0.next_back().map(|(_, v)| v)
    }
}

impl<'a, K, V> FusedIterator for Values<'a, K, V> {}

#[cfg(test)]
mod mytests;
