//! [`Tree`], an intrusive red-black tree with nodes allocated from an [`Allocator`].
//!
//! Every node holds its data together with left, right and parent links and a [`Color`].
//! Nodes are allocated one at a time and never move: rotations only relink them, so a node (and
//! the data it holds) stays where it is until it is removed.
//!
//! Ordering is given by a [`Compare`] implementation, by default [`Less`] which uses [`PartialOrd`].
//! Equal elements are not stored twice, [`Tree::insert`] rejects them and [`Tree::insert_or_update`]
//! overwrites the stored data.
//!
//! # Example
//!
//! ```
//!     use proef_core::collections::Tree;
//!     let mut tree = Tree::new();
//!     for x in [40, 55, 65, 60, 75, 57] {
//!         assert!(tree.insert(x).inserted);
//!     }
//!     assert_eq!(tree.remove(&60), Some(60));
//!     assert!(tree.iter().copied().eq([40, 55, 57, 65, 75]));
//!     assert!(tree.validate().is_ok());
//! ```

use std::{
    cmp::Ordering, error::Error, fmt, fmt::Debug, iter::FusedIterator, marker::PhantomData, mem,
    ptr, ptr::NonNull,
};

use arrayvec::ArrayVec;
use tracing::{debug, trace};

use crate::alloc::{self, Allocator, Global};
use crate::collections::{Compare, Less};

pub(crate) type Link<T> = Option<NonNull<Node<T>>>;

/// Upper bound on the depth of a tree [`Tree::validate`] will traverse.
///
/// A valid red-black tree has height at most 2·log2(n+1), which is below this for any `n` that fits in memory.
const MAX_DEPTH: usize = 130;

/// Node color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Red.
    Red,
    /// Black.
    Black,
}

/// Node of a [`Tree`].
///
/// Nodes are only ever reachable through shared references, the links stay private to the tree.
/// Element data is changed through [`Tree::find_node_mut`], [`InsertResult::data`] or
/// [`OccupiedNode::get_mut`].
///
/// ```compile_fail
/// use proef_core::collections::rb_tree::Node;
/// use proef_core::collections::Tree;
///
/// let mut t1 = Tree::new();
/// let mut t2 = Tree::new();
/// for x in [1, 2, 3] {
///     t1.insert(x);
///     t2.insert(x * 10);
/// }
/// let a: &mut Node<i32> = t1.find_node_mut(&2).unwrap();
/// let b: &mut Node<i32> = t2.find_node_mut(&20).unwrap();
/// std::mem::swap(a, b);
/// ```
pub struct Node<T> {
    left: Link<T>,
    parent: Link<T>,
    right: Link<T>,
    color: Color,
    data: T,
}

impl<T> Node<T> {
    /// The stored data.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// The node color.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Returns `true` if the node is red.
    pub fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    /// Left child.
    pub fn left(&self) -> Option<&Node<T>> {
        self.left.map(|n| unsafe { &*n.as_ptr() })
    }

    /// Right child.
    pub fn right(&self) -> Option<&Node<T>> {
        self.right.map(|n| unsafe { &*n.as_ptr() })
    }

    /// Parent, `None` for the root.
    pub fn parent(&self) -> Option<&Node<T>> {
        self.parent.map(|n| unsafe { &*n.as_ptr() })
    }

    /// Returns `true` if the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Leftmost node of the subtree rooted here.
    pub fn min_node(&self) -> &Node<T> {
        unsafe { &*min_ptr(NonNull::from(self)).as_ptr() }
    }

    /// Rightmost node of the subtree rooted here.
    pub fn max_node(&self) -> &Node<T> {
        unsafe { &*max_ptr(NonNull::from(self)).as_ptr() }
    }

    /// Next node in order.
    pub fn successor(&self) -> Option<&Node<T>> {
        unsafe { successor_ptr(NonNull::from(self)).map(|n| &*n.as_ptr()) }
    }

    /// Previous node in order.
    pub fn predecessor(&self) -> Option<&Node<T>> {
        unsafe { predecessor_ptr(NonNull::from(self)).map(|n| &*n.as_ptr()) }
    }
}

impl<T: Debug> Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("data", &self.data)
            .field("color", &self.color)
            .finish()
    }
}

/// Shorthand for dereferencing a node link, the node must be live.
#[inline]
unsafe fn nd<'a, T>(n: NonNull<Node<T>>) -> &'a mut Node<T> {
    &mut *n.as_ptr()
}

/// Shared version of [`nd`], for traversals that do not write.
#[inline]
unsafe fn rd<'a, T>(n: NonNull<Node<T>>) -> &'a Node<T> {
    &*n.as_ptr()
}

/// Null links count as black.
#[inline]
fn is_red<T>(n: Link<T>) -> bool {
    match n {
        Some(n) => unsafe { rd(n).color == Color::Red },
        None => false,
    }
}

unsafe fn min_ptr<T>(mut n: NonNull<Node<T>>) -> NonNull<Node<T>> {
    while let Some(l) = rd(n).left {
        n = l;
    }
    n
}

unsafe fn max_ptr<T>(mut n: NonNull<Node<T>>) -> NonNull<Node<T>> {
    while let Some(r) = rd(n).right {
        n = r;
    }
    n
}

/// Minimum of the right subtree, or the first ancestor reached from its left side.
unsafe fn successor_ptr<T>(n: NonNull<Node<T>>) -> Link<T> {
    if let Some(r) = rd(n).right {
        return Some(min_ptr(r));
    }
    let mut child = n;
    let mut parent = rd(n).parent;
    while let Some(p) = parent {
        if rd(p).right != Some(child) {
            break;
        }
        child = p;
        parent = rd(p).parent;
    }
    parent
}

/// Mirror image of [`successor_ptr`].
unsafe fn predecessor_ptr<T>(n: NonNull<Node<T>>) -> Link<T> {
    if let Some(l) = rd(n).left {
        return Some(max_ptr(l));
    }
    let mut child = n;
    let mut parent = rd(n).parent;
    while let Some(p) = parent {
        if rd(p).left != Some(child) {
            break;
        }
        child = p;
        parent = rd(p).parent;
    }
    parent
}

/// Result of [`Tree::insert`] and [`Tree::insert_or_update`].
pub struct InsertResult<'a, T> {
    /// The data now stored for the key, newly inserted or existing.
    pub data: &'a mut T,
    /// `true` if a new node was created.
    pub inserted: bool,
    /// The data that did not end up in the tree: the rejected argument of [`Tree::insert`],
    /// or the overwritten data for [`Tree::insert_or_update`].
    pub displaced: Option<T>,
}

/// Structural problem found by [`Tree::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// The root is red.
    RedRoot,
    /// The root has a parent link.
    RootHasParent,
    /// A red node has a red child.
    RedChildOfRed,
    /// Two paths from the root to an empty leaf have a different number of black nodes.
    BlackHeightMismatch,
    /// In-order traversal is not strictly ascending.
    OutOfOrder,
    /// A child's parent link does not point back to its parent.
    BrokenParentLink,
    /// The tree is deeper than any valid red-black tree can be.
    TooDeep,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Violation::RedRoot => "root is red",
            Violation::RootHasParent => "root has a parent",
            Violation::RedChildOfRed => "red node has a red child",
            Violation::BlackHeightMismatch => "black height differs between paths",
            Violation::OutOfOrder => "elements out of order",
            Violation::BrokenParentLink => "parent link does not match child link",
            Violation::TooDeep => "tree too deep",
        };
        f.write_str(s)
    }
}

impl Error for Violation {}

/// Intrusive red-black tree.
///
/// General guide to implementation:
///
/// Nodes are linked by raw pointers, each non-root node is owned by its parent and the tree owns the root.
/// Structural changes go through left and right rotations, which keep the parent links and
/// the root pointer up to date.
///
/// Removing a node with two children swaps its data with the in-order successor and removes the successor
/// node instead, so the node that is freed always has at most one child.
///
/// The element count is not stored, [`Tree::node_count`] traverses the tree.
pub struct Tree<T, C = Less, A: Allocator = Global> {
    root: Link<T>,
    compare: C,
    alloc: A,
    _marker: PhantomData<Box<Node<T>>>,
}

unsafe impl<T: Send, C: Send, A: Allocator + Send> Send for Tree<T, C, A> {}
unsafe impl<T: Sync, C: Sync, A: Allocator + Sync> Sync for Tree<T, C, A> {}

impl<T> Tree<T> {
    /// Returns a new, empty tree ordered by [`Less`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_compare_in(Less, Global::new())
    }
}

impl<T, C: Default, A: Allocator> Tree<T, C, A> {
    /// Returns a new, empty tree in the specified allocator.
    pub fn new_in(alloc: A) -> Self {
        Self::with_compare_in(C::default(), alloc)
    }
}

impl<T, C, A: Allocator> Tree<T, C, A> {
    /// Returns a new, empty tree with the specified comparator and allocator.
    pub const fn with_compare_in(compare: C, alloc: A) -> Self {
        Self {
            root: None,
            compare,
            alloc,
            _marker: PhantomData,
        }
    }

    /// The comparator.
    pub fn comparator(&self) -> &C {
        &self.compare
    }

    /// The allocator nodes are allocated from.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The root node.
    pub fn root(&self) -> Option<&Node<T>> {
        self.root.map(|n| unsafe { &*n.as_ptr() })
    }

    /// First node in order.
    pub fn first(&self) -> Option<&Node<T>> {
        self.root.map(|n| unsafe { &*min_ptr(n).as_ptr() })
    }

    /// Last node in order.
    pub fn last(&self) -> Option<&Node<T>> {
        self.root.map(|n| unsafe { &*max_ptr(n).as_ptr() })
    }

    /// Number of nodes. This traverses the whole tree.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Number of black nodes on the path from the root to its leftmost empty leaf
    /// (taking the right child where there is no left child).
    ///
    /// All paths agree in a valid tree, [`Tree::validate`] checks every path.
    pub fn black_height(&self) -> usize {
        let mut height = 0;
        let mut cur = self.root;
        while let Some(n) = cur {
            let node = unsafe { rd(n) };
            if node.color == Color::Black {
                height += 1;
            }
            cur = node.left.or(node.right);
        }
        height
    }

    /// Drop all elements and free every node.
    ///
    /// Nodes are freed bottom-up following parent links, so no recursion or auxiliary storage is used.
    pub fn clear(&mut self) {
        let mut cur = self.root.take();
        let mut freed = 0usize;
        while let Some(n) = cur {
            unsafe {
                let node = nd(n);
                if let Some(l) = node.left.take() {
                    cur = Some(l);
                } else if let Some(r) = node.right.take() {
                    cur = Some(r);
                } else {
                    cur = node.parent;
                    ptr::drop_in_place(&mut node.data);
                    alloc::free_one(&self.alloc, n);
                    freed += 1;
                }
            }
        }
        if freed > 0 {
            trace!(freed, "tree cleared");
        }
    }

    /// Iterate in order. Use `.rev()` to iterate in reverse order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            front: self.root.map(|n| unsafe { min_ptr(n) }),
            back: self.root.map(|n| unsafe { max_ptr(n) }),
            _pd: PhantomData,
        }
    }

    /// Iterate in order with mutable access to the data.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            front: self.root.map(|n| unsafe { min_ptr(n) }),
            back: self.root.map(|n| unsafe { max_ptr(n) }),
            _pd: PhantomData,
        }
    }

    /// Find a node using a function returning the ordering of a node's data relative to the target
    /// (as for [`slice::binary_search_by`]).
    pub fn find_node_by<F>(&self, f: F) -> Option<&Node<T>>
    where
        F: FnMut(&T) -> Ordering,
    {
        self.locate_by(f).map(|n| unsafe { &*n.as_ptr() })
    }

    /// Get a cursor on the node found by `f`, see [`Tree::find_node_by`].
    pub fn entry_by<F>(&mut self, f: F) -> Option<OccupiedNode<'_, T, C, A>>
    where
        F: FnMut(&T) -> Ordering,
    {
        let n = self.locate_by(f)?;
        Some(unsafe { self.occupied(n) })
    }

    pub(crate) fn locate_by<F>(&self, mut f: F) -> Link<T>
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut cur = self.root;
        while let Some(n) = cur {
            let node = unsafe { rd(n) };
            match f(&node.data) {
                Ordering::Less => cur = node.right,
                Ordering::Greater => cur = node.left,
                Ordering::Equal => return cur,
            }
        }
        None
    }

    /// # Safety
    ///
    /// `node` must be a node of this tree.
    pub(crate) unsafe fn occupied(&mut self, node: NonNull<Node<T>>) -> OccupiedNode<'_, T, C, A> {
        OccupiedNode { tree: self, node }
    }

    // ##########################################################################
    // Structural primitives ####################################################
    // ##########################################################################

    /// Point the link that referred to `old` (a child link of `parent`, or the root) at `new`.
    unsafe fn replace_child(&mut self, parent: Link<T>, old: NonNull<Node<T>>, new: Link<T>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let p = nd(p);
                if p.left == Some(old) {
                    p.left = new;
                } else {
                    p.right = new;
                }
            }
        }
    }

    /// The right child of `x` takes the place of `x`, which becomes its left child.
    unsafe fn rotate_left(&mut self, x: NonNull<Node<T>>) {
        let Some(y) = nd(x).right else {
            debug_assert!(false, "rotate_left without right child");
            return;
        };
        let inner = nd(y).left;
        nd(x).right = inner;
        if let Some(b) = inner {
            nd(b).parent = Some(x);
        }
        let parent = nd(x).parent;
        nd(y).parent = parent;
        self.replace_child(parent, x, Some(y));
        nd(y).left = Some(x);
        nd(x).parent = Some(y);
    }

    /// The left child of `x` takes the place of `x`, which becomes its right child.
    unsafe fn rotate_right(&mut self, x: NonNull<Node<T>>) {
        let Some(y) = nd(x).left else {
            debug_assert!(false, "rotate_right without left child");
            return;
        };
        let inner = nd(y).right;
        nd(x).left = inner;
        if let Some(b) = inner {
            nd(b).parent = Some(x);
        }
        let parent = nd(x).parent;
        nd(y).parent = parent;
        self.replace_child(parent, x, Some(y));
        nd(y).right = Some(x);
        nd(x).parent = Some(y);
    }

    /// Restore the red-black rules after `n` was linked in red.
    unsafe fn rebalance(&mut self, mut n: NonNull<Node<T>>) {
        use Color::*;
        loop {
            let Some(p) = nd(n).parent else {
                nd(n).color = Black;
                return;
            };
            if nd(p).color == Black {
                return;
            }
            let Some(g) = nd(p).parent else {
                // Red root, can only be recolored.
                nd(p).color = Black;
                return;
            };
            let parent_is_left = nd(g).left == Some(p);
            let aunt = if parent_is_left {
                nd(g).right
            } else {
                nd(g).left
            };
            if let Some(a) = aunt.filter(|a| is_red(Some(*a))) {
                nd(p).color = Black;
                nd(a).color = Black;
                nd(g).color = Red;
                n = g;
                continue;
            }
            let node_is_left = nd(p).left == Some(n);
            match (parent_is_left, node_is_left) {
                (true, true) => {
                    self.rotate_right(g);
                    nd(p).color = Black;
                }
                (true, false) => {
                    self.rotate_left(p);
                    self.rotate_right(g);
                    nd(n).color = Black;
                }
                (false, false) => {
                    self.rotate_left(g);
                    nd(p).color = Black;
                }
                (false, true) => {
                    self.rotate_right(p);
                    self.rotate_left(g);
                    nd(n).color = Black;
                }
            }
            nd(g).color = Red;
            return;
        }
    }

    /// Unlink and free `z`, returning its data.
    ///
    /// # Safety
    ///
    /// `z` must be a node of this tree.
    unsafe fn delete_ptr(&mut self, z: NonNull<Node<T>>) -> T {
        // A node with two children trades data with its successor, which has no left child.
        let y = match (nd(z).left, nd(z).right) {
            (Some(_), Some(r)) => {
                let s = min_ptr(r);
                mem::swap(&mut nd(z).data, &mut nd(s).data);
                s
            }
            _ => z,
        };
        let child = nd(y).left.or(nd(y).right);
        let parent = nd(y).parent;
        if let Some(c) = child {
            nd(c).parent = parent;
        }
        self.replace_child(parent, y, child);
        let color = nd(y).color;
        let data = ptr::read(&nd(y).data);
        alloc::free_one(&self.alloc, y);
        if color == Color::Black {
            self.fix_double_black(child, parent);
        }
        data
    }

    /// Remove the double black defect at `x` (possibly an empty leaf, hence the separate `parent`).
    unsafe fn fix_double_black(&mut self, mut x: Link<T>, mut parent: Link<T>) {
        use Color::*;
        while x != self.root && !is_red(x) {
            let Some(p) = parent else { break };
            if nd(p).left == x {
                let Some(mut w) = nd(p).right else { break };
                if nd(w).color == Red {
                    // Case I
                    nd(w).color = Black;
                    nd(p).color = Red;
                    self.rotate_left(p);
                    let Some(s) = nd(p).right else { break };
                    w = s;
                }
                if !is_red(nd(w).left) && !is_red(nd(w).right) {
                    // Case II
                    nd(w).color = Red;
                    x = Some(p);
                    parent = nd(p).parent;
                } else {
                    if !is_red(nd(w).right) {
                        // Case III
                        if let Some(near) = nd(w).left {
                            nd(near).color = Black;
                        }
                        nd(w).color = Red;
                        self.rotate_right(w);
                        let Some(s) = nd(p).right else { break };
                        w = s;
                    }
                    // Case IV
                    nd(w).color = nd(p).color;
                    nd(p).color = Black;
                    if let Some(far) = nd(w).right {
                        nd(far).color = Black;
                    }
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let Some(mut w) = nd(p).left else { break };
                if nd(w).color == Red {
                    nd(w).color = Black;
                    nd(p).color = Red;
                    self.rotate_right(p);
                    let Some(s) = nd(p).left else { break };
                    w = s;
                }
                if !is_red(nd(w).left) && !is_red(nd(w).right) {
                    nd(w).color = Red;
                    x = Some(p);
                    parent = nd(p).parent;
                } else {
                    if !is_red(nd(w).left) {
                        if let Some(near) = nd(w).right {
                            nd(near).color = Black;
                        }
                        nd(w).color = Red;
                        self.rotate_left(w);
                        let Some(s) = nd(p).left else { break };
                        w = s;
                    }
                    nd(w).color = nd(p).color;
                    nd(p).color = Black;
                    if let Some(far) = nd(w).left {
                        nd(far).color = Black;
                    }
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }
        if let Some(n) = x {
            nd(n).color = Black;
        }
    }

    /// Allocate a red node holding `data` and link it below `parent`.
    fn link_new(&mut self, data: T, parent: Link<T>, left: bool, color: Color) -> NonNull<Node<T>> {
        let n = alloc::allocate_one::<Node<T>, A>(&self.alloc);
        unsafe {
            n.as_ptr().write(Node {
                left: None,
                parent,
                right: None,
                color,
                data,
            });
            match parent {
                None => self.root = Some(n),
                Some(p) if left => nd(p).left = Some(n),
                Some(p) => nd(p).right = Some(n),
            }
        }
        n
    }
}

impl<T, C: Compare<T>, A: Allocator> Tree<T, C, A> {
    /// Insert `data` unless an equal element is present.
    ///
    /// If an equal element is present, `inserted` is false, `data` is the existing element
    /// and `displaced` holds `data`.
    pub fn insert(&mut self, data: T) -> InsertResult<'_, T> {
        self.insert_impl(data, false)
    }

    /// Insert `data`, overwriting an equal element if one is present.
    ///
    /// If an equal element is present, `inserted` is false and `displaced` holds the old data.
    pub fn insert_or_update(&mut self, data: T) -> InsertResult<'_, T> {
        self.insert_impl(data, true)
    }

    fn insert_impl(&mut self, data: T, update: bool) -> InsertResult<'_, T> {
        let mut parent = None;
        let mut left = false;
        let mut cur = self.root;
        while let Some(n) = cur {
            let node = unsafe { nd(n) };
            if self.compare.less(&data, &node.data) {
                left = true;
                cur = node.left;
            } else if self.compare.less(&node.data, &data) {
                left = false;
                cur = node.right;
            } else {
                let displaced = if update {
                    mem::replace(&mut node.data, data)
                } else {
                    data
                };
                return InsertResult {
                    data: &mut node.data,
                    inserted: false,
                    displaced: Some(displaced),
                };
            }
            parent = Some(n);
        }
        let n = self.link_new(data, parent, left, Color::Red);
        unsafe { self.rebalance(n) };
        self.check_invariants();
        InsertResult {
            data: unsafe { &mut nd(n).data },
            inserted: true,
            displaced: None,
        }
    }

    fn locate(&self, key: &T) -> Link<T> {
        let compare = &self.compare;
        self.locate_by(|d| {
            if compare.less(d, key) {
                Ordering::Less
            } else if compare.less(key, d) {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
    }

    /// Find the node holding an element equal to `key`.
    pub fn find_node(&self, key: &T) -> Option<&Node<T>> {
        self.locate(key).map(|n| unsafe { &*n.as_ptr() })
    }

    /// Mutable access to the element equal to `key`.
    ///
    /// Changing the data in a way that changes its ordering leaves the tree out of order,
    /// later lookups may then miss elements (see [`Tree::validate`]).
    pub fn find_node_mut(&mut self, key: &T) -> Option<&mut T> {
        self.locate(key).map(|n| unsafe { &mut nd(n).data })
    }

    /// Get a cursor on the node holding an element equal to `key`.
    pub fn entry(&mut self, key: &T) -> Option<OccupiedNode<'_, T, C, A>> {
        let n = self.locate(key)?;
        Some(unsafe { self.occupied(n) })
    }

    /// Remove and return the element equal to `key`.
    pub fn remove(&mut self, key: &T) -> Option<T> {
        let n = self.locate(key)?;
        Some(unsafe { self.occupied(n) }.delete_node())
    }

    /// Remove and return the element found by `f`, see [`Tree::find_node_by`].
    pub fn remove_by<F>(&mut self, f: F) -> Option<T>
    where
        F: FnMut(&T) -> Ordering,
    {
        Some(self.entry_by(f)?.delete_node())
    }

    /// Check every red-black rule over the whole tree.
    ///
    /// Returns the black height (black nodes on each path from the root to an empty leaf).
    pub fn validate(&self) -> Result<usize, Violation> {
        let result = self.check_structure().and_then(|height| {
            let mut prev: Option<&T> = None;
            for d in self.iter() {
                if let Some(p) = prev {
                    if !self.compare.less(p, d) {
                        return Err(Violation::OutOfOrder);
                    }
                }
                prev = Some(d);
            }
            Ok(height)
        });
        if let Err(violation) = &result {
            debug!(%violation, "red-black tree validation failed");
        }
        result
    }

    fn check_structure(&self) -> Result<usize, Violation> {
        let Some(root) = self.root else { return Ok(0) };
        let r = unsafe { rd(root) };
        if r.parent.is_some() {
            return Err(Violation::RootHasParent);
        }
        if r.color == Color::Red {
            return Err(Violation::RedRoot);
        }
        let mut height = None;
        let mut stack = ArrayVec::<(NonNull<Node<T>>, usize), MAX_DEPTH>::new();
        stack.push((root, 1));
        while let Some((n, blacks)) = stack.pop() {
            let node = unsafe { rd(n) };
            for child in [node.left, node.right] {
                match child {
                    None => match height {
                        None => height = Some(blacks),
                        Some(h) if h != blacks => return Err(Violation::BlackHeightMismatch),
                        _ => {}
                    },
                    Some(c) => {
                        let cn = unsafe { rd(c) };
                        if cn.parent != Some(n) {
                            return Err(Violation::BrokenParentLink);
                        }
                        if node.color == Color::Red && cn.color == Color::Red {
                            return Err(Violation::RedChildOfRed);
                        }
                        let b = blacks + usize::from(cn.color == Color::Black);
                        if stack.try_push((c, b)).is_err() {
                            return Err(Violation::TooDeep);
                        }
                    }
                }
            }
        }
        Ok(height.unwrap_or(0))
    }

    #[inline]
    fn check_invariants(&self) {
        if cfg!(feature = "check-invariants") {
            if let Err(v) = self.validate() {
                panic!("red-black tree invariant violated: {}", v);
            }
        }
    }
}

/// Cursor on a node of a [`Tree`], returned by [`Tree::entry`] and [`Tree::entry_by`].
pub struct OccupiedNode<'a, T, C, A: Allocator> {
    tree: &'a mut Tree<T, C, A>,
    node: NonNull<Node<T>>,
}

impl<'a, T, C, A: Allocator> OccupiedNode<'a, T, C, A> {
    /// The data.
    pub fn get(&self) -> &T {
        unsafe { &rd(self.node).data }
    }

    /// Mutable access to the data.
    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut nd(self.node).data }
    }

    /// Convert into a mutable reference to the data with the lifetime of the tree borrow.
    pub fn into_mut(self) -> &'a mut T {
        unsafe { &mut nd(self.node).data }
    }

    /// The node.
    pub fn node(&self) -> &Node<T> {
        unsafe { rd(self.node) }
    }
}

impl<'a, T, C: Compare<T>, A: Allocator> OccupiedNode<'a, T, C, A> {
    /// Remove the node from the tree, returning its data.
    pub fn delete_node(self) -> T {
        let data = unsafe { self.tree.delete_ptr(self.node) };
        self.tree.check_invariants();
        data
    }
}

impl<T, C, A: Allocator> Drop for Tree<T, C, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, C: Default, A: Allocator + Default> Default for Tree<T, C, A> {
    fn default() -> Self {
        Self::with_compare_in(C::default(), A::default())
    }
}

impl<T: Clone, C: Clone, A: Allocator + Clone> Clone for Tree<T, C, A> {
    /// Copies structure and colors node for node.
    fn clone(&self) -> Self {
        let mut t = Self::with_compare_in(self.compare.clone(), self.alloc.clone());
        if let Some(r) = self.root {
            // Nodes are linked as they are copied, so a panicking clone leaves a tree that drops cleanly.
            unsafe { t.copy_from(r, None, false) };
        }
        t
    }
}

impl<T: Clone, C, A: Allocator> Tree<T, C, A> {
    unsafe fn copy_from(&mut self, src: NonNull<Node<T>>, parent: Link<T>, left: bool) {
        let s = rd(src);
        let n = self.link_new(s.data.clone(), parent, left, s.color);
        if let Some(l) = s.left {
            self.copy_from(l, Some(n), true);
        }
        if let Some(r) = s.right {
            self.copy_from(r, Some(n), false);
        }
    }
}

impl<T: Debug, C, A: Allocator> Debug for Tree<T, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T, C, A: Allocator> IntoIterator for &'a Tree<T, C, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T, C, A: Allocator> IntoIterator for &'a mut Tree<T, C, A> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;
    fn into_iter(self) -> IterMut<'a, T> {
        self.iter_mut()
    }
}

/// Iterator returned by [`Tree::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    front: Link<T>,
    back: Link<T>,
    _pd: PhantomData<&'a T>,
}

impl<'a, T> Clone for Iter<'a, T> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
            _pd: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    fn next(&mut self) -> Option<&'a T> {
        let n = self.front?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.front = unsafe { successor_ptr(n) };
        }
        Some(unsafe { &(*n.as_ptr()).data })
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        let n = self.back?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.back = unsafe { predecessor_ptr(n) };
        }
        Some(unsafe { &(*n.as_ptr()).data })
    }
}

impl<'a, T> FusedIterator for Iter<'a, T> {}

/// Iterator returned by [`Tree::iter_mut`].
#[derive(Debug)]
pub struct IterMut<'a, T> {
    front: Link<T>,
    back: Link<T>,
    _pd: PhantomData<&'a mut T>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;
    fn next(&mut self) -> Option<&'a mut T> {
        let n = self.front?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.front = unsafe { successor_ptr(n) };
        }
        Some(unsafe { &mut (*n.as_ptr()).data })
    }
}

impl<'a, T> DoubleEndedIterator for IterMut<'a, T> {
    fn next_back(&mut self) -> Option<&'a mut T> {
        let n = self.back?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.back = unsafe { predecessor_ptr(n) };
        }
        Some(unsafe { &mut (*n.as_ptr()).data })
    }
}

impl<'a, T> FusedIterator for IterMut<'a, T> {}

#[cfg(test)]
mod mytests;
