pub mod map;

pub use map::Map;

pub mod rb_tree;

pub use rb_tree::Tree;

/// Strict weak ordering used to position elements in a [`Tree`].
///
/// `less(a, b)` must be irreflexive, asymmetric and transitive, otherwise lookups and
/// [`Tree::validate`] give meaningless results (memory safety is not affected).
///
/// Closures `Fn(&T, &T) -> bool` implement this trait.
///
/// # Example
///
/// ```
/// use proef_core::collections::Tree;
/// use proef_core::alloc::Global;
/// let mut t = Tree::with_compare_in(|a: &i32, b: &i32| a > b, Global::new());
/// t.insert(1);
/// t.insert(3);
/// t.insert(2);
/// assert!(t.iter().copied().eq([3, 2, 1]));
/// ```
pub trait Compare<T: ?Sized> {
    /// Returns `true` if `a` is ordered before `b`.
    fn less(&self, a: &T, b: &T) -> bool;
}

/// Orders by [`PartialOrd`], the default comparator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Less;

impl<T: PartialOrd + ?Sized> Compare<T> for Less {
    #[inline]
    fn less(&self, a: &T, b: &T) -> bool {
        a < b
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> bool,
{
    #[inline]
    fn less(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}
