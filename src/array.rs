use crate::alloc::{self, capacity_overflow, Allocator, Global};

use std::{
    fmt,
    ops::{Deref, DerefMut},
    ptr,
    ptr::NonNull,
    slice,
};

use tracing::trace;

/// Contiguous growable storage where spare capacity is an explicit reservation.
///
/// Unlike [`std::vec::Vec`], capacity never grows speculatively: storage always holds exactly
/// [`count`](Array::count) + [`reservation`](Array::reservation) slots. Growth first consumes the
/// reservation, otherwise the reservation is dropped and storage is reallocated to fit exactly.
///
/// An array with no elements and no reservation owns no storage and [`as_ptr`](Array::as_ptr) is null.
///
/// # Example
///
/// ```
/// use proef_core::array::Array;
/// let mut a = Array::new();
/// a.reserve(2);
/// a.add("England");
/// a.add("France");
/// assert_eq!(a.count(), 2);
/// assert_eq!(a.reservation(), 0);
/// for s in &a { println!("s={}", s); }
/// ```
pub struct Array<T, A: Allocator = Global> {
    p: Option<NonNull<T>>,
    count: usize,
    reservation: usize,
    alloc: A,
}

impl<T> Array<T> {
    /// Create a new, empty Array.
    #[must_use]
    pub const fn new() -> Array<T> {
        Self::new_in(Global::new())
    }
}

/// # Basic methods.
impl<T, A: Allocator> Array<T, A> {
    /// Rejects allocators that cannot hand out more than one element at a time.
    const CAN_ALLOCATE_MANY: () = assert!(
        A::CAN_ALLOCATE_MANY,
        "Array requires an allocator with CAN_ALLOCATE_MANY"
    );

    /// Create a new, empty Array in the specified allocator.
    ///
    /// The allocator must be able to hand out more than one element at a time,
    /// otherwise the program does not compile:
    ///
    /// ```compile_fail
    /// use proef_core::alloc::{AllocError, Allocator, Global};
    /// use proef_core::array::Array;
    /// use std::{alloc::Layout, ptr::NonNull};
    ///
    /// struct OneAtATime(Global);
    ///
    /// unsafe impl Allocator for OneAtATime {
    ///     const CAN_ALLOCATE_MANY: bool = false;
    ///
    ///     fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
    ///         self.0.allocate(layout)
    ///     }
    ///     unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
    ///         self.0.deallocate(ptr, layout);
    ///     }
    /// }
    ///
    /// let mut a = Array::<u32, _>::new_in(OneAtATime(Global::new()));
    /// a.add(1);
    /// ```
    #[must_use]
    pub const fn new_in(alloc: A) -> Array<T, A> {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAN_ALLOCATE_MANY;
        Self {
            p: None,
            count: 0,
            reservation: 0,
            alloc,
        }
    }

    /// Returns a reference to the underlying allocator.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Number of elements.
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Number of reserved slots after the elements, not yet constructed.
    pub const fn reservation(&self) -> usize {
        self.reservation
    }

    /// Returns `true` if the array contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Pointer to the first element, null if the array owns no storage.
    pub fn as_ptr(&self) -> *const T {
        match self.p {
            Some(p) => p.as_ptr(),
            None => ptr::null(),
        }
    }

    /// Mutable pointer to the first element, null if the array owns no storage.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        match self.p {
            Some(p) => p.as_ptr(),
            None => ptr::null_mut(),
        }
    }

    /// Make sure `reservation` slots are available after the elements.
    ///
    /// Requests not larger than the current reservation do nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use proef_core::array::Array;
    /// let mut a = Array::<u8>::new();
    /// a.reserve(8);
    /// a.reserve(4);
    /// assert_eq!(a.reservation(), 8);
    /// a.resize(3, 0);
    /// assert_eq!(a.reservation(), 5);
    /// ```
    pub fn reserve(&mut self, reservation: usize) {
        if reservation > self.reservation {
            let old = self.slots();
            let new = self
                .count
                .checked_add(reservation)
                .unwrap_or_else(|| capacity_overflow());
            self.reservation = reservation;
            unsafe { self.set_slots(old, new) };
        }
    }

    /// Append a value, consuming one reserved slot if there is one.
    pub fn add(&mut self, value: T) {
        let mut fill = Fill::new(self, 1);
        fill.push(value);
    }

    /// Resizes the array to hold `count` elements.
    ///
    /// New elements are clones of `exemplar`, removed elements are dropped.
    /// The reservation is kept when shrinking.
    pub fn resize(&mut self, count: usize, exemplar: T)
    where
        T: Clone,
    {
        if count < self.count {
            self.shrink_count(count);
        } else if count > self.count {
            let added = count - self.count;
            let mut fill = Fill::new(self, added);
            for _ in 0..added {
                fill.push(exemplar.clone());
            }
        }
    }

    /// Like [`Array::resize`] with a default constructed exemplar.
    ///
    /// The exemplar is only constructed when the array grows.
    pub fn resize_default(&mut self, count: usize)
    where
        T: Default + Clone,
    {
        if count <= self.count {
            self.shrink_count(count);
        } else {
            self.resize(count, T::default());
        }
    }

    /// Resizes the array to hold `count` elements,
    /// new elements are the result of calling `f`.
    pub fn resize_with<F>(&mut self, count: usize, mut f: F)
    where
        F: FnMut() -> T,
    {
        if count <= self.count {
            self.shrink_count(count);
        } else {
            let added = count - self.count;
            let mut fill = Fill::new(self, added);
            for _ in 0..added {
                fill.push(f());
            }
        }
    }

    /// Drop all elements and release storage, including any reservation.
    pub fn clear(&mut self) {
        let slots = self.slots();
        let count = self.count;
        self.count = 0;
        self.reservation = slots;
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.data().as_ptr(), count));
        }
        self.reservation = 0;
        unsafe { self.set_slots(slots, 0) };
    }

    // ##########################################################################
    // Private methods ##########################################################
    // ##########################################################################

    /// Number of slots in storage.
    #[inline]
    fn slots(&self) -> usize {
        self.count + self.reservation
    }

    /// Storage pointer, dangling if there is no storage.
    #[inline]
    fn data(&self) -> NonNull<T> {
        self.p.unwrap_or(NonNull::dangling())
    }

    /// Drop elements from `count` onwards and shrink storage to match, keeping the reservation.
    fn shrink_count(&mut self, count: usize) {
        if count >= self.count {
            return;
        }
        let old = self.slots();
        let removed = self.count - count;
        self.count = count;
        // Removed slots count as reserved while they are dropped.
        self.reservation += removed;
        unsafe {
            let tail = self.data().as_ptr().add(count);
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(tail, removed));
        }
        self.reservation -= removed;
        unsafe { self.set_slots(old, self.slots()) };
    }

    /// Make room for `added` more elements. Returns the resulting number of slots.
    fn make_room(&mut self, added: usize) -> usize {
        if self.reservation >= added {
            self.reservation -= added;
        } else {
            let old = self.slots();
            let new = self
                .count
                .checked_add(added)
                .unwrap_or_else(|| capacity_overflow());
            self.reservation = 0;
            unsafe { self.set_slots(old, new) };
        }
        self.slots() + added
    }

    /// Allocate, reallocate or free storage.
    /// # Safety
    ///
    /// `old` must be the number of slots in current storage (0 if there is none),
    /// `new` must be at least `count`.
    unsafe fn set_slots(&mut self, old: usize, new: usize) {
        debug_assert!(new >= self.count);
        if new == 0 {
            if let Some(p) = self.p.take() {
                trace!(old, "array storage freed");
                alloc::free_array(&self.alloc, p, old);
            }
        } else {
            let p = match self.p {
                Some(p) => alloc::reallocate_array(&self.alloc, p, old, new),
                None => alloc::allocate_array(&self.alloc, new),
            };
            trace!(old, new, "array storage set");
            self.p = Some(p);
        }
    }
}

/// Constructs new elements after the current ones.
/// When dropped (even while unwinding) the elements written so far are counted and the remaining
/// new slots go back to the reservation.
struct Fill<'a, T, A: Allocator> {
    slots: usize,
    written: usize,
    v: &'a mut Array<T, A>,
}

impl<'a, T, A: Allocator> Fill<'a, T, A> {
    fn new(v: &'a mut Array<T, A>, added: usize) -> Self {
        let slots = v.make_room(added);
        Self {
            slots,
            written: 0,
            v,
        }
    }

    #[inline]
    fn push(&mut self, value: T) {
        let i = self.v.count + self.written;
        debug_assert!(i < self.slots);
        unsafe {
            ptr::write(self.v.data().as_ptr().add(i), value);
        }
        self.written += 1;
    }
}

impl<'a, T, A: Allocator> Drop for Fill<'a, T, A> {
    fn drop(&mut self) {
        self.v.count += self.written;
        self.v.reservation = self.slots - self.v.count;
    }
}

unsafe impl<T: Send, A: Allocator + Send> Send for Array<T, A> {}
unsafe impl<T: Sync, A: Allocator + Sync> Sync for Array<T, A> {}

impl<T, A: Allocator> Deref for Array<T, A> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.data().as_ptr(), self.count) }
    }
}

impl<T, A: Allocator> DerefMut for Array<T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.data().as_ptr(), self.count) }
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a Array<T, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut Array<T, A> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, A: Allocator> Drop for Array<T, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for Array<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, A: Allocator + Clone> Clone for Array<T, A> {
    /// Clones every element into exactly sized storage, the reservation is not copied.
    fn clone(&self) -> Self {
        let mut a = Array::new_in(self.alloc.clone());
        a.extend_from_slice(self);
        a
    }
}

impl<T, A: Allocator> Array<T, A> {
    /// Append clones of every element of `s`, one allocation at most.
    pub fn extend_from_slice(&mut self, s: &[T])
    where
        T: Clone,
    {
        let mut fill = Fill::new(self, s.len());
        for e in s {
            fill.push(e.clone());
        }
    }
}

impl<T: Clone> From<&[T]> for Array<T> {
    /// Allocates an `Array<T>` and fills it by cloning `s`'s items.
    fn from(s: &[T]) -> Array<T> {
        let mut a = Array::new();
        a.extend_from_slice(s);
        a
    }
}

impl<T, const N: usize> From<[T; N]> for Array<T> {
    fn from(arr: [T; N]) -> Array<T> {
        let mut a = Array::new();
        let mut fill = Fill::new(&mut a, N);
        for e in arr {
            fill.push(e);
        }
        drop(fill);
        a
    }
}

impl<T, A: Allocator> Extend<T> for Array<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(lower);
        for e in iter {
            self.add(e);
        }
    }
}

impl<T> FromIterator<T> for Array<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Array<T> {
        let mut a = Array::new();
        a.extend(iter);
        a
    }
}

impl<T, A: Allocator> fmt::Debug for Array<T, A>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: PartialEq, A: Allocator, B: Allocator> PartialEq<Array<T, B>> for Array<T, A> {
    fn eq(&self, other: &Array<T, B>) -> bool {
        **self == **other
    }
}

impl<T: Eq, A: Allocator> Eq for Array<T, A> {}
