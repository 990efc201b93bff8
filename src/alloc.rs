use std::alloc::{handle_alloc_error, Layout};
use std::cell::Cell;
use std::error::Error;
use std::fmt;
use std::ptr;
use std::ptr::NonNull;

/// The `AllocError` error indicates an allocation failure
/// that may be due to resource exhaustion or to
/// something wrong when combining the given input arguments with this
/// allocator.
///
/// The containers in this crate never surface it: a failed allocation is
/// passed straight to [`std::alloc::handle_alloc_error`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AllocError;

impl Error for AllocError {}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

/// Memory allocation.
///
/// # Safety
///
/// Blocks returned by `allocate`, `grow` and `shrink` must stay valid until they are passed
/// to `deallocate` (or to `grow`/`shrink`) on the same allocator, and must fit the requested layout.
pub unsafe trait Allocator {
    /// The allocator can hand out blocks of more than one element, and `grow`/`shrink` may be used.
    ///
    /// When this is `false` every request is for a single element and blocks are never resized.
    /// [`Array`](crate::array::Array) refuses to compile with such an allocator.
    const CAN_ALLOCATE_MANY: bool = true;

    /// Attempts to allocate a block of memory.
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError>;

    /// Deallocates the memory referenced by `ptr`.
    /// # Safety
    ///
    /// `ptr` must be a block currently allocated by this allocator with `layout`.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Attempts to extend the memory block.
    ///
    /// The block may move, the first `old_layout.size()` bytes are preserved.
    /// # Safety
    ///
    /// `ptr` must be a block currently allocated by this allocator with `old_layout`,
    /// and `new_layout.size()` must be at least `old_layout.size()`.
    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        debug_assert!(
            new_layout.size() >= old_layout.size(),
            "`new_layout.size()` must be greater than or equal to `old_layout.size()`"
        );

        let new_ptr = self.allocate(new_layout)?;

        let len = old_layout.size();

        ptr::copy_nonoverlapping(
            ptr.as_ptr().cast::<u8>(),
            new_ptr.as_ptr().cast::<u8>(),
            len,
        );
        self.deallocate(ptr, old_layout);

        Ok(new_ptr)
    }

    /// Attempts to shrink the memory block.
    ///
    /// The block may move, the first `new_layout.size()` bytes are preserved.
    /// # Safety
    ///
    /// `ptr` must be a block currently allocated by this allocator with `old_layout`,
    /// and `new_layout.size()` must not exceed `old_layout.size()`.
    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        debug_assert!(
            new_layout.size() <= old_layout.size(),
            "`new_layout.size()` must be smaller than or equal to `old_layout.size()`"
        );

        let new_ptr = self.allocate(new_layout)?;
        let len = new_layout.size();
        ptr::copy_nonoverlapping(
            ptr.as_ptr().cast::<u8>(),
            new_ptr.as_ptr().cast::<u8>(),
            len,
        );
        self.deallocate(ptr, old_layout);
        Ok(new_ptr)
    }
}

unsafe impl<A> Allocator for &A
where
    A: Allocator,
{
    const CAN_ALLOCATE_MANY: bool = A::CAN_ALLOCATE_MANY;

    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the safety contract must be upheld by the caller
        unsafe { (**self).deallocate(ptr, layout) }
    }

    #[inline]
    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        // SAFETY: the safety contract must be upheld by the caller
        unsafe { (**self).grow(ptr, old_layout, new_layout) }
    }

    #[inline]
    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        // SAFETY: the safety contract must be upheld by the caller
        unsafe { (**self).shrink(ptr, old_layout, new_layout) }
    }
}

/// What an allocation is for. Only used to group memory use for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Anything without a more specific purpose.
    #[default]
    General,
    /// Backing storage of strings.
    InternalString,
}

impl Purpose {
    /// Number of purposes.
    pub const COUNT: usize = 2;

    /// All purposes, in declaration order.
    pub const ALL: [Purpose; Purpose::COUNT] = [Purpose::General, Purpose::InternalString];

    #[cfg_attr(not(feature = "profiling"), allow(dead_code))]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Bytes currently held by [`Global`] allocators tagged with `purpose`.
///
/// Always 0 unless the `profiling` feature is enabled.
pub fn purpose_memory(purpose: Purpose) -> usize {
    accounting::held(purpose)
}

#[cfg(feature = "profiling")]
mod accounting {
    use super::Purpose;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static HELD: [AtomicUsize; Purpose::COUNT] = [AtomicUsize::new(0), AtomicUsize::new(0)];

    pub(super) fn add(purpose: Purpose, bytes: usize) {
        let held = HELD[purpose.index()].fetch_add(bytes, Ordering::Relaxed) + bytes;
        tracing::trace!(?purpose, bytes, held, "allocated");
    }

    pub(super) fn sub(purpose: Purpose, bytes: usize) {
        let held = HELD[purpose.index()].fetch_sub(bytes, Ordering::Relaxed) - bytes;
        tracing::trace!(?purpose, bytes, held, "released");
    }

    pub(super) fn held(purpose: Purpose) -> usize {
        HELD[purpose.index()].load(Ordering::Relaxed)
    }
}

#[cfg(not(feature = "profiling"))]
mod accounting {
    use super::Purpose;

    #[inline(always)]
    pub(super) fn add(_purpose: Purpose, _bytes: usize) {}

    #[inline(always)]
    pub(super) fn sub(_purpose: Purpose, _bytes: usize) {}

    pub(super) fn held(_purpose: Purpose) -> usize {
        0
    }
}

/// Default implementation of Allocator, backed by [`std::alloc`].
///
/// Memory is attributed to the allocator's [`Purpose`] when the `profiling` feature is enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global {
    purpose: Purpose,
}

impl Global {
    /// Allocator for general purpose memory.
    pub const fn new() -> Self {
        Self::with_purpose(Purpose::General)
    }

    /// Allocator whose memory is attributed to `purpose`.
    pub const fn with_purpose(purpose: Purpose) -> Self {
        Self { purpose }
    }

    /// The purpose memory from this allocator is attributed to.
    pub const fn purpose(&self) -> Purpose {
        self.purpose
    }

    /// Resize with `realloc`, the block may move.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        debug_assert!(old_layout.align() == new_layout.align());
        if old_layout.size() == 0 {
            return self.allocate(new_layout);
        }
        if new_layout.size() == 0 {
            self.deallocate(ptr, old_layout);
            return self.allocate(new_layout);
        }
        let raw_ptr = std::alloc::realloc(ptr.as_ptr(), old_layout, new_layout.size());
        let ptr = NonNull::new(raw_ptr).ok_or(AllocError)?;
        accounting::sub(self.purpose, old_layout.size());
        accounting::add(self.purpose, new_layout.size());
        Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()))
    }
}

unsafe impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        match layout.size() {
            // A well aligned dangling pointer, never dereferenced.
            0 => {
                let dangling = NonNull::new(layout.align() as *mut u8).ok_or(AllocError)?;
                Ok(NonNull::slice_from_raw_parts(dangling, 0))
            }
            size => unsafe {
                let raw_ptr = std::alloc::alloc(layout);
                let ptr = NonNull::new(raw_ptr).ok_or(AllocError)?;
                accounting::add(self.purpose, size);
                Ok(NonNull::slice_from_raw_parts(ptr, size))
            },
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr.as_ptr(), layout);
            accounting::sub(self.purpose, layout.size());
        }
    }

    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        debug_assert!(new_layout.size() >= old_layout.size());
        self.reallocate(ptr, old_layout, new_layout)
    }

    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        debug_assert!(new_layout.size() <= old_layout.size());
        self.reallocate(ptr, old_layout, new_layout)
    }
}

/// Allocator that counts calls made to the allocator it wraps.
///
/// Resizes through `grow` or `shrink` count as reallocations.
///
/// # Example
///
/// ```
/// use proef_core::{alloc::{CountingAllocator, Global}, array::Array};
/// let mut a = Array::<u32, _>::new_in(CountingAllocator::<Global>::default());
/// a.reserve(10);
/// a.add(1);
/// assert_eq!(a.allocator().allocations(), 1);
/// assert_eq!(a.allocator().reallocations(), 0);
/// ```
#[derive(Debug, Default)]
pub struct CountingAllocator<A: Allocator = Global> {
    inner: A,
    allocations: Cell<usize>,
    reallocations: Cell<usize>,
    frees: Cell<usize>,
}

impl<A: Allocator> CountingAllocator<A> {
    /// Count calls made to `inner`.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            allocations: Cell::new(0),
            reallocations: Cell::new(0),
            frees: Cell::new(0),
        }
    }

    /// The wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Number of `allocate` calls.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Number of `grow`/`shrink` calls.
    pub fn reallocations(&self) -> usize {
        self.reallocations.get()
    }

    /// Number of `deallocate` calls.
    pub fn frees(&self) -> usize {
        self.frees.get()
    }

    /// Total number of calls.
    pub fn total(&self) -> usize {
        self.allocations() + self.reallocations() + self.frees()
    }

    fn bump(counter: &Cell<usize>) {
        counter.set(counter.get() + 1);
    }
}

unsafe impl<A: Allocator> Allocator for CountingAllocator<A> {
    const CAN_ALLOCATE_MANY: bool = A::CAN_ALLOCATE_MANY;

    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        Self::bump(&self.allocations);
        self.inner.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        Self::bump(&self.frees);
        self.inner.deallocate(ptr, layout);
    }

    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        Self::bump(&self.reallocations);
        self.inner.grow(ptr, old_layout, new_layout)
    }

    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        Self::bump(&self.reallocations);
        self.inner.shrink(ptr, old_layout, new_layout)
    }
}

// Typed helpers. Failure to allocate is fatal.

#[cold]
pub(crate) fn capacity_overflow() -> ! {
    panic!("capacity overflow");
}

fn array_layout<T>(n: usize) -> Layout {
    match Layout::array::<T>(n) {
        Ok(layout) => layout,
        Err(_) => capacity_overflow(),
    }
}

/// Allocate uninitialised storage for `n` values of `T`.
///
/// Zero sized requests do not reach the allocator and return a dangling pointer.
pub fn allocate_array<T, A: Allocator>(alloc: &A, n: usize) -> NonNull<T> {
    let layout = array_layout::<T>(n);
    if layout.size() == 0 {
        return NonNull::dangling();
    }
    match alloc.allocate(layout) {
        Ok(p) => p.cast::<T>(),
        Err(AllocError) => handle_alloc_error(layout),
    }
}

/// Resize storage for `old_n` values of `T` to hold `new_n`, the block may move.
/// # Safety
///
/// `p` must come from [`allocate_array`] or [`reallocate_array`] on the same allocator with `old_n`
/// elements, and `A::CAN_ALLOCATE_MANY` must be true.
pub unsafe fn reallocate_array<T, A: Allocator>(
    alloc: &A,
    p: NonNull<T>,
    old_n: usize,
    new_n: usize,
) -> NonNull<T> {
    debug_assert!(A::CAN_ALLOCATE_MANY, "allocator cannot resize blocks");
    let old_layout = array_layout::<T>(old_n);
    let new_layout = array_layout::<T>(new_n);
    if old_layout.size() == 0 {
        return allocate_array(alloc, new_n);
    }
    if new_layout.size() == 0 {
        free_array(alloc, p, old_n);
        return NonNull::dangling();
    }
    let result = if new_layout.size() > old_layout.size() {
        alloc.grow(p.cast::<u8>(), old_layout, new_layout)
    } else if new_layout.size() < old_layout.size() {
        alloc.shrink(p.cast::<u8>(), old_layout, new_layout)
    } else {
        return p;
    };
    match result {
        Ok(p) => p.cast::<T>(),
        Err(AllocError) => handle_alloc_error(new_layout),
    }
}

/// Free storage for `n` values of `T`. The values must already have been dropped.
/// # Safety
///
/// `p` must come from [`allocate_array`] or [`reallocate_array`] on the same allocator with `n` elements.
pub unsafe fn free_array<T, A: Allocator>(alloc: &A, p: NonNull<T>, n: usize) {
    let layout = array_layout::<T>(n);
    if layout.size() != 0 {
        alloc.deallocate(p.cast::<u8>(), layout);
    }
}

/// Allocate uninitialised storage for a single `T`.
pub fn allocate_one<T, A: Allocator>(alloc: &A) -> NonNull<T> {
    allocate_array(alloc, 1)
}

/// Free storage for a single `T` that has already been dropped.
/// # Safety
///
/// `p` must come from [`allocate_one`] on the same allocator.
pub unsafe fn free_one<T, A: Allocator>(alloc: &A, p: NonNull<T>) {
    free_array(alloc, p, 1);
}
