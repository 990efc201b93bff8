#![deny(missing_docs)]

//! Allocator-aware foundation containers: [`array::Array`] (growable storage with an explicit reservation),
//! [`collections::Tree`] (an intrusive red-black tree) and [`collections::Map`] (an ordered map built on the tree).
//!
//! Every container takes its storage from an [`alloc::Allocator`], by default [`alloc::Global`].
//! Allocation failure is fatal (see [`std::alloc::handle_alloc_error`]).

//!# Features
//!
//! This crate supports the following cargo features:
//! - `profiling` : per [`alloc::Purpose`] accounting of memory held through [`alloc::Global`], see [`alloc::purpose_memory`].
//! - `check-invariants` : validate the red-black rules after every tree insert and delete, panicking on a violation.
//! - `cap` : tests use the `cap` crate as the global allocator and print memory use.
//!
//! The tree tests include a panic check for `check-invariants`, run it with `cargo test --features check-invariants`.

/// Memory allocation.
pub mod alloc;

/// [`array::Array`], contiguous storage with an explicit reservation.
pub mod array;

/// Ordered containers.
pub mod collections;

// Tests.

#[cfg(all(test, not(miri), feature = "cap"))]
#[global_allocator]
static ALLOCATOR: cap::Cap<std::alloc::System> = cap::Cap::new(std::alloc::System, usize::MAX);

#[cfg(test)]
pub(crate) fn print_memory() {
    #[cfg(all(test, not(miri), feature = "cap"))]
    println!("Memory allocated: {} bytes", ALLOCATOR.allocated());
}

/* mimalloc cannot be used with miri */
#[cfg(all(test, not(miri), not(feature = "cap")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
