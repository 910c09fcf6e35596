//! Spin-locked wrapper for sharing one allocator between threads.
//!
//! The allocators themselves are single-threaded. Sharing one instance
//! requires serializing every call, which this wrapper does with a
//! `spin::Mutex`. Per-thread arenas need no wrapper at all.

use crate::allocator::ArenaAllocator;
use crate::arena::ArenaPtr;
use crate::error::Result;
use crate::stats::ArenaStats;

/// An allocator behind a spin lock
#[derive(Debug)]
pub struct LockedArena<A> {
    inner: spin::Mutex<A>,
}

impl<A> LockedArena<A> {
    /// Wrap `allocator`
    pub const fn new(allocator: A) -> Self {
        Self {
            inner: spin::Mutex::new(allocator),
        }
    }

    /// Lock the allocator for a sequence of calls
    pub fn lock(&self) -> spin::MutexGuard<'_, A> {
        self.inner.lock()
    }

    /// Unwrap the allocator
    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }
}

impl<'a, A: ArenaAllocator<'a>> LockedArena<A> {
    /// Allocate under the lock
    pub fn alloc(&self, size: usize) -> Result<ArenaPtr> {
        self.inner.lock().alloc(size)
    }

    /// Free under the lock
    pub fn free(&self, ptr: Option<ArenaPtr>) {
        self.inner.lock().free(ptr);
    }

    /// Occupancy snapshot under the lock
    pub fn stats(&self) -> ArenaStats {
        self.inner.lock().stats()
    }
}
