//! # Allocator Interface
//!
//! The four-operation contract both arena allocators implement, and the
//! runtime selector used by drivers that pick an implementation at startup.
//!
//! | Operation | Result                                                  |
//! |-----------|---------------------------------------------------------|
//! | create    | allocator over the memory, or a configuration error     |
//! | alloc     | pointer to at least `size` usable bytes, or an error    |
//! | free      | nothing; `None` is a no-op                              |
//! | destroy   | the backing memory, untouched; nothing is released      |
//!
//! The contract promises no thread-safety, no zeroing of returned memory
//! and no detection of double frees or foreign pointers.

use core::fmt;
use core::str::FromStr;

use alloc::boxed::Box;

use crate::arena::ArenaPtr;
use crate::buddy::BuddyAllocator;
use crate::error::Result;
use crate::free_list::FreeListAllocator;
use crate::stats::ArenaStats;

// =============================================================================
// ALLOCATOR TRAIT
// =============================================================================

/// An allocator managing a single caller-supplied arena
pub trait ArenaAllocator<'a> {
    /// Create an allocator over `memory`, carving its metadata from the head
    fn create(memory: &'a mut [u8]) -> Result<Self>
    where
        Self: Sized;

    /// Tear the allocator down and hand the backing memory back
    fn destroy(self: Box<Self>) -> &'a mut [u8];

    /// Allocate at least `size` bytes
    fn alloc(&mut self, size: usize) -> Result<ArenaPtr>;

    /// Free a pointer returned by `alloc` on this allocator
    fn free(&mut self, ptr: Option<ArenaPtr>);

    /// Which implementation this is
    fn kind(&self) -> AllocatorKind;

    /// Payload capacity of a live block
    fn usable_size(&self, ptr: ArenaPtr) -> usize;

    /// Payload of a live block
    fn bytes(&self, ptr: ArenaPtr) -> &[u8];

    /// Mutable payload of a live block
    fn bytes_mut(&mut self, ptr: ArenaPtr) -> &mut [u8];

    /// Occupancy snapshot
    fn stats(&self) -> ArenaStats;
}

// =============================================================================
// ALLOCATOR KIND
// =============================================================================

/// Available allocator implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorKind {
    /// First-fit free list with coalescing
    FreeList,
    /// Power-of-two buddy system
    Buddy,
}

impl AllocatorKind {
    /// All implementations
    pub const ALL: [AllocatorKind; 2] = [AllocatorKind::FreeList, AllocatorKind::Buddy];

    /// Short name used on command lines and in logs
    pub const fn name(self) -> &'static str {
        match self {
            AllocatorKind::FreeList => "free-list",
            AllocatorKind::Buddy => "buddy",
        }
    }

    /// Create an allocator of this kind over `memory`
    pub fn create<'a>(self, memory: &'a mut [u8]) -> Result<Box<dyn ArenaAllocator<'a> + 'a>> {
        log::debug!("creating {} allocator over {} bytes", self, memory.len());
        let allocator: Box<dyn ArenaAllocator<'a> + 'a> = match self {
            AllocatorKind::FreeList => Box::new(FreeListAllocator::create(memory)?),
            AllocatorKind::Buddy => Box::new(BuddyAllocator::create(memory)?),
        };
        Ok(allocator)
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognized allocator name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAllocatorKind;

impl fmt::Display for UnknownAllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown allocator kind (expected \"free-list\" or \"buddy\")")
    }
}

impl core::error::Error for UnknownAllocatorKind {}

impl FromStr for AllocatorKind {
    type Err = UnknownAllocatorKind;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        AllocatorKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownAllocatorKind)
    }
}

// =============================================================================
// TESTS
// =============================================================================
