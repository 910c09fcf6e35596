//! # Arena
//!
//! The byte region an allocator manages, and the offset arithmetic used to
//! lay metadata out inside it.
//!
//! ## Overview
//!
//! Both allocators keep every piece of their bookkeeping inside the arena
//! itself: the descriptor at its head, block headers in front of payloads,
//! and free-list links inside the free blocks. All of that is reached
//! through the typed accessors below, which take byte offsets relative to
//! the start of the arena and are bounds-checked by slice indexing.
//!
//! Multi-byte fields are stored little-endian.

use core::fmt;
use core::mem::size_of;
use core::num::NonZeroUsize;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Size of an offset-sized metadata field (size words, link words)
pub const WORD_SIZE: usize = size_of::<usize>();

/// Alignment every payload handed out by the free-list allocator honours
pub const MAX_ALIGN: usize = 16;

static_assertions::const_assert!(MAX_ALIGN.is_power_of_two());
static_assertions::const_assert!(MAX_ALIGN >= WORD_SIZE);

// =============================================================================
// ALIGNMENT HELPERS
// =============================================================================

/// Round `value` up to a multiple of `align` (a power of two)
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Round `value` down to a multiple of `align` (a power of two)
#[inline]
pub const fn align_down(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

/// Check whether `value` is a multiple of `align` (a power of two)
#[inline]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Smallest `k` such that `2^k >= value`
#[inline]
pub const fn ilog2_ceil(value: usize) -> u32 {
    if value <= 1 {
        0
    } else {
        usize::BITS - (value - 1).leading_zeros()
    }
}

// =============================================================================
// ARENA POINTER
// =============================================================================

/// A pointer handed out by an arena allocator.
///
/// This is the byte offset of the first usable byte of a live block,
/// relative to the start of the arena. Offset 0 always belongs to the
/// allocator descriptor, so a payload offset is never zero and
/// `Option<ArenaPtr>` doubles as the nullable pointer of the allocator
/// contract.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaPtr(NonZeroUsize);

impl ArenaPtr {
    /// Wrap a payload offset. Returns `None` for offset 0.
    #[inline]
    pub const fn new(offset: usize) -> Option<Self> {
        match NonZeroUsize::new(offset) {
            Some(offset) => Some(Self(offset)),
            None => None,
        }
    }

    /// Byte offset from the start of the arena
    #[inline]
    pub const fn offset(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for ArenaPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaPtr({:#x})", self.offset())
    }
}

impl fmt::Display for ArenaPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.offset())
    }
}

// =============================================================================
// ARENA
// =============================================================================

/// Caller-supplied memory, viewed through typed accessors.
///
/// The arena borrows the memory for `'a`; dropping or releasing it hands the
/// untouched slice back to whoever created the allocator. Nothing here
/// allocates or frees host memory.
pub struct Arena<'a> {
    memory: &'a mut [u8],
}

impl<'a> Arena<'a> {
    /// View `memory` as an arena
    #[inline]
    pub fn new(memory: &'a mut [u8]) -> Self {
        Self { memory }
    }

    /// Total size of the arena in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Whether the arena has no bytes at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Give the backing memory back
    #[inline]
    pub fn into_inner(self) -> &'a mut [u8] {
        self.memory
    }

    /// Read an offset-sized field at `offset`
    #[inline]
    pub fn read_word(&self, offset: usize) -> usize {
        let mut raw = [0u8; WORD_SIZE];
        raw.copy_from_slice(&self.memory[offset..offset + WORD_SIZE]);
        usize::from_le_bytes(raw)
    }

    /// Write an offset-sized field at `offset`
    #[inline]
    pub fn write_word(&mut self, offset: usize, value: usize) {
        self.memory[offset..offset + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
    }

    /// Read a 16-bit field at `offset`
    #[inline]
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.memory[offset], self.memory[offset + 1]])
    }

    /// Write a 16-bit field at `offset`
    #[inline]
    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.memory[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Read a byte at `offset`
    #[inline]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.memory[offset]
    }

    /// Write a byte at `offset`
    #[inline]
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.memory[offset] = value;
    }

    /// Borrow `len` bytes starting at `offset`
    #[inline]
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.memory[offset..offset + len]
    }

    /// Mutably borrow `len` bytes starting at `offset`
    #[inline]
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.memory[offset..offset + len]
    }
}

impl fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("start", &self.memory.as_ptr())
            .field("len", &self.memory.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
