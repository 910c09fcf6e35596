//! # Buddy Allocator
//!
//! Power-of-two size classes with XOR-address buddy coalescing.
//!
//! ## Memory Layout
//!
//! ```text
//! Offset  Size  Field
//! ──────────────────────────────────────
//! 0x00    8     Arena size
//! 0x08    8     Aligned base (XOR origin)
//! 0x10    1     min_order
//! 0x11    1     max_order
//! 0x18    512   Free-list heads, one per order (0 = empty)
//! 0x220   ...   Padding up to `base`
//! base    ...   Top-order blocks, 2^max_order bytes each
//! ──────────────────────────────────────
//! ```
//!
//! A live block starts with a 2-byte order tag; the payload follows it. A
//! free block holds a single link word pointing at the next free block of
//! the same order.
//!
//! ## Invariants
//!
//! - A block of order `k` starts at `base + n * 2^k`, so its buddy is at
//!   `base + ((offset - base) ^ 2^k)`.
//! - Two free buddies of the same order below `max_order` never coexist;
//!   freeing always merges as far up as it can.
//! - Top-order blocks are never merged with each other.

use core::fmt;
use core::mem::size_of;

use alloc::boxed::Box;

use crate::allocator::{AllocatorKind, ArenaAllocator};
use crate::arena::{align_down, align_up, ilog2_ceil, is_aligned, Arena, ArenaPtr, MAX_ALIGN, WORD_SIZE};
use crate::error::{AllocError, Result};
use crate::stats::ArenaStats;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Size of the order tag stored at the start of a live block
pub const ORDER_TAG_SIZE: usize = size_of::<u16>();

/// Smallest payload the minimum order must hold
pub const MIN_PAYLOAD: usize = 8;

/// Lowest order ever used (16-byte blocks)
pub const MIN_ORDER_FLOOR: u32 = 4;

/// Highest order ever used (1 MiB blocks)
pub const MAX_ORDER_CAP: u32 = 20;

/// Number of free-list heads in the descriptor
pub const FREE_LIST_COUNT: usize = 64;

const DESC_SIZE: usize = 0;
const DESC_BASE: usize = WORD_SIZE;
const DESC_MIN_ORDER: usize = 2 * WORD_SIZE;
const DESC_MAX_ORDER: usize = 2 * WORD_SIZE + 1;
const DESC_HEADS: usize = 3 * WORD_SIZE;

/// Bytes reserved for the allocator descriptor at the head of the arena
pub const DESCRIPTOR_SIZE: usize = align_up(DESC_HEADS + FREE_LIST_COUNT * WORD_SIZE, MAX_ALIGN);

/// Null link
const NIL: usize = 0;

static_assertions::const_assert!((1usize << MIN_ORDER_FLOOR) >= WORD_SIZE);
static_assertions::const_assert!((1usize << MIN_ORDER_FLOOR) >= ORDER_TAG_SIZE + 1);
static_assertions::const_assert!((MAX_ORDER_CAP as usize) < FREE_LIST_COUNT);
static_assertions::const_assert!(MAX_ORDER_CAP <= u16::MAX as u32);

/// Byte size of a block of `order`
#[inline]
pub const fn block_size(order: u32) -> usize {
    1usize << order
}

/// Smallest order at or above `min_order` whose block holds `need` bytes
#[inline]
fn order_for(need: usize, min_order: u32) -> u32 {
    ilog2_ceil(need).max(min_order)
}

// =============================================================================
// BUDDY ALLOCATOR
// =============================================================================

/// Buddy-system allocator with 64 order-indexed free lists.
///
/// Not synchronized; wrap it in [`crate::LockedArena`] to share it.
pub struct BuddyAllocator<'a> {
    arena: Arena<'a>,
    live_bytes: usize,
    allocations: u64,
    frees: u64,
}

impl<'a> BuddyAllocator<'a> {
    /// Create an allocator over `memory`.
    ///
    /// The working region starts at the first multiple of the top block
    /// size after the descriptor and is trimmed to a whole number of top
    /// blocks, each seeded onto the top-order free list.
    pub fn new(memory: &'a mut [u8]) -> Result<Self> {
        let size = memory.len();
        let min_order = MIN_ORDER_FLOOR.max(ilog2_ceil(ORDER_TAG_SIZE + MIN_PAYLOAD));

        let required = DESCRIPTOR_SIZE + block_size(min_order);
        if size < required {
            return Err(AllocError::ArenaTooSmall { size, required });
        }

        let usable = size - DESCRIPTOR_SIZE;
        let mut max_order = 0;
        while max_order < MAX_ORDER_CAP && block_size(max_order + 1) <= usable {
            max_order += 1;
        }

        // Alignment padding may leave no room for a top block; step down
        // until one fits.
        let base = loop {
            if max_order < min_order {
                return Err(AllocError::NoUsableOrder {
                    min_order,
                    max_order,
                });
            }
            let base = align_up(DESCRIPTOR_SIZE, block_size(max_order));
            if base + block_size(max_order) <= size {
                break base;
            }
            max_order -= 1;
        };

        let managed = align_down(size - base, block_size(max_order));
        let blocks = managed >> max_order;

        let mut arena = Arena::new(memory);
        arena.write_word(DESC_SIZE, size);
        arena.write_word(DESC_BASE, base);
        arena.write_u8(DESC_MIN_ORDER, min_order as u8);
        arena.write_u8(DESC_MAX_ORDER, max_order as u8);
        for order in 0..FREE_LIST_COUNT {
            arena.write_word(DESC_HEADS + order * WORD_SIZE, NIL);
        }

        let mut allocator = Self {
            arena,
            live_bytes: 0,
            allocations: 0,
            frees: 0,
        };
        for i in (0..blocks).rev() {
            allocator.push(max_order, base + (i << max_order));
        }

        log::debug!(
            "buddy: arena of {} bytes, orders {}..={}, {} top blocks at {:#x}",
            size,
            min_order,
            max_order,
            blocks,
            base
        );

        Ok(allocator)
    }

    /// Give the backing memory back. No memory is released.
    pub fn release(self) -> &'a mut [u8] {
        log::debug!("buddy: released arena of {} bytes", self.arena.len());
        self.arena.into_inner()
    }

    /// Smallest order handed out
    pub fn min_order(&self) -> u32 {
        self.arena.read_u8(DESC_MIN_ORDER) as u32
    }

    /// Largest order handed out
    pub fn max_order(&self) -> u32 {
        self.arena.read_u8(DESC_MAX_ORDER) as u32
    }

    /// Offset of the aligned working region; block offsets are relative to it
    pub fn base(&self) -> usize {
        self.arena.read_word(DESC_BASE)
    }

    /// End of the region covered by top-order blocks
    fn limit(&self) -> usize {
        let base = self.base();
        base + align_down(self.arena.len() - base, block_size(self.max_order()))
    }

    /// Largest request that could ever succeed on this arena
    pub fn max_request(&self) -> usize {
        block_size(self.max_order()) - ORDER_TAG_SIZE
    }

    /// Allocate at least `size` bytes.
    ///
    /// Rounds `size` plus the order tag up to a power of two, takes a block
    /// from the smallest non-empty order at or above it, and halves it down
    /// to size, pushing each upper half onto the free list one order below.
    pub fn alloc(&mut self, size: usize) -> Result<ArenaPtr> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let max_order = self.max_order();
        let order = match size.checked_add(ORDER_TAG_SIZE) {
            Some(need) => order_for(need, self.min_order()),
            None => u32::MAX,
        };
        if order > max_order {
            return Err(AllocError::RequestTooLarge {
                size,
                max: self.max_request(),
            });
        }

        let Some(mut cur) = (order..=max_order).find(|&o| self.head(o) != NIL) else {
            return Err(AllocError::OutOfMemory { size });
        };
        let block = self.pop(cur).ok_or(AllocError::OutOfMemory { size })?;

        while cur > order {
            cur -= 1;
            self.push(cur, block + block_size(cur));
            log::trace!("buddy: split {:#x} to order {}", block, cur);
        }

        self.arena.write_u16(block, order as u16);
        self.live_bytes += block_size(order);
        self.allocations += 1;
        log::trace!("buddy: alloc {} bytes -> block {:#x} order {}", size, block, order);

        ArenaPtr::new(block + ORDER_TAG_SIZE).ok_or(AllocError::OutOfMemory { size })
    }

    /// Return a block, merging it with its buddy for as long as the buddy
    /// is free at the same order.
    ///
    /// `None` is a no-op. Pointers outside the working region, and tags
    /// that cannot describe a block at that offset, are logged and ignored.
    pub fn free(&mut self, ptr: Option<ArenaPtr>) {
        let Some(ptr) = ptr else {
            return;
        };
        let Some((mut block, mut order)) = self.block_of(ptr) else {
            log::warn!("buddy: ignoring free of foreign pointer {}", ptr);
            return;
        };

        self.live_bytes = self.live_bytes.saturating_sub(block_size(order));
        self.frees += 1;

        let max_order = self.max_order();
        while order < max_order {
            let buddy = self.buddy_of(block, order);
            if !self.remove(order, buddy) {
                break;
            }
            log::trace!("buddy: merged {:#x} with {:#x} at order {}", block, buddy, order);
            // The upper half is now interior to the merged block; a stale tag
            // there would let a repeat free of it through.
            self.arena.write_u16(block.max(buddy), 0);
            block = block.min(buddy);
            order += 1;
        }
        self.push(order, block);
    }

    /// Recover the block offset and order behind a payload pointer
    fn block_of(&self, ptr: ArenaPtr) -> Option<(usize, u32)> {
        let base = self.base();
        let offset = ptr.offset();
        if offset < base + ORDER_TAG_SIZE || offset >= self.limit() {
            return None;
        }
        let block = offset - ORDER_TAG_SIZE;
        let order = self.arena.read_u16(block) as u32;
        if order < self.min_order() || order > self.max_order() || !is_aligned(block - base, block_size(order)) {
            return None;
        }
        Some((block, order))
    }

    fn buddy_of(&self, block: usize, order: u32) -> usize {
        let base = self.base();
        base + ((block - base) ^ block_size(order))
    }

    // =========================================================================
    // Free lists
    // =========================================================================

    fn head(&self, order: u32) -> usize {
        self.arena.read_word(DESC_HEADS + order as usize * WORD_SIZE)
    }

    fn set_head(&mut self, order: u32, block: usize) {
        self.arena.write_word(DESC_HEADS + order as usize * WORD_SIZE, block);
    }

    fn push(&mut self, order: u32, block: usize) {
        let head = self.head(order);
        self.arena.write_word(block, head);
        self.set_head(order, block);
    }

    fn pop(&mut self, order: u32) -> Option<usize> {
        let block = self.head(order);
        if block == NIL {
            return None;
        }
        let next = self.arena.read_word(block);
        self.set_head(order, next);
        Some(block)
    }

    /// Unlink `block` from the free list of `order`, if it is there
    fn remove(&mut self, order: u32, block: usize) -> bool {
        let mut prev = NIL;
        let mut cur = self.head(order);
        while cur != NIL {
            let next = self.arena.read_word(cur);
            if cur == block {
                if prev == NIL {
                    self.set_head(order, next);
                } else {
                    self.arena.write_word(prev, next);
                }
                return true;
            }
            prev = cur;
            cur = next;
        }
        false
    }

    /// Walk the free list of `order`, yielding block offsets
    pub fn free_blocks(&self, order: u32) -> FreeNodes<'_, 'a> {
        let cur = if (order as usize) < FREE_LIST_COUNT {
            self.head(order)
        } else {
            NIL
        };
        FreeNodes {
            arena: &self.arena,
            cur,
        }
    }

    /// Number of free blocks of `order`
    pub fn free_count(&self, order: u32) -> usize {
        self.free_blocks(order).count()
    }

    /// Order of a live block, or `None` for a pointer whose tag cannot
    /// describe a block at that offset
    pub fn order_of(&self, ptr: ArenaPtr) -> Option<u32> {
        self.block_of(ptr).map(|(_, order)| order)
    }

    /// Payload capacity of a live block, or 0 for a foreign pointer
    pub fn usable_size(&self, ptr: ArenaPtr) -> usize {
        self.order_of(ptr)
            .map_or(0, |order| block_size(order) - ORDER_TAG_SIZE)
    }

    /// Payload of a live block; empty for a foreign pointer
    pub fn bytes(&self, ptr: ArenaPtr) -> &[u8] {
        let len = self.usable_size(ptr);
        if len == 0 {
            return &[];
        }
        self.arena.bytes(ptr.offset(), len)
    }

    /// Mutable payload of a live block; empty for a foreign pointer
    pub fn bytes_mut(&mut self, ptr: ArenaPtr) -> &mut [u8] {
        let len = self.usable_size(ptr);
        if len == 0 {
            return &mut [];
        }
        self.arena.bytes_mut(ptr.offset(), len)
    }

    /// Snapshot of the allocator's occupancy
    pub fn stats(&self) -> ArenaStats {
        let mut free_bytes = 0;
        let mut free_blocks = 0;
        let mut largest_free = 0;
        for order in self.min_order()..=self.max_order() {
            let count = self.free_count(order);
            if count > 0 {
                free_bytes += count * block_size(order);
                free_blocks += count;
                largest_free = block_size(order);
            }
        }

        let size = self.arena.len();
        ArenaStats {
            arena_size: size,
            overhead: size - (self.limit() - self.base()),
            free_bytes,
            free_blocks,
            largest_free,
            live_bytes: self.live_bytes,
            allocations: self.allocations,
            frees: self.frees,
        }
    }
}

impl fmt::Debug for BuddyAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuddyAllocator")
            .field("arena", &self.arena)
            .field("base", &self.base())
            .field("min_order", &self.min_order())
            .field("max_order", &self.max_order())
            .field("live_bytes", &self.live_bytes)
            .finish()
    }
}

impl<'a> ArenaAllocator<'a> for BuddyAllocator<'a> {
    fn create(memory: &'a mut [u8]) -> Result<Self> {
        Self::new(memory)
    }

    fn destroy(self: Box<Self>) -> &'a mut [u8] {
        (*self).release()
    }

    fn alloc(&mut self, size: usize) -> Result<ArenaPtr> {
        BuddyAllocator::alloc(self, size)
    }

    fn free(&mut self, ptr: Option<ArenaPtr>) {
        BuddyAllocator::free(self, ptr)
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Buddy
    }

    fn usable_size(&self, ptr: ArenaPtr) -> usize {
        BuddyAllocator::usable_size(self, ptr)
    }

    fn bytes(&self, ptr: ArenaPtr) -> &[u8] {
        BuddyAllocator::bytes(self, ptr)
    }

    fn bytes_mut(&mut self, ptr: ArenaPtr) -> &mut [u8] {
        BuddyAllocator::bytes_mut(self, ptr)
    }

    fn stats(&self) -> ArenaStats {
        BuddyAllocator::stats(self)
    }
}

/// Iterator over one order's free list
#[derive(Debug)]
pub struct FreeNodes<'b, 'a> {
    arena: &'b Arena<'a>,
    cur: usize,
}

impl Iterator for FreeNodes<'_, '_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NIL {
            return None;
        }
        let block = self.cur;
        self.cur = self.arena.read_word(block);
        Some(block)
    }
}

// =============================================================================
// TESTS
// =============================================================================
