//! # Free-List Allocator
//!
//! First-fit allocator over an address-ordered, singly linked list of
//! variable-size free blocks.
//!
//! ## Memory Layout
//!
//! ```text
//! Offset  Size  Field
//! ──────────────────────────────────────
//! 0x00    8     Arena size
//! 0x08    8     Free-list head (0 = empty)
//! 0x10    ...   Blocks, back to back, up to the end of the arena
//! ──────────────────────────────────────
//!
//! Block:
//! +0x00   8     Size, header included
//! +0x08   8     Next free block (0 = end, meaningless while live)
//! +0x10   1     BlockFlags
//! +0x20   ...   Payload (MAX_ALIGN-aligned)
//! ```
//!
//! ## Invariants
//!
//! - Blocks tile the arena after the descriptor with no gaps.
//! - The free list threads only through blocks flagged `FREE` and is kept
//!   in ascending address order, so list neighbours that touch in memory
//!   can be coalesced without any boundary tags.
//! - A live block is never linked into the free list.

use core::fmt;

use bitflags::bitflags;

use crate::allocator::{AllocatorKind, ArenaAllocator};
use crate::arena::{align_down, align_up, is_aligned, Arena, ArenaPtr, MAX_ALIGN, WORD_SIZE};
use crate::error::{AllocError, Result};
use crate::stats::ArenaStats;
use alloc::boxed::Box;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Bytes reserved for the allocator descriptor at the head of the arena
pub const DESCRIPTOR_SIZE: usize = align_up(2 * WORD_SIZE, MAX_ALIGN);

/// Bytes of in-band header in front of every block's payload
pub const HEADER_SIZE: usize = align_up(2 * WORD_SIZE + 1, MAX_ALIGN);

/// Smallest payload worth splitting a block off for
pub const MIN_SPLIT_PAYLOAD: usize = 16;

/// Offset of the first block
const FIRST_BLOCK: usize = DESCRIPTOR_SIZE;

/// Null link
const NIL: usize = 0;

const DESC_SIZE: usize = 0;
const DESC_HEAD: usize = WORD_SIZE;

const HDR_SIZE: usize = 0;
const HDR_NEXT: usize = WORD_SIZE;
const HDR_FLAGS: usize = 2 * WORD_SIZE;

static_assertions::const_assert!(is_aligned(DESCRIPTOR_SIZE, MAX_ALIGN));
static_assertions::const_assert!(is_aligned(HEADER_SIZE, MAX_ALIGN));
static_assertions::const_assert!(HDR_FLAGS < HEADER_SIZE);

// =============================================================================
// BLOCK HEADER
// =============================================================================

bitflags! {
    /// Block state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// Block is on the free list
        const FREE = 1 << 0;
    }
}

/// Decoded block header.
///
/// The only code that reinterprets arena bytes as a header is
/// [`BlockHeader::read`] and [`BlockHeader::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Total block size, header included
    pub size: usize,
    /// Offset of the next free block, or 0
    pub next: usize,
    /// State flags
    pub flags: BlockFlags,
}

impl BlockHeader {
    const fn free(size: usize, next: usize) -> Self {
        Self {
            size,
            next,
            flags: BlockFlags::FREE,
        }
    }

    fn read(arena: &Arena<'_>, block: usize) -> Self {
        Self {
            size: arena.read_word(block + HDR_SIZE),
            next: arena.read_word(block + HDR_NEXT),
            flags: BlockFlags::from_bits_truncate(arena.read_u8(block + HDR_FLAGS)),
        }
    }

    fn write(&self, arena: &mut Arena<'_>, block: usize) {
        arena.write_word(block + HDR_SIZE, self.size);
        arena.write_word(block + HDR_NEXT, self.next);
        arena.write_u8(block + HDR_FLAGS, self.flags.bits());
    }

    /// Whether the block is on the free list
    #[inline]
    pub fn is_free(&self) -> bool {
        self.flags.contains(BlockFlags::FREE)
    }
}

/// One block found while walking the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block header
    pub offset: usize,
    /// Total block size, header included
    pub size: usize,
    /// Whether the block is free
    pub free: bool,
}

impl BlockInfo {
    /// Offset one past the last byte of the block
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Offset of the payload
    #[inline]
    pub fn payload(&self) -> usize {
        self.offset + HEADER_SIZE
    }
}

// =============================================================================
// FREE-LIST ALLOCATOR
// =============================================================================

/// First-fit allocator with address-ordered bidirectional coalescing.
///
/// Not synchronized; wrap it in [`crate::LockedArena`] to share it.
pub struct FreeListAllocator<'a> {
    arena: Arena<'a>,
    allocations: u64,
    frees: u64,
}

impl<'a> FreeListAllocator<'a> {
    /// Create an allocator over `memory`.
    ///
    /// Everything after the descriptor becomes a single free block.
    pub fn new(memory: &'a mut [u8]) -> Result<Self> {
        let size = memory.len();
        let required = DESCRIPTOR_SIZE + HEADER_SIZE;
        if size < required {
            return Err(AllocError::ArenaTooSmall { size, required });
        }

        let mut arena = Arena::new(memory);
        arena.write_word(DESC_SIZE, size);
        arena.write_word(DESC_HEAD, FIRST_BLOCK);
        BlockHeader::free(size - FIRST_BLOCK, NIL).write(&mut arena, FIRST_BLOCK);

        log::debug!(
            "free-list: arena of {} bytes, initial block {} bytes at {:#x}",
            size,
            size - FIRST_BLOCK,
            FIRST_BLOCK
        );

        Ok(Self {
            arena,
            allocations: 0,
            frees: 0,
        })
    }

    /// Give the backing memory back. No memory is released.
    pub fn release(self) -> &'a mut [u8] {
        log::debug!("free-list: released arena of {} bytes", self.arena.len());
        self.arena.into_inner()
    }

    /// Block size needed to serve a request of `size` bytes
    fn block_size_for(size: usize) -> Option<usize> {
        size.checked_add(MAX_ALIGN - 1)
            .map(|padded| align_down(padded, MAX_ALIGN))
            .and_then(|payload| payload.checked_add(HEADER_SIZE))
    }

    /// Largest request that could ever succeed on this arena
    pub fn max_request(&self) -> usize {
        align_down(self.arena.len() - FIRST_BLOCK - HEADER_SIZE, MAX_ALIGN)
    }

    /// Allocate at least `size` bytes.
    ///
    /// Takes the first free block (in address order) that is large enough,
    /// splitting off its tail when the remainder can hold a header plus
    /// [`MIN_SPLIT_PAYLOAD`] bytes.
    pub fn alloc(&mut self, size: usize) -> Result<ArenaPtr> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let need = match Self::block_size_for(size) {
            Some(need) if need <= self.arena.len() - FIRST_BLOCK => need,
            _ => {
                return Err(AllocError::RequestTooLarge {
                    size,
                    max: self.max_request(),
                })
            },
        };

        let mut prev = NIL;
        let mut cur = self.head();
        while cur != NIL {
            let header = BlockHeader::read(&self.arena, cur);
            if header.is_free() && header.size >= need {
                let (block_size, successor) = self.split(cur, header, need);
                self.link(prev, successor);
                BlockHeader {
                    size: block_size,
                    next: NIL,
                    flags: BlockFlags::empty(),
                }
                .write(&mut self.arena, cur);

                self.allocations += 1;
                log::trace!("free-list: alloc {} bytes -> block {:#x} ({} bytes)", size, cur, block_size);
                return ArenaPtr::new(cur + HEADER_SIZE).ok_or(AllocError::OutOfMemory { size });
            }
            prev = cur;
            cur = header.next;
        }

        Err(AllocError::OutOfMemory { size })
    }

    /// Carve `need` bytes off the front of `block`.
    ///
    /// Returns the block's final size and the block that takes its place in
    /// the free list.
    fn split(&mut self, block: usize, header: BlockHeader, need: usize) -> (usize, usize) {
        if header.size >= need + HEADER_SIZE + MIN_SPLIT_PAYLOAD {
            let tail = block + need;
            BlockHeader::free(header.size - need, header.next).write(&mut self.arena, tail);
            log::trace!("free-list: split {:#x} at {:#x} ({} bytes left)", block, tail, header.size - need);
            (need, tail)
        } else {
            (header.size, header.next)
        }
    }

    /// Return a block to the free list.
    ///
    /// The block is linked back in address order, then merged with its
    /// successor and then with its predecessor when they touch it in
    /// memory. `None` is a no-op. Pointers that cannot belong to this arena
    /// and blocks already flagged free are logged and ignored.
    pub fn free(&mut self, ptr: Option<ArenaPtr>) {
        let Some(ptr) = ptr else {
            return;
        };
        let Some(block) = self.block_of(ptr) else {
            log::warn!("free-list: ignoring free of foreign pointer {}", ptr);
            return;
        };

        let mut header = BlockHeader::read(&self.arena, block);
        if header.is_free() {
            log::warn!("free-list: ignoring double free of {}", ptr);
            return;
        }
        if header.size < HEADER_SIZE || block + header.size > self.arena.len() {
            log::warn!("free-list: ignoring free of {} with corrupt header", ptr);
            return;
        }
        header.flags.insert(BlockFlags::FREE);

        let mut prev = NIL;
        let mut cur = self.head();
        while cur != NIL && cur < block {
            prev = cur;
            cur = self.next_of(cur);
        }
        header.next = cur;
        header.write(&mut self.arena, block);
        self.link(prev, block);
        self.frees += 1;

        if cur != NIL && block + header.size == cur {
            let successor = BlockHeader::read(&self.arena, cur);
            header.size += successor.size;
            header.next = successor.next;
            header.write(&mut self.arena, block);
            log::trace!("free-list: coalesced {:#x} with successor {:#x}", block, cur);
        }

        if prev != NIL {
            let mut predecessor = BlockHeader::read(&self.arena, prev);
            if prev + predecessor.size == block {
                predecessor.size += header.size;
                predecessor.next = header.next;
                predecessor.write(&mut self.arena, prev);
                log::trace!("free-list: coalesced {:#x} into predecessor {:#x}", block, prev);
            }
        }
    }

    /// Recover the header offset for a payload pointer
    fn block_of(&self, ptr: ArenaPtr) -> Option<usize> {
        let offset = ptr.offset();
        if offset < FIRST_BLOCK + HEADER_SIZE || offset > self.arena.len() || !is_aligned(offset, MAX_ALIGN) {
            return None;
        }
        Some(offset - HEADER_SIZE)
    }

    fn head(&self) -> usize {
        self.arena.read_word(DESC_HEAD)
    }

    fn next_of(&self, block: usize) -> usize {
        self.arena.read_word(block + HDR_NEXT)
    }

    /// Point `prev`'s link (or the list head when `prev` is NIL) at `next`
    fn link(&mut self, prev: usize, next: usize) {
        if prev == NIL {
            self.arena.write_word(DESC_HEAD, next);
        } else {
            self.arena.write_word(prev + HDR_NEXT, next);
        }
    }

    /// Payload capacity of a live block, or 0 for a pointer that cannot
    /// belong to this arena
    pub fn usable_size(&self, ptr: ArenaPtr) -> usize {
        let Some(block) = self.block_of(ptr) else {
            return 0;
        };
        let size = BlockHeader::read(&self.arena, block).size;
        size.saturating_sub(HEADER_SIZE).min(self.arena.len() - ptr.offset())
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

    /// Walk the free list in list (= address) order
    pub fn free_blocks(&self) -> FreeBlocks<'_, 'a> {
        FreeBlocks {
            arena: &self.arena,
            cur: self.head(),
        }
    }

    /// Walk every block in the arena, free and live, in address order
    pub fn blocks(&self) -> Blocks<'_, 'a> {
        Blocks {
            arena: &self.arena,
            cur: FIRST_BLOCK,
        }
    }

    /// Snapshot of the allocator's occupancy.
    ///
    /// Free bytes come from the free-list walk and live bytes from the
    /// physical walk, so a list that strays into a live block, or blocks
    /// that stop tiling the arena, show up as a stats snapshot that is not
    /// conserved.
    pub fn stats(&self) -> ArenaStats {
        let mut free_bytes = 0;
        let mut free_blocks = 0;
        let mut largest_free = 0;
        for block in self.free_blocks() {
            free_bytes += block.size;
            free_blocks += 1;
            largest_free = largest_free.max(block.size);
        }
        let live_bytes: usize = self.blocks().filter(|b| !b.free).map(|b| b.size).sum();

        ArenaStats {
            arena_size: self.arena.len(),
            overhead: DESCRIPTOR_SIZE,
            free_bytes,
            free_blocks,
            largest_free,
            live_bytes,
            allocations: self.allocations,
            frees: self.frees,
        }
    }
}

impl fmt::Debug for FreeListAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeListAllocator")
            .field("arena", &self.arena)
            .field("head", &self.head())
            .field("allocations", &self.allocations)
            .field("frees", &self.frees)
            .finish()
    }
}

impl<'a> ArenaAllocator<'a> for FreeListAllocator<'a> {
    fn create(memory: &'a mut [u8]) -> Result<Self> {
        Self::new(memory)
    }

    fn destroy(self: Box<Self>) -> &'a mut [u8] {
        (*self).release()
    }

    fn alloc(&mut self, size: usize) -> Result<ArenaPtr> {
        FreeListAllocator::alloc(self, size)
    }

    fn free(&mut self, ptr: Option<ArenaPtr>) {
        FreeListAllocator::free(self, ptr)
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::FreeList
    }

    fn usable_size(&self, ptr: ArenaPtr) -> usize {
        FreeListAllocator::usable_size(self, ptr)
    }

    fn bytes(&self, ptr: ArenaPtr) -> &[u8] {
        FreeListAllocator::bytes(self, ptr)
    }

    fn bytes_mut(&mut self, ptr: ArenaPtr) -> &mut [u8] {
        FreeListAllocator::bytes_mut(self, ptr)
    }

    fn stats(&self) -> ArenaStats {
        FreeListAllocator::stats(self)
    }
}

// =============================================================================
// ITERATORS
// =============================================================================

/// Iterator over the free list
#[derive(Debug)]
pub struct FreeBlocks<'b, 'a> {
    arena: &'b Arena<'a>,
    cur: usize,
}

impl Iterator for FreeBlocks<'_, '_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NIL {
            return None;
        }
        let offset = self.cur;
        let header = BlockHeader::read(self.arena, offset);
        self.cur = header.next;
        Some(BlockInfo {
            offset,
            size: header.size,
            free: header.is_free(),
        })
    }
}

/// Iterator over every block in the arena
#[derive(Debug)]
pub struct Blocks<'b, 'a> {
    arena: &'b Arena<'a>,
    cur: usize,
}

impl Iterator for Blocks<'_, '_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur + HEADER_SIZE > self.arena.len() {
            return None;
        }
        let offset = self.cur;
        let header = BlockHeader::read(self.arena, offset);
        if header.size < HEADER_SIZE {
            // Corrupt header; stop rather than loop forever.
            self.cur = self.arena.len();
            return None;
        }
        self.cur = self.cur.saturating_add(header.size);
        Some(BlockInfo {
            offset,
            size: header.size,
            free: header.is_free(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;
    use std::vec::Vec;

    fn free_list(alloc: &FreeListAllocator<'_>) -> Vec<(usize, usize)> {
        alloc.free_blocks().map(|b| (b.offset, b.size)).collect()
    }

    fn assert_conserved(alloc: &FreeListAllocator<'_>) {
        let total: usize = alloc.blocks().map(|b| b.size).sum();
        assert_eq!(total + DESCRIPTOR_SIZE, alloc.stats().arena_size);
        let stats = alloc.stats();
        assert!(stats.is_conserved());

        let walked_free: usize = alloc.blocks().filter(|b| b.free).map(|b| b.size).sum();
        assert_eq!(walked_free, stats.free_bytes);
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(DESCRIPTOR_SIZE, 16);
        assert_eq!(HEADER_SIZE, 32);
    }

    #[test]
    fn test_create_single_free_block() {
        let mut memory = vec![0u8; 4096];
        let alloc = FreeListAllocator::new(&mut memory).unwrap();
        assert_eq!(free_list(&alloc), vec![(16, 4080)]);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_create_too_small() {
        let mut memory = vec![0u8; DESCRIPTOR_SIZE + HEADER_SIZE - 1];
        let err = FreeListAllocator::new(&mut memory).unwrap_err();
        assert_eq!(
            err,
            AllocError::ArenaTooSmall {
                size: 47,
                required: 48
            }
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_zero_size_request() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        assert_eq!(alloc.alloc(0), Err(AllocError::ZeroSize));
        assert_eq!(free_list(&alloc), vec![(16, 4080)]);
    }

    #[test]
    fn test_alloc_splits_first_fit() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();

        let a = alloc.alloc(100).unwrap();
        assert_eq!(a.offset(), 16 + HEADER_SIZE);
        assert_eq!(alloc.usable_size(a), 112);
        assert_eq!(free_list(&alloc), vec![(160, 3936)]);

        let b = alloc.alloc(100).unwrap();
        assert_eq!(b.offset(), 160 + HEADER_SIZE);
        assert_eq!(free_list(&alloc), vec![(304, 3792)]);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_payloads_are_aligned() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        for size in [1, 7, 16, 33, 250] {
            let ptr = alloc.alloc(size).unwrap();
            assert!(is_aligned(ptr.offset(), MAX_ALIGN));
            assert!(alloc.usable_size(ptr) >= size);
        }
    }

    #[test]
    fn test_free_coalesces_both_neighbours() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();

        let a = alloc.alloc(100).unwrap();
        let b = alloc.alloc(100).unwrap();

        alloc.free(Some(a));
        assert_eq!(free_list(&alloc), vec![(16, 144), (304, 3792)]);

        alloc.free(Some(b));
        assert_eq!(free_list(&alloc), vec![(16, 4080)]);
        assert_conserved(&alloc);
    }

    #[test]
    fn test_free_adjacent_in_either_order() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();

        let a = alloc.alloc(64).unwrap();
        let b = alloc.alloc(64).unwrap();
        let guard = alloc.alloc(64).unwrap();

        alloc.free(Some(b));
        alloc.free(Some(a));

        let blocks = free_list(&alloc);
        assert_eq!(blocks[0], (16, 2 * (64 + HEADER_SIZE)));
        assert_eq!(blocks.len(), 2);

        alloc.free(Some(guard));
        assert_eq!(free_list(&alloc), vec![(16, 4080)]);
    }

    #[test]
    fn test_whole_block_consumed_when_remainder_small() {
        // Initial block is 4080 bytes; a request needing 4032 leaves 48,
        // exactly one header plus the minimum payload, so it still splits.
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let ptr = alloc.alloc(4000).unwrap();
        assert_eq!(alloc.usable_size(ptr), 4000);
        assert_eq!(free_list(&alloc), vec![(16 + 4032, 48)]);

        // A request needing 4048 leaves 32: too small, the caller gets all of it.
        alloc.free(Some(ptr));
        let ptr = alloc.alloc(4016).unwrap();
        assert_eq!(alloc.usable_size(ptr), 4080 - HEADER_SIZE);
        assert!(free_list(&alloc).is_empty());
        assert_conserved(&alloc);
    }

    #[test]
    fn test_request_larger_than_arena() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        assert!(matches!(alloc.alloc(5000), Err(AllocError::RequestTooLarge { .. })));
        assert!(matches!(alloc.alloc(usize::MAX), Err(AllocError::RequestTooLarge { .. })));
        assert_eq!(alloc.max_request(), 4048);
        assert!(alloc.alloc(4048).is_ok());
    }

    #[test]
    fn test_exhaustion_count() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();

        let footprint = 64 + HEADER_SIZE;
        let expected = (4096 - DESCRIPTOR_SIZE) / footprint;

        let mut issued = 0;
        while alloc.alloc(64).is_ok() {
            issued += 1;
        }
        assert_eq!(issued, expected);
        assert!(alloc.alloc(64).unwrap_err().is_exhaustion());
        assert_conserved(&alloc);
    }

    #[test]
    fn test_failed_alloc_leaves_state_unchanged() {
        let mut memory = vec![0u8; 1024];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let _a = alloc.alloc(400).unwrap();
        let before = free_list(&alloc);
        assert!(alloc.alloc(900).is_err());
        assert_eq!(free_list(&alloc), before);
    }

    #[test]
    fn test_round_trip_restores_free_list() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let before = free_list(&alloc);
        for _ in 0..100 {
            let ptr = alloc.alloc(200).unwrap();
            alloc.free(Some(ptr));
        }
        assert_eq!(free_list(&alloc), before);
        assert_eq!(alloc.stats().allocations, 100);
        assert_eq!(alloc.stats().frees, 100);
    }

    #[test]
    fn test_reuses_freed_hole_first() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let a = alloc.alloc(256).unwrap();
        let _b = alloc.alloc(256).unwrap();
        alloc.free(Some(a));

        let c = alloc.alloc(128).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_free_null_and_foreign_pointers_ignored() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let ptr = alloc.alloc(32).unwrap();
        let before = free_list(&alloc);

        alloc.free(None);
        alloc.free(ArenaPtr::new(8));
        alloc.free(ArenaPtr::new(5000));
        alloc.free(ArenaPtr::new(ptr.offset() + 1));
        assert_eq!(free_list(&alloc), before);

        alloc.free(Some(ptr));
        alloc.free(Some(ptr));
        assert_eq!(free_list(&alloc), vec![(16, 4080)]);
        assert_eq!(alloc.stats().frees, 1);
    }

    #[test]
    fn test_stats_flag_free_block_inside_live_block() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let ptr = alloc.alloc(1000).unwrap();
        assert_conserved(&alloc);

        // Forge a 64-byte header 16 bytes into the payload and free it
        let fake = ptr.offset() + 16;
        let payload = alloc.bytes_mut(ptr);
        payload[16..16 + WORD_SIZE].copy_from_slice(&64usize.to_le_bytes());
        payload[16 + WORD_SIZE..16 + 2 * WORD_SIZE].copy_from_slice(&0usize.to_le_bytes());
        payload[16 + 2 * WORD_SIZE] = 0;
        alloc.free(ArenaPtr::new(fake + HEADER_SIZE));

        let stats = alloc.stats();
        assert_eq!(stats.free_blocks, 2);
        assert_eq!(stats.live_bytes, 1040);
        assert!(!stats.is_conserved());
    }

    #[test]
    fn test_payload_access_with_foreign_pointer_is_empty() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let _ = alloc.alloc(64).unwrap();

        for offset in [1, HEADER_SIZE, 40, 8192] {
            let ptr = ArenaPtr::new(offset).unwrap();
            assert_eq!(alloc.usable_size(ptr), 0);
            assert!(alloc.bytes(ptr).is_empty());
            assert!(alloc.bytes_mut(ptr).is_empty());
        }
    }

    #[test]
    fn test_payload_access_does_not_touch_neighbours() {
        let mut memory = vec![0u8; 4096];
        let mut alloc = FreeListAllocator::new(&mut memory).unwrap();
        let a = alloc.alloc(100).unwrap();
        let b = alloc.alloc(100).unwrap();

        alloc.bytes_mut(a).fill(0xaa);
        alloc.bytes_mut(b).fill(0xbb);

        assert!(alloc.bytes(a).iter().all(|&x| x == 0xaa));
        assert!(alloc.bytes(b).iter().all(|&x| x == 0xbb));
        assert_conserved(&alloc);

        alloc.free(Some(a));
        alloc.free(Some(b));
        assert_eq!(free_list(&alloc), vec![(16, 4080)]);
    }

    #[test]
    fn test_release_returns_memory() {
        let mut memory = vec![0u8; 256];
        let alloc = FreeListAllocator::new(&mut memory).unwrap();
        let memory = alloc.release();
        assert_eq!(memory.len(), 256);
        assert_eq!(&memory[..8], &256usize.to_le_bytes());
    }
}
