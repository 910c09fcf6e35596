//! Occupancy snapshots shared by both allocators.

/// Point-in-time view of an arena's occupancy.
///
/// `overhead` counts every byte that can never be handed out: the
/// descriptor, alignment padding and (for the buddy allocator) the tail
/// that does not fill a whole top-order block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Total arena size
    pub arena_size: usize,
    /// Bytes reserved for metadata and padding
    pub overhead: usize,
    /// Bytes held by free blocks
    pub free_bytes: usize,
    /// Number of free blocks
    pub free_blocks: usize,
    /// Size of the largest free block
    pub largest_free: usize,
    /// Bytes held by live blocks, headers included
    pub live_bytes: usize,
    /// Successful allocations since creation
    pub allocations: u64,
    /// Frees since creation
    pub frees: u64,
}

impl ArenaStats {
    /// Fraction of free memory not part of the largest free block
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - (self.largest_free as f64 / self.free_bytes as f64)
    }

    /// Whether free, live and overhead bytes add up to the arena size
    pub fn is_conserved(&self) -> bool {
        self.overhead + self.free_bytes + self.live_bytes == self.arena_size
    }

    /// Allocations not yet freed
    pub fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }
}
