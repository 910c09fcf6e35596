//! Error types and result handling for the arena allocators.
//!
//! Errors fall into two groups: configuration failures reported by
//! `create` when the arena cannot host the allocator's metadata, and
//! resource exhaustion reported by `alloc`. Precondition violations
//! (double free, foreign pointers) are not errors; see the allocator docs.

use core::fmt;

/// Result type alias for arena allocator operations.
pub type Result<T> = core::result::Result<T, AllocError>;

/// Failure reported by an arena allocator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AllocError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The arena cannot hold the allocator descriptor plus one block
    ArenaTooSmall {
        /// Bytes supplied
        size: usize,
        /// Bytes needed at minimum
        required: usize,
    },

    /// No block order in `min_order..=max_order` fits the arena
    NoUsableOrder {
        /// Smallest order the allocator could hand out
        min_order: u32,
        /// Largest order that fit the arena
        max_order: u32,
    },

    // ========================================================================
    // Allocation Errors
    // ========================================================================
    /// Zero-byte requests never yield a block
    ZeroSize,

    /// The request can never be satisfied by this arena
    RequestTooLarge {
        /// Bytes requested
        size: usize,
        /// Largest request the allocator can ever satisfy
        max: usize,
    },

    /// No free block is currently large enough
    OutOfMemory {
        /// Bytes requested
        size: usize,
    },
}

impl AllocError {
    /// Whether this error came from `create`
    #[inline]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::ArenaTooSmall { .. } | Self::NoUsableOrder { .. })
    }

    /// Whether freeing something may let the same request succeed later
    #[inline]
    pub const fn is_exhaustion(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArenaTooSmall { size, required } => {
                write!(f, "arena of {} bytes is too small, need at least {}", size, required)
            },
            Self::NoUsableOrder {
                min_order,
                max_order,
            } => write!(
                f,
                "no usable block order: max order {} is below min order {}",
                max_order, min_order
            ),
            Self::ZeroSize => write!(f, "zero-sized allocation"),
            Self::RequestTooLarge { size, max } => {
                write!(f, "request of {} bytes exceeds the largest block ({} bytes)", size, max)
            },
            Self::OutOfMemory { size } => write!(f, "out of memory for {} bytes", size),
        }
    }
}

impl core::error::Error for AllocError {}
