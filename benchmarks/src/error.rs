//! Driver errors.

use core::fmt;

use helix_arena::AllocError;

/// Result type for the benchmark driver
pub type Result<T> = core::result::Result<T, BenchError>;

/// Why a benchmark run could not start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchError {
    /// No operations requested
    ZeroCount,
    /// Request size range is empty or starts at zero
    InvalidSizeRange {
        /// Smallest request size
        min: usize,
        /// Largest request size
        max: usize,
    },
    /// Arena size overflows once rounded to whole pages
    ArenaSizeOverflow(usize),
    /// The allocator rejected the arena
    Create(AllocError),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCount => write!(f, "operation count must be at least 1"),
            Self::InvalidSizeRange { min, max } => {
                write!(f, "invalid request size range {}..={}", min, max)
            },
            Self::ArenaSizeOverflow(size) => write!(f, "arena size {} is too large", size),
            Self::Create(err) => write!(f, "allocator_create failed: {}", err),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Create(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AllocError> for BenchError {
    fn from(err: AllocError) -> Self {
        Self::Create(err)
    }
}
