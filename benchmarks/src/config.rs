//! # Benchmark Configuration
//!
//! Command-line options for the arena benchmark, parsed with `clap`.
//! Defaults reproduce the classic run: a 1 MiB arena, 100000 requests of
//! 8 to 4096 bytes drawn from seed 12345.

use clap::{Parser, ValueEnum};
use helix_arena::AllocatorKind;
use log::LevelFilter;

use crate::error::{BenchError, Result};

/// Default arena size (1 MiB)
pub const DEFAULT_ARENA_SIZE: usize = 1 << 20;

/// Default number of alloc/free pairs
pub const DEFAULT_COUNT: usize = 100_000;

/// Default smallest request
pub const DEFAULT_MIN_SIZE: usize = 8;

/// Default largest request
pub const DEFAULT_MAX_SIZE: usize = 4096;

/// Default RNG seed
pub const DEFAULT_SEED: u64 = 12345;

/// Allocator selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// First-fit free list with coalescing
    FreeList,
    /// Power-of-two buddy system
    Buddy,
}

impl From<Strategy> for AllocatorKind {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::FreeList => AllocatorKind::FreeList,
            Strategy::Buddy => AllocatorKind::Buddy,
        }
    }
}

/// Benchmark a free-list or buddy allocator over a single arena
#[derive(Debug, Clone, Parser)]
#[command(name = "arena-bench", version, about)]
pub struct BenchConfig {
    /// Allocator to benchmark
    #[arg(short, long, value_enum, default_value_t = Strategy::FreeList)]
    pub allocator: Strategy,

    /// Arena size in bytes, rounded up to whole pages
    #[arg(short = 's', long, default_value_t = DEFAULT_ARENA_SIZE)]
    pub arena_size: usize,

    /// Number of allocations, each later freed
    #[arg(short = 'n', long, default_value_t = DEFAULT_COUNT)]
    pub count: usize,

    /// Smallest request size in bytes
    #[arg(long, default_value_t = DEFAULT_MIN_SIZE)]
    pub min_size: usize,

    /// Largest request size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE)]
    pub max_size: usize,

    /// Seed for the request size generator
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Log level written to stderr (off, error, warn, info, debug, trace)
    #[arg(long, default_value_t = LevelFilter::Warn)]
    pub log_level: LevelFilter,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            allocator: Strategy::FreeList,
            arena_size: DEFAULT_ARENA_SIZE,
            count: DEFAULT_COUNT,
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            seed: DEFAULT_SEED,
            log_level: LevelFilter::Warn,
        }
    }
}

impl BenchConfig {
    /// Allocator implementation to create
    pub fn kind(&self) -> AllocatorKind {
        self.allocator.into()
    }

    /// Reject settings the workload cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(BenchError::ZeroCount);
        }
        if self.min_size == 0 || self.min_size > self.max_size {
            return Err(BenchError::InvalidSizeRange {
                min: self.min_size,
                max: self.max_size,
            });
        }
        Ok(())
    }
}
