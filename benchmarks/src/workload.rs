//! # Benchmark Workload
//!
//! Times `count` allocations of random sizes followed by `count` frees on a
//! single arena. Allocation stops at the first failure; every slot is still
//! freed afterwards, empty ones included, so the free loop always runs
//! `count` times.

use core::fmt;
use std::time::{Duration, Instant};

use helix_arena::{AllocatorKind, ArenaPtr, ArenaStats};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::BenchConfig;
use crate::error::{BenchError, Result};

/// Arena granularity and alignment
pub const PAGE_SIZE: usize = 4096;

// =============================================================================
// ARENA BUFFER
// =============================================================================

/// Heap buffer exposing a page-aligned window of whole pages
#[derive(Debug)]
pub struct PageBuffer {
    buf: Vec<u8>,
    start: usize,
    len: usize,
}

impl PageBuffer {
    /// Allocate at least `size` bytes, rounded up to whole pages
    pub fn new(size: usize) -> Result<Self> {
        let len = size
            .checked_add(PAGE_SIZE - 1)
            .map(|s| s & !(PAGE_SIZE - 1))
            .ok_or(BenchError::ArenaSizeOverflow(size))?;
        let total = len
            .checked_add(PAGE_SIZE)
            .ok_or(BenchError::ArenaSizeOverflow(size))?;

        let buf = vec![0u8; total];
        let addr = buf.as_ptr() as usize;
        let start = addr.next_multiple_of(PAGE_SIZE) - addr;
        Ok(Self { buf, start, len })
    }

    /// Size of the aligned window
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The aligned window
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[self.start..self.start + self.len]
    }
}

// =============================================================================
// REQUEST SIZES
// =============================================================================

/// Draw `count` request sizes uniformly from `min..=max`
pub fn request_sizes(count: usize, min: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.random_range(min..=max)).collect()
}

// =============================================================================
// REPORT
// =============================================================================

/// Outcome of one benchmark run
#[derive(Debug, Clone, Copy)]
pub struct Report {
    /// Allocator that ran
    pub kind: AllocatorKind,
    /// Requested operation count
    pub count: usize,
    /// Allocations that succeeded before the first failure
    pub succeeded: usize,
    /// Index of the first failed allocation
    pub failed_at: Option<usize>,
    /// Time spent in the allocation loop
    pub alloc_time: Duration,
    /// Time spent in the free loop
    pub free_time: Duration,
    /// Occupancy after the last allocation
    pub peak: ArenaStats,
    /// Occupancy after every free
    pub after: ArenaStats,
}

impl Report {
    /// Mean nanoseconds per allocation, over the requested count
    pub fn per_alloc_ns(&self) -> f64 {
        self.alloc_time.as_nanos() as f64 / self.count as f64
    }

    /// Mean nanoseconds per free, over the requested count
    pub fn per_free_ns(&self) -> f64 {
        self.free_time.as_nanos() as f64 / self.count as f64
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocs={} alloc_ms={:.3} free_ms={:.3} per_alloc_ns={:.1} per_free_ns={:.1}",
            self.count,
            self.alloc_time.as_secs_f64() * 1e3,
            self.free_time.as_secs_f64() * 1e3,
            self.per_alloc_ns(),
            self.per_free_ns()
        )
    }
}

// =============================================================================
// RUN
// =============================================================================

/// Run the workload described by `config`
pub fn run(config: &BenchConfig) -> Result<Report> {
    config.validate()?;

    let kind = config.kind();
    let sizes = request_sizes(config.count, config.min_size, config.max_size, config.seed);
    let mut buffer = PageBuffer::new(config.arena_size)?;
    log::info!("{} allocator over a {} byte arena, {} requests", kind, buffer.len(), config.count);

    let mut allocator = kind.create(buffer.as_mut_slice())?;
    let mut ptrs: Vec<Option<ArenaPtr>> = vec![None; config.count];
    let mut failed_at = None;

    let t0 = Instant::now();
    for (i, &size) in sizes.iter().enumerate() {
        match allocator.alloc(size) {
            Ok(ptr) => ptrs[i] = Some(ptr),
            Err(err) => {
                failed_at = Some(i);
                log::warn!("alloc failed at {}: {}", i, err);
                break;
            },
        }
    }
    let alloc_time = t0.elapsed();
    let peak = allocator.stats();

    let t1 = Instant::now();
    for &ptr in &ptrs {
        allocator.free(ptr);
    }
    let free_time = t1.elapsed();
    let after = allocator.stats();

    log::debug!(
        "peak: {} live bytes, fragmentation {:.3}",
        peak.live_bytes,
        peak.fragmentation()
    );
    allocator.destroy();

    Ok(Report {
        kind,
        count: config.count,
        succeeded: failed_at.unwrap_or(config.count),
        failed_at,
        alloc_time,
        free_time,
        peak,
        after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;

    fn small(strategy: Strategy, arena_size: usize, count: usize) -> BenchConfig {
        BenchConfig {
            allocator: strategy,
            arena_size,
            count,
            ..BenchConfig::default()
        }
    }

    #[test]
    fn test_page_buffer_alignment() {
        let mut buffer = PageBuffer::new(5000).unwrap();
        assert_eq!(buffer.len(), 2 * PAGE_SIZE);
        let slice = buffer.as_mut_slice();
        assert_eq!(slice.len(), 2 * PAGE_SIZE);
        assert_eq!(slice.as_ptr() as usize % PAGE_SIZE, 0);

        assert!(PageBuffer::new(usize::MAX).is_err());
    }

    #[test]
    fn test_request_sizes_deterministic() {
        let a = request_sizes(1000, 8, 4096, 12345);
        let b = request_sizes(1000, 8, 4096, 12345);
        assert_eq!(a, b);
        assert!(a.iter().all(|&s| (8..=4096).contains(&s)));
        assert_ne!(a, request_sizes(1000, 8, 4096, 1));
        assert_eq!(request_sizes(10, 64, 64, 3), vec![64; 10]);
    }

    #[test]
    fn test_run_frees_everything() {
        for strategy in [Strategy::FreeList, Strategy::Buddy] {
            let report = run(&small(strategy, 1 << 20, 100)).unwrap();
            assert_eq!(report.count, 100);
            assert!(report.peak.is_conserved());
            assert_eq!(report.peak.outstanding(), report.succeeded as u64);
            assert_eq!(report.after.live_bytes, 0);
            assert_eq!(report.after.outstanding(), 0);
            assert!(report.after.is_conserved());
        }
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        for strategy in [Strategy::FreeList, Strategy::Buddy] {
            let report = run(&small(strategy, PAGE_SIZE, 100)).unwrap();
            let failed_at = report.failed_at.unwrap();
            assert_eq!(report.succeeded, failed_at);
            assert_eq!(report.peak.allocations, failed_at as u64);
            assert_eq!(report.after.live_bytes, 0);
        }
    }

    #[test]
    fn test_run_rejects_bad_config() {
        assert_eq!(run(&small(Strategy::FreeList, 1 << 20, 0)).unwrap_err(), BenchError::ZeroCount);
    }

    #[test]
    fn test_report_format() {
        let report = Report {
            kind: AllocatorKind::FreeList,
            count: 1000,
            succeeded: 1000,
            failed_at: None,
            alloc_time: Duration::from_micros(1500),
            free_time: Duration::from_micros(500),
            peak: ArenaStats::default(),
            after: ArenaStats::default(),
        };
        assert_eq!(
            report.to_string(),
            "allocs=1000 alloc_ms=1.500 free_ms=0.500 per_alloc_ns=1500.0 per_free_ns=500.0"
        );
    }
}
