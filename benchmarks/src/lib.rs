//! # Helix Arena Benchmarks
//!
//! Driver for timing the arena allocators: build a [`BenchConfig`], hand
//! it to [`run`] and print the returned [`Report`].
//!
//! ```text
//! arena-bench --allocator buddy --arena-size 1048576 -n 100000
//! allocs=100000 alloc_ms=… free_ms=… per_alloc_ns=… per_free_ns=…
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod logger;
pub mod workload;

// Re-exports
pub use config::{BenchConfig, Strategy};
pub use error::{BenchError, Result};
pub use workload::{run, Report};
