//! # Helix Arena Allocators
//!
//! Two general-purpose allocators that manage a single caller-supplied
//! byte region and store all of their bookkeeping inside it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ArenaAllocator (trait)                      │
//! │            create · alloc · free · destroy · stats              │
//! │                                                                 │
//! │  ┌─────────────────────────┐     ┌───────────────────────────┐  │
//! │  │   FreeListAllocator     │     │     BuddyAllocator        │  │
//! │  │  first fit, split,      │     │  2^k size classes,        │  │
//! │  │  address-ordered merge  │     │  XOR buddy coalescing     │  │
//! │  └────────────┬────────────┘     └─────────────┬─────────────┘  │
//! │               │                                │                │
//! │  ┌────────────┴────────────────────────────────┴─────────────┐  │
//! │  │                Arena (bounds-checked bytes)               │  │
//! │  │        descriptor │ blocks ...................... │       │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pointers
//!
//! Allocations are returned as [`ArenaPtr`], a non-zero byte offset from
//! the start of the arena. Offset 0 always holds the descriptor, so
//! `Option<ArenaPtr>` doubles as the nullable pointer accepted by `free`.
//! Payload alignment is computed on offsets, making the layout of a given
//! sequence of calls independent of where the arena lives in memory.
//!
//! ## Threading
//!
//! Neither allocator synchronizes. Use one per thread, or share one
//! through [`LockedArena`].

#![no_std]
#![cfg_attr(test, allow(clippy::unwrap_used))]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod allocator;
pub mod arena;
pub mod buddy;
pub mod error;
pub mod free_list;
pub mod locked;
pub mod stats;

// Re-exports
pub use allocator::{AllocatorKind, ArenaAllocator, UnknownAllocatorKind};
pub use arena::{Arena, ArenaPtr};
pub use buddy::BuddyAllocator;
pub use error::{AllocError, Result};
pub use free_list::{BlockFlags, BlockInfo, FreeListAllocator};
pub use locked::LockedArena;
pub use stats::ArenaStats;
