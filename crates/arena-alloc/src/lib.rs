// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # arena-alloc
//!
//! A power-of-two buddy allocator over one fixed region, for devices
//! where the inference runtime must not lean on a general-purpose heap.
//!
//! # Key Components
//!
//! - [`BuddyArena`] — the allocator core: per-order free lists, split on
//!   allocation, XOR-buddy coalescing on free, in-place shrinking realloc.
//! - [`LedgerEntry`] — the out-of-band `(offset, order, requested)` record
//!   kept for every live block, since free blocks carry no header.
//! - [`Arena`] — a cloneable, lockable handle with an enable flag that
//!   delegates to the system heap while the arena is switched off.
//! - [`ArenaBuffer`] — an RAII buffer that frees its block on drop.
//! - [`MemoryBudget`] — arena capacity with `"32M"`-style parsing.
//! - [`AllocationStats`] — split/merge counters and live/peak bytes.
//!
//! # Ownership Model
//!
//! ```text
//! Arena::alloc(size)
//!       │
//!       ▼
//!   ArenaBuffer  ◄─── offset + Arc<ArenaInner>
//!       │
//!       │  drop()
//!       ▼
//!   BuddyArena::free(offset)  ──► ledger lookup ──► merge with buddies
//! ```
//!
//! # Example
//! ```
//! use arena_alloc::{ArenaConfig, BuddyArena};
//!
//! let mut heap = BuddyArena::with_capacity(1024, ArenaConfig::default()).unwrap();
//! let initial = heap.free_lists();
//!
//! let a = heap.alloc(40).unwrap();
//! let b = heap.alloc(3).unwrap();
//! assert_eq!(heap.allocation(a).unwrap().block_size(), 64);
//! assert_eq!(heap.allocation(b).unwrap().block_size(), 16);
//!
//! heap.free(a).unwrap();
//! heap.free(b).unwrap();
//! assert_eq!(heap.free_lists(), initial);
//! ```

mod arena;
mod budget;
mod buddy;
mod buffer;
mod error;
mod ledger;
mod stats;

pub use arena::Arena;
pub use budget::MemoryBudget;
pub use buddy::{ArenaConfig, BuddyArena, FreeListShape};
pub use buffer::ArenaBuffer;
pub use error::ArenaError;
pub use ledger::LedgerEntry;
pub use stats::AllocationStats;
