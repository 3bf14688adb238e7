// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Power-of-two buddy allocator over one owned byte buffer.
//!
//! Blocks are `(offset, order)` pairs in an arena-relative address space:
//! a block of order `k` is `1 << k` bytes long and starts at an offset that
//! is a multiple of `1 << k`. The buddy of a block is found by flipping bit
//! `k` of its offset, which is why every registered region must be aligned
//! to the minimum block size.
//!
//! ```text
//!  order 6 │ 0                               64                              │
//!  order 5 │ 0               32              │ 64              96            │
//!  order 4 │ 0       16      │ 32      48    │ ...
//! ```
//!
//! Allocation pops the lowest free offset of the smallest sufficient order
//! and splits it down, pushing each upper half onto its own order's list.
//! Freeing merges with the buddy while the buddy is free.

use crate::ledger::{Ledger, LedgerEntry};
use crate::{AllocationStats, ArenaError};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Snapshot of the free lists: order → sorted free offsets.
///
/// Orders with an empty list are omitted.
pub type FreeListShape = BTreeMap<u32, Vec<usize>>;

/// Order bounds of a buddy arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArenaConfig {
    /// Smallest block order; requests below `1 << min_order` are rounded up.
    pub min_order: u32,
    /// Largest block order; requests above `1 << max_order` fail.
    pub max_order: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_order: 4,
            max_order: 24,
        }
    }
}

impl ArenaConfig {
    /// Creates a configuration after checking the bounds.
    pub fn new(min_order: u32, max_order: u32) -> Result<Self, ArenaError> {
        let config = Self {
            min_order,
            max_order,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the bounds are ordered and addressable.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.min_order > self.max_order {
            return Err(ArenaError::InvalidConfig(format!(
                "min_order {} is greater than max_order {}",
                self.min_order, self.max_order
            )));
        }
        if self.max_order >= usize::BITS - 1 {
            return Err(ArenaError::InvalidConfig(format!(
                "max_order {} does not fit the address space",
                self.max_order
            )));
        }
        Ok(())
    }

    /// Size of the smallest block in bytes.
    pub fn min_block(&self) -> usize {
        1usize << self.min_order
    }

    /// Size of the largest block in bytes.
    pub fn max_block(&self) -> usize {
        1usize << self.max_order
    }

    /// Returns the smallest order whose block holds `size` bytes.
    ///
    /// Sizes at or below the minimum block (including zero) map to
    /// `min_order`. Sizes above the maximum block fail.
    pub fn order_for(&self, size: usize) -> Result<u32, ArenaError> {
        if size <= self.min_block() {
            return Ok(self.min_order);
        }
        let order = usize::BITS - (size - 1).leading_zeros();
        if order > self.max_order {
            return Err(ArenaError::OrderTooLarge {
                requested: size,
                max_order: self.max_order,
            });
        }
        Ok(order)
    }

    fn orders(&self) -> usize {
        (self.max_order - self.min_order + 1) as usize
    }
}

/// Buddy allocator over a single owned buffer.
///
/// `BuddyArena` is not synchronised; share it through
/// [`Arena`](crate::Arena).
pub struct BuddyArena {
    config: ArenaConfig,
    memory: Vec<u8>,
    /// Indexed by `order - min_order`.
    free_lists: Vec<BTreeSet<usize>>,
    ledger: Ledger,
    regions: Vec<Range<usize>>,
    stats: AllocationStats,
}

impl BuddyArena {
    /// Creates an arena owning `capacity` bytes with no free blocks.
    ///
    /// Memory becomes allocatable only once it is registered with
    /// [`register_region`](Self::register_region).
    pub fn new(capacity: usize, config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            config,
            memory: vec![0u8; capacity],
            free_lists: vec![BTreeSet::new(); config.orders()],
            ledger: Ledger::default(),
            regions: Vec::new(),
            stats: AllocationStats::default(),
        })
    }

    /// Creates an arena and registers its whole buffer.
    ///
    /// The capacity is rounded down to a multiple of the minimum block.
    pub fn with_capacity(capacity: usize, config: ArenaConfig) -> Result<Self, ArenaError> {
        let mut arena = Self::new(capacity, config)?;
        let usable = capacity - capacity % config.min_block();
        if usable > 0 {
            arena.register_region(0, usable)?;
        }
        Ok(arena)
    }

    /// Seeds the free lists with `size` bytes starting at `offset`.
    ///
    /// The region is cut into maximal aligned power-of-two slices, each
    /// pushed onto the list of its order.
    pub fn register_region(&mut self, offset: usize, size: usize) -> Result<(), ArenaError> {
        let min_block = self.config.min_block();
        if size == 0 || offset % min_block != 0 || size % min_block != 0 {
            return Err(ArenaError::MisalignedRegion {
                offset,
                size,
                min_block,
            });
        }
        let end = match offset.checked_add(size) {
            Some(end) if end <= self.memory.len() => end,
            _ => {
                return Err(ArenaError::RegionOutOfBounds {
                    offset,
                    size,
                    capacity: self.memory.len(),
                })
            }
        };
        if self
            .regions
            .iter()
            .any(|r| offset < r.end && r.start < end)
        {
            return Err(ArenaError::RegionOverlap { offset, size });
        }

        let mut cursor = offset;
        let mut slices = 0usize;
        while cursor < end {
            let align_order = if cursor == 0 {
                self.config.max_order
            } else {
                cursor.trailing_zeros().min(self.config.max_order)
            };
            let fit_order = usize::BITS - 1 - (end - cursor).leading_zeros();
            let order = align_order.min(fit_order);
            self.insert_block(cursor, order);
            cursor += 1usize << order;
            slices += 1;
        }
        self.regions.push(offset..end);

        tracing::debug!(offset, size, slices, "registered arena region");
        Ok(())
    }

    /// Allocates a block holding at least `size` bytes.
    ///
    /// Returns the arena offset of the block.
    pub fn alloc(&mut self, size: usize) -> Result<usize, ArenaError> {
        let order = match self.config.order_for(size) {
            Ok(order) => order,
            Err(e) => {
                self.stats.record_failure();
                return Err(e);
            }
        };

        let Some(mut current) = (order..=self.config.max_order)
            .find(|&k| !self.free_lists[self.slot(k)].is_empty())
        else {
            self.stats.record_failure();
            return Err(ArenaError::OutOfMemory {
                requested: size,
                order,
            });
        };

        let slot = self.slot(current);
        let Some(offset) = self.free_lists[slot].pop_first() else {
            self.stats.record_failure();
            return Err(ArenaError::OutOfMemory {
                requested: size,
                order,
            });
        };

        while current > order {
            current -= 1;
            let upper = offset + (1usize << current);
            let slot = self.slot(current);
            self.free_lists[slot].insert(upper);
            self.stats.splits += 1;
        }

        self.ledger.record(offset, order, size);
        self.stats.record_allocation(1usize << order);
        Ok(offset)
    }

    /// Returns the block at `offset` to the free lists.
    pub fn free(&mut self, offset: usize) -> Result<(), ArenaError> {
        let entry = self
            .ledger
            .remove(offset)
            .ok_or(ArenaError::UnknownAllocation { offset })?;
        self.stats.merges += self.insert_block(offset, entry.order);
        self.stats.record_free(entry.block_size());
        Ok(())
    }

    /// Resizes the allocation at `offset`, returning its (possibly new) offset.
    ///
    /// A request that still fits the current order stays in place. A larger
    /// one allocates a new block, copies the old contents and frees the old
    /// block. On failure the original allocation is untouched.
    pub fn realloc(&mut self, offset: usize, new_size: usize) -> Result<usize, ArenaError> {
        let entry = self
            .ledger
            .get(offset)
            .ok_or(ArenaError::UnknownAllocation { offset })?;
        let new_order = match self.config.order_for(new_size) {
            Ok(order) => order,
            Err(e) => {
                self.stats.record_failure();
                return Err(e);
            }
        };

        if new_order <= entry.order {
            self.ledger.set_requested(offset, new_size);
            self.stats.reallocations += 1;
            return Ok(offset);
        }

        // `alloc` records its own failure.
        let target = self.alloc(new_size)?;
        let copied = entry.requested.min(new_size);
        self.memory.copy_within(offset..offset + copied, target);
        self.free(offset)?;
        self.stats.reallocations += 1;
        Ok(target)
    }

    /// Returns the ledger entry of the live allocation at `offset`.
    pub fn allocation(&self, offset: usize) -> Option<LedgerEntry> {
        self.ledger.get(offset)
    }

    /// Iterates over all live allocations in offset order.
    pub fn allocations(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.ledger.iter()
    }

    /// Number of live allocations.
    pub fn live_allocations(&self) -> usize {
        self.ledger.len()
    }

    /// The requested bytes of the allocation at `offset`.
    pub fn data(&self, offset: usize) -> Result<&[u8], ArenaError> {
        let entry = self
            .ledger
            .get(offset)
            .ok_or(ArenaError::UnknownAllocation { offset })?;
        Ok(&self.memory[offset..offset + entry.requested])
    }

    /// Mutable view of the requested bytes of the allocation at `offset`.
    pub fn data_mut(&mut self, offset: usize) -> Result<&mut [u8], ArenaError> {
        let entry = self
            .ledger
            .get(offset)
            .ok_or(ArenaError::UnknownAllocation { offset })?;
        Ok(&mut self.memory[offset..offset + entry.requested])
    }

    /// Mutable views of several allocations at once, in the order given.
    ///
    /// Live allocations never overlap, so the views are disjoint unless the
    /// same offset is passed twice, which is an error.
    pub fn data_many_mut(&mut self, offsets: &[usize]) -> Result<Vec<&mut [u8]>, ArenaError> {
        let mut spans = Vec::with_capacity(offsets.len());
        for (index, &offset) in offsets.iter().enumerate() {
            let entry = self
                .ledger
                .get(offset)
                .ok_or(ArenaError::UnknownAllocation { offset })?;
            spans.push((index, offset, entry.requested));
        }
        spans.sort_by_key(|&(_, offset, _)| offset);

        let mut views: Vec<Option<&mut [u8]>> = (0..offsets.len()).map(|_| None).collect();
        let mut rest: &mut [u8] = &mut self.memory;
        let mut base = 0usize;
        for (index, offset, len) in spans {
            if offset < base {
                return Err(ArenaError::OverlappingAccess { offset });
            }
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(offset - base);
            let (view, tail) = tail.split_at_mut(len);
            views[index] = Some(view);
            rest = tail;
            base = offset + len;
        }
        Ok(views.into_iter().flatten().collect())
    }

    /// Snapshot of the free lists.
    pub fn free_lists(&self) -> FreeListShape {
        self.free_lists
            .iter()
            .enumerate()
            .filter(|(_, list)| !list.is_empty())
            .map(|(i, list)| (self.config.min_order + i as u32, list.iter().copied().collect()))
            .collect()
    }

    /// Total bytes sitting in the free lists.
    pub fn free_bytes(&self) -> usize {
        self.free_lists
            .iter()
            .enumerate()
            .map(|(i, list)| list.len() << (self.config.min_order as usize + i))
            .sum()
    }

    /// Logs every non-empty free list at debug level.
    pub fn dump(&self) {
        for (order, offsets) in self.free_lists() {
            tracing::debug!(
                order,
                block_size = 1usize << order,
                count = offsets.len(),
                ?offsets,
                "free list"
            );
        }
        tracing::debug!(
            live = self.ledger.len(),
            free_bytes = self.free_bytes(),
            "arena summary"
        );
    }

    /// Total buffer size in bytes, registered or not.
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// The order bounds.
    pub fn config(&self) -> ArenaConfig {
        self.config
    }

    /// Cumulative statistics.
    pub fn stats(&self) -> &AllocationStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut AllocationStats {
        &mut self.stats
    }

    fn slot(&self, order: u32) -> usize {
        (order - self.config.min_order) as usize
    }

    /// Pushes a free block, merging with free buddies. Returns the merge count.
    fn insert_block(&mut self, mut offset: usize, mut order: u32) -> u64 {
        let mut merges = 0;
        while order < self.config.max_order {
            let buddy = offset ^ (1usize << order);
            let slot = self.slot(order);
            if !self.free_lists[slot].remove(&buddy) {
                break;
            }
            offset &= buddy;
            order += 1;
            merges += 1;
        }
        let slot = self.slot(order);
        self.free_lists[slot].insert(offset);
        merges
    }
}

impl std::fmt::Debug for BuddyArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuddyArena")
            .field("capacity", &self.memory.len())
            .field("config", &self.config)
            .field("live_allocations", &self.ledger.len())
            .field("free_bytes", &self.free_bytes())
            .finish()
    }
}
