// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared, lockable handle to a buddy arena.
//!
//! [`Arena`] is the process-facing allocator. It wraps a [`BuddyArena`] in
//! `Arc<Mutex<..>>` and carries the enable flag: while disabled, requests
//! are served from the system heap so code that runs before the arena is
//! seeded, or after it is torn down, keeps working.

use crate::buffer::ArenaBuffer;
use crate::{AllocationStats, ArenaConfig, ArenaError, BuddyArena, FreeListShape, MemoryBudget};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) struct ArenaInner {
    heap: Mutex<BuddyArena>,
    enabled: AtomicBool,
}

impl ArenaInner {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, BuddyArena>, ArenaError> {
        self.heap.lock().map_err(|_| ArenaError::Poisoned)
    }
}

/// Cloneable handle to a shared buddy arena.
///
/// # Example
/// ```
/// use arena_alloc::{Arena, ArenaConfig, MemoryBudget};
///
/// let arena = Arena::new(MemoryBudget::from_kb(4), ArenaConfig::default()).unwrap();
/// let buf = arena.alloc(100).unwrap();
/// assert_eq!(buf.len(), 100);
/// assert_eq!(arena.stats().unwrap().live_bytes, 128);
///
/// drop(buf);
/// assert_eq!(arena.stats().unwrap().live_bytes, 0);
/// ```
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

impl Arena {
    /// Creates an arena whose whole buffer is registered and enabled.
    pub fn new(budget: MemoryBudget, config: ArenaConfig) -> Result<Self, ArenaError> {
        let heap = BuddyArena::with_capacity(budget.as_bytes(), config)?;
        tracing::info!(
            capacity = %budget,
            min_order = config.min_order,
            max_order = config.max_order,
            "arena initialised"
        );
        Ok(Self::from_heap(heap))
    }

    /// Wraps an existing buddy arena, for callers that register regions
    /// themselves.
    pub fn from_heap(heap: BuddyArena) -> Self {
        Self {
            inner: Arc::new(ArenaInner {
                heap: Mutex::new(heap),
                enabled: AtomicBool::new(true),
            }),
        }
    }

    /// Creates a handle that starts out delegating to the system heap.
    pub fn system() -> Result<Self, ArenaError> {
        let arena = Self::from_heap(BuddyArena::new(0, ArenaConfig::default())?);
        arena.set_enabled(false);
        Ok(arena)
    }

    /// Switches between arena allocation and system-heap delegation.
    ///
    /// Buffers already handed out keep their original backing and are
    /// released to it on drop.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
        tracing::debug!(enabled, "arena allocation toggled");
    }

    /// Whether new requests are served by the arena.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Allocates a zero-filled buffer of `size` bytes.
    pub fn alloc(&self, size: usize) -> Result<ArenaBuffer, ArenaError> {
        let mut heap = self.inner.lock()?;
        if !self.is_enabled() {
            heap.stats_mut().record_system_fallback();
            return Ok(ArenaBuffer::system(vec![0u8; size]));
        }

        let offset = heap.alloc(size).map_err(|e| {
            tracing::warn!(size, error = %e, "arena allocation failed");
            e
        })?;
        heap.data_mut(offset)?.fill(0);
        Ok(ArenaBuffer::arena(offset, size, Arc::clone(&self.inner)))
    }

    /// Locks the arena for direct access.
    ///
    /// Used to borrow several arena-backed buffers at once through
    /// [`BuddyArena::data_many_mut`]. Do not drop an [`ArenaBuffer`] of
    /// this arena while holding the guard.
    pub fn lock(&self) -> Result<MutexGuard<'_, BuddyArena>, ArenaError> {
        self.inner.lock()
    }

    /// Registers an additional region of the owned buffer.
    pub fn register_region(&self, offset: usize, size: usize) -> Result<(), ArenaError> {
        self.inner.lock()?.register_region(offset, size)
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> Result<AllocationStats, ArenaError> {
        Ok(self.inner.lock()?.stats().clone())
    }

    /// Snapshot of the free lists.
    pub fn free_lists(&self) -> Result<FreeListShape, ArenaError> {
        Ok(self.inner.lock()?.free_lists())
    }

    /// Logs the free lists at debug level.
    pub fn dump(&self) -> Result<(), ArenaError> {
        self.inner.lock()?.dump();
        Ok(())
    }

    /// The order bounds of the underlying arena.
    pub fn config(&self) -> Result<ArenaConfig, ArenaError> {
        Ok(self.inner.lock()?.config())
    }

    /// Whether two handles share the same arena.
    pub fn same_arena(&self, other: &Arena) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Arena");
        s.field("enabled", &self.is_enabled());
        if let Ok(heap) = self.inner.heap.try_lock() {
            s.field("capacity", &heap.capacity())
                .field("live_allocations", &heap.live_allocations());
        }
        s.finish()
    }
}
