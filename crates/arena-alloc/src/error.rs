// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the buddy arena.

/// Errors that can occur while configuring, seeding or using an arena.
///
/// Allocation failures are ordinary outcomes: callers are expected to
/// handle [`ArenaError::OutOfMemory`] and [`ArenaError::OrderTooLarge`]
/// without treating them as fatal.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// No free block of a sufficient order is left.
    #[error("out of memory: no free block of order {order} or above for {requested} bytes")]
    OutOfMemory { requested: usize, order: u32 },

    /// The request needs an order above the configured maximum.
    #[error("request of {requested} bytes exceeds the largest block (order {max_order})")]
    OrderTooLarge { requested: usize, max_order: u32 },

    /// The order bounds are unusable.
    #[error("invalid arena configuration: {0}")]
    InvalidConfig(String),

    /// A region's offset or size is not a multiple of the minimum block.
    #[error("region {offset:#x}+{size:#x} is not aligned to the {min_block}-byte minimum block")]
    MisalignedRegion {
        offset: usize,
        size: usize,
        min_block: usize,
    },

    /// A region extends past the end of the arena buffer.
    #[error("region {offset:#x}+{size:#x} lies outside the {capacity}-byte arena")]
    RegionOutOfBounds {
        offset: usize,
        size: usize,
        capacity: usize,
    },

    /// A region overlaps memory that was registered earlier.
    #[error("region {offset:#x}+{size:#x} overlaps an already registered region")]
    RegionOverlap { offset: usize, size: usize },

    /// The offset was not handed out by this arena, or was already freed.
    #[error("no live allocation at offset {offset:#x}")]
    UnknownAllocation { offset: usize },

    /// Two requested views would cover the same bytes.
    #[error("overlapping access to allocation at offset {offset:#x}")]
    OverlappingAccess { offset: usize },

    /// A budget string could not be parsed.
    #[error("invalid memory budget '{0}': expected a number with an optional K, M or G suffix")]
    InvalidBudget(String),

    /// The budget parsed to zero bytes.
    #[error("memory budget must be non-zero")]
    ZeroBudget,

    /// The arena lock was poisoned by a panicking holder.
    #[error("arena lock poisoned")]
    Poisoned,
}
