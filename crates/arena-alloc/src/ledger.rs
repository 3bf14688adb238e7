// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Out-of-band record of live allocations.
//!
//! Free blocks double as free-list entries, so a live block carries no
//! header. The ledger keeps the order and requested size of every block
//! handed out, keyed by its arena offset, so `free` and `realloc` can
//! recover them without touching the block itself.

use std::collections::BTreeMap;

/// One live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LedgerEntry {
    /// Arena-relative offset of the block.
    pub offset: usize,
    /// Buddy order of the block (block size is `1 << order`).
    pub order: u32,
    /// Bytes the caller asked for.
    pub requested: usize,
}

impl LedgerEntry {
    /// Size of the backing block in bytes.
    pub fn block_size(&self) -> usize {
        1usize << self.order
    }
}

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    entries: BTreeMap<usize, LedgerEntry>,
}

impl Ledger {
    pub(crate) fn record(&mut self, offset: usize, order: u32, requested: usize) {
        self.entries.insert(
            offset,
            LedgerEntry {
                offset,
                order,
                requested,
            },
        );
    }

    pub(crate) fn get(&self, offset: usize) -> Option<LedgerEntry> {
        self.entries.get(&offset).copied()
    }

    pub(crate) fn set_requested(&mut self, offset: usize, requested: usize) {
        if let Some(entry) = self.entries.get_mut(&offset) {
            entry.requested = requested;
        }
    }

    pub(crate) fn remove(&mut self, offset: usize) -> Option<LedgerEntry> {
        self.entries.remove(&offset)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_remove() {
        let mut ledger = Ledger::default();
        ledger.record(64, 5, 20);
        assert_eq!(ledger.len(), 1);

        let entry = ledger.get(64).unwrap();
        assert_eq!(entry.block_size(), 32);
        assert_eq!(entry.requested, 20);

        ledger.set_requested(64, 8);
        assert_eq!(ledger.get(64).unwrap().requested, 8);

        assert!(ledger.remove(64).is_some());
        assert!(ledger.remove(64).is_none());
        assert!(ledger.get(64).is_none());
    }
}
