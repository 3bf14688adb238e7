// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII buffers handed out by [`Arena`](crate::Arena).
//!
//! An [`ArenaBuffer`] either names a block inside the arena or owns a
//! system-heap `Vec<u8>` (when the arena was disabled at allocation time).
//! Dropping an arena-backed buffer frees its block. Arena bytes live behind
//! the arena lock, so access goes through closures instead of borrowed
//! slices.

use crate::arena::ArenaInner;
use crate::ArenaError;
use std::sync::Arc;

enum Backing {
    Arena { offset: usize, arena: Arc<ArenaInner> },
    System(Vec<u8>),
}

/// A buffer allocated from an [`Arena`](crate::Arena).
pub struct ArenaBuffer {
    backing: Backing,
    len: usize,
}

impl ArenaBuffer {
    pub(crate) fn arena(offset: usize, len: usize, arena: Arc<ArenaInner>) -> Self {
        Self {
            backing: Backing::Arena { offset, arena },
            len,
        }
    }

    pub(crate) fn system(data: Vec<u8>) -> Self {
        Self {
            len: data.len(),
            backing: Backing::System(data),
        }
    }

    /// Requested size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arena offset, or `None` for a system-heap buffer.
    pub fn offset(&self) -> Option<usize> {
        match &self.backing {
            Backing::Arena { offset, .. } => Some(*offset),
            Backing::System(_) => None,
        }
    }

    /// Mutable bytes of a system-heap buffer, or `None` if arena-backed.
    pub fn system_bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.backing {
            Backing::System(data) => Some(data.as_mut_slice()),
            Backing::Arena { .. } => None,
        }
    }

    /// Runs `f` over the buffer contents.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, ArenaError> {
        match &self.backing {
            Backing::Arena { offset, arena } => {
                let heap = arena.lock()?;
                Ok(f(heap.data(*offset)?))
            }
            Backing::System(data) => Ok(f(data)),
        }
    }

    /// Runs `f` over the mutable buffer contents.
    pub fn write<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, ArenaError> {
        match &mut self.backing {
            Backing::Arena { offset, arena } => {
                let mut heap = arena.lock()?;
                Ok(f(heap.data_mut(*offset)?))
            }
            Backing::System(data) => Ok(f(data)),
        }
    }

    /// Copies the contents out.
    pub fn to_vec(&self) -> Result<Vec<u8>, ArenaError> {
        self.read(|bytes| bytes.to_vec())
    }

    /// Resizes the buffer, keeping the first `min(len, new_len)` bytes.
    ///
    /// Arena-backed buffers shrink in place while the new size fits the
    /// current block; otherwise they move. Bytes past the old length are
    /// zeroed. On failure the buffer is unchanged.
    pub fn realloc(&mut self, new_len: usize) -> Result<(), ArenaError> {
        let old_len = self.len;
        match &mut self.backing {
            Backing::Arena { offset, arena } => {
                let mut heap = arena.lock()?;
                *offset = heap.realloc(*offset, new_len)?;
                if new_len > old_len {
                    heap.data_mut(*offset)?[old_len..].fill(0);
                }
            }
            Backing::System(data) => data.resize(new_len, 0),
        }
        self.len = new_len;
        Ok(())
    }
}

impl Drop for ArenaBuffer {
    fn drop(&mut self) {
        if let Backing::Arena { offset, arena } = &self.backing {
            let result = arena.lock().and_then(|mut heap| heap.free(*offset));
            if let Err(e) = result {
                tracing::warn!(offset = *offset, error = %e, "failed to return arena buffer");
            }
        }
    }
}

impl std::fmt::Debug for ArenaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaBuffer")
            .field("len", &self.len)
            .field("offset", &self.offset())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Arena, ArenaConfig, MemoryBudget};

    fn arena() -> Arena {
        Arena::new(MemoryBudget::from_kb(1), ArenaConfig::new(4, 10).unwrap()).unwrap()
    }

    #[test]
    fn test_read_write() {
        let arena = arena();
        let mut buf = arena.alloc(8).unwrap();
        buf.write(|b| b.copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
        assert_eq!(buf.read(|b| b[7]).unwrap(), 8);
    }

    #[test]
    fn test_realloc_in_place() {
        let arena = arena();
        let mut buf = arena.alloc(30).unwrap();
        let before = buf.offset();
        buf.realloc(20).unwrap();
        assert_eq!(buf.offset(), before);
        assert_eq!(buf.len(), 20);
    }

    #[test]
    fn test_realloc_moves_and_keeps_prefix() {
        let arena = arena();
        let mut buf = arena.alloc(16).unwrap();
        let _neighbour = arena.alloc(16).unwrap();
        buf.write(|b| b.fill(9)).unwrap();

        buf.realloc(64).unwrap();
        assert_ne!(buf.offset(), Some(0));
        let bytes = buf.to_vec().unwrap();
        assert_eq!(bytes.len(), 64);
        assert!(bytes[..16].iter().all(|&x| x == 9));
        assert!(bytes[16..].iter().all(|&x| x == 0));
        assert_eq!(arena.stats().unwrap().frees, 1);
    }

    #[test]
    fn test_realloc_failure_keeps_buffer() {
        let arena = arena();
        let mut buf = arena.alloc(16).unwrap();
        assert!(buf.realloc(4096).is_err());
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.offset(), Some(0));
    }

    #[test]
    fn test_system_buffer() {
        let arena = arena();
        arena.set_enabled(false);
        let mut buf = arena.alloc(4).unwrap();
        buf.system_bytes_mut().unwrap()[0] = 5;
        buf.realloc(8).unwrap();
        assert_eq!(buf.to_vec().unwrap(), vec![5, 0, 0, 0, 0, 0, 0, 0]);
    }
}
