// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt arena` command: run allocator operations and show the result.
//!
//! Operations are comma-separated: `a:SIZE` allocates (sizes take the
//! usual `K`/`M` suffixes), `f:N` frees the N-th allocation and
//! `r:N:SIZE` reallocates it.

use anyhow::{bail, Context};
use arena_alloc::{Arena, ArenaBuffer, MemoryBudget};
use runtime::RuntimeConfig;

/// One parsed allocator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Alloc(usize),
    Free(usize),
    Realloc(usize, usize),
}

fn parse_ops(ops: &str) -> anyhow::Result<Vec<Op>> {
    let size = |s: &str| -> anyhow::Result<usize> {
        Ok(MemoryBudget::parse(s)
            .with_context(|| format!("invalid size '{s}'"))?
            .as_bytes())
    };
    let index = |s: &str| -> anyhow::Result<usize> {
        s.parse().with_context(|| format!("invalid allocation index '{s}'"))
    };

    ops.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|op| {
            let parts: Vec<&str> = op.split(':').collect();
            match parts.as_slice() {
                ["a", s] => Ok(Op::Alloc(size(s)?)),
                ["f", n] => Ok(Op::Free(index(n)?)),
                ["r", n, s] => Ok(Op::Realloc(index(n)?, size(s)?)),
                _ => bail!("unknown operation '{op}'"),
            }
        })
        .collect()
}

pub async fn execute(config: RuntimeConfig, size: String, ops: String) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                nnrt · Arena Explorer                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let budget = MemoryBudget::parse(&size).with_context(|| format!("invalid arena size '{size}'"))?;
    let arena = Arena::new(budget, config.arena_config()?)?;
    let ops = parse_ops(&ops)?;
    println!("  Arena: {budget}, blocks {}..{} bytes", arena.config()?.min_block(), arena.config()?.max_block());
    println!();

    let mut live: Vec<Option<ArenaBuffer>> = Vec::new();
    for op in ops {
        match op {
            Op::Alloc(bytes) => match arena.alloc(bytes) {
                Ok(buffer) => {
                    println!("  alloc   #{:<3} {bytes:>9} bytes -> {}", live.len(), describe(&arena, &buffer)?);
                    live.push(Some(buffer));
                }
                Err(e) => println!("  alloc        {bytes:>9} bytes -> failed: {e}"),
            },
            Op::Free(n) => match live.get_mut(n).and_then(Option::take) {
                Some(buffer) => {
                    println!("  free    #{n:<3} {:>9} bytes", buffer.len());
                    drop(buffer);
                }
                None => println!("  free    #{n:<3} not live"),
            },
            Op::Realloc(n, bytes) => match live.get_mut(n).and_then(Option::as_mut) {
                Some(buffer) => match buffer.realloc(bytes) {
                    Ok(()) => println!("  realloc #{n:<3} {bytes:>9} bytes -> {}", describe(&arena, buffer)?),
                    Err(e) => println!("  realloc #{n:<3} {bytes:>9} bytes -> failed: {e}"),
                },
                None => println!("  realloc #{n:<3} not live"),
            },
        }
    }
    println!();

    println!("  Free lists (order: offsets):");
    for (order, offsets) in arena.free_lists()?.iter() {
        println!("   {order:>2}: {offsets:?}");
    }
    println!();
    println!("  {}", arena.stats()?.summary());
    arena.dump()?;
    println!();
    Ok(())
}

/// Offset and block size of a buffer.
fn describe(arena: &Arena, buffer: &ArenaBuffer) -> anyhow::Result<String> {
    let Some(offset) = buffer.offset() else {
        return Ok("system heap".into());
    };
    let block = arena
        .lock()?
        .allocation(offset)
        .map(|entry| entry.block_size())
        .unwrap_or_default();
    Ok(format!("offset {offset:#x}, block {block}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ops() {
        let ops = parse_ops("a:100, a:4K,f:0,r:1:2K").unwrap();
        assert_eq!(
            ops,
            vec![Op::Alloc(100), Op::Alloc(4096), Op::Free(0), Op::Realloc(1, 2048)]
        );
    }

    #[test]
    fn test_parse_ops_rejects_unknown() {
        assert!(parse_ops("x:1").is_err());
        assert!(parse_ops("f:one").is_err());
    }
}
