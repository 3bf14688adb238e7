// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The memory planner: in-place reuse and block assignment.
//!
//! One forward pass over the bound nodes decides where every output lives:
//!
//! ```text
//!   for each node, for each output:
//!     external buffer?                      ─▶ leave it alone
//!     in-place pair and the input's last use ─▶ Aliased(input slot)
//!     otherwise                              ─▶ Owned(pool.request(size))
//!   then, for each input:
//!     remaining -= 1; at zero                ─▶ pool.release(block)
//! ```
//!
//! The pool hands out the first block whose every allocation has been
//! released, so the number of blocks tracks how many tensors are alive at
//! once rather than how many tensors the graph has. Graph outputs are
//! never released.

use crate::RuntimeError;
use model_ir::{Graph, NodeId, TensorId, TensorKind, Validated};
use op_registry::InplacePair;

// ── Blocks ─────────────────────────────────────────────────────────

/// Where a planned output lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum BlockAssignment {
    /// A block of the pool.
    Owned(usize),
    /// The storage of the node's input in this slot.
    Aliased(usize),
}

/// A reusable unit of tensor storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MemoryBlock {
    /// Largest request the block has served.
    pub max_size: usize,
    pub alloc_count: usize,
    pub free_count: usize,
}

impl MemoryBlock {
    /// No tensor currently holds the block.
    pub fn is_free(&self) -> bool {
        self.alloc_count == self.free_count
    }
}

/// Blocks keyed by peak concurrent demand.
#[derive(Debug, Clone, Default)]
pub struct BlockPool {
    blocks: Vec<MemoryBlock>,
}

impl BlockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the first free block, growing it if needed, or creates one.
    pub fn request(&mut self, size: usize) -> usize {
        if let Some(id) = self.blocks.iter().position(MemoryBlock::is_free) {
            let block = &mut self.blocks[id];
            block.max_size = block.max_size.max(size);
            block.alloc_count += 1;
            return id;
        }
        self.blocks.push(MemoryBlock {
            max_size: size,
            alloc_count: 1,
            free_count: 0,
        });
        self.blocks.len() - 1
    }

    /// Returns one allocation of `id` to the pool.
    pub fn release(&mut self, id: usize) {
        if let Some(block) = self.blocks.get_mut(id) {
            if !block.is_free() {
                block.free_count += 1;
            }
        }
    }

    /// Widens a block for a tensor that took it over in place.
    pub fn grow(&mut self, id: usize, size: usize) {
        if let Some(block) = self.blocks.get_mut(id) {
            block.max_size = block.max_size.max(size);
        }
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ── Plan ───────────────────────────────────────────────────────────

/// What the planner needs to know about one bound node.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub node: NodeId,
    pub inplace: &'a [InplacePair],
    pub scratch: usize,
}

/// Storage decision for one output tensor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutputPlan {
    pub tensor: TensorId,
    pub size: usize,
    /// `None` when the tensor has its own external buffer.
    pub assignment: Option<BlockAssignment>,
}

/// Storage decisions for one bound node.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodePlan {
    pub node: NodeId,
    pub outputs: Vec<OutputPlan>,
    pub scratch: usize,
}

/// The result of planning a graph.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryPlan {
    blocks: Vec<MemoryBlock>,
    nodes: Vec<NodePlan>,
    scratch_size: usize,
    align: usize,
}

impl MemoryPlan {
    /// A plan with nothing in it.
    pub(crate) fn empty(align: usize) -> Self {
        Self {
            blocks: Vec::new(),
            nodes: Vec::new(),
            scratch_size: 0,
            align,
        }
    }

    /// Plans storage for `requests`, given in execution order.
    pub fn build(
        graph: &Graph<Validated>,
        requests: &[PlanRequest<'_>],
        align: usize,
    ) -> Result<Self, RuntimeError> {
        let tensors = graph.tensors();
        let mut remaining: Vec<usize> = tensors.iter().map(|t| t.consumer_count()).collect();
        let mut owner: Vec<Option<usize>> = vec![None; tensors.len()];
        // Capacity of the caller's input buffer a tensor shares, if any.
        let mut shared_input: Vec<Option<usize>> = tensors
            .iter()
            .map(|t| (t.kind() == TensorKind::Input).then(|| t.byte_size()))
            .collect();
        let mut pinned = vec![false; tensors.len()];
        for id in graph.output_tensors() {
            pinned[id.index()] = true;
        }

        let mut pool = BlockPool::new();
        let mut nodes = Vec::with_capacity(requests.len());
        let mut scratch_size = 0;

        for request in requests {
            let node = graph.node(request.node)?;
            let mut outputs = Vec::with_capacity(node.outputs().len());

            for (slot, &out) in node.outputs().iter().enumerate() {
                let tensor = graph.tensor(out)?;
                let size = tensor.byte_size();
                if graph.data(out)?.is_external() {
                    outputs.push(OutputPlan {
                        tensor: out,
                        size,
                        assignment: None,
                    });
                    continue;
                }

                let pair = request
                    .inplace
                    .iter()
                    .find(|p| p.output == slot)
                    .and_then(|p| node.input(p.input).map(|src| (p.input, src)));
                let reuse = match pair {
                    Some((input_slot, src)) if !pinned[src.index()] && remaining[src.index()] == 1 => {
                        if let Some(block) = owner[src.index()].take() {
                            pool.grow(block, size);
                            owner[out.index()] = Some(block);
                            Some(input_slot)
                        } else if let Some(capacity) =
                            shared_input[src.index()].filter(|&capacity| size <= capacity)
                        {
                            shared_input[src.index()] = None;
                            shared_input[out.index()] = Some(capacity);
                            Some(input_slot)
                        } else {
                            None
                        }
                    }
                    _ => None,
                };

                let assignment = match reuse {
                    Some(input_slot) => {
                        tracing::debug!(node = %node.name(), tensor = %tensor.name(), input_slot, "output reuses input in place");
                        BlockAssignment::Aliased(input_slot)
                    }
                    None => {
                        let block = pool.request(size);
                        owner[out.index()] = Some(block);
                        tracing::debug!(node = %node.name(), tensor = %tensor.name(), block, size, "output assigned block");
                        BlockAssignment::Owned(block)
                    }
                };
                outputs.push(OutputPlan {
                    tensor: out,
                    size,
                    assignment: Some(assignment),
                });
            }

            for &input in node.inputs() {
                let count = &mut remaining[input.index()];
                *count = count.saturating_sub(1);
                if *count == 0 && !pinned[input.index()] {
                    if let Some(block) = owner[input.index()].take() {
                        pool.release(block);
                    }
                }
            }

            scratch_size = scratch_size.max(request.scratch);
            nodes.push(NodePlan {
                node: request.node,
                outputs,
                scratch: request.scratch,
            });
        }

        let plan = Self {
            blocks: pool.blocks,
            nodes,
            scratch_size,
            align,
        };
        tracing::info!(
            graph = %graph.name(),
            blocks = plan.num_blocks(),
            planned_bytes = plan.total_bytes(),
            scratch = plan.scratch_size,
            "memory planned"
        );
        Ok(plan)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    /// Largest request block `id` served.
    pub fn block_size(&self, id: usize) -> Option<usize> {
        self.blocks.get(id).map(|b| b.max_size)
    }

    /// Bytes requested from the arena for block `id`, padding included.
    pub fn backing_size(&self, id: usize) -> Option<usize> {
        self.block_size(id).map(|size| size + self.align)
    }

    /// Per bound node, in execution order.
    pub fn nodes(&self) -> &[NodePlan] {
        &self.nodes
    }

    /// The decision for one tensor, if a bound node produces it.
    pub fn assignment(&self, tensor: TensorId) -> Option<BlockAssignment> {
        self.nodes
            .iter()
            .flat_map(|n| &n.outputs)
            .find(|o| o.tensor == tensor)
            .and_then(|o| o.assignment)
    }

    /// Size of the shared scratch buffer.
    pub fn scratch_size(&self) -> usize {
        self.scratch_size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    /// Bytes of block storage plus scratch, without padding.
    pub fn total_bytes(&self) -> usize {
        self.blocks.iter().map(|b| b.max_size).sum::<usize>() + self.scratch_size
    }

    /// Logs the plan at debug level.
    pub fn dump(&self) {
        for (id, block) in self.blocks.iter().enumerate() {
            tracing::debug!(block = id, max_size = block.max_size, uses = block.alloc_count, "block");
        }
        for node in &self.nodes {
            for output in &node.outputs {
                tracing::debug!(node = %node.node, tensor = %output.tensor, size = output.size, assignment = ?output.assignment, "output");
            }
        }
        tracing::debug!(scratch = self.scratch_size, align = self.align, "scratch");
    }

    /// Returns a summary string describing the plan.
    pub fn summary(&self) -> String {
        let aliased = self
            .nodes
            .iter()
            .flat_map(|n| &n.outputs)
            .filter(|o| matches!(o.assignment, Some(BlockAssignment::Aliased(_))))
            .count();
        format!(
            "MemoryPlan: {} blocks, {} bytes planned, {} in-place outputs, {} bytes scratch",
            self.blocks.len(),
            self.total_bytes(),
            aliased,
            self.scratch_size,
        )
    }
}
