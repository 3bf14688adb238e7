// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Backing storage of a compiled graph and the per-hook byte views.
//!
//! Every block of a [`MemoryPlan`] gets one arena allocation of
//! `max_size + align` bytes; the tensor's slot starts at the first aligned
//! byte. A hook call resolves the node's tensors to distinct regions:
//!
//! ```text
//!   TensorData::Planned { block, offset, capacity } ─▶ block[offset..offset + capacity]
//!   TensorData::External(bytes)                     ─▶ bytes
//!   TensorData::Alias(root)                         ─▶ root's external bytes
//! ```

use crate::exec_graph::BoundNode;
use crate::planner::{BlockAssignment, MemoryPlan};
use crate::RuntimeError;
use arena_alloc::{Arena, ArenaBuffer};
use model_ir::{Graph, GraphError, PlannedSlot, TensorAddress, TensorData, TensorId, Validated};
use op_registry::{NodeContext, NodeIo, NodeOps, OpError};

/// Where the bytes of one tensor come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Block(PlannedSlot),
    External(TensorId),
    /// No storage yet; seen by hooks as an empty region.
    Unmapped(TensorId),
}

impl Location {
    fn from_address(address: TensorAddress) -> Self {
        match address {
            TensorAddress::Planned(slot) => Self::Block(slot),
            TensorAddress::External(root) => Self::External(root),
        }
    }

    /// Same backing buffer, regardless of the window into it.
    fn same_source(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Block(a), Self::Block(b)) => a.block == b.block,
            (Self::External(a), Self::External(b)) | (Self::Unmapped(a), Self::Unmapped(b)) => a == b,
            _ => false,
        }
    }
}

/// Resolves a tensor inside a mutably borrowed data table.
fn locate(data: &[TensorData], tensor: TensorId) -> Result<Option<Location>, GraphError> {
    let entry = data.get(tensor.index()).ok_or(GraphError::UnknownTensor(tensor))?;
    let location = match entry {
        TensorData::Unassigned => None,
        TensorData::External(_) => Some(Location::External(tensor)),
        TensorData::Planned(slot) => Some(Location::Block(*slot)),
        TensorData::Alias(root) => match data.get(root.index()) {
            Some(TensorData::External(_)) => Some(Location::External(*root)),
            _ => None,
        },
    };
    Ok(location)
}

/// Arena allocations backing one execution graph.
pub(crate) struct Storage {
    arena: Arena,
    blocks: Vec<ArenaBuffer>,
    slots: Vec<PlannedSlot>,
    scratch: Option<ArenaBuffer>,
}

impl Storage {
    /// Storage with no blocks yet.
    pub(crate) fn empty(arena: &Arena) -> Self {
        Self {
            arena: arena.clone(),
            blocks: Vec::new(),
            slots: Vec::new(),
            scratch: None,
        }
    }

    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Allocates every block and the scratch buffer of `plan`.
    pub(crate) fn allocate(arena: &Arena, plan: &MemoryPlan) -> Result<Self, RuntimeError> {
        let align = plan.align().max(1);
        let mut blocks = Vec::with_capacity(plan.num_blocks());
        let mut slots = Vec::with_capacity(plan.num_blocks());
        for (id, block) in plan.blocks().iter().enumerate() {
            let mut buffer = arena.alloc(block.max_size + align)?;
            let base = match buffer.offset() {
                Some(offset) => offset,
                None => buffer
                    .system_bytes_mut()
                    .map_or(0, |bytes| bytes.as_ptr() as usize),
            };
            slots.push(PlannedSlot {
                block: id,
                offset: (align - base % align) % align,
                capacity: block.max_size,
            });
            blocks.push(buffer);
        }
        let scratch = match plan.scratch_size() {
            0 => None,
            size => Some(arena.alloc(size)?),
        };
        tracing::debug!(blocks = blocks.len(), scratch = plan.scratch_size(), "tensor storage allocated");
        Ok(Self {
            arena: arena.clone(),
            blocks,
            slots,
            scratch,
        })
    }

    /// Writes the address of every planned output into the graph.
    ///
    /// Nodes are visited in execution order, so an aliased output always
    /// finds its source already placed.
    pub(crate) fn assign(&self, plan: &MemoryPlan, graph: &mut Graph<Validated>) -> Result<(), RuntimeError> {
        for node_plan in plan.nodes() {
            for output in &node_plan.outputs {
                match output.assignment {
                    Some(BlockAssignment::Owned(block)) => {
                        let slot = self.slots.get(block).copied().ok_or_else(|| {
                            RuntimeError::Storage(format!("plan refers to missing block {block}"))
                        })?;
                        graph.assign_planned(output.tensor, slot)?;
                    }
                    Some(BlockAssignment::Aliased(input)) => {
                        let node = graph.node(node_plan.node)?;
                        let source = node.input(input).ok_or_else(|| GraphError::InvalidNode {
                            name: node.name().to_string(),
                            detail: format!("in-place input slot {input} is not connected"),
                        })?;
                        graph.assign_alias(output.tensor, source)?;
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    pub(crate) fn slots(&self) -> &[PlannedSlot] {
        &self.slots
    }

    /// Runs one hook of a bound node with views of its tensors.
    ///
    /// With `strict` set, a tensor without storage is an error; otherwise
    /// the hook sees it as an empty region. The outer error is a storage
    /// failure, the inner one the hook's own.
    pub(crate) fn invoke<R>(
        &mut self,
        graph: &mut Graph<Validated>,
        bound: &mut BoundNode,
        strict: bool,
        num_threads: usize,
        hook: impl FnOnce(&dyn NodeOps, &mut NodeContext<'_>) -> Result<R, OpError>,
    ) -> Result<Result<R, OpError>, RuntimeError> {
        let use_scratch = bound.scratch > 0;
        let (tensors, nodes, data) = graph.split_data_mut();
        let node = nodes.get(bound.node.index()).ok_or(GraphError::UnknownNode(bound.node))?;

        // Distinct locations, and the location index of every slot.
        let table: &[TensorData] = data;
        let mut locations: Vec<Location> = Vec::new();
        let mut resolve = |tensor: TensorId| -> Result<usize, RuntimeError> {
            let location = match locate(table, tensor)? {
                Some(location) => location,
                None if !strict => Location::Unmapped(tensor),
                None => {
                    return Err(RuntimeError::MissingData {
                        tensor: tensors
                            .get(tensor.index())
                            .map_or_else(|| tensor.to_string(), |t| t.name().to_string()),
                    })
                }
            };
            match locations.iter().position(|l| l.same_source(&location)) {
                Some(index) if locations[index] == location => Ok(index),
                Some(_) => Err(RuntimeError::Storage(format!(
                    "tensor {tensor} overlaps another tensor of node '{}'",
                    node.name()
                ))),
                None => {
                    locations.push(location);
                    Ok(locations.len() - 1)
                }
            }
        };
        let inputs = node.inputs().iter().map(|&t| resolve(t)).collect::<Result<Vec<_>, _>>()?;
        let outputs = node.outputs().iter().map(|&t| resolve(t)).collect::<Result<Vec<_>, _>>()?;

        let mut heap = self.arena.lock()?;
        let mut views: Vec<Option<&mut [u8]>> = locations.iter().map(|_| None).collect();

        // Arena-backed blocks and scratch come out of one disjoint borrow.
        let mut arena_offsets = Vec::new();
        let mut arena_targets = Vec::new();
        let mut system_blocks = Vec::new();
        for (index, location) in locations.iter().enumerate() {
            if let Location::Block(slot) = location {
                let buffer = self.blocks.get(slot.block).ok_or_else(|| {
                    RuntimeError::Storage(format!("tensor refers to missing block {}", slot.block))
                })?;
                match buffer.offset() {
                    Some(offset) => {
                        arena_offsets.push(offset);
                        arena_targets.push(Some(index));
                    }
                    None => system_blocks.push((slot.block, index)),
                }
            }
        }
        let scratch_offset = self.scratch.as_ref().and_then(ArenaBuffer::offset).filter(|_| use_scratch);
        if let Some(offset) = scratch_offset {
            arena_offsets.push(offset);
            arena_targets.push(None);
        }

        let mut scratch: &mut [u8] = &mut [];
        if !arena_offsets.is_empty() {
            for (view, target) in heap.data_many_mut(&arena_offsets)?.into_iter().zip(arena_targets) {
                match target {
                    Some(index) => views[index] = Some(view),
                    None => scratch = view,
                }
            }
        }
        for (block, buffer) in self.blocks.iter_mut().enumerate() {
            if let Some(&(_, index)) = system_blocks.iter().find(|(b, _)| *b == block) {
                views[index] = buffer.system_bytes_mut();
            }
        }
        if use_scratch && scratch_offset.is_none() {
            if let Some(bytes) = self.scratch.as_mut().and_then(ArenaBuffer::system_bytes_mut) {
                scratch = bytes;
            }
        }
        for (index, entry) in data.iter_mut().enumerate() {
            if let TensorData::External(bytes) = entry {
                let here = Location::External(TensorId(index));
                if let Some(position) = locations.iter().position(|l| *l == here) {
                    views[position] = Some(bytes.as_mut_slice());
                }
            }
        }

        for (view, location) in views.iter_mut().zip(&locations) {
            if matches!(location, Location::Unmapped(_)) {
                let empty: &mut [u8] = &mut [];
                *view = Some(empty);
            }
        }

        let mut regions = Vec::with_capacity(views.len());
        for (view, location) in views.into_iter().zip(&locations) {
            let view = view.ok_or_else(|| RuntimeError::Storage("tensor storage is not mapped".into()))?;
            let region = match location {
                Location::External(_) | Location::Unmapped(_) => view,
                Location::Block(slot) => {
                    let available = view.len();
                    let end = slot.offset + slot.capacity;
                    view.get_mut(slot.offset..end).ok_or_else(|| {
                        RuntimeError::Storage(format!(
                            "slot {}..{end} exceeds its {available}-byte block",
                            slot.offset
                        ))
                    })?
                }
            };
            regions.push(region);
        }

        let io = NodeIo {
            regions,
            inputs,
            outputs,
        };
        let mut ctx = NodeContext::new(node, tensors, io, &mut bound.state, scratch, num_threads);
        Ok(hook(&*bound.ops, &mut ctx))
    }

    /// Copies the current bytes of a tensor out of its storage.
    pub(crate) fn read(&self, graph: &Graph<Validated>, tensor: TensorId) -> Result<Vec<u8>, RuntimeError> {
        let t = graph.tensor(tensor)?;
        let missing = || RuntimeError::MissingData {
            tensor: t.name().to_string(),
        };
        let size = t.byte_size();
        match graph.address(tensor)?.map(Location::from_address) {
            Some(Location::Block(slot)) => {
                let buffer = self.blocks.get(slot.block).ok_or_else(missing)?;
                let end = slot.offset + size.min(slot.capacity);
                buffer.read(|bytes| bytes.get(slot.offset..end).map(<[u8]>::to_vec))?.ok_or_else(missing)
            }
            Some(Location::External(root)) => {
                let bytes = graph.external_data(root)?.ok_or_else(missing)?;
                Ok(bytes[..size.min(bytes.len())].to_vec())
            }
            Some(Location::Unmapped(_)) | None => Err(missing()),
        }
    }
}

/// Bytes available to a tensor at its resolved address.
pub(crate) fn capacity(graph: &Graph<Validated>, tensor: TensorId) -> Result<usize, RuntimeError> {
    let capacity = match graph.address(tensor)? {
        Some(TensorAddress::Planned(slot)) => slot.capacity,
        Some(TensorAddress::External(root)) => graph.external_data(root)?.map_or(0, <[u8]>::len),
        None => 0,
    };
    Ok(capacity)
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("blocks", &self.blocks.len())
            .field("scratch", &self.scratch.as_ref().map(ArenaBuffer::len))
            .finish()
    }
}
