// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-invocation view handed to a node implementation.
//!
//! The runner resolves every tensor of a node to one of a set of *distinct*
//! storage regions. Two slots index the same region exactly when the
//! planner made them share storage (in-place reuse), so a kernel can ask
//! for a read/write pair and get an error instead of an aliasing borrow.
//!
//! ```text
//!   inputs:  [0] ──┐        regions: [0] &mut [u8]   (shared by in0/out0)
//!   outputs: [0] ──┘                 [1] &mut [u8]   (in1)
//!   inputs:  [1] ───────────────────▶
//! ```

use crate::{NodeState, OpError};
use model_ir::{GraphError, Node, OpParams, Tensor};
use std::any::Any;

/// Storage regions of one node plus the slot → region mapping.
pub struct NodeIo<'a> {
    pub regions: Vec<&'a mut [u8]>,
    /// Region index per input slot.
    pub inputs: Vec<usize>,
    /// Region index per output slot.
    pub outputs: Vec<usize>,
}

/// Everything a node implementation may touch during one hook call.
pub struct NodeContext<'a> {
    node: &'a Node,
    tensors: &'a [Tensor],
    io: NodeIo<'a>,
    state: &'a mut Option<NodeState>,
    scratch: &'a mut [u8],
    num_threads: usize,
}

impl<'a> NodeContext<'a> {
    /// `tensors` is the graph's full tensor table.
    pub fn new(
        node: &'a Node,
        tensors: &'a [Tensor],
        io: NodeIo<'a>,
        state: &'a mut Option<NodeState>,
        scratch: &'a mut [u8],
        num_threads: usize,
    ) -> Self {
        Self {
            node,
            tensors,
            io,
            state,
            scratch,
            num_threads,
        }
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn params(&self) -> &'a OpParams {
        self.node.params()
    }

    /// Thread hint for implementations that fan out internally.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn input_tensor(&self, slot: usize) -> Result<&'a Tensor, OpError> {
        let id = self.node.input(slot).ok_or(OpError::MissingSlot {
            direction: "input",
            slot,
        })?;
        let tensors: &'a [Tensor] = self.tensors;
        tensors.get(id.index()).ok_or(OpError::Graph(GraphError::UnknownTensor(id)))
    }

    pub fn output_tensor(&self, slot: usize) -> Result<&'a Tensor, OpError> {
        let id = self.node.output(slot).ok_or(OpError::MissingSlot {
            direction: "output",
            slot,
        })?;
        let tensors: &'a [Tensor] = self.tensors;
        tensors.get(id.index()).ok_or(OpError::Graph(GraphError::UnknownTensor(id)))
    }

    /// Bytes of an input tensor.
    pub fn input(&self, slot: usize) -> Result<&[u8], OpError> {
        let tensor = self.input_tensor(slot)?;
        let region = self.region("input", slot)?;
        view(&self.io.regions[region], tensor)
    }

    /// Mutable bytes of an output tensor.
    pub fn output_mut(&mut self, slot: usize) -> Result<&mut [u8], OpError> {
        let tensor = self.output_tensor(slot)?;
        let region = self.region("output", slot)?;
        view_mut(&mut self.io.regions[region], tensor)
    }

    /// Whether the output shares storage with the input.
    pub fn is_inplace(&self, input: usize, output: usize) -> bool {
        match (self.io.inputs.get(input), self.io.outputs.get(output)) {
            (Some(i), Some(o)) => i == o,
            _ => false,
        }
    }

    /// A read view of one input and a write view of one output.
    ///
    /// Fails with [`OpError::Aliased`] when the two share storage.
    pub fn io(&mut self, input: usize, output: usize) -> Result<(&[u8], &mut [u8]), OpError> {
        let in_tensor = self.input_tensor(input)?;
        let out_tensor = self.output_tensor(output)?;
        let read = self.region("input", input)?;
        let write = self.region("output", output)?;
        if read == write {
            return Err(OpError::Aliased { input, output });
        }
        let (src, dst) = split_pair(&mut self.io.regions, read, write);
        Ok((view(src, in_tensor)?, view_mut(dst, out_tensor)?))
    }

    /// Read views of every input and a write view of one output.
    pub fn inputs_and_output(&mut self, output: usize) -> Result<(Vec<&[u8]>, &mut [u8]), OpError> {
        let out_tensor = self.output_tensor(output)?;
        let write = self.region("output", output)?;
        let mut reads = Vec::with_capacity(self.node.inputs().len());
        for slot in 0..self.node.inputs().len() {
            let region = self.region("input", slot)?;
            if region == write {
                return Err(OpError::Aliased { input: slot, output });
            }
            reads.push((region, self.input_tensor(slot)?));
        }

        let mut shared: Vec<Option<&[u8]>> = vec![None; self.io.regions.len()];
        let mut target = None;
        for (index, region) in self.io.regions.iter_mut().enumerate() {
            if index == write {
                target = Some(&mut **region);
            } else {
                shared[index] = Some(&**region);
            }
        }

        let inputs = reads
            .into_iter()
            .map(|(region, tensor)| match shared[region] {
                Some(bytes) => view(bytes, tensor),
                None => Err(OpError::Aliased { input: region, output }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let target = target.ok_or(OpError::MissingSlot {
            direction: "output",
            slot: output,
        })?;
        Ok((inputs, view_mut(target, out_tensor)?))
    }

    /// Copies an input into an output; a no-op when they share storage.
    pub fn copy_input_to_output(&mut self, input: usize, output: usize) -> Result<(), OpError> {
        if self.is_inplace(input, output) {
            return Ok(());
        }
        let (src, dst) = self.io(input, output)?;
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        Ok(())
    }

    /// The node's private state, downcast to `T`.
    pub fn state<T: Any>(&mut self) -> Result<&mut T, OpError> {
        self.state
            .as_mut()
            .and_then(|state| (**state).downcast_mut::<T>())
            .ok_or(OpError::State)
    }

    /// An input view together with the node's private state.
    pub fn input_with_state<T: Any>(&mut self, slot: usize) -> Result<(&[u8], &mut T), OpError> {
        let tensor = self.input_tensor(slot)?;
        let region = self.region("input", slot)?;
        let bytes = view(&self.io.regions[region], tensor)?;
        let state = self
            .state
            .as_mut()
            .and_then(|state| (**state).downcast_mut::<T>())
            .ok_or(OpError::State)?;
        Ok((bytes, state))
    }

    /// An output view together with the node's private state.
    pub fn output_with_state<T: Any>(&mut self, slot: usize) -> Result<(&mut [u8], &mut T), OpError> {
        let tensor = self.output_tensor(slot)?;
        let region = self.region("output", slot)?;
        let bytes = view_mut(&mut self.io.regions[region], tensor)?;
        let state = self
            .state
            .as_mut()
            .and_then(|state| (**state).downcast_mut::<T>())
            .ok_or(OpError::State)?;
        Ok((bytes, state))
    }

    /// Whether the node has private state.
    pub fn has_state(&self) -> bool {
        self.state.is_some()
    }

    /// Replaces the node's private state.
    pub fn set_state(&mut self, state: NodeState) {
        *self.state = Some(state);
    }

    /// The graph-wide scratch buffer, sized to the largest declared need.
    pub fn scratch(&mut self) -> &mut [u8] {
        &mut *self.scratch
    }

    fn region(&self, direction: &'static str, slot: usize) -> Result<usize, OpError> {
        let map = match direction {
            "input" => &self.io.inputs,
            _ => &self.io.outputs,
        };
        map.get(slot)
            .copied()
            .filter(|&r| r < self.io.regions.len())
            .ok_or(OpError::MissingSlot { direction, slot })
    }
}

fn view<'b>(bytes: &'b [u8], tensor: &Tensor) -> Result<&'b [u8], OpError> {
    let needed = tensor.byte_size();
    let available = bytes.len();
    bytes.get(..needed).ok_or_else(|| OpError::ShortBuffer {
        name: tensor.name().to_string(),
        needed,
        available,
    })
}

fn view_mut<'b>(bytes: &'b mut [u8], tensor: &Tensor) -> Result<&'b mut [u8], OpError> {
    let needed = tensor.byte_size();
    let available = bytes.len();
    bytes.get_mut(..needed).ok_or_else(|| OpError::ShortBuffer {
        name: tensor.name().to_string(),
        needed,
        available,
    })
}

/// Borrows region `read` shared and region `write` mutably; `read != write`.
fn split_pair<'s>(regions: &'s mut [&mut [u8]], read: usize, write: usize) -> (&'s [u8], &'s mut [u8]) {
    if read < write {
        let (lo, hi) = regions.split_at_mut(write);
        (&*lo[read], &mut *hi[0])
    } else {
        let (lo, hi) = regions.split_at_mut(read);
        (&*hi[0], &mut *lo[write])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{Graph, NodeId, OpKind, TensorKind, Validated};
    use tensor_core::DType;

    /// `x -> relu -> y` plus a second input `z` on the same node.
    fn graph() -> Graph<Validated> {
        let mut g = Graph::new("ctx");
        let x = g.create_tensor("x", DType::U8);
        let z = g.create_tensor("z", DType::U8);
        let y = g.create_tensor("y", DType::U8);
        for t in [x, z] {
            g.set_tensor_kind(t, TensorKind::Input).unwrap();
            g.set_tensor_shape(t, &[4]).unwrap();
        }
        g.set_tensor_shape(y, &[4]).unwrap();
        let input = g.create_node("in", OpKind::Input, 1);
        g.set_node_output(input, 0, x).unwrap();
        g.set_node_output(input, 1, z).unwrap();
        let n = g.create_node("n", OpKind::Generic, 1);
        g.set_node_input(n, 0, x).unwrap();
        g.set_node_input(n, 1, z).unwrap();
        g.set_node_output(n, 0, y).unwrap();
        g.validate().unwrap()
    }

    #[test]
    fn test_io_on_distinct_regions() {
        let g = graph();
        let node = g.node(NodeId(1)).unwrap();
        let (mut a, mut b, mut c) = ([1u8, 2, 3, 4], [5u8; 4], [0u8; 6]);
        let mut state = None;
        let mut scratch: [u8; 0] = [];
        let io = NodeIo {
            regions: vec![&mut a[..], &mut b[..], &mut c[..]],
            inputs: vec![0, 1],
            outputs: vec![2],
        };
        let mut ctx = NodeContext::new(node, g.tensors(), io, &mut state, &mut scratch, 1);

        assert!(!ctx.is_inplace(0, 0));
        ctx.copy_input_to_output(0, 0).unwrap();
        assert_eq!(ctx.output_mut(0).unwrap(), &[1, 2, 3, 4]);

        let (inputs, out) = ctx.inputs_and_output(0).unwrap();
        assert_eq!(inputs, vec![&[1u8, 2, 3, 4][..], &[5u8; 4][..]]);
        assert_eq!(out.len(), 4);
        drop(ctx);
        assert_eq!(c, [1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_aliased_pair_is_rejected() {
        let g = graph();
        let node = g.node(NodeId(1)).unwrap();
        let (mut a, mut b) = ([7u8; 4], [0u8; 4]);
        let mut state = None;
        let mut scratch: [u8; 0] = [];
        let io = NodeIo {
            regions: vec![&mut a[..], &mut b[..]],
            inputs: vec![0, 1],
            outputs: vec![0],
        };
        let mut ctx = NodeContext::new(node, g.tensors(), io, &mut state, &mut scratch, 1);

        assert!(ctx.is_inplace(0, 0));
        assert!(matches!(ctx.io(0, 0), Err(OpError::Aliased { input: 0, output: 0 })));
        assert!(ctx.inputs_and_output(0).is_err());
        ctx.copy_input_to_output(0, 0).unwrap();
        ctx.output_mut(0).unwrap()[0] = 1;
        assert_eq!(ctx.input(0).unwrap(), &[1, 7, 7, 7]);
    }

    #[test]
    fn test_short_region() {
        let g = graph();
        let node = g.node(NodeId(1)).unwrap();
        let (mut a, mut b, mut c) = ([0u8; 4], [0u8; 4], [0u8; 2]);
        let mut state = None;
        let mut scratch: [u8; 0] = [];
        let io = NodeIo {
            regions: vec![&mut a[..], &mut b[..], &mut c[..]],
            inputs: vec![0, 1],
            outputs: vec![2],
        };
        let mut ctx = NodeContext::new(node, g.tensors(), io, &mut state, &mut scratch, 1);
        assert!(matches!(ctx.output_mut(0), Err(OpError::ShortBuffer { needed: 4, .. })));
    }

    #[test]
    fn test_state_downcast() {
        let g = graph();
        let node = g.node(NodeId(1)).unwrap();
        let mut a = [0u8; 4];
        let mut state = None;
        let mut scratch = [0u8; 8];
        let io = NodeIo {
            regions: vec![&mut a[..]],
            inputs: vec![0, 0],
            outputs: vec![0],
        };
        let mut ctx = NodeContext::new(node, g.tensors(), io, &mut state, &mut scratch, 2);

        assert!(matches!(ctx.state::<u32>(), Err(OpError::State)));
        ctx.set_state(Box::new(41u32));
        *ctx.state::<u32>().unwrap() += 1;
        assert!(ctx.state::<String>().is_err());
        assert_eq!(ctx.scratch().len(), 8);
        assert_eq!(ctx.num_threads(), 2);
        drop(ctx);
        assert_eq!(state.and_then(|s| s.downcast::<u32>().ok()).map(|b| *b), Some(42));
    }
}
