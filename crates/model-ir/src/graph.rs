// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The IR graph: a tensor table plus nodes in execution order.
//!
//! # Type-State Pattern
//!
//! ```text
//! Graph<Building>   — construction calls, nothing checked yet.
//!       │  .validate()
//!       ▼
//! Graph<Validated>  — references resolved, topological order checked,
//!                     consumer counts computed. Ready to compile.
//! ```
//!
//! The compiler only accepts `Graph<Validated>`, so a half-built graph
//! cannot reach the memory planner.

use crate::tensor::{Tensor, TensorAddress, TensorData, TensorId, TensorKind, PlannedSlot};
use crate::{GraphError, Node, NodeId, OpKind, OpParams};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use tensor_core::{DType, QuantParams, Shape};

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph is under construction.
#[derive(Debug, Clone)]
pub struct Building;

/// Marker: graph has been validated and may be compiled.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Building {}
impl GraphState for Validated {}

// ── Graph ──────────────────────────────────────────────────────────

/// An IR graph.
///
/// Nodes are stored in execution order; the order is checked by
/// [`validate`](Graph::validate) but never recomputed.
#[derive(Debug, Clone)]
pub struct Graph<S: GraphState = Building> {
    name: String,
    tensors: Vec<Tensor>,
    /// Parallel to `tensors`.
    data: Vec<TensorData>,
    nodes: Vec<Node>,
    input_nodes: Vec<NodeId>,
    output_nodes: Vec<NodeId>,
    _state: PhantomData<S>,
}

// ── Shared accessors ───────────────────────────────────────────────

impl<S: GraphState> Graph<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn tensor(&self, id: TensorId) -> Result<&Tensor, GraphError> {
        self.tensors.get(id.0).ok_or(GraphError::UnknownTensor(id))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(id.0).ok_or(GraphError::UnknownNode(id))
    }

    /// Storage descriptor of a tensor.
    pub fn data(&self, id: TensorId) -> Result<&TensorData, GraphError> {
        self.data.get(id.0).ok_or(GraphError::UnknownTensor(id))
    }

    pub fn find_tensor(&self, name: &str) -> Option<TensorId> {
        self.tensors.iter().find(|t| t.name == name).map(|t| t.id)
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Declared graph input nodes.
    pub fn input_nodes(&self) -> &[NodeId] {
        &self.input_nodes
    }

    /// Declared graph output nodes.
    pub fn output_nodes(&self) -> &[NodeId] {
        &self.output_nodes
    }

    /// Tensors written by the graph input nodes.
    pub fn input_tensors(&self) -> Vec<TensorId> {
        self.io_tensors(&self.input_nodes)
    }

    /// Tensors written by the graph output nodes.
    pub fn output_tensors(&self) -> Vec<TensorId> {
        self.io_tensors(&self.output_nodes)
    }

    fn io_tensors(&self, nodes: &[NodeId]) -> Vec<TensorId> {
        nodes
            .iter()
            .filter_map(|n| self.nodes.get(n.0))
            .flat_map(|n| n.outputs.iter().copied())
            .collect()
    }

    fn tensor_mut(&mut self, id: TensorId) -> Result<&mut Tensor, GraphError> {
        self.tensors.get_mut(id.0).ok_or(GraphError::UnknownTensor(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(id.0).ok_or(GraphError::UnknownNode(id))
    }

    fn check_nodes(&self, ids: &[NodeId]) -> Result<(), GraphError> {
        match ids.iter().find(|id| id.0 >= self.nodes.len()) {
            Some(id) => Err(GraphError::UnknownNode(*id)),
            None => Ok(()),
        }
    }
}

// ── Building state ─────────────────────────────────────────────────

impl Graph<Building> {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tensors: Vec::new(),
            data: Vec::new(),
            nodes: Vec::new(),
            input_nodes: Vec::new(),
            output_nodes: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Adds an unshaped variable tensor.
    pub fn create_tensor(&mut self, name: impl Into<String>, dtype: DType) -> TensorId {
        let id = TensorId(self.tensors.len());
        self.tensors.push(Tensor::new(id, name.into(), dtype));
        self.data.push(TensorData::Unassigned);
        id
    }

    pub fn set_tensor_kind(&mut self, id: TensorId, kind: TensorKind) -> Result<(), GraphError> {
        self.tensor_mut(id)?.kind = kind;
        Ok(())
    }

    /// Sets the dimensions (at most four).
    pub fn set_tensor_shape(&mut self, id: TensorId, dims: &[usize]) -> Result<(), GraphError> {
        let shape = Shape::try_from(dims)?;
        self.tensor_mut(id)?.shape = Some(shape);
        Ok(())
    }

    pub fn set_tensor_quant(&mut self, id: TensorId, quant: QuantParams) -> Result<(), GraphError> {
        self.tensor_mut(id)?.quant = Some(quant);
        Ok(())
    }

    /// Attaches graph-owned bytes: constant data, or a persistent buffer
    /// for a variable tensor. Sizes are checked by `validate`.
    pub fn set_tensor_data(&mut self, id: TensorId, bytes: Vec<u8>) -> Result<(), GraphError> {
        let slot = self.data.get_mut(id.0).ok_or(GraphError::UnknownTensor(id))?;
        *slot = TensorData::External(bytes);
        Ok(())
    }

    /// Appends a node.
    pub fn create_node(&mut self, name: impl Into<String>, op: OpKind, version: u32) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, name.into(), op, version));
        id
    }

    /// Sets input `slot` of `node`. Slots are filled in order; setting an
    /// existing slot replaces it.
    pub fn set_node_input(
        &mut self,
        node: NodeId,
        slot: usize,
        tensor: TensorId,
    ) -> Result<(), GraphError> {
        self.tensor(tensor)?;
        let n = self.node_mut(node)?;
        place(&mut n.inputs, node, "input", slot, tensor)?;
        Ok(())
    }

    /// Sets output `slot` of `node` and records `node` as the producer.
    pub fn set_node_output(
        &mut self,
        node: NodeId,
        slot: usize,
        tensor: TensorId,
    ) -> Result<(), GraphError> {
        self.node(node)?;
        match self.tensor(tensor)?.producer {
            Some(producer) if producer != node => {
                return Err(GraphError::MultipleProducers { tensor, producer })
            }
            _ => {}
        }
        let replaced = place(&mut self.node_mut(node)?.outputs, node, "output", slot, tensor)?;
        if let Some(old) = replaced.filter(|old| *old != tensor) {
            self.tensor_mut(old)?.producer = None;
        }
        self.tensor_mut(tensor)?.producer = Some(node);
        Ok(())
    }

    pub fn set_node_params(&mut self, node: NodeId, params: OpParams) -> Result<(), GraphError> {
        self.node_mut(node)?.params = params;
        Ok(())
    }

    pub fn set_node_dynamic(&mut self, node: NodeId, dynamic: bool) -> Result<(), GraphError> {
        self.node_mut(node)?.dynamic_shape = dynamic;
        Ok(())
    }

    /// Declares the graph input and output nodes.
    pub fn set_graph_io(&mut self, inputs: &[NodeId], outputs: &[NodeId]) -> Result<(), GraphError> {
        self.check_nodes(inputs)?;
        self.check_nodes(outputs)?;
        self.input_nodes = inputs.to_vec();
        self.output_nodes = outputs.to_vec();
        Ok(())
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The graph has at least one node.
    /// - Input and constant tensors have shapes; constants carry exactly
    ///   `elem_num * elem_size` bytes; other external buffers are at least
    ///   that large.
    /// - Every node input is an input, a constant, externally backed, or
    ///   produced by an earlier node.
    ///
    /// Consumer counts are recomputed from the node list. Undeclared graph
    /// inputs default to the `Input` nodes; undeclared outputs to the nodes
    /// whose outputs nobody reads.
    pub fn validate(mut self) -> Result<Graph<Validated>, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "graph '{}' contains no nodes",
                self.name
            )));
        }

        for t in &mut self.tensors {
            t.consumers.clear();
        }
        for node in &self.nodes {
            for input in &node.inputs {
                self.tensors[input.0].consumers.push(node.id);
            }
        }

        for (tensor, data) in self.tensors.iter().zip(&self.data) {
            check_tensor(tensor, data)?;
        }

        let mut available: HashSet<TensorId> = self
            .tensors
            .iter()
            .zip(&self.data)
            .filter(|(t, d)| t.kind != TensorKind::Variable || d.is_external())
            .map(|(t, _)| t.id)
            .collect();
        for node in &self.nodes {
            if let Some(&tensor) = node.inputs.iter().find(|t| !available.contains(*t)) {
                return Err(GraphError::NotTopological {
                    node: node.id,
                    tensor,
                });
            }
            available.extend(node.outputs.iter().copied());
        }

        if self.input_nodes.is_empty() {
            self.input_nodes = self
                .nodes
                .iter()
                .filter(|n| n.op == OpKind::Input)
                .map(|n| n.id)
                .collect();
        }
        if self.output_nodes.is_empty() {
            let tensors = &self.tensors;
            self.output_nodes = self
                .nodes
                .iter()
                .filter(|n| !n.op.is_source() && !n.outputs.is_empty())
                .filter(|n| n.outputs.iter().all(|t| tensors[t.0].consumers.is_empty()))
                .map(|n| n.id)
                .collect();
        }

        tracing::info!(
            graph = %self.name,
            nodes = self.nodes.len(),
            tensors = self.tensors.len(),
            inputs = self.input_nodes.len(),
            outputs = self.output_nodes.len(),
            "graph validated"
        );

        Ok(Graph {
            name: self.name,
            tensors: self.tensors,
            data: self.data,
            nodes: self.nodes,
            input_nodes: self.input_nodes,
            output_nodes: self.output_nodes,
            _state: PhantomData,
        })
    }
}

/// Writes `tensor` into `slots[slot]`, returning the replaced entry.
fn place(
    slots: &mut Vec<TensorId>,
    node: NodeId,
    direction: &'static str,
    slot: usize,
    tensor: TensorId,
) -> Result<Option<TensorId>, GraphError> {
    match slot.cmp(&slots.len()) {
        std::cmp::Ordering::Less => Ok(Some(std::mem::replace(&mut slots[slot], tensor))),
        std::cmp::Ordering::Equal => {
            slots.push(tensor);
            Ok(None)
        }
        std::cmp::Ordering::Greater => Err(GraphError::SlotGap {
            node,
            direction,
            slot,
            len: slots.len(),
        }),
    }
}

fn check_tensor(tensor: &Tensor, data: &TensorData) -> Result<(), GraphError> {
    let invalid = |detail: String| GraphError::InvalidTensor {
        name: tensor.name.clone(),
        detail,
    };
    if tensor.kind != TensorKind::Variable && tensor.shape.is_none() {
        return Err(invalid(format!("{:?} tensor has no shape", tensor.kind)));
    }
    match (tensor.kind, data) {
        (TensorKind::Constant, TensorData::External(bytes)) => {
            if bytes.len() != tensor.byte_size() {
                return Err(invalid(format!(
                    "constant holds {} bytes, shape needs {}",
                    bytes.len(),
                    tensor.byte_size()
                )));
            }
        }
        (TensorKind::Constant, _) => return Err(invalid("constant has no data".into())),
        (_, TensorData::External(bytes)) if tensor.shape.is_some() => {
            if bytes.len() < tensor.byte_size() {
                return Err(invalid(format!(
                    "buffer holds {} bytes, shape needs {}",
                    bytes.len(),
                    tensor.byte_size()
                )));
            }
        }
        _ => {}
    }
    Ok(())
}

// ── Validated state ────────────────────────────────────────────────

impl Graph<Validated> {
    /// Supplies the data of an input tensor. The byte count must match the
    /// tensor's shape exactly.
    pub fn set_input_data(&mut self, id: TensorId, bytes: Vec<u8>) -> Result<(), GraphError> {
        let tensor = self.tensor(id)?;
        if tensor.kind != TensorKind::Input {
            return Err(GraphError::InvalidTensor {
                name: tensor.name.clone(),
                detail: format!("{:?} tensor cannot take input data", tensor.kind),
            });
        }
        if bytes.len() != tensor.byte_size() {
            return Err(GraphError::DataSize {
                tensor: id,
                expected: tensor.byte_size(),
                actual: bytes.len(),
            });
        }
        self.data[id.0] = TensorData::External(bytes);
        Ok(())
    }

    /// Gives a variable tensor a persistent graph-owned buffer, so the
    /// planner leaves it alone. Takes effect at the next compile.
    pub fn set_tensor_buffer(&mut self, id: TensorId, bytes: Vec<u8>) -> Result<(), GraphError> {
        let tensor = self.tensor(id)?;
        if tensor.kind != TensorKind::Variable {
            return Err(GraphError::InvalidTensor {
                name: tensor.name.clone(),
                detail: "only variable tensors take persistent buffers".into(),
            });
        }
        if bytes.len() < tensor.byte_size() {
            return Err(GraphError::DataSize {
                tensor: id,
                expected: tensor.byte_size(),
                actual: bytes.len(),
            });
        }
        self.data[id.0] = TensorData::External(bytes);
        Ok(())
    }

    /// Replaces a tensor's shape. Returns whether it changed.
    pub fn set_tensor_shape(&mut self, id: TensorId, shape: Shape) -> Result<bool, GraphError> {
        let tensor = self.tensor_mut(id)?;
        if tensor.shape.as_ref() == Some(&shape) {
            return Ok(false);
        }
        tensor.shape = Some(shape);
        Ok(true)
    }

    pub fn set_node_dynamic(&mut self, node: NodeId, dynamic: bool) -> Result<(), GraphError> {
        self.node_mut(node)?.dynamic_shape = dynamic;
        Ok(())
    }

    /// Points a tensor at a slot of the planner's block pool.
    pub fn assign_planned(&mut self, id: TensorId, slot: PlannedSlot) -> Result<(), GraphError> {
        let data = self.data.get_mut(id.0).ok_or(GraphError::UnknownTensor(id))?;
        *data = TensorData::Planned(slot);
        Ok(())
    }

    /// Makes `id` share the storage of `source`.
    ///
    /// A planned slot is copied. Graph-owned storage is referenced through
    /// its owning tensor, which may be an input whose data arrives later.
    pub fn assign_alias(&mut self, id: TensorId, source: TensorId) -> Result<(), GraphError> {
        self.tensor(id)?;
        let assigned = match self.data(source)? {
            TensorData::Planned(slot) => TensorData::Planned(*slot),
            TensorData::Alias(root) => TensorData::Alias(*root),
            TensorData::External(_) => TensorData::Alias(source),
            TensorData::Unassigned if self.tensor(source)?.kind == TensorKind::Input => {
                TensorData::Alias(source)
            }
            TensorData::Unassigned => {
                return Err(GraphError::InvalidTensor {
                    name: self.tensor(source)?.name.clone(),
                    detail: "cannot alias a tensor without storage".into(),
                })
            }
        };
        self.data[id.0] = assigned;
        Ok(())
    }

    /// Drops every planned or aliased assignment.
    pub fn reset_planned(&mut self) {
        for data in &mut self.data {
            if matches!(data, TensorData::Planned(_) | TensorData::Alias(_)) {
                *data = TensorData::Unassigned;
            }
        }
    }

    /// Resolved storage of a tensor, or `None` if it has none.
    pub fn address(&self, id: TensorId) -> Result<Option<TensorAddress>, GraphError> {
        let address = match self.data(id)? {
            TensorData::Unassigned => None,
            TensorData::External(_) => Some(TensorAddress::External(id)),
            TensorData::Planned(slot) => Some(TensorAddress::Planned(*slot)),
            TensorData::Alias(root) => match self.data(*root)? {
                TensorData::External(_) => Some(TensorAddress::External(*root)),
                _ => None,
            },
        };
        Ok(address)
    }

    /// Graph-owned bytes of a tensor, following an alias.
    pub fn external_data(&self, id: TensorId) -> Result<Option<&[u8]>, GraphError> {
        match self.address(id)? {
            Some(TensorAddress::External(root)) => match &self.data[root.0] {
                TensorData::External(bytes) => Ok(Some(bytes.as_slice())),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Borrows metadata and nodes immutably alongside mutable storage.
    pub fn split_data_mut(&mut self) -> (&[Tensor], &[Node], &mut [TensorData]) {
        (&self.tensors, &self.nodes, &mut self.data)
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        let constant_bytes: usize = self
            .data
            .iter()
            .zip(&self.tensors)
            .filter(|(_, t)| t.kind == TensorKind::Constant)
            .map(|(d, _)| match d {
                TensorData::External(b) => b.len(),
                _ => 0,
            })
            .sum();
        format!(
            "Graph '{}': {} nodes, {} tensors, {} inputs, {} outputs, {} constant bytes",
            self.name,
            self.nodes.len(),
            self.tensors.len(),
            self.input_nodes.len(),
            self.output_nodes.len(),
            constant_bytes,
        )
    }
}

impl<S: GraphState> fmt::Display for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph '{}' ({} nodes):", self.name, self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        for tensor in &self.tensors {
            writeln!(f, "  {}", tensor.summary())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// input → relu → softmax
    fn chain() -> (Graph<Building>, [TensorId; 3]) {
        let mut g = Graph::new("chain");
        let t0 = g.create_tensor("in", DType::F32);
        let t1 = g.create_tensor("mid", DType::F32);
        let t2 = g.create_tensor("out", DType::F32);
        g.set_tensor_kind(t0, TensorKind::Input).unwrap();
        g.set_tensor_shape(t0, &[1, 8]).unwrap();

        let n0 = g.create_node("in", OpKind::Input, 1);
        g.set_node_output(n0, 0, t0).unwrap();
        let n1 = g.create_node("relu", OpKind::Relu, 1);
        g.set_node_input(n1, 0, t0).unwrap();
        g.set_node_output(n1, 0, t1).unwrap();
        let n2 = g.create_node("softmax", OpKind::Softmax, 1);
        g.set_node_input(n2, 0, t1).unwrap();
        g.set_node_output(n2, 0, t2).unwrap();
        (g, [t0, t1, t2])
    }

    #[test]
    fn test_validate_ok() {
        let (g, [t0, t1, t2]) = chain();
        let v = g.validate().unwrap();
        assert_eq!(v.num_nodes(), 3);
        assert_eq!(v.tensor(t0).unwrap().consumer_count(), 1);
        assert_eq!(v.tensor(t1).unwrap().consumer_count(), 1);
        assert_eq!(v.tensor(t2).unwrap().consumer_count(), 0);
        assert_eq!(v.input_nodes(), &[NodeId(0)]);
        assert_eq!(v.output_nodes(), &[NodeId(2)]);
        assert_eq!(v.output_tensors(), vec![t2]);
    }

    #[test]
    fn test_validate_empty() {
        assert!(Graph::new("empty").validate().is_err());
    }

    #[test]
    fn test_validate_not_topological() {
        let mut g = Graph::new("bad");
        let a = g.create_tensor("a", DType::F32);
        let b = g.create_tensor("b", DType::F32);
        let n0 = g.create_node("first", OpKind::Relu, 1);
        g.set_node_input(n0, 0, b).unwrap();
        g.set_node_output(n0, 0, a).unwrap();
        let n1 = g.create_node("second", OpKind::Relu, 1);
        g.set_node_input(n1, 0, a).unwrap();
        g.set_node_output(n1, 0, b).unwrap();
        assert!(matches!(
            g.validate(),
            Err(GraphError::NotTopological { node: NodeId(0), .. })
        ));
    }

    #[test]
    fn test_constant_needs_data() {
        let mut g = Graph::new("c");
        let w = g.create_tensor("w", DType::F32);
        g.set_tensor_kind(w, TensorKind::Constant).unwrap();
        g.set_tensor_shape(w, &[2, 2]).unwrap();
        let n = g.create_node("w", OpKind::Const, 1);
        g.set_node_output(n, 0, w).unwrap();
        assert!(matches!(g.clone().validate(), Err(GraphError::InvalidTensor { .. })));

        g.set_tensor_data(w, vec![0u8; 15]).unwrap();
        assert!(g.clone().validate().is_err());
        g.set_tensor_data(w, vec![0u8; 16]).unwrap();
        assert!(g.validate().is_ok());
    }

    #[test]
    fn test_input_needs_shape() {
        let mut g = Graph::new("i");
        let t = g.create_tensor("x", DType::F32);
        g.set_tensor_kind(t, TensorKind::Input).unwrap();
        let n = g.create_node("x", OpKind::Input, 1);
        g.set_node_output(n, 0, t).unwrap();
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_multiple_producers() {
        let (mut g, [_, t1, _]) = chain();
        let n = g.create_node("dup", OpKind::Relu, 1);
        assert!(matches!(
            g.set_node_output(n, 0, t1),
            Err(GraphError::MultipleProducers { .. })
        ));
    }

    #[test]
    fn test_slot_gap() {
        let (mut g, [t0, ..]) = chain();
        let n = g.create_node("gap", OpKind::Relu, 1);
        assert!(matches!(
            g.set_node_input(n, 1, t0),
            Err(GraphError::SlotGap { slot: 1, len: 0, .. })
        ));
    }

    #[test]
    fn test_shared_input_counts_twice() {
        let (mut g, [t0, _, t2]) = chain();
        let n = g.create_node("side", OpKind::Relu, 1);
        let t3 = g.create_tensor("side", DType::F32);
        g.set_node_input(n, 0, t0).unwrap();
        g.set_node_output(n, 0, t3).unwrap();
        let v = g.validate().unwrap();
        assert_eq!(v.tensor(t0).unwrap().consumer_count(), 2);
        assert_eq!(v.output_tensors(), vec![t2, t3]);
    }

    #[test]
    fn test_set_input_data_size_checked() {
        let (g, [t0, t1, _]) = chain();
        let mut v = g.validate().unwrap();
        assert!(matches!(
            v.set_input_data(t0, vec![0; 4]),
            Err(GraphError::DataSize { expected: 32, .. })
        ));
        v.set_input_data(t0, vec![1; 32]).unwrap();
        assert_eq!(v.external_data(t0).unwrap().unwrap().len(), 32);
        assert!(v.set_input_data(t1, vec![0; 32]).is_err());
    }

    #[test]
    fn test_alias_resolution() {
        let (g, [t0, t1, t2]) = chain();
        let mut v = g.validate().unwrap();
        v.set_input_data(t0, vec![0; 32]).unwrap();

        v.assign_alias(t1, t0).unwrap();
        assert_eq!(v.data(t1).unwrap(), &TensorData::Alias(t0));
        assert_eq!(v.address(t1).unwrap(), v.address(t0).unwrap());

        let slot = PlannedSlot {
            block: 0,
            offset: 16,
            capacity: 32,
        };
        v.assign_planned(t2, slot).unwrap();
        assert_eq!(v.address(t2).unwrap(), Some(TensorAddress::Planned(slot)));

        v.reset_planned();
        assert!(v.data(t1).unwrap().is_unassigned());
        assert!(v.data(t2).unwrap().is_unassigned());
        assert!(v.data(t0).unwrap().is_external());
    }

    #[test]
    fn test_alias_of_pending_input() {
        let (g, [t0, t1, t2]) = chain();
        let mut v = g.validate().unwrap();
        v.assign_alias(t1, t0).unwrap();
        v.assign_alias(t2, t1).unwrap();
        assert_eq!(v.data(t2).unwrap(), &TensorData::Alias(t0));
        assert_eq!(v.address(t2).unwrap(), None);

        v.set_input_data(t0, vec![0; 32]).unwrap();
        assert_eq!(v.address(t2).unwrap(), Some(TensorAddress::External(t0)));
    }

    #[test]
    fn test_alias_of_unassigned_fails() {
        let (g, [_, t1, t2]) = chain();
        let mut v = g.validate().unwrap();
        assert!(v.assign_alias(t2, t1).is_err());
    }

    #[test]
    fn test_set_tensor_shape_reports_change() {
        let (g, [_, t1, _]) = chain();
        let mut v = g.validate().unwrap();
        assert!(v.set_tensor_shape(t1, Shape::matrix(1, 8)).unwrap());
        assert!(!v.set_tensor_shape(t1, Shape::matrix(1, 8)).unwrap());
    }

    #[test]
    fn test_display_and_summary() {
        let (g, _) = chain();
        let v = g.validate().unwrap();
        let text = v.to_string();
        assert!(text.contains("relu"));
        assert!(v.summary().contains("3 nodes"));
    }
}
