// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! IR tensors: metadata plus a description of where the data lives.
//!
//! The graph owns every [`Tensor`] and, in a parallel table, its
//! [`TensorData`]. Input and constant data is owned by the graph as
//! [`TensorData::External`]; variable tensors get a [`TensorData::Planned`]
//! slot from the memory planner at compile time, or a [`TensorData::Alias`]
//! when they reuse an external tensor's storage in place.

use crate::NodeId;
use std::fmt;
use tensor_core::{DType, QuantParams, Shape};

/// Handle to a tensor within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct TensorId(pub usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Role of a tensor in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorKind {
    /// Supplied by the caller before each run.
    Input,
    /// Ships with the graph (weights, biases).
    Constant,
    /// Produced by a node; storage is planned.
    Variable,
}

/// A slot in the memory planner's block pool.
///
/// `block` indexes the execution graph's blocks; `offset` and `capacity`
/// locate the tensor inside that block's backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PlannedSlot {
    pub block: usize,
    pub offset: usize,
    pub capacity: usize,
}

/// Where a tensor's bytes live.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TensorData {
    /// No storage yet.
    #[default]
    Unassigned,
    /// Owned by the graph (inputs, constants, persistent buffers).
    External(Vec<u8>),
    /// Assigned by the memory planner.
    Planned(PlannedSlot),
    /// Shares the storage of another tensor whose data is external.
    Alias(TensorId),
}

impl TensorData {
    pub fn is_unassigned(&self) -> bool {
        matches!(self, Self::Unassigned)
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

/// Resolved storage identity. Two tensors share storage exactly when their
/// addresses compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorAddress {
    /// The external buffer owned by this tensor.
    External(TensorId),
    /// A slot in the planner's block pool.
    Planned(PlannedSlot),
}

/// A tensor in the IR graph.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub(crate) id: TensorId,
    pub(crate) name: String,
    pub(crate) dtype: DType,
    pub(crate) shape: Option<Shape>,
    pub(crate) kind: TensorKind,
    pub(crate) quant: Option<QuantParams>,
    pub(crate) producer: Option<NodeId>,
    pub(crate) consumers: Vec<NodeId>,
}

impl Tensor {
    pub(crate) fn new(id: TensorId, name: String, dtype: DType) -> Self {
        Self {
            id,
            name,
            dtype,
            shape: None,
            kind: TensorKind::Variable,
            quant: None,
            producer: None,
            consumers: Vec::new(),
        }
    }

    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The shape, or `None` until it is set or inferred.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    pub fn kind(&self) -> TensorKind {
        self.kind
    }

    pub fn quant(&self) -> Option<&QuantParams> {
        self.quant.as_ref()
    }

    /// The node that writes this tensor, if any.
    pub fn producer(&self) -> Option<NodeId> {
        self.producer
    }

    /// Nodes that read this tensor, one entry per input slot.
    pub fn consumers(&self) -> &[NodeId] {
        &self.consumers
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Element count; zero while unshaped.
    pub fn elem_num(&self) -> usize {
        self.shape.as_ref().map_or(0, Shape::num_elements)
    }

    /// `elem_num * element size`.
    pub fn byte_size(&self) -> usize {
        self.elem_num() * self.dtype.size_bytes()
    }

    /// One-line description.
    pub fn summary(&self) -> String {
        let shape = self
            .shape
            .as_ref()
            .map_or_else(|| "?".to_string(), |s| s.to_string());
        format!(
            "{} '{}' {:?} {} {} ({} consumers)",
            self.id,
            self.name,
            self.kind,
            self.dtype,
            shape,
            self.consumers.len()
        )
    }
}
