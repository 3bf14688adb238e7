// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! IR nodes.

use crate::{OpKind, OpParams, TensorId};
use std::fmt;

/// Handle to a node within its graph. Doubles as the node's position in
/// execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// An operator applied to ordered input tensors, writing ordered outputs.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) op: OpKind,
    pub(crate) version: u32,
    pub(crate) inputs: Vec<TensorId>,
    pub(crate) outputs: Vec<TensorId>,
    pub(crate) params: OpParams,
    pub(crate) dynamic_shape: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, op: OpKind, version: u32) -> Self {
        Self {
            id,
            name,
            op,
            version,
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: OpParams::default(),
            dynamic_shape: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }

    pub fn input(&self, slot: usize) -> Option<TensorId> {
        self.inputs.get(slot).copied()
    }

    pub fn output(&self, slot: usize) -> Option<TensorId> {
        self.outputs.get(slot).copied()
    }

    pub fn params(&self) -> &OpParams {
        &self.params
    }

    /// Whether output shapes must be re-inferred before every run.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic_shape
    }

    pub fn summary(&self) -> String {
        let list = |ids: &[TensorId]| {
            ids.iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{} '{}' {} v{} [{}] -> [{}]{}",
            self.id,
            self.name,
            self.op,
            self.version,
            list(&self.inputs),
            list(&self.outputs),
            if self.dynamic_shape { " (dynamic)" } else { "" }
        )
    }
}
