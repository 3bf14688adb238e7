// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for operator methods, registries and node implementations.

use model_ir::{GraphError, OpKind};
use tensor_core::DType;

/// Errors raised by operator methods and node-ops implementations.
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    /// A node has fewer tensors than the operator needs.
    #[error("{direction} slot {slot} is not connected")]
    MissingSlot {
        direction: &'static str,
        slot: usize,
    },

    /// A tensor the operator reads has no shape yet.
    #[error("tensor '{name}' has no shape")]
    Unshaped { name: String },

    /// An input and an output share storage where the kernel needs them apart.
    #[error("input slot {input} and output slot {output} share storage")]
    Aliased { input: usize, output: usize },

    /// A tensor's storage is smaller than its shape requires.
    #[error("tensor '{name}' needs {needed} bytes, storage holds {available}")]
    ShortBuffer {
        name: String,
        needed: usize,
        available: usize,
    },

    /// The kernel does not handle this element type.
    #[error("{op} does not support {dtype}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    /// Shape inference rejected the node's inputs or parameters.
    #[error("{op} shape inference: {detail}")]
    Shape { op: OpKind, detail: String },

    /// A parameter is missing or out of range.
    #[error("{op} parameter '{name}': {detail}")]
    Param {
        op: OpKind,
        name: &'static str,
        detail: String,
    },

    /// Implementation-private state is missing or of the wrong type.
    #[error("node state is missing or has an unexpected type")]
    State,

    /// Kernel-specific failure.
    #[error("{op}: {detail}")]
    Kernel { op: &'static str, detail: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}

/// Errors raised by the operator registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A method is already registered under this kind and version.
    #[error("operator {kind} v{version} is already registered")]
    Duplicate { kind: OpKind, version: u32 },

    /// No method is registered for the operator.
    #[error("no operator method for {kind} v{version}")]
    NotFound { kind: OpKind, version: u32 },

    /// Shape inference failed for a node.
    #[error("shape inference failed for node '{node}': {source}")]
    Inference {
        node: String,
        #[source]
        source: OpError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}
