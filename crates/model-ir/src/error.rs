// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction, validation and loading.

use crate::{NodeId, TensorId};

/// Errors that can occur when building, validating or loading a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The manifest or weights file could not be read.
    #[error("failed to read graph file: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    /// A shape, dtype or quantisation value was rejected.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),

    /// A tensor handle does not belong to this graph.
    #[error("unknown tensor {0}")]
    UnknownTensor(TensorId),

    /// A node handle does not belong to this graph.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A name used by the manifest does not resolve.
    #[error("unknown {what} '{name}'")]
    UnknownName { what: &'static str, name: String },

    /// Slots must be filled in order without gaps.
    #[error("node {node}: {direction} slot {slot} skips past {len} filled slots")]
    SlotGap {
        node: NodeId,
        direction: &'static str,
        slot: usize,
        len: usize,
    },

    /// A tensor is already the output of another node.
    #[error("tensor {tensor} already produced by node {producer}")]
    MultipleProducers { tensor: TensorId, producer: NodeId },

    /// A node reads a tensor that is not available at that point.
    #[error("node {node} reads tensor {tensor} before it is produced")]
    NotTopological { node: NodeId, tensor: TensorId },

    /// A tensor is missing required metadata or data.
    #[error("tensor '{name}': {detail}")]
    InvalidTensor { name: String, detail: String },

    /// A node definition is invalid.
    #[error("node '{name}': {detail}")]
    InvalidNode { name: String, detail: String },

    /// Graph-level inconsistency.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Supplied data does not match the tensor's byte size.
    #[error("tensor {tensor}: expected {expected} bytes, got {actual}")]
    DataSize {
        tensor: TensorId,
        expected: usize,
        actual: usize,
    },
}
