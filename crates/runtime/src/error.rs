// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for compiling and running execution graphs.

use model_ir::{GraphError, NodeId, OpKind};
use op_registry::{OpError, RegistryError};
use std::fmt;

/// When a shape mismatch was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Run,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => f.write_str("compile"),
            Self::Run => f.write_str("run"),
        }
    }
}

/// Errors that can occur while compiling or running a graph.
///
/// None of these are swallowed. After a run-time failure the execution
/// graph should be recompiled before it is used again.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The arena could not back a block, or its lock was poisoned.
    #[error("allocation failed: {0}")]
    Allocation(#[from] arena_alloc::ArenaError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The device offers no usable implementation for a node.
    #[error("no implementation of {op} for node '{node}' on device '{device}'")]
    NoImplementation {
        node: String,
        op: OpKind,
        device: String,
    },

    /// The engine has no device of that name.
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    /// A bound node's `init` hook failed.
    #[error("init failed for node '{node}': {source}")]
    NodeInit {
        node: String,
        #[source]
        source: OpError,
    },

    /// A bound node's `prerun` hook failed.
    #[error("prerun failed for node '{node}': {source}")]
    NodePrerun {
        node: String,
        #[source]
        source: OpError,
    },

    /// A bound node failed during `run` or `reshape`.
    #[error("node {node_index} ('{node}') failed: {source}")]
    NodeFailed {
        node_index: NodeId,
        node: String,
        #[source]
        source: OpError,
    },

    /// A node's tensors could not be mapped to storage during `run`.
    #[error("node {node_index} ('{node}') has no usable storage: {source}")]
    NodeStorage {
        node_index: NodeId,
        node: String,
        #[source]
        source: Box<RuntimeError>,
    },

    /// An inferred shape is incompatible with the declared or planned one.
    #[error("shape mismatch at node {node_index} ('{node}') during {phase}: {detail}")]
    ShapeMismatch {
        node_index: NodeId,
        node: String,
        detail: String,
        phase: Phase,
    },

    /// A tensor a node reads or writes has no storage.
    #[error("tensor '{tensor}' has no data")]
    MissingData { tensor: String },

    /// Planned storage does not match the graph it was planned for.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RuntimeError {
    /// Whether the error aborted a compile rather than a run.
    pub fn is_compile_failure(&self) -> bool {
        match self {
            Self::NoImplementation { .. }
            | Self::UnknownDevice(_)
            | Self::NodeInit { .. }
            | Self::NodePrerun { .. }
            | Self::Registry(_) => true,
            Self::ShapeMismatch { phase, .. } => *phase == Phase::Compile,
            _ => false,
        }
    }

    /// The graph node a run-time or shape failure is attributed to.
    pub fn node_index(&self) -> Option<NodeId> {
        match self {
            Self::NodeFailed { node_index, .. }
            | Self::NodeStorage { node_index, .. }
            | Self::ShapeMismatch { node_index, .. } => Some(*node_index),
            _ => None,
        }
    }
}
