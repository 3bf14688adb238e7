// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The node-ops interface implemented by device backends.
//!
//! # Lifecycle
//! ```text
//! compile:  score ─▶ init ─▶ (inplace_map, scratch_size) ─▶ prerun
//! run:      [reshape] ─▶ run ─▶ Continue | Stop
//! teardown: postrun ─▶ release
//! ```
//!
//! Implementations are shared between nodes and graphs; anything a bound
//! node needs to remember lives in its [`NodeState`].

use crate::{NodeContext, OpError};
use model_ir::{Graph, Node, Validated};
use std::any::Any;
use std::fmt;

/// Implementation-private state of one bound node.
pub type NodeState = Box<dyn Any + Send>;

// ── Score ──────────────────────────────────────────────────────────

/// Suitability of an implementation for a node. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(pub u32);

impl Score {
    /// Fixed-function or pre-compiled implementation.
    pub const STATIC: Score = Score(10_000);
    pub const BEST: Score = Score(8_000);
    pub const PREFER: Score = Score(6_000);
    pub const CAN_DO: Score = Score(4_000);
    /// Never chosen when an alternative exists.
    pub const NOT_SUPPORTED: Score = Score(2_000);

    pub fn is_supported(self) -> bool {
        self > Self::NOT_SUPPORTED
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Run status ─────────────────────────────────────────────────────

/// Result of a successful `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Proceed to the next node.
    Continue,
    /// Halt the graph without error; later nodes do not run this time.
    Stop,
}

// ── In-place declaration ───────────────────────────────────────────

/// Output `output` may share the storage of input `input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InplacePair {
    pub output: usize,
    pub input: usize,
}

// ── NodeOps trait ──────────────────────────────────────────────────

/// A device implementation of an operator.
///
/// Only [`name`](NodeOps::name), [`score`](NodeOps::score) and
/// [`run`](NodeOps::run) are required.
pub trait NodeOps: Send + Sync {
    /// Human-readable implementation name (e.g. `"cpu.relu"`).
    fn name(&self) -> &str;

    /// Suitability for `node`. Must be a pure function of its arguments.
    fn score(&self, node: &Node, graph: &Graph<Validated>) -> Score;

    /// Outputs that may reuse an input's storage.
    fn inplace_map(&self, _node: &Node) -> Vec<InplacePair> {
        Vec::new()
    }

    /// Bytes of shared scratch memory needed during `run`.
    fn scratch_size(&self, _node: &Node, _graph: &Graph<Validated>) -> usize {
        0
    }

    /// Creates the node's private state. Called once at compile time.
    fn init(&self, _node: &Node, _graph: &Graph<Validated>) -> Result<Option<NodeState>, OpError> {
        Ok(None)
    }

    /// Called once after storage is assigned, before the first run.
    fn prerun(&self, _ctx: &mut NodeContext<'_>) -> Result<(), OpError> {
        Ok(())
    }

    fn run(&self, ctx: &mut NodeContext<'_>) -> Result<NodeStatus, OpError>;

    /// Called before `run` when a dynamic node's shapes changed.
    fn reshape(&self, _ctx: &mut NodeContext<'_>) -> Result<(), OpError> {
        Ok(())
    }

    /// Called once when the execution graph is torn down.
    fn postrun(&self, _ctx: &mut NodeContext<'_>) -> Result<(), OpError> {
        Ok(())
    }

    /// Disposes of the private state.
    fn release(&self, state: Option<NodeState>) {
        drop(state);
    }
}
