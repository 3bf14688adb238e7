// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Compiles validated graphs into execution graphs and runs them.
//!
//! The runtime takes:
//! - A validated `Graph` from `model-ir`.
//! - A `Device` and the `OpRegistry` from `op-registry`.
//! - An `Arena` from `arena-alloc`.
//!
//! ```text
//! Graph<Validated> ──▶ Engine::compile ──▶ ExecutionGraph ──▶ run() ─┐
//!                       │ infer shapes                        ▲      │
//!                       │ bind nodes (Device::select)         └──────┘
//!                       │ MemoryPlan (blocks + in-place aliases)
//!                       │ Storage (arena blocks + shared scratch)
//!                       └ prerun hooks
//! ```
//!
//! # Single stream
//! One `run` call executes the whole graph on the calling thread. Nodes
//! never overlap, which is what lets every node share one scratch buffer.
//! Feeding the graph from another thread goes through an external queue.

mod config;
mod engine;
mod error;
mod exec_graph;
mod metrics;
pub mod planner;
mod storage;

pub use config::RuntimeConfig;
pub use engine::Engine;
pub use error::{Phase, RuntimeError};
pub use exec_graph::{BoundNode, ExecutionGraph, RunOutcome};
pub use metrics::{NodeMetrics, RunMetrics};
pub use planner::{
    BlockAssignment, BlockPool, MemoryBlock, MemoryPlan, NodePlan, OutputPlan, PlanRequest,
};
