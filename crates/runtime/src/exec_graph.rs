// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compiled execution graph and its runner.
//!
//! ```text
//! ExecutionGraph<'g>
//!   ├── &'g mut Graph<Validated>   tensor shapes and data
//!   ├── [BoundNode]                node + NodeOps + private state
//!   ├── MemoryPlan                 block decisions
//!   └── Storage                    arena blocks + shared scratch
//!
//! run():  for each bound node, in order
//!           dynamic? ─▶ re-infer shapes (must fit the planned capacity)
//!           [reshape] ─▶ run ─▶ Continue ─▶ next
//!                              Stop     ─▶ RunOutcome::Suspended
//! ```
//!
//! The execution graph holds the IR graph mutably for its whole life, so
//! the graph cannot be rewired underneath a compiled plan. Dropping it runs
//! the `postrun` and `release` hooks, returns every block to the arena and
//! clears the planned tensor addresses.

use crate::planner::{MemoryPlan, PlanRequest};
use crate::storage::{self, Storage};
use crate::error::{Phase, RuntimeError};
use crate::metrics::{NodeMetrics, RunMetrics};
use arena_alloc::Arena;
use model_ir::{Graph, GraphError, NodeId, OpKind, TensorId, TensorKind, Validated};
use op_registry::{Device, InplacePair, NodeOps, NodeState, NodeStatus, OpRegistry, Score};
use std::sync::Arc;
use std::time::Instant;
use tensor_core::Shape;

// ── Bound nodes ────────────────────────────────────────────────────

/// A graph node paired with the implementation chosen for it.
pub struct BoundNode {
    pub(crate) node: NodeId,
    pub(crate) name: String,
    pub(crate) op: OpKind,
    pub(crate) ops: Arc<dyn NodeOps>,
    pub(crate) score: Score,
    pub(crate) state: Option<NodeState>,
    pub(crate) inplace: Vec<InplacePair>,
    pub(crate) scratch: usize,
}

impl BoundNode {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    /// Name of the selected implementation.
    pub fn implementation(&self) -> &str {
        self.ops.name()
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn inplace_map(&self) -> &[InplacePair] {
        &self.inplace
    }

    pub fn scratch_size(&self) -> usize {
        self.scratch
    }
}

impl std::fmt::Debug for BoundNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundNode")
            .field("node", &self.node)
            .field("name", &self.name)
            .field("implementation", &self.ops.name())
            .field("score", &self.score)
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

/// How a successful `run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every bound node ran.
    Completed,
    /// A node asked to stop; later nodes did not run this time.
    Suspended { node_index: NodeId },
}

impl RunOutcome {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

// ── Execution graph ────────────────────────────────────────────────

/// A graph bound to one device, with storage assigned to every tensor.
pub struct ExecutionGraph<'g> {
    graph: &'g mut Graph<Validated>,
    registry: OpRegistry,
    device: String,
    nodes: Vec<BoundNode>,
    plan: MemoryPlan,
    storage: Storage,
    num_threads: usize,
    profiling: bool,
    last_metrics: Option<RunMetrics>,
    prepared: bool,
    finished: bool,
}

impl<'g> ExecutionGraph<'g> {
    pub(crate) fn new(
        graph: &'g mut Graph<Validated>,
        registry: OpRegistry,
        arena: &Arena,
        device: &str,
        num_threads: usize,
        profiling: bool,
    ) -> Self {
        Self {
            graph,
            registry,
            device: device.to_string(),
            nodes: Vec::new(),
            plan: MemoryPlan::empty(1),
            storage: Storage::empty(arena),
            num_threads,
            profiling,
            last_metrics: None,
            prepared: false,
            finished: false,
        }
    }

    /// Selects and initialises an implementation for every non-source node.
    pub(crate) fn bind(&mut self, device: &Device) -> Result<(), RuntimeError> {
        let graph: &Graph<Validated> = self.graph;
        for node in graph.nodes() {
            if node.op().is_source() {
                continue;
            }
            let selection = device.select(node, graph).ok_or_else(|| {
                tracing::error!(node = %node.name(), op = %node.op(), device = %device.name(), "no implementation");
                RuntimeError::NoImplementation {
                    node: node.name().to_string(),
                    op: node.op(),
                    device: device.name().to_string(),
                }
            })?;
            let state = selection.ops.init(node, graph).map_err(|source| {
                tracing::error!(node = %node.name(), error = %source, "node init failed");
                RuntimeError::NodeInit {
                    node: node.name().to_string(),
                    source,
                }
            })?;
            tracing::debug!(
                node = %node.name(),
                implementation = selection.ops.name(),
                score = %selection.score,
                "node bound"
            );
            self.nodes.push(BoundNode {
                node: node.id(),
                name: node.name().to_string(),
                op: node.op(),
                inplace: selection.ops.inplace_map(node),
                scratch: selection.ops.scratch_size(node, graph),
                ops: selection.ops,
                score: selection.score,
                state,
            });
        }
        Ok(())
    }

    /// Plans, allocates and assigns storage for every bound output.
    pub(crate) fn plan_memory(&mut self, align: usize) -> Result<(), RuntimeError> {
        let requests: Vec<PlanRequest<'_>> = self
            .nodes
            .iter()
            .map(|bound| PlanRequest {
                node: bound.node,
                inplace: &bound.inplace,
                scratch: bound.scratch,
            })
            .collect();
        let plan = MemoryPlan::build(self.graph, &requests, align)?;
        let storage = Storage::allocate(self.storage.arena(), &plan)?;
        storage.assign(&plan, self.graph)?;
        plan.dump();
        self.plan = plan;
        self.storage = storage;
        Ok(())
    }

    /// Runs every `prerun` hook in node order.
    pub(crate) fn prerun(&mut self) -> Result<(), RuntimeError> {
        for bound in &mut self.nodes {
            self.storage
                .invoke(self.graph, bound, false, self.num_threads, |ops, ctx| ops.prerun(ctx))?
                .map_err(|source| {
                    tracing::error!(node = %bound.name, error = %source, "node prerun failed");
                    RuntimeError::NodePrerun {
                        node: bound.name.clone(),
                        source,
                    }
                })?;
        }
        self.prepared = true;
        Ok(())
    }

    /// Executes the bound nodes once, in order.
    ///
    /// Stops early with [`RunOutcome::Suspended`] when a node returns
    /// [`NodeStatus::Stop`]. A failed run leaves the graph in an
    /// unspecified state; recompile before running it again.
    pub fn run(&mut self) -> Result<RunOutcome, RuntimeError> {
        let started = Instant::now();
        let mut metrics = RunMetrics::new(self.nodes.len());
        let mut outcome = RunOutcome::Completed;

        for index in 0..self.nodes.len() {
            let node_started = Instant::now();
            let (reinferred, reshape) = self.refresh_shapes(index)?;

            let bound = &mut self.nodes[index];
            let status = self
                .storage
                .invoke(self.graph, bound, true, self.num_threads, |ops, ctx| {
                    if reshape {
                        ops.reshape(ctx)?;
                    }
                    ops.run(ctx)
                })
                .map_err(|source| {
                    tracing::error!(node = %bound.name, index = %bound.node, error = %source, "node storage unavailable");
                    RuntimeError::NodeStorage {
                        node_index: bound.node,
                        node: bound.name.clone(),
                        source: Box::new(source),
                    }
                })?
                .map_err(|source| {
                    tracing::error!(node = %bound.name, index = %bound.node, error = %source, "node run failed");
                    RuntimeError::NodeFailed {
                        node_index: bound.node,
                        node: bound.name.clone(),
                        source,
                    }
                })?;

            if self.profiling {
                metrics.record_node(NodeMetrics {
                    node: bound.node,
                    name: bound.name.clone(),
                    op: bound.op,
                    implementation: bound.ops.name().to_string(),
                    duration: node_started.elapsed(),
                    reinferred,
                });
            }
            if status == NodeStatus::Stop {
                tracing::debug!(node = %bound.name, "run suspended");
                outcome = RunOutcome::Suspended {
                    node_index: bound.node,
                };
                break;
            }
        }

        if self.profiling {
            let suspended_at = match outcome {
                RunOutcome::Suspended { node_index } => Some(node_index),
                RunOutcome::Completed => None,
            };
            metrics.finalise(started.elapsed(), suspended_at);
            tracing::debug!("{}", metrics.summary());
            self.last_metrics = Some(metrics);
        }
        Ok(outcome)
    }

    /// Re-infers a dynamic node's output shapes before it runs.
    ///
    /// Returns whether inference ran and whether any shape changed. A
    /// failed inference keeps the previous shapes; a shape that no longer
    /// fits its planned storage aborts the run.
    fn refresh_shapes(&mut self, index: usize) -> Result<(bool, bool), RuntimeError> {
        let id = self.nodes[index].node;
        if !self.graph.node(id)?.is_dynamic() {
            return Ok((false, false));
        }
        let shapes = match self.registry.infer_outputs(self.graph, id) {
            Ok(shapes) => shapes,
            Err(e) => {
                tracing::warn!(node = %self.nodes[index].name, error = %e, "shape inference failed, keeping previous shapes");
                return Ok((true, false));
            }
        };

        let mut updates: Vec<(TensorId, Shape)> = Vec::with_capacity(shapes.len());
        for (tensor, shape) in shapes {
            let t = self.graph.tensor(tensor)?;
            let needed = shape.size_bytes(t.dtype());
            let available = storage::capacity(self.graph, tensor)?;
            if needed > available {
                let detail = format!(
                    "tensor '{}' now needs {needed} bytes, its storage holds {available}",
                    t.name()
                );
                tracing::error!(node = %self.nodes[index].name, "{detail}");
                return Err(RuntimeError::ShapeMismatch {
                    node_index: id,
                    node: self.nodes[index].name.clone(),
                    detail,
                    phase: Phase::Run,
                });
            }
            updates.push((tensor, shape));
        }

        let mut changed = false;
        for (tensor, shape) in updates {
            changed |= self.graph.set_tensor_shape(tensor, shape)?;
        }
        Ok((true, changed))
    }

    /// Runs every `postrun` hook once. Failures are logged, not returned.
    pub fn postrun(&mut self) {
        if !self.prepared || self.finished {
            return;
        }
        for bound in &mut self.nodes {
            let result = self
                .storage
                .invoke(self.graph, bound, false, self.num_threads, |ops, ctx| ops.postrun(ctx));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(node = %bound.name, error = %e, "postrun failed"),
                Err(e) => tracing::warn!(node = %bound.name, error = %e, "postrun skipped"),
            }
        }
        self.finished = true;
    }

    // ── Data access ────────────────────────────────────────────────

    /// Supplies the bytes of an input tensor.
    pub fn set_input(&mut self, tensor: TensorId, bytes: Vec<u8>) -> Result<(), RuntimeError> {
        self.graph.set_input_data(tensor, bytes)?;
        Ok(())
    }

    /// Supplies an `f32` input tensor.
    pub fn set_input_f32(&mut self, tensor: TensorId, values: &[f32]) -> Result<(), RuntimeError> {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.set_input(tensor, bytes)
    }

    /// Changes the shape of an input tensor between runs.
    ///
    /// Supply matching data with [`set_input`](Self::set_input) afterwards.
    /// Nodes marked dynamic re-infer their outputs on the next run; the new
    /// outputs must still fit the storage planned at compile time.
    pub fn resize_input(&mut self, tensor: TensorId, shape: Shape) -> Result<bool, RuntimeError> {
        let t = self.graph.tensor(tensor)?;
        if t.kind() != TensorKind::Input {
            return Err(GraphError::InvalidTensor {
                name: t.name().to_string(),
                detail: "only input tensors can be resized".into(),
            }
            .into());
        }
        Ok(self.graph.set_tensor_shape(tensor, shape)?)
    }

    /// Copies the current bytes of any tensor.
    pub fn tensor_bytes(&self, tensor: TensorId) -> Result<Vec<u8>, RuntimeError> {
        self.storage.read(self.graph, tensor)
    }

    /// Copies an `f32` tensor.
    pub fn tensor_f32(&self, tensor: TensorId) -> Result<Vec<f32>, RuntimeError> {
        let bytes = self.tensor_bytes(tensor)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn graph(&self) -> &Graph<Validated> {
        self.graph
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Bound nodes in execution order.
    pub fn bound_nodes(&self) -> &[BoundNode] {
        &self.nodes
    }

    pub fn plan(&self) -> &MemoryPlan {
        &self.plan
    }

    /// Metrics of the most recent run, when profiling is enabled.
    pub fn last_metrics(&self) -> Option<&RunMetrics> {
        self.last_metrics.as_ref()
    }

    /// Returns a summary string describing the execution graph.
    pub fn summary(&self) -> String {
        format!(
            "ExecutionGraph '{}' on '{}': {} bound nodes, {} blocks ({} slots), {} bytes planned, {} bytes scratch",
            self.graph.name(),
            self.device,
            self.nodes.len(),
            self.plan.num_blocks(),
            self.storage.slots().len(),
            self.plan.total_bytes(),
            self.plan.scratch_size(),
        )
    }
}

impl Drop for ExecutionGraph<'_> {
    fn drop(&mut self) {
        self.postrun();
        for bound in self.nodes.drain(..) {
            bound.ops.release(bound.state);
        }
        self.graph.reset_planned();
        tracing::debug!(graph = %self.graph.name(), "execution graph released");
    }
}

impl std::fmt::Debug for ExecutionGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGraph")
            .field("graph", &self.graph.name())
            .field("device", &self.device)
            .field("nodes", &self.nodes)
            .field("storage", &self.storage)
            .finish()
    }
}
