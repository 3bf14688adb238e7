// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The engine context and the execution-graph compiler.
//!
//! ```text
//! Engine { config, arena, registry, devices }
//!     │  .compile(&mut graph, "cpu")
//!     ▼
//!   infer shapes ─▶ bind nodes ─▶ plan memory ─▶ prerun
//!     │
//!     ▼
//! ExecutionGraph<'g>   ── .run() ─▶ RunOutcome
//! ```
//!
//! The engine owns everything a compile needs, so several engines can live
//! side by side without sharing any state.

use crate::exec_graph::ExecutionGraph;
use crate::{Phase, RuntimeConfig, RuntimeError};
use arena_alloc::Arena;
use model_ir::{Graph, TensorKind, Validated};
use op_registry::{Device, OpRegistry};

// ── Engine ─────────────────────────────────────────────────────────

/// Configuration, arena, operator registry and devices.
///
/// # Example
/// ```no_run
/// use runtime::{Engine, RuntimeConfig};
///
/// # fn example(graph: &mut model_ir::Graph<model_ir::Validated>) -> Result<(), runtime::RuntimeError> {
/// let engine = Engine::new(RuntimeConfig::default())?;
/// let mut exec = engine.compile(graph, "cpu")?;
/// let outcome = exec.run()?;
/// println!("{outcome:?}");
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    config: RuntimeConfig,
    arena: Arena,
    registry: OpRegistry,
    devices: Vec<Device>,
}

impl Engine {
    /// Creates an engine with the built-in operator methods and the CPU device.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let arena = if config.use_arena {
            let budget = config.parse_budget()?;
            tracing::info!("arena budget: {budget}");
            Arena::new(budget, config.arena_config()?)?
        } else {
            tracing::info!("arena disabled, using the system allocator");
            Arena::system()?
        };
        Self::with_arena(config, arena)
    }

    /// Creates an engine on an existing arena.
    pub fn with_arena(config: RuntimeConfig, arena: Arena) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self {
            config,
            arena,
            registry: OpRegistry::with_builtins(),
            devices: vec![Device::cpu()],
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut OpRegistry {
        &mut self.registry
    }

    /// Adds a device, replacing any device with the same name.
    pub fn add_device(&mut self, device: Device) {
        self.devices.retain(|d| d.name() != device.name());
        tracing::debug!(device = %device.name(), "device added");
        self.devices.push(device);
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    // ── Compile ────────────────────────────────────────────────────

    /// Infers the output shape of every operator node, in node order.
    ///
    /// A declared output shape must keep its element count. Nodes whose
    /// operator method is dynamic are marked so the runner re-infers them.
    pub fn infer_shapes(&self, graph: &mut Graph<Validated>) -> Result<(), RuntimeError> {
        self.registry.mark_dynamic(graph)?;

        for index in 0..graph.num_nodes() {
            let node = &graph.nodes()[index];
            if node.op().is_source() {
                continue;
            }
            let (id, name) = (node.id(), node.name().to_string());
            for (tensor, shape) in self.registry.infer_outputs(graph, id)? {
                let t = graph.tensor(tensor)?;
                if let Some(declared) = t.shape() {
                    if declared.num_elements() != shape.num_elements() {
                        let detail = format!(
                            "tensor '{}' is declared {declared}, inferred {shape}",
                            t.name()
                        );
                        tracing::error!(node = %name, "{detail}");
                        return Err(RuntimeError::ShapeMismatch {
                            node_index: id,
                            node: name,
                            detail,
                            phase: Phase::Compile,
                        });
                    }
                }
                graph.set_tensor_shape(tensor, shape)?;
            }
        }

        let unshaped = graph.tensors().iter().find_map(|t| match t.producer() {
            Some(producer) if t.kind() == TensorKind::Variable && t.shape().is_none() => {
                Some((producer, t.name().to_string()))
            }
            _ => None,
        });
        if let Some((producer, tensor)) = unshaped {
            let node = graph.node(producer)?.name().to_string();
            let detail = format!("tensor '{tensor}' has no shape after inference");
            tracing::error!(node = %node, "{detail}");
            return Err(RuntimeError::ShapeMismatch {
                node_index: producer,
                node,
                detail,
                phase: Phase::Compile,
            });
        }
        Ok(())
    }

    /// Compiles `graph` for the named device.
    pub fn compile<'g>(
        &self,
        graph: &'g mut Graph<Validated>,
        device: &str,
    ) -> Result<ExecutionGraph<'g>, RuntimeError> {
        let device = self
            .device(device)
            .ok_or_else(|| RuntimeError::UnknownDevice(device.to_string()))?;
        self.compile_on(graph, device)
    }

    /// Compiles `graph` for `device`.
    ///
    /// A failure releases everything bound so far; no partial execution
    /// graph survives. Any storage a previous compile assigned is cleared
    /// first.
    pub fn compile_on<'g>(
        &self,
        graph: &'g mut Graph<Validated>,
        device: &Device,
    ) -> Result<ExecutionGraph<'g>, RuntimeError> {
        graph.reset_planned();
        self.infer_shapes(graph)?;

        let mut exec = ExecutionGraph::new(
            graph,
            self.registry.clone(),
            &self.arena,
            device.name(),
            self.config.resolve_threads(),
            self.config.enable_profiling,
        );
        exec.bind(device)?;
        exec.plan_memory(self.config.block_align)?;
        exec.prerun()?;

        tracing::info!("{}", exec.summary());
        Ok(exec)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("devices", &self.devices)
            .finish()
    }
}
