// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The operator registry: `(kind, version)` → [`OpMethod`].
//!
//! The registry is an explicit value rather than process-wide state, so
//! independent engines (and tests) can carry different operator sets.

use crate::method::{builtin_methods, ShapeQuery};
use crate::{OpMethod, RegistryError};
use model_ir::{Building, Graph, NodeId, OpKind, TensorId, Validated};
use std::collections::BTreeMap;
use std::sync::Arc;
use tensor_core::Shape;

/// Table of operator methods.
#[derive(Clone, Default)]
pub struct OpRegistry {
    methods: BTreeMap<(OpKind, u32), Arc<dyn OpMethod>>,
}

impl OpRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in operator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for method in builtin_methods() {
            let key = (method.kind(), method.version());
            registry.methods.insert(key, method);
        }
        registry
    }

    /// Registers a method under its kind and version.
    pub fn register(&mut self, method: Arc<dyn OpMethod>) -> Result<(), RegistryError> {
        let (kind, version) = (method.kind(), method.version());
        if self.methods.contains_key(&(kind, version)) {
            return Err(RegistryError::Duplicate { kind, version });
        }
        tracing::debug!(op = %kind, version, "registered operator method");
        self.methods.insert((kind, version), method);
        Ok(())
    }

    /// Removes and returns a method.
    pub fn unregister(&mut self, kind: OpKind, version: u32) -> Option<Arc<dyn OpMethod>> {
        self.methods.remove(&(kind, version))
    }

    /// The method for `kind` with the highest version not above `version`.
    pub fn find(&self, kind: OpKind, version: u32) -> Option<&Arc<dyn OpMethod>> {
        self.methods
            .range((kind, 0)..=(kind, version))
            .next_back()
            .map(|(_, method)| method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered `(kind, version)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (OpKind, u32)> + '_ {
        self.methods.keys().copied()
    }

    fn method(&self, kind: OpKind, version: u32) -> Result<&Arc<dyn OpMethod>, RegistryError> {
        self.find(kind, version)
            .ok_or(RegistryError::NotFound { kind, version })
    }

    /// Creates a node whose parameters are the method's defaults.
    pub fn create_node(
        &self,
        graph: &mut Graph<Building>,
        name: impl Into<String>,
        kind: OpKind,
        version: u32,
    ) -> Result<NodeId, RegistryError> {
        let method = self.method(kind, version)?;
        let id = graph.create_node(name, kind, version);
        graph.set_node_params(id, method.create_param())?;
        if method.is_dynamic() {
            graph.set_node_dynamic(id, true)?;
        }
        Ok(id)
    }

    /// Output shapes of one node, without applying them.
    pub fn infer_outputs(
        &self,
        graph: &Graph<Validated>,
        node: NodeId,
    ) -> Result<Vec<(TensorId, Shape)>, RegistryError> {
        let n = graph.node(node)?;
        let method = self.method(n.op(), n.version())?;
        let query = ShapeQuery::new(n, graph, &method.create_param())?;
        let inference = |source| RegistryError::Inference {
            node: n.name().to_string(),
            source,
        };

        let shapes = method.infer_shape(&query).map_err(inference)?;
        if shapes.len() != n.outputs().len() {
            return Err(inference(crate::OpError::Shape {
                op: n.op(),
                detail: format!(
                    "{} shapes inferred for {} outputs",
                    shapes.len(),
                    n.outputs().len()
                ),
            }));
        }
        Ok(n.outputs().iter().copied().zip(shapes).collect())
    }

    /// Re-infers one node's output shapes. Returns whether any changed.
    pub fn infer_shape(&self, graph: &mut Graph<Validated>, node: NodeId) -> Result<bool, RegistryError> {
        let mut changed = false;
        for (tensor, shape) in self.infer_outputs(graph, node)? {
            changed |= graph.set_tensor_shape(tensor, shape)?;
        }
        Ok(changed)
    }

    /// Marks nodes whose method is dynamic.
    pub fn mark_dynamic(&self, graph: &mut Graph<Validated>) -> Result<(), RegistryError> {
        let dynamic: Vec<NodeId> = graph
            .nodes()
            .iter()
            .filter(|n| self.find(n.op(), n.version()).is_some_and(|m| m.is_dynamic()))
            .map(|n| n.id())
            .collect();
        for id in dynamic {
            graph.set_node_dynamic(id, true)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.methods.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::ElementwiseMethod;
    use crate::{OpError, ShapeQuery};
    use model_ir::{OpParams, TensorKind};
    use tensor_core::DType;

    struct Doubling;

    impl OpMethod for Doubling {
        fn kind(&self) -> OpKind {
            OpKind::Generic
        }
        fn version(&self) -> u32 {
            2
        }
        fn create_param(&self) -> OpParams {
            OpParams::new().with("factor", 2usize)
        }
        fn infer_shape(&self, q: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
            let input = q.input_shape(0)?;
            let factor = q.required_param("factor")?;
            Ok(vec![Shape::vector(input.num_elements() * factor)])
        }
        fn is_dynamic(&self) -> bool {
            true
        }
    }

    fn chain(registry: &OpRegistry, version: u32) -> Graph<Validated> {
        let mut g = Graph::new("reg");
        let x = g.create_tensor("x", DType::F32);
        g.set_tensor_kind(x, TensorKind::Input).unwrap();
        g.set_tensor_shape(x, &[3]).unwrap();
        let y = g.create_tensor("y", DType::F32);
        let input = registry.create_node(&mut g, "x", OpKind::Input, 1).unwrap();
        g.set_node_output(input, 0, x).unwrap();
        let op = registry.create_node(&mut g, "op", OpKind::Generic, version).unwrap();
        g.set_node_input(op, 0, x).unwrap();
        g.set_node_output(op, 0, y).unwrap();
        g.validate().unwrap()
    }

    #[test]
    fn test_builtins_cover_every_kind() {
        let registry = OpRegistry::with_builtins();
        for kind in OpKind::ALL {
            assert!(registry.find(kind, 1).is_some(), "{kind} missing");
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = OpRegistry::with_builtins();
        let err = registry.register(Arc::new(ElementwiseMethod(OpKind::Relu)));
        assert!(matches!(err, Err(RegistryError::Duplicate { kind: OpKind::Relu, version: 1 })));
    }

    #[test]
    fn test_find_falls_back_to_older_version() {
        let mut registry = OpRegistry::with_builtins();
        registry.register(Arc::new(Doubling)).unwrap();
        assert_eq!(registry.find(OpKind::Generic, 1).map(|m| m.version()), Some(1));
        assert_eq!(registry.find(OpKind::Generic, 2).map(|m| m.version()), Some(2));
        assert_eq!(registry.find(OpKind::Generic, 9).map(|m| m.version()), Some(2));
        assert!(registry.find(OpKind::Generic, 0).is_none());
    }

    #[test]
    fn test_unregister() {
        let mut registry = OpRegistry::with_builtins();
        let before = registry.len();
        assert!(registry.unregister(OpKind::Move, 1).is_some());
        assert_eq!(registry.len(), before - 1);
        assert!(registry.find(OpKind::Move, 1).is_none());
        assert!(registry.unregister(OpKind::Move, 1).is_none());
    }

    #[test]
    fn test_create_node_uses_defaults() {
        let mut registry = OpRegistry::with_builtins();
        registry.register(Arc::new(Doubling)).unwrap();
        let g = chain(&registry, 2);
        let op = g.node(NodeId(1)).unwrap();
        assert_eq!(op.params().get_usize("factor"), Some(2));
        assert!(op.is_dynamic());
    }

    #[test]
    fn test_create_node_unknown() {
        let registry = OpRegistry::new();
        let mut g = Graph::new("empty");
        assert!(matches!(
            registry.create_node(&mut g, "n", OpKind::Conv, 1),
            Err(RegistryError::NotFound { kind: OpKind::Conv, version: 1 })
        ));
    }

    #[test]
    fn test_infer_shape_applies_once() {
        let mut registry = OpRegistry::with_builtins();
        registry.register(Arc::new(Doubling)).unwrap();
        let mut g = chain(&registry, 2);
        let y = g.find_tensor("y").unwrap();

        assert!(registry.infer_shape(&mut g, NodeId(1)).unwrap());
        assert_eq!(g.tensor(y).unwrap().shape(), Some(&Shape::vector(6)));
        assert!(!registry.infer_shape(&mut g, NodeId(1)).unwrap());
    }

    #[test]
    fn test_inference_error_names_node() {
        let registry = OpRegistry::with_builtins();
        let mut g = Graph::new("bad");
        let x = g.create_tensor("x", DType::F32);
        g.set_tensor_kind(x, TensorKind::Input).unwrap();
        g.set_tensor_shape(x, &[3]).unwrap();
        let y = g.create_tensor("y", DType::F32);
        let input = g.create_node("x", OpKind::Input, 1);
        g.set_node_output(input, 0, x).unwrap();
        let mv = g.create_node("window", OpKind::Move, 1);
        g.set_node_input(mv, 0, x).unwrap();
        g.set_node_output(mv, 0, y).unwrap();
        let g = g.validate().unwrap();

        match registry.infer_outputs(&g, mv) {
            Err(RegistryError::Inference { node, .. }) => assert_eq!(node, "window"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_mark_dynamic() {
        let mut registry = OpRegistry::with_builtins();
        registry.register(Arc::new(Doubling)).unwrap();
        let mut g = chain(&OpRegistry::with_builtins(), 1);
        assert!(!g.node(NodeId(1)).unwrap().is_dynamic());

        registry.mark_dynamic(&mut g).unwrap();
        assert!(!g.node(NodeId(1)).unwrap().is_dynamic());

        let mut g2 = chain(&registry, 2);
        g2.set_node_dynamic(NodeId(1), false).unwrap();
        registry.mark_dynamic(&mut g2).unwrap();
        assert!(g2.node(NodeId(1)).unwrap().is_dynamic());
    }
}
