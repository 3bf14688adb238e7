// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph loading from a JSON manifest plus an optional weights blob.
//!
//! The loader is a client of the graph construction calls: it never builds
//! tensors or nodes directly. The weights blob is memory-mapped and only
//! the byte ranges referenced by constant tensors are copied out.

use crate::graph::{Building, Validated};
use crate::manifest::{GraphManifest, ManifestTensor};
use crate::{Graph, GraphError, NodeId, OpKind, TensorId};
use std::collections::HashMap;
use std::path::Path;
use tensor_core::{DType, QuantParams};

/// Loads a graph from disk.
///
/// # Example
/// ```no_run
/// use model_ir::GraphLoader;
/// use std::path::Path;
///
/// let graph = GraphLoader::load(Path::new("./models/kws.json")).unwrap();
/// println!("{}", graph.summary());
/// ```
pub struct GraphLoader;

impl GraphLoader {
    /// Loads and validates the graph described by a manifest file.
    ///
    /// A `weights` entry is resolved relative to the manifest's directory.
    pub fn load(manifest_path: &Path) -> Result<Graph<Validated>, GraphError> {
        let manifest = GraphManifest::from_file(manifest_path)?;
        manifest.validate()?;

        match &manifest.weights {
            Some(file) => {
                let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
                let weights_path = dir.join(file);
                let handle = std::fs::File::open(&weights_path)?;
                // SAFETY: the map is read-only and dropped before this
                // function returns; the file is not modified meanwhile.
                let mmap = unsafe { memmap2::Mmap::map(&handle) }?;
                tracing::debug!(
                    path = %weights_path.display(),
                    bytes = mmap.len(),
                    "mapped weights file"
                );
                Self::from_manifest(&manifest, Some(&mmap[..]))
            }
            None => Self::from_manifest(&manifest, None),
        }
    }

    /// Builds and validates a graph from a parsed manifest.
    pub fn from_manifest(
        manifest: &GraphManifest,
        weights: Option<&[u8]>,
    ) -> Result<Graph<Validated>, GraphError> {
        manifest.validate()?;
        let graph = Self::build(manifest, weights)?;
        let graph = graph.validate()?;
        tracing::info!(graph = %graph.name(), "graph loaded");
        Ok(graph)
    }

    /// Translates a manifest into construction calls, without validating.
    pub fn build(
        manifest: &GraphManifest,
        weights: Option<&[u8]>,
    ) -> Result<Graph<Building>, GraphError> {
        let mut graph = Graph::new(manifest.name.clone());

        let mut tensors: HashMap<&str, TensorId> = HashMap::new();
        for mt in &manifest.tensors {
            let dtype = DType::parse(&mt.dtype)?;
            let id = graph.create_tensor(mt.name.clone(), dtype);
            graph.set_tensor_kind(id, mt.kind)?;
            if let Some(dims) = &mt.dims {
                graph.set_tensor_shape(id, dims)?;
            }
            if let Some(q) = &mt.quant {
                let quant = QuantParams::per_channel(q.scales.clone(), q.zero_points.clone())?;
                graph.set_tensor_quant(id, quant)?;
            }
            if let Some(bytes) = constant_bytes(mt, dtype, weights)? {
                graph.set_tensor_data(id, bytes)?;
            }
            tensors.insert(mt.name.as_str(), id);
        }

        let lookup = |name: &str| {
            tensors.get(name).copied().ok_or_else(|| GraphError::UnknownName {
                what: "tensor",
                name: name.to_string(),
            })
        };

        let mut nodes: HashMap<&str, NodeId> = HashMap::new();
        for mn in &manifest.nodes {
            let op = OpKind::from_str_loose(&mn.op).ok_or_else(|| GraphError::InvalidNode {
                name: mn.name.clone(),
                detail: format!("unrecognised operator '{}'", mn.op),
            })?;
            let id = graph.create_node(mn.name.clone(), op, mn.version);
            for (slot, name) in mn.inputs.iter().enumerate() {
                graph.set_node_input(id, slot, lookup(name.as_str())?)?;
            }
            for (slot, name) in mn.outputs.iter().enumerate() {
                graph.set_node_output(id, slot, lookup(name.as_str())?)?;
            }
            graph.set_node_params(id, mn.params.clone())?;
            graph.set_node_dynamic(id, mn.dynamic)?;
            nodes.insert(mn.name.as_str(), id);
        }

        let resolve = |names: &[String]| {
            names
                .iter()
                .map(|n| {
                    nodes.get(n.as_str()).copied().ok_or_else(|| GraphError::UnknownName {
                        what: "node",
                        name: n.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        graph.set_graph_io(&resolve(&manifest.inputs)?, &resolve(&manifest.outputs)?)?;

        Ok(graph)
    }
}

/// Constant bytes from inline values or the weights blob.
fn constant_bytes(
    mt: &ManifestTensor,
    dtype: DType,
    weights: Option<&[u8]>,
) -> Result<Option<Vec<u8>>, GraphError> {
    if let Some(values) = &mt.values {
        return encode_values(&mt.name, values, dtype).map(Some);
    }
    let Some(range) = mt.weights else {
        return Ok(None);
    };
    let blob = weights.ok_or_else(|| GraphError::InvalidTensor {
        name: mt.name.clone(),
        detail: "weights range without a weights file".into(),
    })?;
    let end = range.offset.checked_add(range.length);
    match end.and_then(|end| blob.get(range.offset..end)) {
        Some(bytes) => Ok(Some(bytes.to_vec())),
        None => Err(GraphError::InvalidTensor {
            name: mt.name.clone(),
            detail: format!(
                "weights range {}+{} exceeds the {}-byte file",
                range.offset,
                range.length,
                blob.len()
            ),
        }),
    }
}

/// Encodes inline values as little-endian elements of `dtype`.
fn encode_values(name: &str, values: &[f64], dtype: DType) -> Result<Vec<u8>, GraphError> {
    let mut out = Vec::with_capacity(values.len() * dtype.size_bytes());
    for &v in values {
        match dtype {
            DType::F32 => out.extend_from_slice(&(v as f32).to_le_bytes()),
            DType::I32 => out.extend_from_slice(&(v as i32).to_le_bytes()),
            DType::I8 => out.push((v as i8) as u8),
            DType::U8 => out.push(v as u8),
            DType::F16 => {
                return Err(GraphError::InvalidTensor {
                    name: name.to_string(),
                    detail: "inline values are not supported for f16".into(),
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TensorData, TensorKind};

    fn manifest() -> GraphManifest {
        GraphManifest::from_json(
            r#"{
            "name": "tiny",
            "weights": "w.bin",
            "tensors": [
                { "name": "x", "dims": [1, 2], "kind": "input" },
                { "name": "w", "dims": [2, 2], "kind": "constant",
                  "weights": { "offset": 4, "length": 16 } },
                { "name": "b", "dtype": "i8", "dims": [2], "kind": "constant",
                  "values": [-1, 3] },
                { "name": "y" }
            ],
            "nodes": [
                { "name": "x", "op": "input", "outputs": ["x"] },
                { "name": "w", "op": "const", "outputs": ["w"] },
                { "name": "b", "op": "const", "outputs": ["b"] },
                { "name": "fc", "op": "fc", "inputs": ["x", "w", "b"], "outputs": ["y"],
                  "params": { "num_output": 2 }, "dynamic": true }
            ],
            "outputs": ["fc"]
        }"#,
        )
        .unwrap()
    }

    fn blob() -> Vec<u8> {
        let mut blob = vec![0xEEu8; 4];
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
        blob
    }

    #[test]
    fn test_from_manifest() {
        let g = GraphLoader::from_manifest(&manifest(), Some(blob().as_slice())).unwrap();
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.input_nodes(), &[NodeId(0)]);
        assert_eq!(g.output_nodes(), &[NodeId(3)]);

        let w = g.find_tensor("w").unwrap();
        let bytes = g.external_data(w).unwrap().unwrap();
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());

        let b = g.find_tensor("b").unwrap();
        assert_eq!(g.data(b).unwrap(), &TensorData::External(vec![0xFF, 3]));

        let fc = g.node(NodeId(3)).unwrap();
        assert!(fc.is_dynamic());
        assert_eq!(fc.params().get_usize("num_output"), Some(2));
        assert_eq!(g.tensor(g.find_tensor("x").unwrap()).unwrap().kind(), TensorKind::Input);
    }

    #[test]
    fn test_range_out_of_bounds() {
        let short = vec![0u8; 10];
        assert!(matches!(
            GraphLoader::from_manifest(&manifest(), Some(short.as_slice())),
            Err(GraphError::InvalidTensor { .. })
        ));
    }

    #[test]
    fn test_unknown_tensor_reference() {
        let mut m = manifest();
        m.nodes[3].inputs[0] = "nope".into();
        assert!(matches!(
            GraphLoader::from_manifest(&m, Some(blob().as_slice())),
            Err(GraphError::UnknownName { what: "tensor", .. })
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("model-ir-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tiny.json");
        std::fs::write(&path, manifest().to_json().unwrap()).unwrap();
        std::fs::write(dir.join("w.bin"), blob()).unwrap();

        let g = GraphLoader::load(&path).unwrap();
        assert_eq!(g.name(), "tiny");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_weights_file() {
        let dir = std::env::temp_dir().join(format!("model-ir-missing-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tiny.json");
        std::fs::write(&path, manifest().to_json().unwrap()).unwrap();

        assert!(matches!(GraphLoader::load(&path), Err(GraphError::Io(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
