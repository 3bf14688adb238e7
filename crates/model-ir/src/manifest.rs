// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON graph manifest.
//!
//! The manifest lists tensors, nodes and graph IO by name. Constant data is
//! either inline (`values`, encoded according to the tensor's dtype) or a
//! byte range into a sidecar weights blob named by `weights`.
//!
//! # Format
//! ```json
//! {
//!   "name": "kws-dnn",
//!   "weights": "kws.bin",
//!   "tensors": [
//!     { "name": "features", "dtype": "f32", "dims": [1, 490], "kind": "input" },
//!     { "name": "fc1.w", "dtype": "f32", "dims": [144, 490], "kind": "constant",
//!       "weights": { "offset": 0, "length": 282240 } },
//!     { "name": "fc1.out", "dtype": "f32" }
//!   ],
//!   "nodes": [
//!     { "name": "features", "op": "input", "outputs": ["features"] },
//!     { "name": "fc1", "op": "fc", "inputs": ["features", "fc1.w"],
//!       "outputs": ["fc1.out"], "params": { "num_output": 144 } }
//!   ],
//!   "inputs": ["features"],
//!   "outputs": ["fc1"]
//! }
//! ```

use crate::{GraphError, OpKind, OpParams, TensorKind};
use std::collections::HashSet;
use std::path::Path;
use tensor_core::DType;

/// Top-level graph manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphManifest {
    pub name: String,
    /// Weights blob, relative to the manifest's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<String>,
    pub tensors: Vec<ManifestTensor>,
    pub nodes: Vec<ManifestNode>,
    /// Graph input node names. Defaults to every `input` node.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Graph output node names. Defaults to nodes whose outputs nobody reads.
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A tensor entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestTensor {
    pub name: String,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    /// Omitted for variable tensors whose shape is inferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<Vec<usize>>,
    #[serde(default = "default_kind")]
    pub kind: TensorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quant: Option<ManifestQuant>,
    /// Inline constant values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    /// Constant bytes inside the weights blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightRange>,
}

/// Quantisation parameters; one entry per channel, or a single entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestQuant {
    pub scales: Vec<f32>,
    pub zero_points: Vec<i32>,
}

/// Byte range into the weights blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WeightRange {
    pub offset: usize,
    pub length: usize,
}

/// A node entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestNode {
    pub name: String,
    pub op: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "OpParams::is_empty")]
    pub params: OpParams,
    #[serde(default)]
    pub dynamic: bool,
}

fn default_dtype() -> String {
    "f32".to_string()
}

fn default_kind() -> TensorKind {
    TensorKind::Variable
}

fn default_version() -> u32 {
    1
}

impl GraphManifest {
    /// Loads a manifest from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks names, dtypes, operator names and constant sources.
    ///
    /// Reference resolution and ordering are left to graph validation.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut names = HashSet::new();
        for t in &self.tensors {
            if !names.insert(t.name.as_str()) {
                return Err(invalid_tensor(&t.name, "duplicate tensor name"));
            }
            DType::parse(&t.dtype)?;
            if t.values.is_some() && t.weights.is_some() {
                return Err(invalid_tensor(&t.name, "both inline values and a weights range"));
            }
            if t.weights.is_some() && self.weights.is_none() {
                return Err(invalid_tensor(&t.name, "weights range without a weights file"));
            }
        }

        let mut names = HashSet::new();
        for n in &self.nodes {
            if !names.insert(n.name.as_str()) {
                return Err(GraphError::InvalidNode {
                    name: n.name.clone(),
                    detail: "duplicate node name".into(),
                });
            }
            if OpKind::from_str_loose(&n.op).is_none() {
                return Err(GraphError::InvalidNode {
                    name: n.name.clone(),
                    detail: format!("unrecognised operator '{}'", n.op),
                });
            }
        }
        Ok(())
    }
}

fn invalid_tensor(name: &str, detail: &str) -> GraphError {
    GraphError::InvalidTensor {
        name: name.to_string(),
        detail: detail.to_string(),
    }
}
