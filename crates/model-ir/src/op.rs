// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator kinds and their parameter blocks.
//!
//! A node names its operator by [`OpKind`] plus a version number. The
//! parameters are an [`OpParams`] map of named values: operator methods in
//! the registry supply defaults and read typed values out of it.

use std::collections::BTreeMap;
use std::fmt;

/// The kind of computation a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Placeholder for operators the runtime does not interpret.
    Generic,
    /// Graph input; produces an externally supplied tensor.
    Input,
    /// Constant; produces a tensor whose data ships with the graph.
    Const,
    /// 2-D convolution.
    Conv,
    /// 2-D pooling.
    Pool,
    /// Fully connected layer.
    Fc,
    /// Rectified linear unit.
    Relu,
    /// Softmax over the innermost dimension.
    Softmax,
    /// Streaming window over incoming frames.
    Move,
}

impl OpKind {
    /// All kinds, in declaration order.
    pub const ALL: [OpKind; 9] = [
        Self::Generic,
        Self::Input,
        Self::Const,
        Self::Conv,
        Self::Pool,
        Self::Fc,
        Self::Relu,
        Self::Softmax,
        Self::Move,
    ];

    /// Parses an operator name, accepting common aliases
    /// (`"convolution"`, `"fully_connected"`, `"const"`/`"constant"`, ...).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Some(Self::Generic),
            "input" => Some(Self::Input),
            "const" | "constant" => Some(Self::Const),
            "conv" | "convolution" | "conv2d" => Some(Self::Conv),
            "pool" | "pooling" | "maxpool" | "avgpool" => Some(Self::Pool),
            "fc" | "fully_connected" | "fullyconnected" | "dense" => Some(Self::Fc),
            "relu" => Some(Self::Relu),
            "softmax" => Some(Self::Softmax),
            "move" | "move_buffer" | "window" => Some(Self::Move),
            _ => None,
        }
    }

    /// Returns the canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Input => "input",
            Self::Const => "const",
            Self::Conv => "conv",
            Self::Pool => "pool",
            Self::Fc => "fc",
            Self::Relu => "relu",
            Self::Softmax => "softmax",
            Self::Move => "move",
        }
    }

    /// Input and Const nodes do no work at run time.
    pub fn is_source(self) -> bool {
        matches!(self, Self::Input | Self::Const)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Parameters ─────────────────────────────────────────────────────

/// A single operator parameter value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Ints(Vec<i64>),
    Text(String),
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Ints(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Named operator parameters.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OpParams(BTreeMap<String, ParamValue>);

impl OpParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Integer value; floats with no fractional part are accepted.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Non-negative integer value.
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_int(key).and_then(|v| usize::try_from(v).ok())
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Fills in every key of `defaults` that is not set here.
    pub fn merge_defaults(&mut self, defaults: &OpParams) {
        for (k, v) in &defaults.0 {
            self.0.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_loose() {
        assert_eq!(OpKind::from_str_loose("ReLU"), Some(OpKind::Relu));
        assert_eq!(OpKind::from_str_loose("fully_connected"), Some(OpKind::Fc));
        assert_eq!(OpKind::from_str_loose("constant"), Some(OpKind::Const));
        assert_eq!(OpKind::from_str_loose("lstm"), None);
        for kind in OpKind::ALL {
            assert_eq!(OpKind::from_str_loose(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_is_source() {
        assert!(OpKind::Input.is_source());
        assert!(OpKind::Const.is_source());
        assert!(!OpKind::Relu.is_source());
    }

    #[test]
    fn test_params_typed_access() {
        let p = OpParams::new()
            .with("window", 49)
            .with("alpha", 0.5)
            .with("pads", vec![0i64, 1])
            .with("method", "max");
        assert_eq!(p.get_usize("window"), Some(49));
        assert_eq!(p.get_float("alpha"), Some(0.5));
        assert_eq!(p.get_text("method"), Some("max"));
        assert_eq!(p.get_int("method"), None);
        assert_eq!(p.get_usize("missing"), None);
    }

    #[test]
    fn test_params_negative_not_usize() {
        let p = OpParams::new().with("pad", -1);
        assert_eq!(p.get_int("pad"), Some(-1));
        assert_eq!(p.get_usize("pad"), None);
    }

    #[test]
    fn test_merge_defaults() {
        let mut p = OpParams::new().with("stride", 2);
        p.merge_defaults(&OpParams::new().with("stride", 1).with("pad", 0));
        assert_eq!(p.get_int("stride"), Some(2));
        assert_eq!(p.get_int("pad"), Some(0));
    }

    #[test]
    fn test_params_json() {
        let p: OpParams = serde_json::from_str(r#"{"k": 3, "s": 1.5, "d": [1, 2]}"#).unwrap();
        assert_eq!(p.get("k"), Some(&ParamValue::Int(3)));
        assert_eq!(p.get("s"), Some(&ParamValue::Float(1.5)));
        assert_eq!(p.get("d"), Some(&ParamValue::Ints(vec![1, 2])));
    }
}
