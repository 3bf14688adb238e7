// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator methods: the device-independent half of an operator.
//!
//! An [`OpMethod`] knows an operator's default parameters and how to infer
//! its output shapes. It never touches tensor bytes; that is the job of a
//! device's [`NodeOps`](crate::NodeOps) implementation.
//!
//! ```text
//!   OpRegistry ── (kind, version) ──▶ Arc<dyn OpMethod>
//!                                        ├─ create_param()   defaults
//!                                        ├─ infer_shape()    output shapes
//!                                        └─ is_dynamic()     re-infer per run
//! ```

use crate::OpError;
use model_ir::graph::GraphState;
use model_ir::{Graph, GraphError, Node, OpKind, OpParams, Tensor};
use tensor_core::Shape;

// ── Shape query ────────────────────────────────────────────────────

/// Read-only view of a node and its tensors for shape inference.
///
/// `params` are the node's parameters with the method's defaults filled in.
pub struct ShapeQuery<'a> {
    node: &'a Node,
    params: OpParams,
    inputs: Vec<&'a Tensor>,
    outputs: Vec<&'a Tensor>,
}

impl<'a> ShapeQuery<'a> {
    /// Resolves a node's tensors in `graph`.
    pub fn new<S: GraphState>(
        node: &'a Node,
        graph: &'a Graph<S>,
        defaults: &OpParams,
    ) -> Result<Self, GraphError> {
        let mut params = node.params().clone();
        params.merge_defaults(defaults);
        let inputs = node
            .inputs()
            .iter()
            .map(|&id| graph.tensor(id))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = node
            .outputs()
            .iter()
            .map(|&id| graph.tensor(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            node,
            params,
            inputs,
            outputs,
        })
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn params(&self) -> &OpParams {
        &self.params
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn input(&self, slot: usize) -> Result<&'a Tensor, OpError> {
        self.inputs.get(slot).copied().ok_or(OpError::MissingSlot {
            direction: "input",
            slot,
        })
    }

    pub fn output(&self, slot: usize) -> Result<&'a Tensor, OpError> {
        self.outputs.get(slot).copied().ok_or(OpError::MissingSlot {
            direction: "output",
            slot,
        })
    }

    /// Shape of an input tensor; unshaped inputs are an error.
    pub fn input_shape(&self, slot: usize) -> Result<&'a Shape, OpError> {
        let tensor = self.input(slot)?;
        tensor.shape().ok_or_else(|| OpError::Unshaped {
            name: tensor.name().to_string(),
        })
    }

    /// A non-negative integer parameter.
    pub fn usize_param(&self, name: &'static str) -> Result<Option<usize>, OpError> {
        match self.params.get_int(name) {
            None => Ok(None),
            Some(v) => usize::try_from(v).map(Some).map_err(|_| OpError::Param {
                op: self.node.op(),
                name,
                detail: format!("{v} is negative"),
            }),
        }
    }

    /// A non-negative integer parameter that must be present.
    pub fn required_param(&self, name: &'static str) -> Result<usize, OpError> {
        self.usize_param(name)?.ok_or_else(|| OpError::Param {
            op: self.node.op(),
            name,
            detail: "missing".into(),
        })
    }

    fn shape_error(&self, detail: impl Into<String>) -> OpError {
        OpError::Shape {
            op: self.node.op(),
            detail: detail.into(),
        }
    }
}

// ── OpMethod trait ─────────────────────────────────────────────────

/// The device-independent description of an operator.
///
/// Methods are stateless and shared across graphs, so they must be
/// `Send + Sync`.
pub trait OpMethod: Send + Sync {
    fn kind(&self) -> OpKind;

    fn version(&self) -> u32 {
        1
    }

    /// Default parameter block for new nodes of this operator.
    fn create_param(&self) -> OpParams {
        OpParams::new()
    }

    /// Output shapes, one per output slot.
    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError>;

    /// Whether output shapes depend on run-time input shapes.
    fn is_dynamic(&self) -> bool {
        false
    }
}

// ── Built-in methods ───────────────────────────────────────────────

/// Input, Const and Generic nodes: outputs keep their declared shapes.
#[derive(Debug, Clone, Copy)]
pub struct SourceMethod(pub OpKind);

impl OpMethod for SourceMethod {
    fn kind(&self) -> OpKind {
        self.0
    }

    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
        (0..query.num_outputs())
            .map(|slot| {
                let tensor = query.output(slot)?;
                tensor.shape().cloned().ok_or_else(|| OpError::Unshaped {
                    name: tensor.name().to_string(),
                })
            })
            .collect()
    }
}

/// Element-wise operators: output 0 takes the shape of input 0.
#[derive(Debug, Clone, Copy)]
pub struct ElementwiseMethod(pub OpKind);

impl OpMethod for ElementwiseMethod {
    fn kind(&self) -> OpKind {
        self.0
    }

    fn create_param(&self) -> OpParams {
        match self.0 {
            OpKind::Relu => OpParams::new().with("negative_slope", 0.0),
            _ => OpParams::new(),
        }
    }

    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
        Ok(vec![query.input_shape(0)?.clone()])
    }
}

/// Fully connected: `[batch, in...] x weight -> [batch, out]`.
///
/// The weight may be stored `[out, in]` or `[in, out]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FcMethod;

impl OpMethod for FcMethod {
    fn kind(&self) -> OpKind {
        OpKind::Fc
    }

    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
        let input = query.input_shape(0)?;
        let weight = query.input_shape(1)?;

        let (batch, features) = match input.dims() {
            [] => (1, 1),
            [k] => (1, *k),
            [batch, rest @ ..] => (*batch, rest.iter().product::<usize>()),
        };
        let [rows, cols] = weight.dims() else {
            return Err(query.shape_error(format!("weight must be 2-D, got {weight}")));
        };
        let out = if *cols == features {
            *rows
        } else if *rows == features {
            *cols
        } else {
            return Err(query.shape_error(format!(
                "input {input} does not match weight {weight}"
            )));
        };

        if let Some(declared) = query.usize_param("num_output")? {
            if declared != out {
                return Err(query.shape_error(format!(
                    "num_output {declared} disagrees with weight {weight}"
                )));
            }
        }
        Ok(vec![Shape::matrix(batch, out)])
    }
}

/// Streaming window: output is the input with `dims[1] = window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveMethod;

impl OpMethod for MoveMethod {
    fn kind(&self) -> OpKind {
        OpKind::Move
    }

    fn create_param(&self) -> OpParams {
        OpParams::new().with("window", 1usize)
    }

    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
        let input = query.input_shape(0)?;
        let window = query.required_param("window")?;
        if window == 0 {
            return Err(query.shape_error("window must be positive"));
        }
        let shape = input
            .with_dim(1, window)
            .ok_or_else(|| query.shape_error(format!("input {input} has no frame axis")))?;
        Ok(vec![shape])
    }
}

/// 2-D convolution over NCHW input with an `[oc, ic / group, kh, kw]` weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvMethod;

impl OpMethod for ConvMethod {
    fn kind(&self) -> OpKind {
        OpKind::Conv
    }

    fn create_param(&self) -> OpParams {
        OpParams::new()
            .with("stride_h", 1usize)
            .with("stride_w", 1usize)
            .with("pad_h", 0usize)
            .with("pad_w", 0usize)
            .with("dilation_h", 1usize)
            .with("dilation_w", 1usize)
            .with("group", 1usize)
    }

    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
        let input = query.input_shape(0)?;
        let weight = query.input_shape(1)?;
        let [n, c, h, w] = input.dims() else {
            return Err(query.shape_error(format!("input must be NCHW, got {input}")));
        };
        let [oc, ic, kh, kw] = weight.dims() else {
            return Err(query.shape_error(format!("weight must be 4-D, got {weight}")));
        };

        let group = query.required_param("group")?.max(1);
        if ic * group != *c {
            return Err(query.shape_error(format!(
                "{c} input channels do not match weight {weight} with {group} groups"
            )));
        }
        if let Some(declared) = query.usize_param("output_channel")? {
            if declared != *oc {
                return Err(query.shape_error(format!(
                    "output_channel {declared} disagrees with weight {weight}"
                )));
            }
        }

        let kh = query.usize_param("kernel_h")?.unwrap_or(*kh);
        let kw = query.usize_param("kernel_w")?.unwrap_or(*kw);
        let out_h = window_extent(
            query,
            *h,
            kh,
            query.required_param("stride_h")?,
            query.required_param("pad_h")?,
            query.required_param("dilation_h")?,
            false,
        )?;
        let out_w = window_extent(
            query,
            *w,
            kw,
            query.required_param("stride_w")?,
            query.required_param("pad_w")?,
            query.required_param("dilation_w")?,
            false,
        )?;
        Ok(vec![Shape::nchw(*n, *oc, out_h, out_w)])
    }
}

/// 2-D max/average pooling over NCHW input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMethod;

impl OpMethod for PoolMethod {
    fn kind(&self) -> OpKind {
        OpKind::Pool
    }

    fn create_param(&self) -> OpParams {
        OpParams::new()
            .with("method", "max")
            .with("stride_h", 1usize)
            .with("stride_w", 1usize)
            .with("pad_h", 0usize)
            .with("pad_w", 0usize)
            .with("global", 0usize)
            .with("ceil_mode", 0usize)
    }

    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
        let input = query.input_shape(0)?;
        let [n, c, h, w] = input.dims() else {
            return Err(query.shape_error(format!("input must be NCHW, got {input}")));
        };
        if query.required_param("global")? != 0 {
            return Ok(vec![Shape::nchw(*n, *c, 1, 1)]);
        }

        let ceil = query.required_param("ceil_mode")? != 0;
        let out_h = window_extent(
            query,
            *h,
            query.required_param("kernel_h")?,
            query.required_param("stride_h")?,
            query.required_param("pad_h")?,
            1,
            ceil,
        )?;
        let out_w = window_extent(
            query,
            *w,
            query.required_param("kernel_w")?,
            query.required_param("stride_w")?,
            query.required_param("pad_w")?,
            1,
            ceil,
        )?;
        Ok(vec![Shape::nchw(*n, *c, out_h, out_w)])
    }
}

/// Output extent of a sliding window along one axis.
fn window_extent(
    query: &ShapeQuery<'_>,
    size: usize,
    kernel: usize,
    stride: usize,
    pad: usize,
    dilation: usize,
    ceil: bool,
) -> Result<usize, OpError> {
    if kernel == 0 || stride == 0 || dilation == 0 {
        return Err(query.shape_error("kernel, stride and dilation must be positive"));
    }
    let span = dilation * (kernel - 1) + 1;
    let padded = size + 2 * pad;
    if padded < span {
        return Err(query.shape_error(format!(
            "window of {span} does not fit padded extent {padded}"
        )));
    }
    let steps = padded - span;
    let steps = if ceil { steps.div_ceil(stride) } else { steps / stride };
    Ok(steps + 1)
}

/// Every built-in method, in registration order.
pub fn builtin_methods() -> Vec<std::sync::Arc<dyn OpMethod>> {
    use std::sync::Arc;
    vec![
        Arc::new(SourceMethod(OpKind::Input)),
        Arc::new(SourceMethod(OpKind::Const)),
        Arc::new(SourceMethod(OpKind::Generic)),
        Arc::new(ElementwiseMethod(OpKind::Relu)),
        Arc::new(ElementwiseMethod(OpKind::Softmax)),
        Arc::new(FcMethod),
        Arc::new(MoveMethod),
        Arc::new(ConvMethod),
        Arc::new(PoolMethod),
    ]
}
