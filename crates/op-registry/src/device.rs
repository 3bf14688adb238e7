// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Devices and implementation selection.
//!
//! A [`Device`] holds candidate [`NodeOps`] per operator kind. Selection is
//! a pure function of the node, the graph and the candidate list:
//!
//! | candidates | chosen |
//! |---|---|
//! | none | nothing |
//! | one | that one, scored [`Score::BEST`] without asking it |
//! | several | highest score above [`Score::NOT_SUPPORTED`]; ties keep registration order |

use crate::cpu;
use crate::{NodeOps, Score};
use model_ir::{Graph, Node, OpKind, Validated};
use std::collections::BTreeMap;
use std::sync::Arc;

/// An implementation chosen for a node.
#[derive(Clone)]
pub struct Selection {
    pub ops: Arc<dyn NodeOps>,
    pub score: Score,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("ops", &self.ops.name())
            .field("score", &self.score)
            .finish()
    }
}

/// A named execution target and its operator implementations.
pub struct Device {
    name: String,
    candidates: BTreeMap<OpKind, Vec<Arc<dyn NodeOps>>>,
}

impl Device {
    /// Creates a device with no implementations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: BTreeMap::new(),
        }
    }

    /// The reference CPU device: ReLU, Softmax and the streaming window.
    pub fn cpu() -> Self {
        let mut device = Self::new("cpu");
        device.register(OpKind::Relu, Arc::new(cpu::ReluOps));
        device.register(OpKind::Softmax, Arc::new(cpu::SoftmaxOps));
        device.register(OpKind::Move, Arc::new(cpu::MoveOps));
        device
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a candidate implementation for `kind`.
    pub fn register(&mut self, kind: OpKind, ops: Arc<dyn NodeOps>) {
        tracing::debug!(device = %self.name, op = %kind, implementation = ops.name(), "registered node ops");
        self.candidates.entry(kind).or_default().push(ops);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, kind: OpKind, ops: Arc<dyn NodeOps>) -> Self {
        self.register(kind, ops);
        self
    }

    /// Candidates for `kind`, in registration order.
    pub fn candidates(&self, kind: OpKind) -> &[Arc<dyn NodeOps>] {
        self.candidates.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Operator kinds this device implements.
    pub fn kinds(&self) -> impl Iterator<Item = OpKind> + '_ {
        self.candidates.keys().copied()
    }

    /// Picks the implementation for `node`, or `None` if nothing fits.
    pub fn select(&self, node: &Node, graph: &Graph<Validated>) -> Option<Selection> {
        match self.candidates(node.op()) {
            [] => None,
            [only] => Some(Selection {
                ops: Arc::clone(only),
                score: Score::BEST,
            }),
            many => {
                let mut best: Option<(usize, Score)> = None;
                for (index, ops) in many.iter().enumerate() {
                    let score = ops.score(node, graph);
                    if !score.is_supported() {
                        continue;
                    }
                    if best.map_or(true, |(_, top)| score > top) {
                        best = Some((index, score));
                    }
                }
                best.map(|(index, score)| Selection {
                    ops: Arc::clone(&many[index]),
                    score,
                })
            }
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table: BTreeMap<_, Vec<&str>> = self
            .candidates
            .iter()
            .map(|(kind, ops)| (kind, ops.iter().map(|o| o.name()).collect()))
            .collect();
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("candidates", &table)
            .finish()
    }
}
