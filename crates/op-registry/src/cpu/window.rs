// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Streaming sliding window over frames.
//!
//! Each run appends the input chunk (`dims[1]` frames) to a window of
//! `window` frames, dropping the oldest. Until the window has been filled
//! once, the node returns [`NodeStatus::Stop`] so the rest of the graph
//! waits for more data; afterwards every run emits the current window.
//!
//! ```text
//! run 1: [ . . . a ]  Stop
//! run 2: [ . . a b ]  Stop
//! run 3: [ . a b c ]  Stop
//! run 4: [ a b c d ]  emit
//! run 5: [ b c d e ]  emit
//! ```

use crate::{NodeContext, NodeOps, NodeState, NodeStatus, OpError, Score};
use model_ir::{Graph, Node, OpKind, Validated};

/// Frame history of one bound Move node.
#[derive(Debug, Clone)]
pub struct Window {
    buffer: Vec<u8>,
    frame_bytes: usize,
    frames: usize,
    filled: usize,
}

impl Window {
    pub fn new(frames: usize, frame_bytes: usize) -> Self {
        Self {
            buffer: vec![0; frames * frame_bytes],
            frame_bytes,
            frames,
            filled: 0,
        }
    }

    /// Appends a chunk of whole frames. Returns whether the window is full.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.frame_bytes == 0 {
            return true;
        }
        let incoming = chunk.len() / self.frame_bytes;
        let chunk = &chunk[..incoming * self.frame_bytes];
        if chunk.len() >= self.buffer.len() {
            let tail = chunk.len() - self.buffer.len();
            self.buffer.copy_from_slice(&chunk[tail..]);
        } else {
            let keep = self.buffer.len() - chunk.len();
            self.buffer.copy_within(chunk.len().., 0);
            self.buffer[keep..].copy_from_slice(chunk);
        }
        self.filled = (self.filled + incoming).min(self.frames);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.frames
    }

    /// Frames currently held.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0);
        self.filled = 0;
    }
}

/// Dtype-agnostic sliding window (`move` operator).
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOps;

impl NodeOps for MoveOps {
    fn name(&self) -> &str {
        "cpu.move"
    }

    fn score(&self, _node: &Node, _graph: &Graph<Validated>) -> Score {
        Score::BEST
    }

    fn init(&self, node: &Node, graph: &Graph<Validated>) -> Result<Option<NodeState>, OpError> {
        let frames = node.params().get_usize("window").unwrap_or(1);
        if frames == 0 {
            return Err(OpError::Param {
                op: OpKind::Move,
                name: "window",
                detail: "must be positive".into(),
            });
        }
        let id = node.input(0).ok_or(OpError::MissingSlot {
            direction: "input",
            slot: 0,
        })?;
        let input = graph.tensor(id)?;
        let shape = input.shape().ok_or_else(|| OpError::Unshaped {
            name: input.name().to_string(),
        })?;
        let chunk_frames = shape.dim(1).filter(|&d| d > 0).ok_or_else(|| OpError::Shape {
            op: OpKind::Move,
            detail: format!("input {shape} has no frame axis"),
        })?;
        let frame_bytes = input.byte_size() / chunk_frames;
        Ok(Some(Box::new(Window::new(frames, frame_bytes))))
    }

    fn prerun(&self, ctx: &mut NodeContext<'_>) -> Result<(), OpError> {
        ctx.state::<Window>()?.reset();
        Ok(())
    }

    fn run(&self, ctx: &mut NodeContext<'_>) -> Result<NodeStatus, OpError> {
        let (chunk, window) = ctx.input_with_state::<Window>(0)?;
        if !window.push(chunk) {
            tracing::trace!(filled = window.filled(), "window not yet full");
            return Ok(NodeStatus::Stop);
        }
        let (out, window) = ctx.output_with_state::<Window>(0)?;
        let n = out.len().min(window.as_bytes().len());
        out[..n].copy_from_slice(&window.as_bytes()[..n]);
        Ok(NodeStatus::Continue)
    }
}
