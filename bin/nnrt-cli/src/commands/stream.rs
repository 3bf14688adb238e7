// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt stream` command: a capture task feeding the inference loop.
//!
//! ```text
//! capture task ──chunk──▶ mpsc (bounded) ──▶ set_input → run
//!                                              │
//!                               Suspended ◀────┤ window not full yet
//!                               Completed ◀────┘ print outputs
//! ```
//!
//! The engine stays on the main task; only owned chunks cross the queue.

use super::{load_graph, preview, synthetic_input};
use runtime::{Engine, RunOutcome, RuntimeConfig};
use std::path::PathBuf;
use std::time::Duration;
use tensor_core::DType;
use tokio::sync::mpsc;

pub async fn execute(
    config: RuntimeConfig,
    graph_path: PathBuf,
    chunks: usize,
    queue: usize,
    interval_ms: u64,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                nnrt · Stream Runner                  ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mut graph = load_graph(&graph_path)?;
    let device = config.device.clone();
    let engine = Engine::new(config)?;
    let mut exec = engine.compile(&mut graph, &device)?;
    println!("  {}", exec.summary());

    let inputs = exec.graph().input_tensors();
    let [input] = inputs.as_slice() else {
        anyhow::bail!("stream needs a graph with exactly one input, found {}", inputs.len());
    };
    let input = *input;
    let output = exec.graph().output_tensors().first().copied();

    // The capture side only sees pre-generated owned chunks.
    let captured: Vec<Vec<u8>> = (0..chunks)
        .map(|step| synthetic_input(exec.graph(), input, step))
        .collect::<anyhow::Result<_>>()?;
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(queue.max(1));
    let capture = tokio::spawn(async move {
        for chunk in captured {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            if tx.send(chunk).await.is_err() {
                tracing::warn!("inference loop closed the queue");
                break;
            }
        }
    });

    println!();
    let (mut completed, mut suspended) = (0usize, 0usize);
    let mut received = 0usize;
    while let Some(chunk) = rx.recv().await {
        exec.set_input(input, chunk)?;
        match exec.run()? {
            RunOutcome::Suspended { node_index } => {
                suspended += 1;
                println!("  chunk {received:>3}: waiting (node {node_index})");
            }
            RunOutcome::Completed => {
                completed += 1;
                match output {
                    Some(id) if exec.graph().tensor(id)?.dtype() == DType::F32 => {
                        println!("  chunk {received:>3}: {}", preview(&exec.tensor_f32(id)?, 6));
                    }
                    _ => println!("  chunk {received:>3}: done"),
                }
            }
        }
        received += 1;
    }
    capture.await?;

    println!();
    println!("  Chunks: {received} received, {completed} completed, {suspended} suspended");
    if let Some(metrics) = exec.last_metrics() {
        println!("  Last:   {}", metrics.summary());
    }
    println!();
    Ok(())
}
