// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # nnrt
//!
//! Command-line interface for the nnrt inference runtime.
//!
//! ## Usage
//! ```bash
//! # Print the graph and its memory plan
//! nnrt inspect --graph ./models/chain.json
//!
//! # Compile and run a few times
//! nnrt run --graph ./models/chain.json --iterations 10
//!
//! # Feed a streaming graph from a capture task
//! nnrt stream --graph ./models/stream.json --chunks 12
//!
//! # Exercise the allocator
//! nnrt arena --size 64K --ops a:100,a:3000,f:0,r:1:40
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nnrt",
    about = "Minimal neural-network inference runtime for constrained devices",
    version,
    author
)]
struct Cli {
    /// Path to a TOML runtime configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a graph, its consumer counts and the compiled memory plan.
    Inspect {
        /// Path to the JSON graph manifest.
        #[arg(short, long)]
        graph: PathBuf,

        /// Device to compile for (defaults to the configured device).
        #[arg(short, long)]
        device: Option<String>,

        /// Print the memory plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Compile a graph and run it on synthetic inputs.
    Run {
        /// Path to the JSON graph manifest.
        #[arg(short, long)]
        graph: PathBuf,

        /// Device to compile for (defaults to the configured device).
        #[arg(short, long)]
        device: Option<String>,

        /// Number of runs.
        #[arg(short, long, default_value_t = 1)]
        iterations: usize,
    },

    /// Feed input chunks through a bounded queue into the inference loop.
    Stream {
        /// Path to the JSON graph manifest.
        #[arg(short, long)]
        graph: PathBuf,

        /// Number of chunks the capture task produces.
        #[arg(long, default_value_t = 16)]
        chunks: usize,

        /// Capacity of the queue between capture and inference.
        #[arg(long, default_value_t = 4)]
        queue: usize,

        /// Delay between captured chunks, in milliseconds.
        #[arg(long, default_value_t = 10)]
        interval_ms: u64,
    },

    /// Run a sequence of allocator operations and dump the free lists.
    Arena {
        /// Arena capacity (e.g. "64K", "1M").
        #[arg(short, long, default_value = "1M")]
        size: String,

        /// Comma-separated operations: `a:SIZE` allocates, `f:N` frees the
        /// N-th allocation, `r:N:SIZE` reallocates it.
        #[arg(long, default_value = "a:100,a:3000,a:16,f:1,a:2000,r:0:900")]
        ops: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect {
            graph,
            device,
            json,
        } => commands::inspect::execute(config, graph, device, json).await,
        Commands::Run {
            graph,
            device,
            iterations,
        } => commands::run::execute(config, graph, device, iterations).await,
        Commands::Stream {
            graph,
            chunks,
            queue,
            interval_ms,
        } => commands::stream::execute(config, graph, chunks, queue, interval_ms).await,
        Commands::Arena { size, ops } => commands::arena::execute(config, size, ops).await,
    }
}
