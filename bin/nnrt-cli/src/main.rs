// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # nnrt
//!
//! Command-line interface for the nnrt compilation and execution runtime.
//!
//! ## Usage
//! ```bash
//! # List registered devices and their capabilities
//! nnrt devices
//!
//! # Compile a graph, generating or loading the on-disk cache
//! nnrt compile --graph ./add.json --cache-dir ./cache --cache-version 2
//!
//! # Compile and run once with every input filled with 1.5
//! nnrt run --graph ./add.json --fill 1.5
//!
//! # Decode and verify a cache directory
//! nnrt cache-info --dir ./cache
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nnrt",
    about = "Compile, cache and execute operation graphs on pluggable devices",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (CLI arguments override it).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides shared by the commands that compile a graph.
#[derive(clap::Args)]
struct CompileArgs {
    /// Path to the graph JSON file.
    #[arg(short, long)]
    graph: PathBuf,

    /// Device name to compile for (defaults to the first registered device).
    #[arg(short, long)]
    device: Option<String>,

    /// Cache directory; must already exist.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Artifact version expected in the cache.
    #[arg(long)]
    cache_version: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered devices with their type, status and capabilities.
    Devices,

    /// Compile a graph and report how the execution plan was obtained.
    Compile {
        #[command(flatten)]
        args: CompileArgs,
    },

    /// Compile a graph and run it once on constant inputs.
    Run {
        #[command(flatten)]
        args: CompileArgs,

        /// Value written to every f32 input element.
        #[arg(long, default_value_t = 1.0)]
        fill: f32,

        /// Output buffer size used when an output shape is dynamic.
        #[arg(long, default_value_t = 1 << 20)]
        dynamic_output_bytes: usize,
    },

    /// Decode a cache manifest and verify every chunk checksum.
    CacheInfo {
        /// Cache directory to inspect.
        #[arg(short, long)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Devices => commands::devices::execute(config).await,
        Commands::Compile { args } => {
            commands::compile::execute(args.apply(config), args.graph).await
        }
        Commands::Run {
            args,
            fill,
            dynamic_output_bytes,
        } => {
            commands::run::execute(args.apply(config), args.graph, fill, dynamic_output_bytes).await
        }
        Commands::CacheInfo { dir } => commands::cache_info::execute(dir).await,
    }
}

impl CompileArgs {
    /// Layers the command-line overrides on top of the file configuration.
    fn apply(&self, mut config: runtime::RuntimeConfig) -> runtime::RuntimeConfig {
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(version) = self.cache_version {
            config.cache_version = version;
        }
        config
    }
}
