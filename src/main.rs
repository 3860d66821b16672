// SPDX-License-Identifier: GPL-3.0-only

use camera_segments::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-segments")]
#[command(about = "Segmented camera recording with live camera switching")]
#[command(version = camera_segments::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/camera-segments/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for segment files (overrides the config)
    #[arg(long, global = true)]
    working_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the command channel over stdin/stdout (default)
    Stdio,

    /// Record a scripted session on the virtual camera
    Demo {
        /// Number of camera switches while recording
        #[arg(short, long, default_value = "1")]
        toggles: usize,

        /// Turn the torch on after recording starts
        #[arg(short, long)]
        flash: bool,

        /// Discard the recording instead of stopping
        #[arg(long)]
        cancel: bool,
    },

    /// Delete leftover segment files
    Clean,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = cli.working_dir {
        config.working_dir = Some(dir);
    }

    // Initialize logging
    // RUST_LOG wins over the config's log_filter
    // Examples: RUST_LOG=debug, RUST_LOG=camera_segments=debug
    // Logs go to stderr; stdout carries the command channel
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    match cli.command {
        Some(Commands::Stdio) | None => cli::run_stdio(&config),
        Some(Commands::Demo {
            toggles,
            flash,
            cancel,
        }) => cli::run_demo(&config, toggles, flash, cancel),
        Some(Commands::Clean) => cli::clean(&config),
        Some(Commands::Config) => cli::show_config(&config),
    }
}
