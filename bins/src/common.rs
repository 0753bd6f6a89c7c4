//! Common utilities for the engine binary: CLI parsing and logging setup.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to the engine's YAML config file.
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Log level, used when `RUST_LOG` is unset.
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

/// Initialize tracing/logging.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    Ok(())
}
