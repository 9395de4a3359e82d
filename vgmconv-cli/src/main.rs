//! vgmconv - Main entry point
//!
//! Decodes audio streams to WAV files (or raw samples on stdout).
//! Logs go to stderr, because stdout may carry audio.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vgmconv_cli::audio::SymphoniaEngine;
use vgmconv_cli::config::{CliArgs, ConvertConfig};
use vgmconv_cli::convert::{Converter, FileSink};
use vgmconv_common::StdFileSystem;

fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vgmconv=info,vgmconv_cli=info,vgmconv_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Parse command-line arguments
    let args = CliArgs::parse();

    let config = ConvertConfig::from_args(args).context("Failed to load configuration")?;
    config
        .validate(io::stdout().is_terminal())
        .context("Invalid configuration")?;
    debug!("Configuration: {:?}", config);

    let mut converter = Converter::new(
        config,
        Arc::new(StdFileSystem),
        SymphoniaEngine::new(),
        FileSink,
    );
    let summary = converter.run();

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("Nothing converted");
        Ok(ExitCode::FAILURE)
    }
}
