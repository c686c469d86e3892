//! Beatmix CLI
//!
//! Command-line front end for the Beatmix loop mixer.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beatmix::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Beatmix v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Validate { config } => commands::validate(&config),
        Commands::Response {
            config,
            points,
            bands,
            json,
        } => commands::response(&config, points, &bands, json),
        Commands::Render {
            config,
            script,
            output,
            duration,
            bit_depth,
        } => commands::render(&config, &script, &output, duration, bit_depth),
    }
}
