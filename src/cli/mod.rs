//! CLI Module
//!
//! Command-line interface for checking configs, plotting the equalizer
//! response, and rendering scripted sessions offline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::BandUpdate;

/// Beatmix - beat-synchronized loop mixer
#[derive(Parser, Debug)]
#[command(name = "beatmix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a mixer config and list its groups and tracks
    Validate {
        /// Path to the mixer config (JSON)
        config: PathBuf,
    },

    /// Print the combined equalizer frequency response
    Response {
        /// Path to the mixer config (JSON)
        config: PathBuf,

        /// Number of log-spaced query frequencies
        #[arg(short, long, default_value_t = 64)]
        points: usize,

        /// Band setting as INDEX:GAIN_DB[:Q] (repeatable)
        #[arg(short, long = "band", value_parser = parse_band_setting)]
        bands: Vec<BandSetting>,

        /// Emit JSON instead of a text plot
        #[arg(long)]
        json: bool,
    },

    /// Replay a session script and write the mix to a WAV file
    Render {
        /// Path to the mixer config (JSON)
        config: PathBuf,

        /// Path to the session script (JSON)
        script: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Length of the render in seconds (default: two measures past the last event)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 16)]
        bit_depth: u16,
    },
}

/// A `--band` argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSetting {
    pub index: usize,
    pub update: BandUpdate,
}

/// Parse `INDEX:GAIN_DB[:Q]`
pub fn parse_band_setting(s: &str) -> std::result::Result<BandSetting, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(format!("expected INDEX:GAIN_DB[:Q], got '{}'", s));
    }
    let index = parts[0]
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("bad band index '{}': {}", parts[0], e))?;
    let gain_db = parts[1]
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("bad gain '{}': {}", parts[1], e))?;
    let q = match parts.get(2) {
        Some(q) => Some(
            q.trim()
                .parse::<f32>()
                .map_err(|e| format!("bad Q '{}': {}", q, e))?,
        ),
        None => None,
    };

    Ok(BandSetting {
        index,
        update: BandUpdate {
            q,
            gain_db: Some(gain_db),
        },
    })
}
