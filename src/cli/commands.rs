//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::BandSetting;
use crate::assets::WavAssetLoader;
use crate::config::{MixerConfig, SessionScript};
use crate::dsp::SignalChain;
use crate::engine::{export_wav, ExportFormat};
use crate::session::MixerSession;
use crate::viz::{log_spaced_frequencies, response_points, ResponsePlot};

/// Lowest frequency shown in response plots
const RESPONSE_MIN_HZ: f32 = 20.0;

/// Frames rendered per engine block
const RENDER_BLOCK_SIZE: usize = 512;

/// Load a config and print its registry.
pub fn validate(config_path: &Path) -> Result<()> {
    info!("Validating config: {}", config_path.display());

    let config = MixerConfig::load(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let loader = WavAssetLoader::new(&config.asset_root, config.sample_rate);

    println!("Config OK: {}", config_path.display());
    println!(
        "Sample rate: {} Hz, tempo: {} bpm in {}/4, buffer time: {} s",
        config.sample_rate,
        config.tempo.bpm,
        config.tempo.beats_per_measure,
        config.tempo.buffer_time_secs
    );
    println!(
        "Equalizer: {} bands, margin {} Hz, {:?} decibels",
        config.equalizer.band_count, config.equalizer.margin_hz, config.equalizer.decibel_scale
    );
    println!("{:-<60}", "");

    for group in config.group_ids() {
        println!("Group {}", group);
        for track in config.tracks.iter().filter(|t| t.group == group) {
            let path = loader.resolve(&track.asset);
            let marker = if path.exists() { "" } else { "  (missing)" };
            if !path.exists() {
                warn!(control = %track.control, path = %path.display(), "Asset not found");
            }
            println!("  {:<20} {}{}", track.control, path.display(), marker);
        }
    }

    Ok(())
}

/// Print the equalizer's combined frequency response.
pub fn response(config_path: &Path, points: usize, bands: &[BandSetting], json: bool) -> Result<()> {
    let config = MixerConfig::load(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let eq = &config.equalizer;
    let mut chain = SignalChain::with_bands(config.sample_rate, eq.band_count, eq.margin_hz)?
        .with_decibel_scale(eq.decibel_scale);

    for setting in bands {
        chain
            .set_band_parameter(setting.index, setting.update)
            .with_context(|| format!("cannot apply --band {}", setting.index))?;
    }

    let nyquist = config.sample_rate as f32 / 2.0;
    let frequencies = log_spaced_frequencies(points, RESPONSE_MIN_HZ, nyquist);
    let magnitudes = chain.frequency_response(&frequencies);

    if json {
        let out = serde_json::to_string_pretty(&response_points(&frequencies, &magnitudes))?;
        println!("{}", out);
        return Ok(());
    }

    println!("Bands:");
    for band in chain.bands() {
        println!(
            "  #{} {:?} @ {} Hz  gain {:+.1} dB  Q {:.3}",
            band.index(),
            band.kind(),
            band.center_frequency_hz(),
            band.gain_db().value(),
            band.q().value()
        );
    }
    println!();
    print!("{}", ResponsePlot::default().render(&magnitudes));
    if let (Some(first), Some(last)) = (frequencies.first(), frequencies.last()) {
        println!("        {:.0} Hz .. {:.0} Hz (log)", first, last);
    }

    Ok(())
}

/// Replay a session script offline and write the mix.
pub fn render(
    config_path: &Path,
    script_path: &Path,
    output: &Path,
    duration: Option<f64>,
    bit_depth: u16,
) -> Result<()> {
    let config = MixerConfig::load(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let script = SessionScript::load(script_path)
        .with_context(|| format!("invalid script {}", script_path.display()))?;

    let end_time = match duration {
        Some(d) if d.is_finite() && d > 0.0 => d,
        Some(d) => bail!("duration must be positive, got {}", d),
        None => {
            script.last_event_time() + 2.0 * config.scheduler_settings().grid.measure_duration()
        }
    };

    let mut session = MixerSession::offline(&config)?;
    let loader = Arc::new(WavAssetLoader::new(&config.asset_root, config.sample_rate));
    let runtime = tokio::runtime::Runtime::new().context("failed to start asset loader")?;
    let ready = runtime.block_on(session.load_assets(loader));
    info!(ready, total = config.tracks.len(), "Assets loaded");

    let mix = session.render_script(&script, end_time, RENDER_BLOCK_SIZE)?;
    export_wav(&mix, output, ExportFormat::new(bit_depth))
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Rendered {:.2} s ({} of {} tracks loaded) to {}",
        mix.duration_secs(),
        ready,
        config.tracks.len(),
        output.display()
    );
    println!("Peak level: {:.3}", mix.peak());

    Ok(())
}
