//! Integration Tests
//!
//! End-to-end tests: config, asset loading, session toggles, offline
//! rendering through the equalizer, and WAV output.

use std::sync::Arc;

use approx::assert_relative_eq;
use beatmix::assets::{MemoryAssetLoader, WavAssetLoader};
use beatmix::config::{MixerConfig, SessionScript, TrackEntry};
use beatmix::dsp::{BandUpdate, FilterKind};
use beatmix::engine::{
    export_wav, generate_test_tone, import_wav, AudioBuffer, AudioEngine, ExportFormat,
};
use beatmix::session::{MixerSession, ToggleEffect};
use beatmix::viz::log_spaced_frequencies;
use beatmix::AudioContext;
use tempfile::tempdir;

const SR: u32 = 48000;

/// Constant-level mono loop, easy to spot in a mix
fn dc_loop(level: f32, secs: f64) -> AudioBuffer {
    let frames = (secs * SR as f64) as usize;
    AudioBuffer::from_channels(vec![vec![level; frames]], SR).unwrap()
}

fn entry(control: &str, group: &str) -> TrackEntry {
    TrackEntry {
        control: control.into(),
        group: group.into(),
        asset: format!("{}.wav", control),
    }
}

fn registry() -> MixerConfig {
    MixerConfig::with_tracks(vec![
        entry("drums-1", "drums"),
        entry("drums-2", "drums"),
        entry("bass-1", "bass"),
    ])
}

async fn offline_session() -> MixerSession<AudioContext> {
    let loader = MemoryAssetLoader::new()
        .with_asset("drums-1.wav", dc_loop(0.5, 0.1))
        .with_asset("drums-2.wav", dc_loop(0.25, 0.1))
        .with_asset("bass-1.wav", dc_loop(0.125, 0.1));
    let mut session = MixerSession::offline(&registry()).unwrap();
    assert_eq!(session.load_assets(Arc::new(loader)).await, 3);
    session
}

// === Engine + chain ===

#[test]
fn test_unsupported_sample_rate_is_fatal() {
    let err = AudioContext::new(100).unwrap_err();
    assert_eq!(err.error_code(), "AUDIO_UNSUPPORTED");
    assert!(!err.is_recoverable());
}

#[test]
fn test_default_chain_layout_and_flat_response() {
    let context = AudioContext::new(SR).unwrap();
    let chain = context.chain();
    let kinds: Vec<FilterKind> = chain.bands().iter().map(|b| b.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            FilterKind::LowShelf,
            FilterKind::Peaking,
            FilterKind::Peaking,
            FilterKind::Peaking,
            FilterKind::HighShelf,
        ]
    );

    let freqs = log_spaced_frequencies(32, 20.0, 23999.0);
    for db in chain.frequency_response(&freqs) {
        assert!(db.abs() < 1e-3, "flat chain should be 0 dB, got {}", db);
    }
}

// === Session rendering ===

#[tokio::test]
async fn test_loops_start_on_shared_downbeats() {
    let mut session = offline_session().await;

    session.toggle(&"drums-1".into(), true).unwrap();
    session.engine_mut().render_until(1.0, 256);
    let effect = session.toggle(&"bass-1".into(), true).unwrap();
    let ToggleEffect::Activated(activation) = effect else {
        panic!("expected activation");
    };
    assert_relative_eq!(activation.start_time, 2.002, epsilon = 1e-9);

    let mix = session.engine_mut().render_until(2.5, 256);
    // mix starts at frame 48000; bass starts at frame 96096
    let bass_start = 96096 - 48000;
    assert_relative_eq!(mix.channel(0)[bass_start - 1], 0.5, epsilon = 1e-4);
    assert_relative_eq!(mix.channel(0)[bass_start], 0.625, epsilon = 1e-4);
    assert_relative_eq!(mix.channel(1)[bass_start], 0.625, epsilon = 1e-4);
}

#[tokio::test]
async fn test_join_on_exact_downbeat_after_long_render() {
    let mut session = offline_session().await;

    session.engine_mut().render_until(0.1, 512);
    session.toggle(&"drums-1".into(), true).unwrap();
    session.engine_mut().render_until(32.1, 4096);

    let effect = session.toggle(&"bass-1".into(), true).unwrap();
    let ToggleEffect::Activated(activation) = effect else {
        panic!("expected activation");
    };
    assert_relative_eq!(activation.start_time, 32.102, epsilon = 1e-6);
}

#[tokio::test]
async fn test_swap_has_no_gap_or_overlap() {
    let mut session = offline_session().await;

    session.toggle(&"drums-1".into(), true).unwrap();
    session.engine_mut().render_until(0.5, 256);
    let effect = session.toggle(&"drums-2".into(), true).unwrap();
    let ToggleEffect::Activated(activation) = effect else {
        panic!("expected activation");
    };
    assert_relative_eq!(activation.start_time, 2.002, epsilon = 1e-9);

    let mix = session.engine_mut().render_until(2.5, 256);
    let swap = 96096 - 24000;
    for i in (swap - 100)..swap {
        assert_relative_eq!(mix.channel(0)[i], 0.5, epsilon = 1e-4);
    }
    for i in swap..(swap + 100) {
        assert_relative_eq!(mix.channel(0)[i], 0.25, epsilon = 1e-4);
    }
    assert_eq!(session.engine().voice_count(), 1);
    assert!(!session.control(&"drums-1".into()).unwrap().is_on());
}

#[tokio::test]
async fn test_deactivate_stops_immediately_and_resets_grid() {
    let mut session = offline_session().await;

    session.toggle(&"drums-1".into(), true).unwrap();
    session.engine_mut().render_until(1.0, 256);
    session.toggle(&"drums-1".into(), false).unwrap();

    let tail = session.engine_mut().render_until(1.1, 256);
    assert!(tail.peak() < 1e-6);
    assert_eq!(session.engine().voice_count(), 0);
    assert_eq!(session.scheduler().timeline().anchor_time(), None);

    // Fresh start, not snapped to the old 0.002 grid
    let now = session.engine().current_time();
    let effect = session.toggle(&"bass-1".into(), true).unwrap();
    let ToggleEffect::Activated(activation) = effect else {
        panic!("expected activation");
    };
    assert_relative_eq!(activation.start_time, now + 0.002, epsilon = 1e-9);
}

#[tokio::test]
async fn test_band_cut_attenuates_mix() {
    let mut session = offline_session().await;
    let low = session.engine().chain().band(0).unwrap().center_frequency_hz();
    assert!(low > 0.0);

    session
        .engine_mut()
        .chain_mut()
        .set_band_parameter(0, BandUpdate::gain(-12.0))
        .unwrap();
    session.toggle(&"drums-1".into(), true).unwrap();

    // DC sits well inside the low shelf
    let mix = session.engine_mut().render_until(0.5, 512);
    let settled = mix.channel(0)[mix.len() - 1];
    assert_relative_eq!(settled, 0.5 * 10f32.powf(-12.0 / 20.0), epsilon = 1e-3);
}

#[tokio::test]
async fn test_script_render_end_to_end() {
    let mut session = offline_session().await;
    let script = SessionScript::from_json_str(
        r#"{
            "events": [
                { "at": 0.0, "action": "toggle", "control": "drums-1", "on": true },
                { "at": 1.0, "action": "toggle", "control": "bass-1", "on": true },
                { "at": 3.0, "action": "set_master_gain", "gain": 0.0 },
                { "at": 9.0, "action": "toggle", "control": "bass-1", "on": false }
            ]
        }"#,
    )
    .unwrap();

    let mix = session.render_script(&script, 4.0, 512).unwrap();
    assert_eq!(mix.len(), 4 * SR as usize);
    assert_eq!(mix.channels(), 2);
    assert_eq!(mix.peak_in(0, 96), 0.0);
    assert_relative_eq!(mix.peak_in(96, 96096), 0.5, epsilon = 1e-4);
    assert_relative_eq!(mix.peak_in(96096, 3 * SR as usize), 0.625, epsilon = 1e-4);
    assert!(mix.peak_in(3 * SR as usize, mix.len()) < 1e-6);

    // The event past the end was never applied
    assert!(session.control(&"bass-1".into()).unwrap().is_on());
}

// === Disk assets ===

#[tokio::test]
async fn test_wav_assets_and_export() {
    let dir = tempdir().unwrap();
    let tone = generate_test_tone(220.0, 0.5, 44100);
    export_wav(&tone, &dir.path().join("drums-1.wav"), ExportFormat::float()).unwrap();
    export_wav(&tone, &dir.path().join("bass-1.wav"), ExportFormat::default()).unwrap();
    // drums-2.wav is missing on purpose

    let mut config = registry();
    config.asset_root = dir.path().to_path_buf();
    let mut session = MixerSession::offline(&config).unwrap();
    let loader = Arc::new(WavAssetLoader::new(&config.asset_root, config.sample_rate));
    assert_eq!(session.load_assets(loader).await, 2);

    let drums_2 = session.control(&"drums-2".into()).unwrap();
    assert!(drums_2.is_disabled());
    let drums_1 = session.control(&"drums-1".into()).unwrap();
    let beatmix::session::ControlState::Ready(buffer) = drums_1.state() else {
        panic!("drums-1 should be ready");
    };
    assert_eq!(buffer.sample_rate, SR);
    assert_eq!(buffer.len(), 24000);

    session.toggle(&"drums-1".into(), true).unwrap();
    let mix = session.engine_mut().render_until(1.0, 512);
    let out = dir.path().join("mix.wav");
    export_wav(&mix, &out, ExportFormat::default()).unwrap();

    let reloaded = import_wav(&out, SR).unwrap();
    assert_eq!(reloaded.len(), SR as usize);
    assert_eq!(reloaded.channels(), 2);
    assert!(reloaded.peak() > 0.9);
}
