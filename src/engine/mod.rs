//! Audio Engine Module
//!
//! The audio engine collaborator of the mixer:
//! - Decoded PCM buffers and WAV I/O
//! - Engine parameters with native ranges
//! - Clock, voice scheduling and offline rendering
//! - Buffer playback handles

pub mod buffer;
pub mod context;
pub mod io;
pub mod mock;
pub mod param;
pub mod source;

pub use buffer::{AudioBuffer, ChannelLayout, DEFAULT_SAMPLE_RATE};
pub use context::{AudioContext, AudioEngine, VoiceId, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
pub use io::{decode_wav, export_wav, generate_test_tone, import_wav, ExportFormat};
pub use mock::{EngineCall, MockEngine};
pub use param::AudioParam;
pub use source::{AudioSourcePlayer, LoopPlaybackHandle};
