//! Beatmix - Beat-Synchronized Loop Mixer
//!
//! Beatmix plays looping audio tracks organized into groups. Within a group
//! at most one loop plays; across groups every loop starts on a shared grid
//! of measure downbeats so they stay in phase.
//!
//! # Architecture
//!
//! - `engine`: audio clock, voices, and an offline renderer
//! - `dsp`: the graphic equalizer every voice is mixed through
//! - `scheduler`: downbeat alignment and per-group loop swapping
//! - `session`: track controls bound to the scheduler
//! - `assets`: asynchronous asset loading
//! - `config`: track registry and tunables

pub mod assets;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod viz;

pub use config::{MixerConfig, SessionScript};
pub use dsp::SignalChain;
pub use engine::{AudioContext, AudioEngine};
pub use error::{MixerError, Result};
pub use scheduler::LoopScheduler;
pub use session::MixerSession;
