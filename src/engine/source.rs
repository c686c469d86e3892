//! Buffer playback units
//!
//! `AudioSourcePlayer` wraps one decoded buffer. Each `play` call schedules
//! a fresh voice and hands back a `LoopPlaybackHandle`, which is consumed by
//! `stop` so a stopped playback can never be reused.

use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::context::{AudioEngine, VoiceId};

/// A decoded buffer ready to be scheduled any number of times
#[derive(Debug, Clone)]
pub struct AudioSourcePlayer {
    buffer: Arc<AudioBuffer>,
}

impl AudioSourcePlayer {
    pub fn new(buffer: Arc<AudioBuffer>) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    /// Schedule the buffer into the engine's signal chain at `start_time`
    ///
    /// Never blocks; the start fires on the engine clock.
    pub fn play<E: AudioEngine + ?Sized>(
        &self,
        engine: &mut E,
        start_time: f64,
        looping: bool,
    ) -> LoopPlaybackHandle {
        let voice = engine.start_source(Arc::clone(&self.buffer), start_time, looping);
        LoopPlaybackHandle {
            voice,
            start_time,
            looping,
        }
    }
}

impl From<AudioBuffer> for AudioSourcePlayer {
    fn from(buffer: AudioBuffer) -> Self {
        Self::new(Arc::new(buffer))
    }
}

/// Token for one scheduled or sounding playback
#[derive(Debug, PartialEq)]
pub struct LoopPlaybackHandle {
    voice: VoiceId,
    start_time: f64,
    looping: bool,
}

impl LoopPlaybackHandle {
    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    /// Time the playback was scheduled to start
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Schedule the end of this playback; `0.0` (or any past time) means now
    pub fn stop<E: AudioEngine + ?Sized>(self, engine: &mut E, at_time: f64) {
        engine.stop_source(self.voice, at_time);
    }
}
