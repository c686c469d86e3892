//! Audio context: clock, voice scheduling and offline rendering
//!
//! Scheduling a start or stop only records the target frame. Nothing runs
//! until `render` reaches that frame, and the scheduler never observes it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::buffer::{AudioBuffer, ChannelLayout};
use crate::dsp::SignalChain;
use crate::error::{MixerError, Result};

/// Lowest sample rate the engine can run at
pub const MIN_SAMPLE_RATE: u32 = 3000;

/// Highest sample rate the engine can run at
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Identifier of a scheduled playback voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl VoiceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice-{}", self.0)
    }
}

/// Clock and scheduling surface of an audio engine
///
/// Times are seconds on the engine's monotonic clock. Calls never block:
/// they register an action that fires on the engine's own timeline.
pub trait AudioEngine {
    /// Current time of the engine clock in seconds
    fn current_time(&self) -> f64;

    /// Engine sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Schedule `buffer` to start at `start_time`, routed into the signal chain
    ///
    /// A start time in the past starts as soon as possible.
    fn start_source(&mut self, buffer: Arc<AudioBuffer>, start_time: f64, looping: bool) -> VoiceId;

    /// Schedule a voice to stop at `stop_time`
    ///
    /// A time at or before now stops immediately. Stopping before the voice
    /// has started cancels it without any audible onset.
    fn stop_source(&mut self, voice: VoiceId, stop_time: f64);
}

/// A scheduled playback of one buffer
#[derive(Debug, Clone)]
struct Voice {
    id: VoiceId,
    buffer: Arc<AudioBuffer>,
    start_frame: u64,
    stop_frame: Option<u64>,
    looping: bool,
}

impl Voice {
    /// First frame at which the voice is silent for good
    fn end_frame(&self) -> Option<u64> {
        let natural_end = if self.looping {
            None
        } else {
            Some(self.start_frame + self.buffer.len() as u64)
        };
        match (natural_end, self.stop_frame) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.buffer.is_empty() || self.stop_frame.is_some_and(|stop| stop <= self.start_frame)
    }
}

/// Offline audio engine
///
/// Owns the clock (frames rendered so far), the master `SignalChain`, and
/// all pending or sounding voices.
#[derive(Debug)]
pub struct AudioContext {
    sample_rate: u32,
    frames_rendered: u64,
    chain: SignalChain,
    voices: Vec<Voice>,
    next_voice: u64,
}

impl AudioContext {
    /// Create a context with the default equalizer
    ///
    /// # Errors
    /// * `AudioUnsupported` - sample rate outside the engine's range
    pub fn new(sample_rate: u32) -> Result<Self> {
        Self::check_sample_rate(sample_rate)?;
        let chain = SignalChain::new(sample_rate)?;
        Ok(Self::with_chain(sample_rate, chain))
    }

    /// Create a context around an already-built chain
    pub fn with_chain(sample_rate: u32, chain: SignalChain) -> Self {
        Self {
            sample_rate,
            frames_rendered: 0,
            chain,
            voices: Vec::new(),
            next_voice: 0,
        }
    }

    /// Fail if the engine cannot run at `sample_rate`
    pub fn check_sample_rate(sample_rate: u32) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(MixerError::AudioUnsupported {
                reason: format!(
                    "sample rate {} Hz outside {}-{} Hz",
                    sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                ),
            });
        }
        Ok(())
    }

    pub fn chain(&self) -> &SignalChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut SignalChain {
        &mut self.chain
    }

    /// Frames rendered since the context was created
    pub fn current_frame(&self) -> u64 {
        self.frames_rendered
    }

    /// Number of voices that are pending or sounding
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Whether a voice is still pending or sounding
    pub fn is_voice_active(&self, voice: VoiceId) -> bool {
        self.voices.iter().any(|v| v.id == voice)
    }

    /// Frame a voice is scheduled to start on
    pub fn voice_start_frame(&self, voice: VoiceId) -> Option<u64> {
        self.voices.iter().find(|v| v.id == voice).map(|v| v.start_frame)
    }

    fn time_to_frame(&self, time: f64) -> u64 {
        let frame = (time * self.sample_rate as f64).round();
        if frame.is_finite() && frame > self.frames_rendered as f64 {
            frame as u64
        } else {
            self.frames_rendered
        }
    }

    /// Render the next `frames` frames of the mix (stereo)
    ///
    /// Advances the clock by `frames`.
    pub fn render(&mut self, frames: usize) -> AudioBuffer {
        let mut mix = AudioBuffer::new(frames, ChannelLayout::Stereo, self.sample_rate);
        let block_start = self.frames_rendered;
        let block_end = block_start + frames as u64;

        for voice in &self.voices {
            let len = voice.buffer.len() as u64;
            let begin = voice.start_frame.max(block_start);
            let end = voice.end_frame().map_or(block_end, |e| e.min(block_end));
            if begin >= end {
                continue;
            }
            for frame in begin..end {
                let offset = frame - voice.start_frame;
                let index = (if voice.looping { offset % len } else { offset }) as usize;
                let out = (frame - block_start) as usize;
                for ch in 0..mix.channels() {
                    mix.samples[ch][out] += voice.buffer.sample_for_output(ch, index);
                }
            }
        }

        self.voices.retain(|voice| match voice.end_frame() {
            Some(end) if end <= block_end => {
                trace!(voice = %voice.id, "Voice finished");
                false
            }
            _ => true,
        });

        self.chain.process(&mut mix);
        self.frames_rendered = block_end;
        mix
    }

    /// Render `duration_secs` of audio in blocks of `block_size` frames
    pub fn render_seconds(&mut self, duration_secs: f64, block_size: usize) -> AudioBuffer {
        let total = (duration_secs * self.sample_rate as f64).round().max(0.0) as usize;
        let block_size = block_size.max(1);
        let mut out = AudioBuffer::new(0, ChannelLayout::Stereo, self.sample_rate);
        let mut remaining = total;
        while remaining > 0 {
            let n = remaining.min(block_size);
            out.append(&self.render(n));
            remaining -= n;
        }
        out
    }

    /// Render until the clock reaches `time` (no-op if already past it)
    pub fn render_until(&mut self, time: f64, block_size: usize) -> AudioBuffer {
        let target = (time * self.sample_rate as f64).round().max(0.0) as u64;
        let frames = target.saturating_sub(self.frames_rendered);
        self.render_seconds(frames as f64 / self.sample_rate as f64, block_size)
    }
}

impl AudioEngine for AudioContext {
    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start_source(&mut self, buffer: Arc<AudioBuffer>, start_time: f64, looping: bool) -> VoiceId {
        let id = VoiceId(self.next_voice);
        self.next_voice += 1;

        let start_frame = self.time_to_frame(start_time);
        if buffer.is_empty() {
            debug!(voice = %id, "Empty buffer scheduled, nothing to play");
            return id;
        }
        debug!(voice = %id, start_time, start_frame, looping, "Scheduled source start");
        self.voices.push(Voice {
            id,
            buffer,
            start_frame,
            stop_frame: None,
            looping,
        });
        id
    }

    fn stop_source(&mut self, voice: VoiceId, stop_time: f64) {
        let stop_frame = self.time_to_frame(stop_time);
        match self.voices.iter_mut().find(|v| v.id == voice) {
            Some(v) => {
                v.stop_frame = Some(stop_frame);
                debug!(voice = %voice, stop_time, stop_frame, "Scheduled source stop");
            }
            None => trace!(voice = %voice, "Stop for a voice that already ended"),
        }
        self.voices.retain(|v| !v.is_cancelled());
    }
}
